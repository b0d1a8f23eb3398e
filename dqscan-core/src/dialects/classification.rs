//! Advisory classification of connection failures.
//!
//! Backends do not expose stable error codes through every driver, so
//! classification works on error text. It is best-effort: anything not
//! recognized is [`ErrorClassification::Unclassified`], which the engine
//! treats as a non-retryable failure.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bucket assigned to a failed connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorClassification {
    /// Transient network failure; safe to retry with backoff
    ConnectionError,
    /// Credentials rejected; retrying wastes time and risks lockouts
    AuthenticationError,
    /// Anything else
    Unclassified,
}

impl ErrorClassification {
    /// Whether an engine should retry after this failure.
    pub fn is_retryable(self) -> bool {
        self == Self::ConnectionError
    }
}

impl fmt::Display for ErrorClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionError => write!(f, "connection-error"),
            Self::AuthenticationError => write!(f, "authentication-error"),
            Self::Unclassified => write!(f, "unclassified"),
        }
    }
}

/// Substring table for one backend.
///
/// Matching is case-sensitive. Connection rules are checked before
/// authentication rules.
#[derive(Debug)]
pub struct ClassificationRules {
    pub connection: &'static [&'static str],
    pub authentication: &'static [&'static str],
    pub authentication_patterns: Vec<Regex>,
}

impl ClassificationRules {
    /// Classifies a message against this table.
    pub fn classify(&self, message: &str) -> ErrorClassification {
        if self.connection.iter().any(|needle| message.contains(needle)) {
            ErrorClassification::ConnectionError
        } else if self
            .authentication
            .iter()
            .any(|needle| message.contains(needle))
            || self
                .authentication_patterns
                .iter()
                .any(|pattern| pattern.is_match(message))
        {
            ErrorClassification::AuthenticationError
        } else {
            ErrorClassification::Unclassified
        }
    }
}

/// Joins the display text of an error and all of its sources.
///
/// Drivers often wrap the interesting message (`Connection refused`, a
/// server notice) a level or two down.
pub fn error_chain_text(error: &(dyn std::error::Error + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
