//! Credential values and the indirections they may be read through.
//!
//! # Security
//! - Resolved secrets live in `Zeroizing` containers and are cleared on drop
//! - `Debug` output never shows secret text
//! - Secrets are resolved once, at bind time, and never serialized back out

use crate::error::ConfigurationError;
use std::fmt;
use std::path::PathBuf;
use zeroize::Zeroizing;

const ENV_VAR_MARKER: &str = "env_var";
const SECRET_FILE_MARKER: &str = "secret_file";

/// Extracts the argument of a `marker(ARG)` indirection, if `raw` is one.
pub(crate) fn marker_argument<'a>(raw: &'a str, marker: &str) -> Option<&'a str> {
    raw.trim()
        .strip_prefix(marker)?
        .strip_prefix('(')?
        .strip_suffix(')')
        .map(str::trim)
        .filter(|arg| !arg.is_empty())
}

/// Returns the variable name if `raw` is an `env_var(NAME)` marker.
pub(crate) fn env_var_name(raw: &str) -> Option<&str> {
    marker_argument(raw, ENV_VAR_MARKER)
}

/// Reads an environment variable on behalf of configuration key `key`.
pub(crate) fn read_env_var(key: &str, variable: &str) -> Result<String, ConfigurationError> {
    std::env::var(variable).map_err(|_| ConfigurationError::EnvVarUnset {
        key: key.to_string(),
        variable: variable.to_string(),
    })
}

/// Where a credential value comes from.
pub enum SecretSource {
    /// The value written directly in the configuration
    Literal(Zeroizing<String>),
    /// `env_var(NAME)`: read the named environment variable
    EnvVar(String),
    /// `secret_file(PATH)`: read the whole file as the secret
    File(PathBuf),
}

impl SecretSource {
    /// Interprets a raw configuration string.
    ///
    /// # Example
    /// ```rust
    /// use dqscan_core::config::SecretSource;
    ///
    /// assert!(matches!(SecretSource::parse("env_var(PGPASSWORD)"), SecretSource::EnvVar(v) if v == "PGPASSWORD"));
    /// assert!(matches!(SecretSource::parse("hunter2"), SecretSource::Literal(_)));
    /// ```
    pub fn parse(raw: &str) -> Self {
        if let Some(variable) = env_var_name(raw) {
            Self::EnvVar(variable.to_string())
        } else if let Some(path) = marker_argument(raw, SECRET_FILE_MARKER) {
            Self::File(PathBuf::from(path))
        } else {
            Self::Literal(Zeroizing::new(raw.to_string()))
        }
    }

    /// Resolves the source into a secret on behalf of configuration key `key`.
    ///
    /// # Errors
    /// - `EnvVarUnset` if the referenced variable is not set
    /// - `SecretFileUnreadable` if the referenced file cannot be read
    pub fn resolve(&self, key: &str) -> Result<Secret, ConfigurationError> {
        match self {
            Self::Literal(value) => Ok(Secret::new(value.to_string())),
            Self::EnvVar(variable) => read_env_var(key, variable).map(Secret::new),
            Self::File(path) => {
                let contents = std::fs::read_to_string(path).map_err(|source| {
                    ConfigurationError::SecretFileUnreadable {
                        key: key.to_string(),
                        path: path.clone(),
                        source,
                    }
                })?;
                let contents = Zeroizing::new(contents);
                Ok(Secret::new(
                    contents.trim_end_matches(['\r', '\n']).to_string(),
                ))
            }
        }
    }
}

impl fmt::Debug for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(_) => f.write_str("Literal(****)"),
            Self::EnvVar(variable) => f.debug_tuple("EnvVar").field(variable).finish(),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

/// Secret text with automatic memory zeroing.
///
/// # Example
/// ```rust
/// use dqscan_core::config::Secret;
///
/// let secret = Secret::new("s3cret".to_string());
/// assert_eq!(secret.expose(), "s3cret");
/// assert!(!format!("{:?}", secret).contains("s3cret"));
/// ```
#[derive(Clone)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    /// Wraps secret text.
    pub fn new(value: String) -> Self {
        Self(Zeroizing::new(value))
    }

    /// Gives access to the secret text for handing to a driver.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Checks whether the secret is empty without exposing it.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_marker_argument() {
        assert_eq!(marker_argument("env_var(HOME)", "env_var"), Some("HOME"));
        assert_eq!(marker_argument("  env_var( HOME ) ", "env_var"), Some("HOME"));
        assert_eq!(marker_argument("env_var()", "env_var"), None);
        assert_eq!(marker_argument("env_var(HOME", "env_var"), None);
        assert_eq!(marker_argument("HOME", "env_var"), None);
        assert_eq!(
            marker_argument("secret_file(/run/pg.pass)", "secret_file"),
            Some("/run/pg.pass")
        );
    }

    #[test]
    fn test_secret_source_parse() {
        assert!(matches!(SecretSource::parse("env_var(PW)"), SecretSource::EnvVar(v) if v == "PW"));
        assert!(
            matches!(SecretSource::parse("secret_file(/tmp/pw)"), SecretSource::File(p) if p == PathBuf::from("/tmp/pw"))
        );
        assert!(matches!(SecretSource::parse("plain"), SecretSource::Literal(_)));
    }

    #[test]
    fn test_secret_source_debug_redacts_literal() {
        let source = SecretSource::parse("hunter2");
        assert!(!format!("{:?}", source).contains("hunter2"));
    }

    #[test]
    fn test_credential_from_env_var() {
        temp_env::with_var("DQSCAN_TEST_SECRET_PW", Some("from-env"), || {
            let secret = SecretSource::parse("env_var(DQSCAN_TEST_SECRET_PW)")
                .resolve("password")
                .unwrap();
            assert_eq!(secret.expose(), "from-env");
        });
    }

    #[test]
    fn test_credential_env_var_unset() {
        temp_env::with_var_unset("DQSCAN_TEST_SECRET_MISSING", || {
            let error = SecretSource::parse("env_var(DQSCAN_TEST_SECRET_MISSING)")
                .resolve("password")
                .unwrap_err();
            assert!(matches!(
                error,
                ConfigurationError::EnvVarUnset { ref key, ref variable }
                    if key == "password" && variable == "DQSCAN_TEST_SECRET_MISSING"
            ));
        });
    }

    #[test]
    fn test_credential_from_secret_file_strips_newline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "file-secret").unwrap();

        let raw = format!("secret_file({})", file.path().display());
        let secret = SecretSource::parse(&raw).resolve("password").unwrap();
        assert_eq!(secret.expose(), "file-secret");
    }

    #[test]
    fn test_credential_secret_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");

        let raw = format!("secret_file({})", path.display());
        let error = SecretSource::parse(&raw).resolve("password").unwrap_err();
        assert!(matches!(error, ConfigurationError::SecretFileUnreadable { .. }));
        assert_eq!(error.key(), "password");
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("topsecret".to_string());
        assert_eq!(format!("{:?}", secret), "Secret(****)");
        assert!(!secret.is_empty());
    }
}
