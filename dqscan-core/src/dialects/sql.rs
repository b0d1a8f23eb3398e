//! SQL text helpers shared by the backend modules.
//!
//! Only mechanics live here: literal escaping, identifier wrapping and the
//! skeleton of the text-to-number cast. The quote characters, escape rules,
//! regex flags and decimal type are constants owned by each backend.

use crate::error::{DqScanError, Result};
use std::fmt;
use std::str::FromStr;

/// Escapes a value for a standard SQL single-quoted literal.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// How a quote character is written inside a quoted identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteEscape {
    /// Embedded quotes are doubled: `"a""b"`
    Doubled,
    /// Embedded quotes and backslashes take a backslash: `` `a\`b` ``
    Backslash,
}

/// Reads back the identifier inside a well-formed quoted name.
///
/// Returns `None` unless `name` is wrapped in `quote` and every embedded
/// quote (and, for [`QuoteEscape::Backslash`], every backslash) is escaped.
pub fn unquote_identifier(name: &str, quote: char, escape: QuoteEscape) -> Option<String> {
    let inner = name.strip_prefix(quote)?.strip_suffix(quote)?;
    let mut unquoted = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match escape {
            QuoteEscape::Doubled if c == quote => {
                if chars.next() != Some(quote) {
                    return None;
                }
                unquoted.push(quote);
            }
            QuoteEscape::Backslash if c == '\\' => match chars.next() {
                Some(next) if next == quote || next == '\\' => unquoted.push(next),
                _ => return None,
            },
            QuoteEscape::Backslash if c == quote => return None,
            _ => unquoted.push(c),
        }
    }
    Some(unquoted)
}

/// Whether `name` is already a well-formed quoted identifier.
pub fn is_quoted(name: &str, quote: char, escape: QuoteEscape) -> bool {
    unquote_identifier(name, quote, escape).is_some()
}

/// Wraps an identifier in `quote`, escaping embedded quote characters.
///
/// Input that is already a well-formed quoted identifier is returned
/// unchanged, so quoting is idempotent. Anything else is escaped whole.
pub fn quote_identifier(name: &str, quote: char, escape: QuoteEscape) -> String {
    if is_quoted(name, quote, escape) {
        return name.to_string();
    }
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push(quote);
    for c in name.chars() {
        match escape {
            QuoteEscape::Doubled if c == quote => {
                quoted.push(quote);
                quoted.push(quote);
            }
            QuoteEscape::Backslash if c == quote || c == '\\' => {
                quoted.push('\\');
                quoted.push(c);
            }
            _ => quoted.push(c),
        }
    }
    quoted.push(quote);
    quoted
}

/// Rejects empty table names before they reach a generated query.
pub fn require_table_name(table_name: &str) -> Result<&str> {
    let trimmed = table_name.trim();
    if trimmed.is_empty() {
        return Err(DqScanError::query_generation("table name must not be empty"));
    }
    Ok(trimmed)
}

/// Declared shape of the text stored in a column being cast to a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidityFormat {
    /// Already a clean numeric string; cast directly
    Numeric,
    NumberWhole,
    NumberDecimalPoint,
    NumberDecimalComma,
    NumberPercentage,
    NumberMoneyUsd,
    NumberMoneyEur,
    NumberMoneyGbp,
    NumberMoneyRmb,
    NumberMoneyChf,
    NumberMoney,
}

impl ValidityFormat {
    /// Every format, in documentation order.
    pub const ALL: [ValidityFormat; 11] = [
        Self::Numeric,
        Self::NumberWhole,
        Self::NumberDecimalPoint,
        Self::NumberDecimalComma,
        Self::NumberPercentage,
        Self::NumberMoneyUsd,
        Self::NumberMoneyEur,
        Self::NumberMoneyGbp,
        Self::NumberMoneyRmb,
        Self::NumberMoneyChf,
        Self::NumberMoney,
    ];

    /// Name used in scan configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::NumberWhole => "number_whole",
            Self::NumberDecimalPoint => "number_decimal_point",
            Self::NumberDecimalComma => "number_decimal_comma",
            Self::NumberPercentage => "number_percentage",
            Self::NumberMoneyUsd => "number_money_usd",
            Self::NumberMoneyEur => "number_money_eur",
            Self::NumberMoneyGbp => "number_money_gbp",
            Self::NumberMoneyRmb => "number_money_rmb",
            Self::NumberMoneyChf => "number_money_chf",
            Self::NumberMoney => "number_money",
        }
    }

    /// Whether values can be cast without cleanup.
    pub fn is_fast_path(&self) -> bool {
        matches!(self, Self::Numeric)
    }

    /// Character separating the fractional part, if the format has one.
    pub fn decimal_separator(&self) -> Option<char> {
        match self {
            Self::Numeric | Self::NumberWhole => None,
            Self::NumberDecimalComma | Self::NumberMoneyEur => Some(','),
            Self::NumberDecimalPoint
            | Self::NumberPercentage
            | Self::NumberMoneyUsd
            | Self::NumberMoneyGbp
            | Self::NumberMoneyRmb
            | Self::NumberMoneyChf
            | Self::NumberMoney => Some('.'),
        }
    }
}

impl fmt::Display for ValidityFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidityFormat {
    type Err = DqScanError;

    fn from_str(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == name)
            .ok_or_else(|| {
                DqScanError::query_generation(format!(
                    "'{}' is not a numeric validity format",
                    name
                ))
            })
    }
}

/// Backend constants for the text-to-number cast.
#[derive(Debug, Clone, Copy)]
pub struct CastSyntax {
    /// Renders a string literal, quotes included
    pub literal: fn(&str) -> String,
    /// Extra `REGEXP_REPLACE` argument for replace-all, if the backend needs one
    pub global_flag: Option<&'static str>,
    /// Target decimal type
    pub decimal_type: &'static str,
}

impl CastSyntax {
    fn regexp_replace(&self, expr: &str, pattern: &str, replacement: &str, global: bool) -> String {
        let flag = match (global, self.global_flag) {
            (true, Some(flag)) => format!(", {}", (self.literal)(flag)),
            _ => String::new(),
        };
        format!(
            "REGEXP_REPLACE({}, {}, {}{})",
            expr,
            (self.literal)(pattern),
            (self.literal)(replacement),
            flag
        )
    }

    /// Builds the cast expression for `format`.
    ///
    /// The general path trims the text, rewrites `(x)` as `-x`, strips every
    /// character other than sign, digits and the decimal separator, turns a
    /// decimal comma into a point and casts. Text left empty becomes NULL.
    pub fn cast_text_to_number(&self, quoted_column: &str, format: ValidityFormat) -> String {
        if format.is_fast_path() {
            return format!("CAST({} AS {})", quoted_column, self.decimal_type);
        }

        let trimmed = format!("TRIM({})", quoted_column);
        let negated = self.regexp_replace(&trimmed, r"^\((.*)\)$", r"-\1", false);
        let keep = match format.decimal_separator() {
            Some(separator) => format!(r"[^-0-9{}]", separator),
            None => r"[^-0-9]".to_string(),
        };
        let mut cleaned = self.regexp_replace(&negated, &keep, "", true);
        if format.decimal_separator() == Some(',') {
            cleaned = format!(
                "REPLACE({}, {}, {})",
                cleaned,
                (self.literal)(","),
                (self.literal)(".")
            );
        }
        format!(
            "CAST(NULLIF({}, {}) AS {})",
            cleaned,
            (self.literal)(""),
            self.decimal_type
        )
    }
}
