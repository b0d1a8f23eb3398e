//! BigQuery query and expression generation.

use super::BigQueryDialect;
use crate::Result;
use crate::dialects::sql::{self as common, CastSyntax, QuoteEscape, ValidityFormat};

const CAST_SYNTAX: CastSyntax = CastSyntax {
    literal,
    global_flag: None,
    decimal_type: "NUMERIC",
};

/// Single-quoted string literal with backslash escapes.
///
/// Control characters are written as escape sequences; the literal never
/// spans lines.
pub(super) fn literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('\'');
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if c.is_control() => escaped.push_str(&format!("\\x{:02x}", u32::from(c))),
            c => escaped.push(c),
        }
    }
    escaped.push('\'');
    escaped
}

/// Backtick-quoted identifier.
pub(super) fn quote(name: &str) -> String {
    common::quote_identifier(name, '`', QuoteEscape::Backslash)
}

pub(super) fn regexp_like(expr: &str, pattern: &str) -> String {
    format!("REGEXP_CONTAINS({}, {})", expr, literal(pattern))
}

pub(super) fn cast_text_to_number(quoted_column: &str, format: ValidityFormat) -> Result<String> {
    Ok(CAST_SYNTAX.cast_text_to_number(quoted_column, format))
}

impl BigQueryDialect {
    /// `` `dataset.table` ``.
    ///
    /// Input already quoted and qualified with the bound dataset is returned
    /// unchanged. A quoted bare table is unwrapped and qualified.
    pub(super) fn quote_table(&self, name: &str) -> String {
        let table = match common::unquote_identifier(name, '`', QuoteEscape::Backslash) {
            Some(inner) => {
                let in_dataset = inner
                    .strip_prefix(self.dataset.as_str())
                    .is_some_and(|rest| rest.starts_with('.'));
                if in_dataset {
                    return name.to_string();
                }
                inner
            }
            None => name.to_string(),
        };
        quote(&format!("{}.{}", self.dataset, table))
    }

    fn catalog_view(&self, view: &str) -> String {
        quote(&format!("{}.INFORMATION_SCHEMA.{}", self.dataset, view))
    }

    pub(super) fn tables_query(&self, limit: Option<u32>, filter: Option<&str>) -> String {
        let mut sql = format!(
            "SELECT table_name \nFROM {}",
            self.catalog_view("TABLES")
        );
        if let Some(pattern) = filter {
            sql.push_str(&format!(" \nWHERE table_name LIKE {}", literal(pattern)));
        }
        sql.push_str(" \nORDER BY table_name");
        if let Some(limit) = limit {
            sql.push_str(&format!(" \nLIMIT {}", limit));
        }
        tracing::trace!("Generated BigQuery tables query: {}", sql);
        sql
    }

    pub(super) fn columns_query(&self, table_name: &str) -> Result<String> {
        let table_name = common::require_table_name(table_name)?;
        let sql = format!(
            "SELECT column_name, data_type, is_nullable \nFROM {} \nWHERE table_name = {} \nORDER BY ordinal_position",
            self.catalog_view("COLUMNS"),
            literal(table_name)
        );
        tracing::trace!("Generated BigQuery columns query: {}", sql);
        Ok(sql)
    }
}
