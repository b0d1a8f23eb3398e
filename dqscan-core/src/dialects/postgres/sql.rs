//! PostgreSQL query and expression generation.
//!
//! PostgreSQL folds unquoted identifiers to lower case, so catalog lookups
//! compare lower-cased names on both sides.

use super::PostgresDialect;
use crate::Result;
use crate::dialects::sql::{self as common, CastSyntax, QuoteEscape, ValidityFormat};

const CAST_SYNTAX: CastSyntax = CastSyntax {
    literal,
    global_flag: Some("g"),
    decimal_type: "NUMERIC",
};

/// Single-quoted string literal.
pub(super) fn literal(value: &str) -> String {
    format!("'{}'", common::escape_literal(value))
}

/// Double-quoted identifier.
pub(super) fn quote(name: &str) -> String {
    common::quote_identifier(name, '"', QuoteEscape::Doubled)
}

pub(super) fn regexp_like(expr: &str, pattern: &str) -> String {
    format!("{} ~* {}", expr, literal(pattern))
}

pub(super) fn cast_text_to_number(quoted_column: &str, format: ValidityFormat) -> Result<String> {
    Ok(CAST_SYNTAX.cast_text_to_number(quoted_column, format))
}

impl PostgresDialect {
    /// `"schema"."table"`.
    ///
    /// Input already qualified with the bound schema is returned unchanged;
    /// anything else, including a quoted bare table, gets the schema prefix.
    pub(super) fn quote_table(&self, name: &str) -> String {
        let schema = quote(&self.schema);
        let qualified = name
            .strip_prefix(schema.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .is_some_and(|table| common::is_quoted(table, '"', QuoteEscape::Doubled));
        if qualified {
            return name.to_string();
        }
        format!("{}.{}", schema, quote(name))
    }

    pub(super) fn tables_query(&self, limit: Option<u32>, filter: Option<&str>) -> String {
        let mut sql = format!(
            "SELECT table_name \nFROM information_schema.tables \nWHERE lower(table_schema)={}",
            literal(&self.schema.to_lowercase())
        );
        if let Some(pattern) = filter {
            sql.push_str(&format!(" \n  AND table_name ILIKE {}", literal(pattern)));
        }
        sql.push_str(" \nORDER BY table_name");
        if let Some(limit) = limit {
            sql.push_str(&format!(" \nLIMIT {}", limit));
        }
        tracing::trace!("Generated PostgreSQL tables query: {}", sql);
        sql
    }

    pub(super) fn columns_query(&self, table_name: &str) -> Result<String> {
        let table_name = common::require_table_name(table_name)?;
        let sql = format!(
            "SELECT column_name, data_type, is_nullable \n\
             FROM information_schema.columns \n\
             WHERE lower(table_name)={} \n  \
             AND table_catalog={} \n  \
             AND lower(table_schema)={} \n\
             ORDER BY ordinal_position",
            literal(&table_name.to_lowercase()),
            literal(&self.database),
            literal(&self.schema.to_lowercase())
        );
        tracing::trace!("Generated PostgreSQL columns query: {}", sql);
        Ok(sql)
    }
}
