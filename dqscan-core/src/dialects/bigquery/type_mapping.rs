//! BigQuery type catalog.
//!
//! BigQuery reports standard SQL names in `INFORMATION_SCHEMA` and legacy
//! names (`INTEGER`, `FLOAT`, `RECORD`) in REST result schemas. Both map to
//! the standard name. Parameterised and templated names resolve by their
//! base type.

use crate::dialects::{NativeType, UNKNOWN_TYPE};

static TYPE_NAMES: &[(&str, &str)] = &[
    ("ARRAY", "ARRAY"),
    ("BIGDECIMAL", "BIGNUMERIC"),
    ("BIGINT", "INT64"),
    ("BIGNUMERIC", "BIGNUMERIC"),
    ("BOOL", "BOOL"),
    ("BOOLEAN", "BOOL"),
    ("BYTEINT", "INT64"),
    ("BYTES", "BYTES"),
    ("DATE", "DATE"),
    ("DATETIME", "DATETIME"),
    ("DECIMAL", "NUMERIC"),
    ("FLOAT", "FLOAT64"),
    ("FLOAT64", "FLOAT64"),
    ("GEOGRAPHY", "GEOGRAPHY"),
    ("INT", "INT64"),
    ("INT64", "INT64"),
    ("INTEGER", "INT64"),
    ("INTERVAL", "INTERVAL"),
    ("JSON", "JSON"),
    ("NUMERIC", "NUMERIC"),
    ("RANGE", "RANGE"),
    ("RECORD", "STRUCT"),
    ("SMALLINT", "INT64"),
    ("STRING", "STRING"),
    ("STRUCT", "STRUCT"),
    ("TIME", "TIME"),
    ("TIMESTAMP", "TIMESTAMP"),
    ("TINYINT", "INT64"),
];

/// Canonical name for a BigQuery type name.
///
/// `NUMERIC(10,2)` resolves as `NUMERIC`, `ARRAY<INT64>` as `ARRAY`.
pub fn lookup_type_name(name: &str) -> Option<&'static str> {
    let base = name
        .split(['(', '<'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_uppercase();
    TYPE_NAMES
        .binary_search_by_key(&base.as_str(), |(known, _)| *known)
        .ok()
        .map(|index| TYPE_NAMES[index].1)
}

pub(super) fn resolve(native: &NativeType) -> &'static str {
    match native {
        NativeType::Name(name) => lookup_type_name(name).unwrap_or(UNKNOWN_TYPE),
        NativeType::Code(_) => UNKNOWN_TYPE,
    }
}
