//! Property tests for the dialect contract across every built-in backend.

use dqscan_core::{
    Configuration, Dialect, DialectRegistry, ErrorClassification, WarehouseType,
};
use proptest::prelude::*;
use serde_json::json;

fn postgres_config(schema: &str, database: &str) -> Configuration {
    Configuration::new()
        .with("type", "postgres")
        .with("username", "u")
        .with("password", "p")
        .with("database", database)
        .with("schema", schema)
}

fn bigquery_config(dataset: &str) -> Configuration {
    Configuration::new()
        .with("type", "bigquery")
        .with("account_info", json!({"project_id": "proj"}))
        .with("dataset", dataset)
}

fn all_dialects() -> Vec<Box<dyn Dialect>> {
    let registry = DialectRegistry::with_builtins();
    vec![
        registry.create(&postgres_config("s", "d")).unwrap(),
        registry.create(&bigquery_config("ds")).unwrap(),
    ]
}

/// Reverses the string-literal escaping of each backend.
fn decode_literal(warehouse: WarehouseType, body: &str) -> String {
    match warehouse {
        WarehouseType::Postgres => body.replace("''", "'"),
        _ => {
            let mut decoded = String::with_capacity(body.len());
            let mut chars = body.chars();
            while let Some(c) = chars.next() {
                if c != '\\' {
                    decoded.push(c);
                    continue;
                }
                match chars.next() {
                    Some('n') => decoded.push('\n'),
                    Some('r') => decoded.push('\r'),
                    Some('t') => decoded.push('\t'),
                    Some('x') => {
                        let hex: String = chars.by_ref().take(2).collect();
                        let code = u32::from_str_radix(&hex, 16).unwrap();
                        decoded.extend(char::from_u32(code));
                    }
                    Some(other) => decoded.push(other),
                    None => {}
                }
            }
            decoded
        }
    }
}

#[test]
fn test_registry_covers_every_warehouse_type() {
    let dialects = all_dialects();
    let types: Vec<WarehouseType> = dialects.iter().map(|d| d.warehouse_type()).collect();
    assert_eq!(types, WarehouseType::ALL);
}

proptest! {
    #[test]
    fn prop_qualify_is_idempotent(name in "[ -~]{0,30}") {
        for dialect in all_dialects() {
            let table = dialect.qualify_table_name(&name);
            prop_assert_eq!(dialect.qualify_table_name(&table), table.clone());

            let column = dialect.qualify_column_name(&name);
            prop_assert_eq!(dialect.qualify_column_name(&column), column.clone());
        }
    }

    #[test]
    fn prop_quoted_column_keeps_the_name(name in "[a-zA-Z_][a-zA-Z0-9_ ]{0,20}") {
        for dialect in all_dialects() {
            let column = dialect.qualify_column_name(&name);
            prop_assert!(column.len() == name.len() + 2);
            prop_assert!(column.contains(&name));
        }
    }

    #[test]
    fn prop_bound_values_round_trip(
        schema in "[a-zA-Z_][a-zA-Z0-9_]{0,20}",
        database in "[a-zA-Z_][a-zA-Z0-9_]{0,20}",
    ) {
        let registry = DialectRegistry::with_builtins();
        let dialect = registry.create(&postgres_config(&schema, &database)).unwrap();
        let tables = dialect.tables_metadata_query(None, None);
        let expected = format!("lower(table_schema)='{}'", schema.to_lowercase());
        prop_assert!(tables.contains(&expected));

        let columns = dialect.columns_metadata_query("t").unwrap();
        let expected_catalog = format!("table_catalog='{}'", database);
        prop_assert!(columns.contains(&expected_catalog));

        let bigquery = registry.create(&bigquery_config(&schema)).unwrap();
        let expected_view = format!("`{}.INFORMATION_SCHEMA.TABLES`", schema);
        prop_assert!(bigquery.tables_metadata_query(None, None).contains(&expected_view));
    }

    #[test]
    fn prop_regex_pattern_survives_escaping(pattern in "(?s).{0,30}") {
        for dialect in all_dialects() {
            let sql = dialect.expr_regexp_like("x", &pattern);
            let start = sql.find('\'').unwrap();
            let end = sql.rfind('\'').unwrap();
            prop_assert!(start < end);
            let body = &sql[start + 1..end];
            prop_assert_eq!(decode_literal(dialect.warehouse_type(), body), pattern.clone());
            if dialect.warehouse_type() == WarehouseType::BigQuery {
                prop_assert!(!body.chars().any(char::is_control));
            }
        }
    }

    #[test]
    fn prop_unrelated_text_is_unclassified(message in "[a-z0-9]{0,40}") {
        for dialect in all_dialects() {
            prop_assert_eq!(dialect.classify_message(&message), ErrorClassification::Unclassified);
        }
    }

    #[test]
    fn prop_unknown_type_codes_never_fail(code in 100_000u32..) {
        for dialect in all_dialects() {
            prop_assert_eq!(
                dialect.resolve_type_name(&code.into()),
                dqscan_core::UNKNOWN_TYPE
            );
        }
    }
}
