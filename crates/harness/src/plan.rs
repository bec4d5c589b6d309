//! The standard coverage plan for a MySQL MCP server.
//!
//! Order matters: later scenarios read what earlier ones wrote (the second
//! `describe_table` expects the column added by `add_column`, the delete
//! removes a row the bulk insert created). The last scenario drops the
//! scratch table.

use serde_json::json;

use crate::scenario::{Check, Scenario};
use crate::table::TableName;

/// Name used by the missing-table error check.
pub const MISSING_TABLE: &str = "non_existent_table_xyz";

/// Value bound as a parameter to verify the server does not interpolate it.
pub const INJECTION_PAYLOAD: &str = "'; DROP TABLE users; --";

/// Columns created on the scratch table.
pub const COLUMNS: [&str; 5] = ["id", "username", "email", "age", "created_at"];

/// Build the standard plan against `table`.
pub fn standard(table: &TableName) -> Vec<Scenario> {
    let t = table.as_str();
    vec![
        Scenario::new("List all tables in database", "list_tables", json!({})),
        Scenario::new("Get database information", "database_info", json!({})),
        Scenario::new(
            format!("Create test table {t}"),
            "create_table",
            json!({
                "table": t,
                "columns": [
                    {"name": "id", "type": "INT", "primaryKey": true, "autoIncrement": true},
                    {"name": "username", "type": "VARCHAR(50)", "notNull": true, "unique": true},
                    {"name": "email", "type": "VARCHAR(100)", "notNull": true},
                    {"name": "age", "type": "INT"},
                    {"name": "created_at", "type": "TIMESTAMP", "default": "CURRENT_TIMESTAMP"}
                ]
            }),
        ),
        Scenario::new(
            format!("Describe table {t}"),
            "describe_table",
            json!({"table": t}),
        )
        .with_check(Check::columns(COLUMNS)),
        Scenario::new(
            "Show indexes on test table",
            "show_indexes",
            json!({"table": t}),
        ),
        Scenario::new(
            "Insert single row",
            "insert",
            json!({
                "table": t,
                "data": {"username": "john_doe", "email": "john@example.com", "age": 30}
            }),
        ),
        Scenario::new(
            "Insert multiple rows",
            "insert_many",
            json!({
                "table": t,
                "rows": [
                    {"username": "jane_smith", "email": "jane@example.com", "age": 25},
                    {"username": "bob_wilson", "email": "bob@example.com", "age": 35}
                ]
            }),
        ),
        Scenario::new(
            "Select all rows",
            "query",
            json!({"sql": format!("SELECT * FROM {t}")}),
        )
        .with_check(Check::RowCountAtLeast(1)),
        Scenario::new(
            "Select with WHERE clause and parameters",
            "query",
            json!({"sql": format!("SELECT * FROM {t} WHERE age > ?"), "params": [28]}),
        ),
        Scenario::new(
            "Update a row",
            "update",
            json!({"table": t, "set": {"age": 31}, "where": {"username": "john_doe"}}),
        ),
        Scenario::new(
            "Add index on age column",
            "add_index",
            json!({"table": t, "indexName": "idx_age", "columns": ["age"]}),
        ),
        Scenario::new(
            "Explain query execution plan",
            "explain_query",
            json!({"sql": format!("SELECT * FROM {t} WHERE age > 25")}),
        ),
        Scenario::new("Show all constraints", "show_constraints", json!({})),
        Scenario::new(
            "Add new column",
            "add_column",
            json!({"table": t, "column": {"name": "phone", "type": "VARCHAR(20)"}}),
        ),
        Scenario::new(
            "Verify column was added",
            "describe_table",
            json!({"table": t}),
        )
        .with_check(Check::columns(["phone"])),
        Scenario::new(
            "Delete a row",
            "delete",
            json!({"table": t, "where": {"username": "bob_wilson"}}),
        ),
        Scenario::new(
            "Error test: Non-existent table",
            "describe_table",
            json!({"table": MISSING_TABLE}),
        )
        .expect_error(),
        Scenario::new(
            "Security test: SQL injection protection",
            "query",
            json!({
                "sql": format!("SELECT * FROM {t} WHERE username = ?"),
                "params": [INJECTION_PAYLOAD]
            }),
        ),
        Scenario::new(
            "Cleanup: Drop test table",
            "query",
            json!({"sql": format!("DROP TABLE IF EXISTS {t}")}),
        ),
    ]
}

/// Distinct tool names used by a plan, in first-use order.
pub fn tools_used(plan: &[Scenario]) -> Vec<&str> {
    let mut tools: Vec<&str> = Vec::new();
    for scenario in plan {
        if !tools.contains(&scenario.tool.as_str()) {
            tools.push(&scenario.tool);
        }
    }
    tools
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Expectation;

    fn plan() -> Vec<Scenario> {
        standard(&TableName::at("mcp_test", 42).unwrap())
    }

    #[test]
    fn create_table_declares_all_columns() {
        let plan = plan();
        let create = plan.iter().find(|s| s.tool == "create_table").unwrap();
        let names: Vec<&str> = create.arguments["columns"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, COLUMNS);
    }

    #[test]
    fn add_column_precedes_its_verification() {
        let plan = plan();
        let add = plan.iter().position(|s| s.tool == "add_column").unwrap();
        let verify = plan
            .iter()
            .position(|s| s.check == Some(Check::columns(["phone"])))
            .unwrap();
        assert!(add < verify);
    }

    #[test]
    fn only_missing_table_expects_error() {
        let plan = plan();
        let expected: Vec<&Scenario> = plan
            .iter()
            .filter(|s| s.expect == Expectation::Error)
            .collect();
        assert_eq!(expected.len(), 1);
        assert_eq!(expected[0].arguments["table"], MISSING_TABLE);
    }

    #[test]
    fn injection_payload_is_bound_not_interpolated() {
        let plan = plan();
        let injection = plan
            .iter()
            .find(|s| s.name.starts_with("Security test"))
            .unwrap();
        assert_eq!(injection.arguments["params"][0], INJECTION_PAYLOAD);
        assert!(!injection.arguments["sql"].as_str().unwrap().contains("DROP"));
        assert_eq!(injection.expect, Expectation::Success);
    }

    #[test]
    fn every_scenario_targets_the_scratch_table_or_nothing() {
        for scenario in plan() {
            if let Some(table) = scenario.arguments.get("table") {
                assert!(table == "mcp_test_42" || table == MISSING_TABLE);
            }
            if let Some(sql) = scenario.arguments.get("sql") {
                assert!(sql.as_str().unwrap().contains("mcp_test_42"));
            }
        }
    }

    #[test]
    fn plan_ends_by_dropping_the_table() {
        let plan = plan();
        let last = plan.last().unwrap();
        assert_eq!(last.arguments["sql"], "DROP TABLE IF EXISTS mcp_test_42");
    }

    #[test]
    fn tools_used_is_deduplicated() {
        let plan = plan();
        let tools = tools_used(&plan);
        assert_eq!(tools.iter().filter(|t| **t == "query").count(), 1);
        assert_eq!(tools[0], "list_tables");
        assert_eq!(tools.len(), 14);
    }
}
