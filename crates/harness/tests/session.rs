//! End-to-end runs against a scripted stand-in for the MySQL MCP server.

#![cfg(unix)]

use std::time::Duration;

use harness::{
    ErrorDetail, RunOptions, Silent, Status, Summary, TableName, Verdict, execute, plan,
};
use mcp::ServerConfig;

/// Answers by pattern-matching request lines. The request id is the last
/// field on the line, so it is cut from the end. Lines without an id are
/// notifications and get no answer. `show_constraints` is never answered.
const FAKE_SERVER: &str = r#"
[ "$ALLOW_WRITE_OPERATIONS" = true ] || exit 7
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\)}$/\1/p')
  [ -z "$id" ] && continue
  case "$line" in
    *'"method":"initialize"'*)
      cat <<EOF
{"jsonrpc":"2.0","id":$id,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"fake-mysql","version":"0.0.1"}}}
EOF
      ;;
    *'"method":"tools/list"'*)
      cat <<EOF
{"jsonrpc":"2.0","id":$id,"result":{"tools":[{"name":"query"},{"name":"describe_table"}]}}
EOF
      ;;
    *non_existent_table_xyz*)
      cat <<EOF
{"jsonrpc":"2.0","id":$id,"error":{"code":-32603,"message":"Table 'test.non_existent_table_xyz' doesn't exist"}}
EOF
      ;;
    *'"name":"show_constraints"'*)
      ;;
    *'"name":"describe_table"'*)
      cat <<EOF
{"jsonrpc":"2.0","id":$id,"result":{"content":[{"type":"text","text":"Schema for table:\n[{\"Field\":\"id\"},{\"Field\":\"username\"},{\"Field\":\"email\"},{\"Field\":\"age\"},{\"Field\":\"created_at\"},{\"Field\":\"phone\"}]"}]}}
EOF
      ;;
    *'"name":"query"'*)
      cat <<EOF
{"jsonrpc":"2.0","id":$id,"result":{"content":[{"type":"text","text":"{\"rows\":[{\"id\":1}],\"rowCount\":1}"}]}}
EOF
      ;;
    *)
      cat <<EOF
{"jsonrpc":"2.0","id":$id,"result":{"content":[{"type":"text","text":"ok"}]}}
EOF
      ;;
  esac
done
exit 0
"#;

fn sh(script: &str) -> ServerConfig {
    let mut config = ServerConfig::new("sh");
    config.args = vec!["-c".to_string(), script.to_string()];
    config.shutdown_grace = Duration::from_millis(500);
    config
}

fn options() -> RunOptions {
    RunOptions {
        response_timeout: Duration::from_millis(500),
        startup_delay: Duration::from_millis(50),
        ..RunOptions::default()
    }
}

#[tokio::test]
async fn standard_plan_against_fake_server() {
    let table = TableName::at("mcp_test", 1_700_000_000).unwrap();
    let plan = plan::standard(&table);

    let report = execute(sh(FAKE_SERVER), options(), table, &plan, &mut Silent)
        .await
        .unwrap();

    assert!(report.failure.is_none(), "{:?}", report.failure);
    assert!(report.server_pid.is_some());
    assert_eq!(report.tools.len(), 2);
    assert_eq!(report.records.len(), plan.len());
    for (record, scenario) in report.records.iter().zip(&plan) {
        assert_eq!(record.scenario, scenario.name);
        assert_eq!(record.tool, scenario.tool);
        assert_eq!(record.status == Status::Pass, record.error.is_none());
    }

    let unanswered = report
        .records
        .iter()
        .find(|r| r.tool == "show_constraints")
        .unwrap();
    assert_eq!(unanswered.error, Some(ErrorDetail::NoResponse));

    let missing = report
        .records
        .iter()
        .find(|r| r.scenario.starts_with("Error test"))
        .unwrap();
    assert_eq!(missing.status, Status::Fail);
    assert_eq!(missing.verdict(), Verdict::ExpectedFail);

    let describe = report
        .records
        .iter()
        .find(|r| r.tool == "describe_table")
        .unwrap();
    assert_eq!(describe.verdict(), Verdict::Pass);

    let summary = Summary::from_records(&report.records);
    assert_eq!(summary.total, 19);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.expected_failures, 1);
    assert_eq!(summary.regressions.len(), 1);
    assert_eq!(summary.by_tool["query"].total, 4);

    // The fake exits on EOF, so cleanup should see a clean exit.
    assert!(report.server_exit.unwrap().success());
}

#[tokio::test]
async fn spawn_failure_is_reported_without_records() {
    let table = TableName::at("mcp_test", 1).unwrap();
    let plan = plan::standard(&table);
    let result = execute(
        ServerConfig::new("/nonexistent/mysql-mcp-server"),
        options(),
        table,
        &plan,
        &mut Silent,
    )
    .await;

    assert!(matches!(result, Err(harness::Error::Mcp(mcp::Error::Spawn { .. }))));
}

#[tokio::test]
async fn server_that_stops_reading_is_still_cleaned_up() {
    // Closes its stdin straight away and then hangs around.
    let table = TableName::at("mcp_test", 2).unwrap();
    let plan = plan::standard(&table);

    let report = execute(sh("exec 0<&-; exec sleep 30"), options(), table, &plan, &mut Silent)
        .await
        .unwrap();

    assert!(matches!(report.failure, Some(harness::Error::Mcp(_))));
    assert!(report.records.is_empty());
    let status = report.server_exit.unwrap();
    assert!(!status.success());
}

#[tokio::test]
async fn server_without_write_toggle_is_rejected_by_fake() {
    let mut config = sh(FAKE_SERVER);
    config.allow_writes = false;
    let table = TableName::at("mcp_test", 3).unwrap();
    let plan = plan::standard(&table);

    let report = execute(config, options(), table, &plan, &mut Silent)
        .await
        .unwrap();

    assert_eq!(report.server_exit.unwrap().code(), Some(7));
}
