//! Sequential scenario execution.

use std::time::Duration;

use mcp::{CallToolResult, InitializeResult, JsonRpcResponse, RpcClient, Tool};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::Result;
use crate::record::{ErrorDetail, Status, TestRecord};
use crate::scenario::{Check, Expectation, Scenario};

/// Default number of characters kept from a result preview.
pub const DEFAULT_PREVIEW_CHARS: usize = 200;

/// Timing and display knobs for a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// How long to wait for each response.
    pub response_timeout: Duration,
    /// Pause after sending `initialize`, before reading its answer.
    pub startup_delay: Duration,
    pub preview_chars: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            response_timeout: mcp::DEFAULT_TIMEOUT,
            startup_delay: Duration::from_secs(1),
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

/// Observer for run progress.
pub trait Progress {
    fn tools_discovered(&mut self, _tools: &[Tool]) {}

    fn scenario_started(&mut self, _index: usize, _total: usize, _scenario: &Scenario) {}

    fn scenario_finished(&mut self, _record: &TestRecord) {}
}

/// A progress observer that ignores everything.
#[derive(Debug, Default)]
pub struct Silent;

impl Progress for Silent {}

/// Classified response to a tool call.
#[derive(Debug)]
pub struct Outcome {
    pub status: Status,
    pub error: Option<ErrorDetail>,
    pub result: Option<CallToolResult>,
}

/// Classify a tool call response.
///
/// PASS exactly when a response arrived and carries no error payload, either
/// as a JSON-RPC `error` or as a tool result flagged `isError`. A response with
/// no payload at all still passes but is logged.
pub fn classify(response: Option<JsonRpcResponse>) -> Outcome {
    let Some(response) = response else {
        return Outcome {
            status: Status::Fail,
            error: Some(ErrorDetail::NoResponse),
            result: None,
        };
    };

    if !response.has_payload() {
        warn!(id = ?response.id, "response has neither result nor error");
    }

    match response.into_result() {
        Err(error) => Outcome {
            status: Status::Fail,
            error: Some(ErrorDetail::Rpc(error)),
            result: None,
        },
        Ok(value) => {
            let result = serde_json::from_value::<CallToolResult>(value).ok();
            match result {
                Some(result) if result.is_error => Outcome {
                    status: Status::Fail,
                    error: Some(ErrorDetail::Tool(result.joined_text())),
                    result: Some(result),
                },
                result => Outcome {
                    status: Status::Pass,
                    error: None,
                    result,
                },
            }
        }
    }
}

/// Keep at most `max` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Drives scenarios over one client and keeps their records in order.
pub struct Runner<W, R> {
    client: RpcClient<W, R>,
    options: RunOptions,
    records: Vec<TestRecord>,
}

impl<W, R> Runner<W, R>
where
    W: AsyncWrite + Unpin,
    R: AsyncBufRead + Unpin,
{
    pub fn new(client: RpcClient<W, R>, options: RunOptions) -> Self {
        Self {
            client,
            options,
            records: Vec::new(),
        }
    }

    /// Records so far, in execution order.
    pub fn records(&self) -> &[TestRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<TestRecord> {
        self.records
    }

    /// Run the MCP handshake.
    pub async fn handshake(&mut self) -> Result<Option<InitializeResult>> {
        let result = self
            .client
            .initialize(self.options.startup_delay, self.options.response_timeout)
            .await?;
        match &result {
            Some(init) => info!(
                protocol = %init.protocol_version,
                server = init.server_info.as_ref().map(|s| s.name.as_str()).unwrap_or("unknown"),
                "server initialized"
            ),
            None => warn!("no usable answer to initialize, continuing"),
        }
        Ok(result)
    }

    /// Ask the server which tools it offers. Not recorded as a scenario.
    pub async fn discover_tools(&mut self) -> Result<Vec<Tool>> {
        let tools = self
            .client
            .list_tools(self.options.response_timeout)
            .await?
            .unwrap_or_else(|| {
                warn!("tools/list returned nothing");
                Vec::new()
            });
        debug!(count = tools.len(), "discovered tools");
        Ok(tools)
    }

    /// Invoke one tool and append exactly one record.
    pub async fn call_tool(&mut self, tool: &str, arguments: Value, scenario: &str) -> &TestRecord {
        self.invoke(tool, arguments, scenario, Expectation::Success, None)
            .await
    }

    /// Run a scenario with its expectation and check.
    pub async fn run_scenario(&mut self, scenario: &Scenario) -> &TestRecord {
        self.invoke(
            &scenario.tool,
            scenario.arguments.clone(),
            &scenario.name,
            scenario.expect,
            scenario.check.as_ref(),
        )
        .await
    }

    /// Run every scenario of `plan` once, in order.
    pub async fn run_plan(&mut self, plan: &[Scenario], progress: &mut impl Progress) {
        let total = plan.len();
        for (index, scenario) in plan.iter().enumerate() {
            progress.scenario_started(index, total, scenario);
            let record = self.run_scenario(scenario).await;
            progress.scenario_finished(record);
        }
    }

    async fn invoke(
        &mut self,
        tool: &str,
        arguments: Value,
        scenario: &str,
        expect: Expectation,
        check: Option<&Check>,
    ) -> &TestRecord {
        let sent = self
            .client
            .call_tool(tool, arguments, self.options.response_timeout)
            .await;

        let outcome = match sent {
            Ok(response) => classify(response),
            Err(e) => {
                warn!(tool, error = %e, "failed to send tool call");
                Outcome {
                    status: Status::Fail,
                    error: Some(ErrorDetail::SendFailed(e.to_string())),
                    result: None,
                }
            }
        };

        let result = outcome.result.as_ref();
        let check_failure = match (outcome.status, check, result) {
            (Status::Pass, Some(check), Some(result)) => check.evaluate(result).err(),
            (Status::Pass, Some(_), None) => Some("result is not a tool result".to_string()),
            _ => None,
        };
        let preview = result
            .and_then(CallToolResult::first_text)
            .filter(|_| outcome.status == Status::Pass)
            .map(|text| truncate_chars(text, self.options.preview_chars));

        let record = TestRecord {
            scenario: scenario.to_string(),
            tool: tool.to_string(),
            status: outcome.status,
            error: outcome.error,
            expect,
            check_failure,
            preview,
        };
        info!(
            scenario,
            tool,
            status = %record.status,
            verdict = record.verdict().label(),
            "scenario finished"
        );

        self.records.push(record);
        &self.records[self.records.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Verdict;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    fn response(json: Value) -> Option<JsonRpcResponse> {
        Some(serde_json::from_value(json).unwrap())
    }

    #[test]
    fn classify_missing_response_as_no_response() {
        let outcome = classify(None);
        assert_eq!(outcome.status, Status::Fail);
        assert_eq!(outcome.error, Some(ErrorDetail::NoResponse));
    }

    #[test]
    fn classify_rpc_error() {
        let outcome = classify(response(json!({
            "jsonrpc": "2.0", "id": 4,
            "error": {"code": -32602, "message": "Invalid table name"}
        })));
        assert_eq!(outcome.status, Status::Fail);
        assert_eq!(
            outcome.error.unwrap().to_string(),
            "[-32602] Invalid table name"
        );
    }

    #[test]
    fn classify_flagged_tool_error() {
        let outcome = classify(response(json!({
            "jsonrpc": "2.0", "id": 4,
            "result": {
                "content": [{"type": "text", "text": "Error: Table 'db.x' doesn't exist"}],
                "isError": true
            }
        })));
        assert_eq!(outcome.status, Status::Fail);
        assert_eq!(
            outcome.error,
            Some(ErrorDetail::Tool("Error: Table 'db.x' doesn't exist".to_string()))
        );
    }

    #[test]
    fn classify_success() {
        let outcome = classify(response(json!({
            "jsonrpc": "2.0", "id": 4,
            "result": {"content": [{"type": "text", "text": "Found 3 tables"}]}
        })));
        assert_eq!(outcome.status, Status::Pass);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.result.unwrap().first_text(), Some("Found 3 tables"));
    }

    #[test]
    fn classify_bare_result_as_pass() {
        let outcome = classify(response(json!({"jsonrpc": "2.0", "id": 4})));
        assert_eq!(outcome.status, Status::Pass);
        assert!(outcome.result.is_none());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("ééééé", 2), "éé...");
    }

    /// Fake server answering each request line with `reply(request)`.
    fn runner_with<F>(reply: F) -> Runner<impl AsyncWrite + Unpin, impl AsyncBufRead + Unpin>
    where
        F: Fn(&Value) -> Option<Value> + Send + 'static,
    {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (client_r, client_w) = tokio::io::split(client_io);
        let (server_r, mut server_w) = tokio::io::split(server_io);

        tokio::spawn(async move {
            let mut lines = BufReader::new(server_r).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let request: Value = serde_json::from_str(&line).unwrap();
                if let Some(mut answer) = reply(&request) {
                    answer["jsonrpc"] = json!("2.0");
                    answer["id"] = request["id"].clone();
                    let mut out = serde_json::to_vec(&answer).unwrap();
                    out.push(b'\n');
                    if server_w.write_all(&out).await.is_err() {
                        break;
                    }
                }
            }
        });

        let options = RunOptions {
            response_timeout: Duration::from_millis(200),
            startup_delay: Duration::from_millis(10),
            preview_chars: 8,
        };
        Runner::new(RpcClient::new(client_w, BufReader::new(client_r)), options)
    }

    fn text(text: &str) -> Value {
        json!({"result": {"content": [{"type": "text", "text": text}]}})
    }

    #[tokio::test]
    async fn every_call_appends_one_record() {
        let mut runner = runner_with(|request| match request["params"]["name"].as_str() {
            Some("slow_tool") => None,
            Some("broken") => Some(json!({"error": {"code": -1, "message": "boom"}})),
            _ => Some(text("a fairly long response body")),
        });

        runner.call_tool("list_tables", json!({}), "list").await;
        runner.call_tool("slow_tool", json!({}), "slow").await;
        runner.call_tool("broken", json!({}), "broken").await;

        let records = runner.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].status, Status::Pass);
        assert_eq!(records[0].preview.as_deref(), Some("a fairly..."));
        assert_eq!(records[1].error, Some(ErrorDetail::NoResponse));
        assert_eq!(records[2].error.as_ref().unwrap().to_string(), "[-1] boom");
    }

    #[tokio::test]
    async fn scenario_checks_and_expectations_shape_the_verdict() {
        let mut runner = runner_with(|request| {
            let args = &request["params"]["arguments"];
            if args["table"] == "missing" {
                return Some(json!({"error": {"code": -32603, "message": "no such table"}}));
            }
            Some(text(r#"{"rows": [], "rowCount": 0}"#))
        });

        let plan = vec![
            Scenario::new("empty select", "query", json!({"sql": "SELECT 1"}))
                .with_check(Check::RowCountAtLeast(1)),
            Scenario::new("missing", "describe_table", json!({"table": "missing"}))
                .expect_error(),
        ];
        runner.run_plan(&plan, &mut Silent).await;

        let verdicts: Vec<Verdict> = runner.records().iter().map(TestRecord::verdict).collect();
        assert_eq!(verdicts, [Verdict::CheckFailed, Verdict::ExpectedFail]);
        assert_eq!(
            runner.records()[0].check_failure.as_deref(),
            Some("expected rowCount >= 1, got 0")
        );
    }

    #[tokio::test]
    async fn progress_sees_each_scenario() {
        #[derive(Default)]
        struct Counting {
            started: Vec<usize>,
            finished: usize,
        }
        impl Progress for Counting {
            fn scenario_started(&mut self, index: usize, total: usize, _scenario: &Scenario) {
                assert_eq!(total, 2);
                self.started.push(index);
            }
            fn scenario_finished(&mut self, _record: &TestRecord) {
                self.finished += 1;
            }
        }

        let mut runner = runner_with(|_| Some(text("ok")));
        let plan = vec![
            Scenario::new("a", "list_tables", json!({})),
            Scenario::new("b", "database_info", json!({})),
        ];
        let mut progress = Counting::default();
        runner.run_plan(&plan, &mut progress).await;

        assert_eq!(progress.started, [0, 1]);
        assert_eq!(progress.finished, 2);
    }

    #[tokio::test]
    async fn handshake_and_discovery() {
        let mut runner = runner_with(|request| match request["method"].as_str() {
            Some("initialize") => Some(json!({"result": {
                "protocolVersion": "2024-11-05",
                "serverInfo": {"name": "mav-mysql-mcp-server"}
            }})),
            Some("tools/list") => Some(json!({"result": {"tools": [{"name": "query"}]}})),
            _ => None,
        });

        let init = runner.handshake().await.unwrap().unwrap();
        assert_eq!(init.protocol_version, "2024-11-05");
        let tools = runner.discover_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert!(runner.records().is_empty());
    }
}
