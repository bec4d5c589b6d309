//! Line-oriented JSON-RPC client over a pair of byte streams.
//!
//! One request is outstanding at a time: every [`RpcClient::call`] writes a
//! single line and then reads until its answer arrives or the deadline
//! passes. Responses are expected in send order.

use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::error::Result;
use crate::protocol::{
    CallToolParams, InitializeParams, InitializeResult, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, RequestId, Tool,
};

/// Default time to wait for a single response.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Maximum accepted response line (1MB).
pub const MAX_LINE_SIZE: usize = 1024 * 1024;

/// JSON-RPC client speaking newline-delimited JSON.
pub struct RpcClient<W, R> {
    writer: W,
    reader: R,
    next_id: i64,
    // Bytes of a line whose read was cut short by a timeout.
    pending: Vec<u8>,
    // Skipping the rest of an oversized line.
    discarding: bool,
}

impl<W, R> RpcClient<W, R>
where
    W: AsyncWrite + Unpin,
    R: AsyncBufRead + Unpin,
{
    pub fn new(writer: W, reader: R) -> Self {
        Self {
            writer,
            reader,
            next_id: 1,
            pending: Vec::new(),
            discarding: false,
        }
    }

    /// Allocate the next request id.
    pub fn next_request_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        RequestId::Number(id)
    }

    /// Write one request as a single line and flush it.
    pub async fn send(&mut self, request: &JsonRpcRequest) -> Result<()> {
        let line = serde_json::to_string(request)?;
        debug!(id = %request.id, method = %request.method, "-> {line}");
        self.write_line(&line).await
    }

    /// Write a notification. No response is expected.
    pub async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<()> {
        let mut notification = JsonRpcNotification::new(method);
        notification.params = params;
        let line = serde_json::to_string(&notification)?;
        debug!(method, "-> {line}");
        self.write_line(&line).await
    }

    /// Read one message, waiting at most `timeout`.
    ///
    /// Returns `None` when the wait expires, the stream is closed, or the
    /// line is not valid JSON-RPC.
    pub async fn receive(&mut self, timeout: Duration) -> Option<JsonRpcResponse> {
        self.receive_until(Instant::now() + timeout).await
    }

    /// Send a request and wait for its response.
    ///
    /// `Err` means the request could not be written; `Ok(None)` means nothing
    /// usable came back in time.
    pub async fn call(
        &mut self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Option<JsonRpcResponse>> {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        request.params = params;
        self.send(&request).await?;
        Ok(self.await_response(&id, Instant::now() + timeout).await)
    }

    /// Invoke a tool via `tools/call`.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<Option<JsonRpcResponse>> {
        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })?;
        self.call("tools/call", Some(params), timeout).await
    }

    /// Run the MCP handshake.
    ///
    /// Sends `initialize`, gives the server `startup_delay` to come up, reads
    /// the answer and then sends `notifications/initialized`. The result is
    /// `None` if the server did not answer usefully; the notification is sent
    /// either way.
    pub async fn initialize(
        &mut self,
        startup_delay: Duration,
        timeout: Duration,
    ) -> Result<Option<InitializeResult>> {
        let id = self.next_request_id();
        let request = JsonRpcRequest::new(id.clone(), "initialize")
            .with_params(InitializeParams::default())?;
        self.send(&request).await?;

        tokio::time::sleep(startup_delay).await;

        let result: Option<InitializeResult> =
            match self.await_response(&id, Instant::now() + timeout).await {
                Some(response) => match response.into_result() {
                    Ok(value) => serde_json::from_value(value)
                        .map_err(|e| warn!(error = %e, "unexpected initialize result"))
                        .ok(),
                    Err(e) => {
                        warn!(error = %e, "server rejected initialize");
                        None
                    }
                },
                None => None,
            };

        self.notify("notifications/initialized", None).await?;
        Ok(result)
    }

    /// Fetch the server's tool list via `tools/list`.
    pub async fn list_tools(&mut self, timeout: Duration) -> Result<Option<Vec<Tool>>> {
        let response = self
            .call("tools/list", Some(Value::Object(Default::default())), timeout)
            .await?;
        let Some(response) = response else {
            return Ok(None);
        };
        match response.into_result() {
            Ok(value) => Ok(serde_json::from_value::<ListToolsResult>(value)
                .map(|r| r.tools)
                .map_err(|e| warn!(error = %e, "unexpected tools/list result"))
                .ok()),
            Err(e) => {
                warn!(error = %e, "tools/list failed");
                Ok(None)
            }
        }
    }

    // --- Internal methods ---

    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Read until the response for `id` shows up.
    ///
    /// Server notifications and late answers to earlier requests are skipped.
    /// Anything else, including an error with a null id, is taken to be the
    /// answer, in send order.
    async fn await_response(
        &mut self,
        id: &RequestId,
        deadline: Instant,
    ) -> Option<JsonRpcResponse> {
        loop {
            let response = self.receive_until(deadline).await?;
            if response.is_notification() {
                debug!(method = ?response.method, "skipping server notification");
                continue;
            }
            match &response.id {
                // Servers answer unreadable requests with a null id.
                None => return Some(response),
                Some(got) if got == id => return Some(response),
                Some(got) if is_stale(got, id) => {
                    debug!(%got, expected = %id, "discarding late response");
                }
                Some(got) => {
                    warn!(%got, expected = %id, "response id mismatch");
                    return Some(response);
                }
            }
        }
    }

    async fn receive_until(&mut self, deadline: Instant) -> Option<JsonRpcResponse> {
        loop {
            let line = self.read_line_until(deadline).await?;
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            debug!("<- {text}");
            return match serde_json::from_str(text) {
                Ok(response) => Some(response),
                Err(e) => {
                    warn!(error = %e, line = %text, "failed to parse response");
                    None
                }
            };
        }
    }

    /// Read one line, holding at most `MAX_LINE_SIZE + 1` bytes of it.
    ///
    /// An oversized line yields `None`; its remainder is dropped by the
    /// following reads.
    async fn read_line_until(&mut self, deadline: Instant) -> Option<Vec<u8>> {
        loop {
            let limit = (MAX_LINE_SIZE + 1).saturating_sub(self.pending.len()) as u64;
            let read = timeout_at(
                deadline,
                (&mut self.reader)
                    .take(limit)
                    .read_until(b'\n', &mut self.pending),
            )
            .await;
            match read {
                Err(_) => {
                    debug!(buffered = self.pending.len(), "timed out waiting for response");
                    return None;
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "failed to read from server");
                    self.pending.clear();
                    self.discarding = false;
                    return None;
                }
                Ok(Ok(0)) => {
                    debug!("server closed its output");
                    self.pending.clear();
                    self.discarding = false;
                    return None;
                }
                Ok(Ok(_)) => {
                    let complete = self.pending.last() == Some(&b'\n');
                    if self.discarding {
                        self.pending.clear();
                        self.discarding = !complete;
                        continue;
                    }
                    if !complete && self.pending.len() > MAX_LINE_SIZE {
                        warn!(max = MAX_LINE_SIZE, "response line too large, dropping it");
                        self.pending.clear();
                        self.discarding = true;
                        return None;
                    }
                    return Some(std::mem::take(&mut self.pending));
                }
            }
        }
    }
}

fn is_stale(got: &RequestId, expected: &RequestId) -> bool {
    match (got.as_number(), expected.as_number()) {
        (Some(got), Some(expected)) => got < expected,
        _ => false,
    }
}
