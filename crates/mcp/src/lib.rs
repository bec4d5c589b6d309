//! MCP (Model Context Protocol) client plumbing for stdio servers.
//!
//! This crate provides the three pieces needed to drive an MCP server as a
//! child process: the wire types, a [`ServerProcess`] that owns the child, and
//! an [`RpcClient`] that speaks newline-delimited JSON-RPC over its pipes.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{DEFAULT_TIMEOUT, RpcClient, ServerConfig, ServerProcess};
//! use std::time::Duration;
//!
//! # async fn example() -> mcp::Result<()> {
//! let mut server = ServerProcess::start(ServerConfig::new("mysql-mcp-server"))?;
//! let (stdin, stdout) = server.take_stdio()?;
//! let mut client = RpcClient::new(stdin, stdout);
//!
//! client.initialize(Duration::from_secs(1), DEFAULT_TIMEOUT).await?;
//!
//! let response = client
//!     .call_tool("list_tables", serde_json::json!({}), DEFAULT_TIMEOUT)
//!     .await?;
//! println!("{response:?}");
//!
//! drop(client);
//! server.cleanup().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod process;
mod protocol;

pub use client::{DEFAULT_TIMEOUT, MAX_LINE_SIZE, RpcClient};
pub use error::{Error, Result};
pub use process::{
    ALLOW_WRITES_ENV, DEFAULT_SHUTDOWN_GRACE, ServerConfig, ServerProcess, ServerStdio,
};
pub use protocol::{
    CallToolParams, CallToolResult, ClientCapabilities, ClientInfo, InitializeParams,
    InitializeResult, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, RequestId, ServerInfo, Tool, ToolContent,
};
