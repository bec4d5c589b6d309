//! Smoke-test harness for MySQL MCP servers.
//!
//! A run starts the server, performs the MCP handshake, executes a fixed,
//! ordered [plan](plan::standard) of tool calls against a scratch table and
//! records one [`TestRecord`] per scenario. [`Summary`] folds the records into
//! pass/fail statistics.
//!
//! # Example
//!
//! ```no_run
//! use harness::{RunOptions, Silent, Summary, TableName, execute, plan};
//! use mcp::ServerConfig;
//!
//! # async fn example() -> harness::Result<()> {
//! let table = TableName::generate("mcp_test")?;
//! let plan = plan::standard(&table);
//!
//! let report = execute(
//!     ServerConfig::new("mysql-mcp-server"),
//!     RunOptions::default(),
//!     table,
//!     &plan,
//!     &mut Silent,
//! )
//! .await?;
//!
//! println!("{}", Summary::from_records(&report.records));
//! # Ok(())
//! # }
//! ```

mod error;
pub mod plan;
mod record;
mod report;
mod runner;
mod scenario;
mod session;
mod table;

pub use error::{Error, Result, error_chain};
pub use record::{ErrorDetail, Status, TestRecord, Verdict};
pub use report::{Summary, ToolStats};
pub use runner::{
    DEFAULT_PREVIEW_CHARS, Outcome, Progress, RunOptions, Runner, Silent, classify, truncate_chars,
};
pub use scenario::{Check, Expectation, Scenario};
pub use session::{RunReport, Session, execute};
pub use table::{DEFAULT_TABLE_PREFIX, TableName, validate_prefix};
