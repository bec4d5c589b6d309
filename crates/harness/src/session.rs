//! A single run against a live server.

use std::process::ExitStatus;

use mcp::{RpcClient, ServerConfig, ServerProcess, Tool};
use tokio::io::BufReader;
use tokio::process::{ChildStdin, ChildStdout};
use tracing::{error, info, warn};

use crate::plan::tools_used;
use crate::record::TestRecord;
use crate::runner::{Progress, RunOptions, Runner};
use crate::scenario::Scenario;
use crate::table::TableName;
use crate::{Error, Result, error_chain};

type StdioRunner = Runner<ChildStdin, BufReader<ChildStdout>>;

/// Everything a finished run leaves behind.
#[derive(Debug)]
pub struct RunReport {
    pub table: TableName,
    pub tools: Vec<Tool>,
    pub records: Vec<TestRecord>,
    /// Harness-level error that cut the run short, if any.
    pub failure: Option<Error>,
    /// OS process id the server ran under.
    pub server_pid: Option<u32>,
    /// How the server exited; `None` if cleanup itself failed.
    pub server_exit: Option<ExitStatus>,
}

/// Owns the server process and the runner talking to it.
pub struct Session {
    server: ServerProcess,
    server_pid: Option<u32>,
    runner: StdioRunner,
    table: TableName,
    tools: Vec<Tool>,
}

impl Session {
    /// Spawn the server and wire a client to its stdio.
    pub fn start(config: ServerConfig, options: RunOptions, table: TableName) -> Result<Self> {
        let mut server = ServerProcess::start(config)?;
        let (stdin, stdout) = server.take_stdio()?;
        let runner = Runner::new(RpcClient::new(stdin, stdout), options);
        Ok(Self {
            server_pid: server.pid(),
            server,
            runner,
            table,
            tools: Vec::new(),
        })
    }

    pub fn records(&self) -> &[TestRecord] {
        self.runner.records()
    }

    /// Handshake, tool discovery, then every scenario of `plan` in order.
    pub async fn run(&mut self, plan: &[Scenario], progress: &mut impl Progress) -> Result<()> {
        self.runner.handshake().await?;

        self.tools = self.runner.discover_tools().await?;
        progress.tools_discovered(&self.tools);
        if !self.tools.is_empty() {
            for tool in tools_used(plan) {
                if !self.tools.iter().any(|t| t.name == tool) {
                    warn!(tool, "server does not advertise a tool used by the plan");
                }
            }
        }

        info!(table = %self.table, scenarios = plan.len(), "running plan");
        self.runner.run_plan(plan, progress).await;
        Ok(())
    }

    /// Stop the server and hand back what the run produced.
    ///
    /// The client is dropped first so the server sees EOF on stdin.
    pub async fn finish(self, failure: Option<Error>) -> RunReport {
        let Session {
            mut server,
            server_pid,
            runner,
            table,
            tools,
        } = self;
        if !server.is_running() {
            warn!(pid = ?server_pid, "server exited before the run finished");
        }
        let records = runner.into_records();

        let server_exit = match server.cleanup().await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "failed to stop server cleanly");
                None
            }
        };

        RunReport {
            table,
            tools,
            records,
            failure,
            server_pid,
            server_exit,
        }
    }
}

/// Run `plan` against a freshly started server and always stop it afterwards.
///
/// Only a failure to start the server is returned as `Err`. Errors after
/// that end the plan early, are logged, and land in [`RunReport::failure`].
pub async fn execute(
    config: ServerConfig,
    options: RunOptions,
    table: TableName,
    plan: &[Scenario],
    progress: &mut impl Progress,
) -> Result<RunReport> {
    let mut session = Session::start(config, options, table)?;

    let failure = session.run(plan, progress).await.err();
    if let Some(e) = &failure {
        error!(
            completed = session.records().len(),
            "run aborted: {}",
            error_chain(e)
        );
    }

    Ok(session.finish(failure).await)
}
