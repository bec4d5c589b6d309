mod config;
mod error;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use harness::{
    Expectation, Progress, Scenario, Summary, TableName, TestRecord, Verdict, error_chain,
    execute, plan, truncate_chars,
};
use mcp::Tool;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{Error, Result};

const CONFIG_FILE: &str = "mcp-smoke.toml";

#[derive(Parser)]
#[command(name = "mysql-mcp-smoke")]
#[command(about = "Smoke-test a MySQL MCP server over stdio", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    opts: Options,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct Options {
    /// Config file (defaults to mcp-smoke.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Server executable, overrides server.command
    #[arg(long, global = true)]
    server: Option<String>,

    /// Argument passed to the server (repeatable), overrides server.args
    #[arg(long = "arg", global = true, allow_hyphen_values = true)]
    server_args: Vec<String>,

    /// Response timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Prefix for the scratch table name
    #[arg(long, global = true)]
    table_prefix: Option<String>,

    /// Exit non-zero when the run has regressions
    #[arg(long, global = true)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the standard plan against the server (default)
    Run,
    /// Print the scenario plan without starting the server
    Plan,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", error_chain(&e));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.opts)?;

    match cli.command {
        Some(Commands::Run) | None => cmd_run(&config, cli.opts.strict).await,
        Some(Commands::Plan) => cmd_plan(&config),
    }
}

fn load_config(opts: &Options) -> Result<Config> {
    let mut config = match &opts.config {
        Some(path) => Config::load(path)?,
        None if Path::new(CONFIG_FILE).exists() => Config::load(CONFIG_FILE)?,
        None => Config::default(),
    };

    if let Some(server) = &opts.server {
        config.server.command = server.clone();
    }
    if !opts.server_args.is_empty() {
        config.server.args = opts.server_args.clone();
    }
    if let Some(ms) = opts.timeout_ms {
        config.client.response_timeout_ms = ms;
    }
    if let Some(prefix) = &opts.table_prefix {
        config.run.table_prefix = prefix.clone();
    }

    config.validate()?;
    Ok(config)
}

async fn cmd_run(config: &Config, strict: bool) -> Result<()> {
    println!("mysql-mcp-smoke v{}", env!("CARGO_PKG_VERSION"));

    let table = TableName::generate(&config.run.table_prefix)?;
    let plan = plan::standard(&table);

    println!("Server: {}", server_line(config));
    println!("Test table: {table}\n");

    let report = execute(
        config.server_config(),
        config.run_options(),
        table,
        &plan,
        &mut Console,
    )
    .await?;

    if let Some(pid) = report.server_pid {
        println!("Server pid: {pid}");
    }
    let summary = Summary::from_records(&report.records);
    println!("\n{summary}");

    match report.server_exit {
        Some(status) => info!(%status, "server exited"),
        None => info!("server exit status unknown"),
    }

    if let Some(source) = report.failure {
        return Err(Error::Aborted {
            completed: report.records.len(),
            source,
        });
    }
    if strict && summary.has_regressions() {
        return Err(Error::Regressions(summary.regressions.len()));
    }
    Ok(())
}

fn cmd_plan(config: &Config) -> Result<()> {
    let table = TableName::generate(&config.run.table_prefix)?;
    let plan = plan::standard(&table);

    println!("Server: {}", server_line(config));
    println!("Test table: {table}");
    println!("{} scenarios:\n", plan.len());

    for (index, scenario) in plan.iter().enumerate() {
        let mut markers = Vec::new();
        if scenario.expect == Expectation::Error {
            markers.push("expects error".to_string());
        }
        if let Some(check) = &scenario.check {
            markers.push(format!("check: {check:?}"));
        }
        let markers = if markers.is_empty() {
            String::new()
        } else {
            format!("  [{}]", markers.join("; "))
        };

        println!("{:>3}. {:<18} {}{markers}", index + 1, scenario.tool, scenario.name);
        println!("     {}", scenario.arguments);
    }

    Ok(())
}

fn server_line(config: &Config) -> String {
    let mut line = config.server.command.clone();
    for arg in &config.server.args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Prints run progress to stdout.
struct Console;

impl Progress for Console {
    fn tools_discovered(&mut self, tools: &[Tool]) {
        println!("Found {} tools:", tools.len());
        for tool in tools {
            let description = tool.description.as_deref().unwrap_or_default();
            println!("  - {}: {}", tool.name, truncate_chars(description, 60));
        }
    }

    fn scenario_started(&mut self, index: usize, total: usize, scenario: &Scenario) {
        let args = serde_json::to_string_pretty(&scenario.arguments)
            .unwrap_or_else(|_| scenario.arguments.to_string());
        println!("\n{}", "=".repeat(60));
        println!("Test {}/{total}: {}", index + 1, scenario.name);
        println!("Tool: {}", scenario.tool);
        println!("Args: {args}");
    }

    fn scenario_finished(&mut self, record: &TestRecord) {
        let verdict = record.verdict();
        match &record.error {
            Some(error) => println!("{}: {error}", verdict.label()),
            None => println!("{}", verdict.label()),
        }
        if verdict == Verdict::CheckFailed {
            if let Some(reason) = &record.check_failure {
                println!("Check failed: {reason}");
            }
        }
        if let Some(preview) = &record.preview {
            println!("Response preview: {preview}");
        }
    }
}
