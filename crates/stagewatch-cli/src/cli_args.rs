use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use stagewatch_protocol::{rest_types::MAX_CONCURRENCY, TestMode};

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u32(value: &str) -> Result<u32, String> {
    let parsed = value
        .parse::<u32>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_concurrency(value: &str) -> Result<u32, String> {
    let parsed = parse_positive_u32(value)?;
    if parsed > MAX_CONCURRENCY {
        return Err(format!("value must be at most {MAX_CONCURRENCY}"));
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliTestMode {
    Normal,
    Fast,
}

impl From<CliTestMode> for TestMode {
    fn from(value: CliTestMode) -> Self {
        match value {
            CliTestMode::Normal => TestMode::Normal,
            CliTestMode::Fast => TestMode::Fast,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "stagewatch",
    about = "Live dashboard for concurrent voice-assistant test runs",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "STAGEWATCH_BASE_URL",
        default_value = "http://127.0.0.1:5000",
        global = true,
        help = "Base URL of the test backend"
    )]
    pub base_url: String,

    #[arg(
        long = "request-timeout-ms",
        env = "STAGEWATCH_REQUEST_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64,
        global = true,
        help = "Timeout for each REST request in milliseconds"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "no-color",
        env = "STAGEWATCH_NO_COLOR",
        default_value_t = false,
        global = true,
        help = "Disable ANSI color output"
    )]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the backend's aggregate run status.
    Status,
    /// Submit a new run.
    Start(StartArgs),
    /// Ask the backend to stop the current run.
    Stop,
    /// Follow the live channel and render the board.
    Watch(WatchArgs),
    /// Fetch the structured run report.
    Report(ReportArgs),
    /// Replay a captured frame log offline and print the final board.
    Replay(ReplayArgs),
}

#[derive(Debug, Clone, Args)]
pub struct StartArgs {
    #[arg(long, help = "TOML file with run settings; flags override its values")]
    pub settings: Option<PathBuf>,

    #[arg(
        long,
        value_parser = parse_concurrency,
        help = "Number of concurrent executions (1-100, default 10)"
    )]
    pub concurrency: Option<u32>,

    #[arg(
        long = "device-sn",
        value_delimiter = ',',
        help = "Device serial number; repeat or pass a comma-separated list"
    )]
    pub device_sns: Vec<String>,

    #[arg(long = "test-mode", value_enum, help = "Run mode (default normal)")]
    pub test_mode: Option<CliTestMode>,

    #[arg(long = "ws-url", help = "Device-side websocket url (ws:// or wss://)")]
    pub ws_url: Option<String>,

    #[arg(
        long = "test-count",
        value_parser = parse_positive_u32,
        help = "Number of executions to run"
    )]
    pub test_count: Option<u32>,

    #[arg(long, default_value_t = false, help = "Follow the run after submitting it")]
    pub watch: bool,

    #[command(flatten)]
    pub watch_args: WatchArgs,
}

#[derive(Debug, Clone, Args)]
pub struct WatchArgs {
    #[arg(
        long = "reconnect-delay-ms",
        default_value_t = 2_000,
        value_parser = parse_positive_u64,
        help = "Delay before reconnecting a dropped live channel"
    )]
    pub reconnect_delay_ms: u64,

    #[arg(
        long = "exit-on-completion",
        default_value_t = false,
        help = "Leave once the run completes or fails"
    )]
    pub exit_on_completion: bool,

    #[arg(
        long = "max-sessions",
        value_parser = parse_positive_usize,
        help = "Stop after this many live-channel sessions"
    )]
    pub max_sessions: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub struct ReportArgs {
    #[arg(long, default_value_t = false, help = "Print the raw report JSON")]
    pub json: bool,

    #[arg(long, help = "Write the raw report JSON to this path")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct ReplayArgs {
    #[arg(help = "Capture file with one frame per line")]
    pub file: PathBuf,
}
