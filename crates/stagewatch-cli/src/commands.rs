use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use stagewatch_client::{
    run_watch, socket_endpoint, spawn_ctrl_c_shutdown, BackendClient, BackendClientConfig,
    RunBackend, WatchRuntimeConfig,
};
use stagewatch_protocol::{StatusSnapshot, TestReport};
use stagewatch_state::{EventIngress, IngestStats};
use tracing::warn;

use crate::board_render::{render_board, Palette};
use crate::cli_args::{Cli, Command, ReportArgs, StartArgs, WatchArgs};
use crate::report_render::{render_report_digest, write_text_atomic};
use crate::run_settings::build_start_request;
use crate::terminal_observer::TerminalObserver;

fn backend_for(cli: &Cli) -> Result<BackendClient> {
    BackendClient::new(BackendClientConfig {
        base_url: cli.base_url.clone(),
        request_timeout_ms: cli.request_timeout_ms,
    })
    .context("failed to build backend client")
}

pub async fn run_command(cli: Cli) -> Result<()> {
    let palette = Palette::new(!cli.no_color);
    match &cli.command {
        Command::Replay(args) => {
            let (board, stats) = replay_capture(&args.file, palette)?;
            print!("{board}");
            println!("{}", render_replay_stats(&stats));
        }
        Command::Status => {
            let status = backend_for(&cli)?
                .fetch_status()
                .await
                .context("failed to fetch run status")?;
            println!("{}", render_status(&status));
        }
        Command::Start(args) => {
            run_start(&backend_for(&cli)?, &cli.base_url, args, palette).await?;
        }
        Command::Stop => {
            let ack = backend_for(&cli)?
                .stop_run()
                .await
                .context("failed to stop run")?;
            println!("run stop requested: {}", ack.status);
        }
        Command::Watch(args) => watch(&backend_for(&cli)?, &cli.base_url, args, palette).await?,
        Command::Report(args) => run_report(&backend_for(&cli)?, args).await?,
    }
    Ok(())
}

fn render_status(status: &StatusSnapshot) -> String {
    let mut line = format!(
        "running={} progress={} / {} total={} ok={} failed={} rate={:.1}%",
        status.is_running,
        status.progress,
        status.total,
        status.summary.total,
        status.summary.successful,
        status.summary.failed,
        status.summary.success_rate
    );
    if let Some(start) = status.start_time.as_deref() {
        line.push_str(&format!(" started={start}"));
    }
    if let Some(end) = status.end_time.as_deref() {
        line.push_str(&format!(" ended={end}"));
    }
    if let Some(error) = status.error.as_deref() {
        line.push_str(&format!(" error={error}"));
    }
    line
}

async fn run_start(
    backend: &BackendClient,
    base_url: &str,
    args: &StartArgs,
    palette: Palette,
) -> Result<()> {
    let request = build_start_request(args)?;
    let ack = backend
        .start_run(&request)
        .await
        .context("failed to start run")?;
    println!(
        "run {}: concurrency={} devices={} mode={}",
        if ack.status.is_empty() { "submitted" } else { ack.status.as_str() },
        request.concurrency,
        request.device_sns.len(),
        request.test_mode.as_str()
    );
    if args.watch {
        watch(backend, base_url, &args.watch_args, palette).await?;
    }
    Ok(())
}

async fn watch(
    backend: &BackendClient,
    base_url: &str,
    args: &WatchArgs,
    palette: Palette,
) -> Result<()> {
    let config = WatchRuntimeConfig {
        socket_url: socket_endpoint(base_url)?,
        reconnect_delay: Duration::from_millis(args.reconnect_delay_ms),
        max_sessions: args.max_sessions,
        exit_on_completion: args.exit_on_completion,
    };
    let mut ingress = EventIngress::new()
        .with_observer(Box::new(TerminalObserver::new(std::io::stdout(), palette)));
    let shutdown = spawn_ctrl_c_shutdown();
    let report = run_watch(&config, backend, &mut ingress, shutdown).await?;
    print!("{}", render_board(ingress.state(), palette));
    println!(
        "watch ended: sessions={} failed_sessions={} run_finished={} shutdown={}",
        report.sessions, report.failed_sessions, report.run_finished, report.shutdown_requested
    );
    Ok(())
}

async fn run_report(backend: &BackendClient, args: &ReportArgs) -> Result<()> {
    let raw = backend
        .fetch_report_json()
        .await
        .context("failed to fetch run report")?;
    if let Some(path) = args.output.as_deref() {
        let pretty = serde_json::to_string_pretty(&raw)?;
        write_text_atomic(path, &pretty)?;
        println!("report written to {}", path.display());
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&raw)?);
    } else if args.output.is_none() {
        let report: TestReport =
            serde_json::from_value(raw).context("failed to decode run report")?;
        print!("{}", render_report_digest(&report));
    }
    Ok(())
}

/// Pushes every captured frame through a fresh ingress and renders the result.
pub fn replay_capture(path: &Path, palette: Palette) -> Result<(String, IngestStats)> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read capture {}", path.display()))?;
    let mut ingress = EventIngress::new();
    for (line_number, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Err(error) = ingress.ingest_frame(line) {
            warn!(line = line_number + 1, %error, "skipping undecodable capture line");
        }
    }
    Ok((render_board(ingress.state(), palette), ingress.stats()))
}

pub fn render_replay_stats(stats: &IngestStats) -> String {
    format!(
        "replayed frames={} dispatched={} dropped={} undecodable={}",
        stats.frames, stats.dispatched, stats.dropped, stats.rejected
    )
}
