//! Reconnecting watch loop around the live dashboard socket.

use std::time::Duration;

use anyhow::Result;
use stagewatch_state::EventIngress;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::backend_client::RunBackend;
use crate::socket_transport::{run_socket_session, wait_for_shutdown, SessionEnd, SessionOptions};

#[derive(Debug, Clone)]
pub struct WatchRuntimeConfig {
    pub socket_url: String,
    pub reconnect_delay: Duration,
    /// Stop after this many sessions; `None` reconnects until shutdown.
    pub max_sessions: Option<usize>,
    pub exit_on_completion: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchReport {
    pub sessions: usize,
    pub failed_sessions: usize,
    pub failure_streak: usize,
    pub run_finished: bool,
    pub shutdown_requested: bool,
}

/// Returns a receiver that flips to `true` on ctrl-c.
pub fn spawn_ctrl_c_shutdown() -> watch::Receiver<bool> {
    let (sender, receiver) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("watch shutdown requested");
            let _ = sender.send(true);
        }
    });
    receiver
}

/// Seeds counters from the status endpoint, then keeps a socket session open,
/// reconnecting after `reconnect_delay` whenever one ends.
///
/// Session failures are surfaced through the ingress and never clear state.
pub async fn run_watch(
    config: &WatchRuntimeConfig,
    backend: &dyn RunBackend,
    ingress: &mut EventIngress,
    mut shutdown: watch::Receiver<bool>,
) -> Result<WatchReport> {
    let mut report = WatchReport::default();
    match backend.fetch_status().await {
        Ok(snapshot) => ingress.seed_status(&snapshot),
        Err(error) => ingress.report_transport_error(&format!("status fetch failed: {error}")),
    }

    let options = SessionOptions {
        stop_on_run_end: config.exit_on_completion,
    };
    loop {
        report.sessions = report.sessions.saturating_add(1);
        match run_socket_session(&config.socket_url, ingress, &mut shutdown, options).await {
            Ok(SessionEnd::Shutdown) => {
                report.shutdown_requested = true;
                return Ok(report);
            }
            Ok(SessionEnd::RunFinished) => {
                report.failure_streak = 0;
                report.run_finished = true;
                info!(sessions = report.sessions, "run finished; leaving watch");
                return Ok(report);
            }
            Ok(SessionEnd::Closed) => {
                report.failure_streak = 0;
                info!(sessions = report.sessions, "dashboard socket closed by server");
            }
            Err(error) => {
                report.failed_sessions = report.failed_sessions.saturating_add(1);
                report.failure_streak = report.failure_streak.saturating_add(1);
                warn!(
                    failure_streak = report.failure_streak,
                    error = %format!("{error:#}"),
                    "dashboard socket session failed"
                );
                ingress.report_transport_error(&format!("{error:#}"));
            }
        }

        if config
            .max_sessions
            .is_some_and(|limit| report.sessions >= limit)
        {
            return Ok(report);
        }

        tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => {
                report.shutdown_requested = true;
                return Ok(report);
            }
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }
}
