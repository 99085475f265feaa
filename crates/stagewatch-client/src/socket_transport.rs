//! Live Socket.IO channel to the test backend.
//!
//! The backend speaks Engine.IO v4 over a plain websocket. A session answers
//! the open handshake with a namespace connect, answers server pings, and
//! feeds every event frame to the ingress in arrival order.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use stagewatch_protocol::{
    notification::{EVENT_RUN_COMPLETED, EVENT_RUN_ERROR},
    Frame, CONNECT_PACKET, PONG_PACKET,
};
use stagewatch_state::{EventIngress, IngestOutcome};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};

const SOCKET_IO_PATH: &str = "socket.io/?EIO=4&transport=websocket";
/// Idle limit used until the server's open handshake states its own.
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// End the session once the run reports completion or a run-level error.
    pub stop_on_run_end: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The server closed the socket or left the namespace.
    Closed,
    Shutdown,
    RunFinished,
}

/// Maps a backend base url onto its Socket.IO websocket endpoint.
///
/// `http(s)://host[:port][/prefix]` becomes
/// `ws(s)://host[:port][/prefix]/socket.io/?EIO=4&transport=websocket`.
/// Urls already using `ws://` or `wss://` are returned unchanged.
pub fn socket_endpoint(base_url: &str) -> Result<String> {
    let trimmed = base_url.trim();
    if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        return Ok(trimmed.to_string());
    }
    let (scheme, rest) = if let Some(rest) = trimmed.strip_prefix("https://") {
        ("wss", rest)
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        ("ws", rest)
    } else {
        bail!("unsupported backend url '{trimmed}': expected http(s):// or ws(s)://");
    };
    let rest = rest.trim_end_matches('/');
    if rest.is_empty() {
        bail!("backend url '{trimmed}' has no host");
    }
    Ok(format!("{scheme}://{rest}/{SOCKET_IO_PATH}"))
}

pub(crate) async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    if *shutdown.borrow() {
        return;
    }
    while shutdown.changed().await.is_ok() {
        if *shutdown.borrow() {
            return;
        }
    }
    std::future::pending::<()>().await;
}

/// Runs one websocket session until the server closes it, shutdown is
/// signalled, or (optionally) the run ends.
pub async fn run_socket_session(
    url: &str,
    ingress: &mut EventIngress,
    shutdown: &mut watch::Receiver<bool>,
    options: SessionOptions,
) -> Result<SessionEnd> {
    let (stream, _response) = connect_async(url)
        .await
        .with_context(|| format!("failed to connect dashboard websocket {url}"))?;
    info!(url, "dashboard socket connected");
    let (mut sink, mut source) = stream.split();
    let mut idle_timeout = DEFAULT_IDLE_TIMEOUT;
    let mut deadline = Instant::now() + idle_timeout;

    loop {
        tokio::select! {
            _ = wait_for_shutdown(shutdown) => {
                let _ = sink.send(WsMessage::Close(None)).await;
                return Ok(SessionEnd::Shutdown);
            }
            _ = tokio::time::sleep_until(deadline) => {
                bail!("no traffic from dashboard socket within {} ms", idle_timeout.as_millis());
            }
            maybe_message = source.next() => {
                let Some(message_result) = maybe_message else {
                    return Ok(SessionEnd::Closed);
                };
                let message = message_result.context("failed reading dashboard websocket message")?;
                deadline = Instant::now() + idle_timeout;
                let text = match message {
                    WsMessage::Text(text) => text,
                    WsMessage::Close(_) => return Ok(SessionEnd::Closed),
                    _ => continue,
                };
                let outcome = match ingress.ingest_frame(text.as_str()) {
                    Ok(outcome) => outcome,
                    Err(error) => {
                        warn!(%error, "skipping undecodable dashboard frame");
                        continue;
                    }
                };
                match outcome {
                    IngestOutcome::Control(Frame::Open { sid, ping_interval_ms, ping_timeout_ms }) => {
                        debug!(sid = %sid, ping_interval_ms, ping_timeout_ms, "engine.io open");
                        idle_timeout = Duration::from_millis(
                            ping_interval_ms.saturating_add(ping_timeout_ms).max(1_000),
                        );
                        deadline = Instant::now() + idle_timeout;
                        sink.send(WsMessage::text(CONNECT_PACKET))
                            .await
                            .context("failed sending namespace connect")?;
                    }
                    IngestOutcome::Control(Frame::Ping) => {
                        sink.send(WsMessage::text(PONG_PACKET))
                            .await
                            .context("failed sending heartbeat reply")?;
                    }
                    IngestOutcome::Control(Frame::Connected) => {
                        info!("dashboard namespace joined");
                    }
                    IngestOutcome::Control(Frame::ConnectError { message }) => {
                        bail!("dashboard namespace connect refused: {message}");
                    }
                    IngestOutcome::Control(Frame::Close | Frame::Disconnected) => {
                        return Ok(SessionEnd::Closed);
                    }
                    IngestOutcome::Control(_) => {}
                    IngestOutcome::Dispatched { event, .. } => {
                        if options.stop_on_run_end
                            && (event == EVENT_RUN_COMPLETED || event == EVENT_RUN_ERROR)
                        {
                            let _ = sink.send(WsMessage::Close(None)).await;
                            return Ok(SessionEnd::RunFinished);
                        }
                    }
                    IngestOutcome::Dropped { .. } => {}
                }
            }
        }
    }
}
