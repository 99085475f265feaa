//! Event ingress: decodes inbound frames and routes them into the dashboard state.
//!
//! Notifications are applied strictly in arrival order. Observers are called
//! only after a notification's mutations are complete and receive a shared
//! reference to the state, so views can read but never write.

use stagewatch_protocol::{
    decode_frame, decode_notification, Frame, Notification, ProtocolError, StatusSnapshot,
};
use tracing::{debug, warn};

use crate::dashboard_state::{DashboardChange, DashboardState};

/// View binding invoked after each state change.
pub trait DashboardObserver: Send {
    fn on_change(&mut self, change: &DashboardChange, state: &DashboardState);
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// A notification was applied and produced this many changes.
    Dispatched {
        event: &'static str,
        changes: usize,
    },
    /// A transport-level frame for the session to act on.
    Control(Frame),
    /// An event the dashboard does not act on, or one missing its key fields.
    Dropped { event: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub frames: u64,
    pub dispatched: u64,
    pub dropped: u64,
    pub rejected: u64,
}

#[derive(Default)]
pub struct EventIngress {
    state: DashboardState,
    observers: Vec<Box<dyn DashboardObserver>>,
    stats: IngestStats,
}

impl EventIngress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(mut self, observer: Box<dyn DashboardObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Decodes one raw frame and dispatches it when it carries a notification.
    pub fn ingest_frame(&mut self, raw: &str) -> Result<IngestOutcome, ProtocolError> {
        self.stats.frames = self.stats.frames.saturating_add(1);
        let frame = match decode_frame(raw) {
            Ok(frame) => frame,
            Err(error) => {
                self.stats.rejected = self.stats.rejected.saturating_add(1);
                return Err(error);
            }
        };
        let Frame::Event { name, payload } = frame else {
            return Ok(IngestOutcome::Control(frame));
        };
        match decode_notification(&name, &payload) {
            Some(notification) => {
                let event = notification.event_name();
                let changes = self.dispatch(notification);
                Ok(IngestOutcome::Dispatched { event, changes })
            }
            None => {
                debug!(event = %name, "dropping notification without actionable payload");
                self.stats.dropped = self.stats.dropped.saturating_add(1);
                Ok(IngestOutcome::Dropped { event: name })
            }
        }
    }

    /// Applies one notification and notifies observers; returns the change count.
    pub fn dispatch(&mut self, notification: Notification) -> usize {
        self.stats.dispatched = self.stats.dispatched.saturating_add(1);
        let changes = self.state.apply(notification);
        self.notify(&changes);
        changes.len()
    }

    /// Seeds aggregate counters from a status fetch.
    pub fn seed_status(&mut self, snapshot: &StatusSnapshot) {
        let mut changes = Vec::new();
        self.state.seed(snapshot, &mut changes);
        self.notify(&changes);
    }

    /// Surfaces a transport or fetch failure without touching run state.
    pub fn report_transport_error(&mut self, message: &str) {
        warn!(error = message, "dashboard transport error");
        let changes = self.state.record_transport_error(message);
        self.notify(&changes);
    }

    /// Explicit clear, e.g. before submitting a new run.
    pub fn clear(&mut self) {
        self.state.reset();
        self.notify(&[DashboardChange::RunReset]);
    }

    fn notify(&mut self, changes: &[DashboardChange]) {
        for change in changes {
            for observer in &mut self.observers {
                observer.on_change(change, &self.state);
            }
        }
    }
}
