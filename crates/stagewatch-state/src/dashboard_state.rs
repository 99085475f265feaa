//! The reset-able context object holding every piece of per-run state.

use stagewatch_protocol::{
    ExecutionDetailPayload, ExecutionStartedPayload, Notification, RunSummary, StatusSnapshot,
    TestKey,
};
use tracing::debug;

use crate::execution_record::RecordDefaults;
use crate::registry::TestRegistry;
use crate::slot_tracker::{SlotStatus, SlotTracker, StartOutcome, StatusOutcome};
use crate::stream_merger::{merge_fragment, merge_snapshot};
use crate::summary::SummaryAggregator;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    Completed,
    Errored,
}

impl RunPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Errored => "errored",
        }
    }
}

/// What a dispatched notification changed, delivered to observers afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardChange {
    RunReset,
    PhaseChanged(RunPhase),
    SlotCreated {
        key: TestKey,
        ordinal: usize,
        status: SlotStatus,
    },
    SlotStatusChanged {
        key: TestKey,
        ordinal: usize,
        status: SlotStatus,
    },
    StatusBuffered {
        key: TestKey,
        status: SlotStatus,
    },
    RecordUpdated {
        key: TestKey,
    },
    SummaryUpdated,
    StatusMessage(String),
    ErrorRaised(String),
    ReportAvailable,
}

#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    registry: TestRegistry,
    slots: SlotTracker,
    summary: SummaryAggregator,
    phase: RunPhase,
    last_status_message: Option<String>,
    last_error: Option<String>,
    report_available: bool,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &TestRegistry {
        &self.registry
    }

    pub fn slots(&self) -> &SlotTracker {
        &self.slots
    }

    pub fn summary(&self) -> &SummaryAggregator {
        &self.summary
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn last_status_message(&self) -> Option<&str> {
        self.last_status_message.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn report_available(&self) -> bool {
        self.report_available
    }

    /// Drops every record, slot, pending status and stream buffer in one step.
    pub(crate) fn reset(&mut self) {
        self.registry.clear_all();
        self.slots.clear();
        self.summary.reset();
        self.phase = RunPhase::Idle;
        self.last_status_message = None;
        self.last_error = None;
        self.report_available = false;
    }

    pub(crate) fn record_transport_error(&mut self, message: &str) -> Vec<DashboardChange> {
        self.last_error = Some(message.to_string());
        vec![DashboardChange::ErrorRaised(message.to_string())]
    }

    pub(crate) fn apply(&mut self, notification: Notification) -> Vec<DashboardChange> {
        let mut changes = Vec::new();
        match notification {
            Notification::RunStarted => {
                self.reset();
                self.summary.is_running = true;
                changes.push(DashboardChange::RunReset);
                self.set_phase(RunPhase::Running, &mut changes);
            }
            Notification::ExecutionStarted(payload) => {
                self.apply_execution_started(payload, &mut changes);
            }
            Notification::ExecutionResult(payload) => {
                let outcome = self.registry.apply_result(&payload);
                debug!(
                    key = %payload.key,
                    status = outcome.status.as_str(),
                    created = outcome.created,
                    "applied execution result"
                );
                changes.push(DashboardChange::RecordUpdated { key: payload.key });
                self.mirror_slot_status(
                    payload.key,
                    SlotStatus::from_success(payload.success),
                    &mut changes,
                );
            }
            Notification::ExecutionDetail(payload) => {
                self.apply_execution_detail(payload, &mut changes);
            }
            Notification::ProgressUpdate(payload) => {
                self.summary.apply_progress(&payload);
                changes.push(DashboardChange::SummaryUpdated);
            }
            Notification::RunCompleted { summary } => {
                if let Some(summary) = summary {
                    self.summary.apply_summary(&summary);
                    changes.push(DashboardChange::SummaryUpdated);
                }
                self.summary.is_running = false;
                self.set_phase(RunPhase::Completed, &mut changes);
                self.report_available = true;
                changes.push(DashboardChange::ReportAvailable);
            }
            Notification::RunError { error } => {
                self.last_error = Some(error.clone());
                self.summary.is_running = false;
                changes.push(DashboardChange::ErrorRaised(error));
                self.set_phase(RunPhase::Errored, &mut changes);
                if self.summary.summary.total > 0 {
                    self.report_available = true;
                    changes.push(DashboardChange::ReportAvailable);
                }
            }
            Notification::StatusMessage { message } => {
                self.last_status_message = Some(message.clone());
                changes.push(DashboardChange::StatusMessage(message));
            }
            Notification::StatusSnapshot(snapshot) => {
                self.seed(&snapshot, &mut changes);
            }
            Notification::Connected { message } => {
                // Transport errors end with a new connection; a run error stays until the next run.
                if self.phase != RunPhase::Errored {
                    self.last_error = None;
                }
                if let Some(message) = message {
                    self.last_status_message = Some(message.clone());
                    changes.push(DashboardChange::StatusMessage(message));
                }
            }
        }
        changes
    }

    pub(crate) fn seed(&mut self, snapshot: &StatusSnapshot, changes: &mut Vec<DashboardChange>) {
        self.summary.seed(snapshot);
        changes.push(DashboardChange::SummaryUpdated);
        if snapshot.is_running && self.phase != RunPhase::Running {
            self.set_phase(RunPhase::Running, changes);
        }
    }

    fn set_phase(&mut self, phase: RunPhase, changes: &mut Vec<DashboardChange>) {
        if self.phase != phase {
            self.phase = phase;
            changes.push(DashboardChange::PhaseChanged(phase));
        }
    }

    fn apply_execution_started(
        &mut self,
        payload: ExecutionStartedPayload,
        changes: &mut Vec<DashboardChange>,
    ) {
        let key = payload.key;
        let created = !self.registry.contains(&key);
        let record = self.registry.get_or_create(
            key,
            RecordDefaults::new(payload.text.clone(), payload.timestamp),
        );
        if created {
            changes.push(DashboardChange::RecordUpdated { key });
        } else {
            // An earlier result or detail may have created the record without input text.
            record.adopt_input_text(None, Some(&payload.text));
        }

        if let StartOutcome::Created {
            ordinal, status, ..
        } = self.slots.on_start(key, SlotStatus::Waiting)
        {
            changes.push(DashboardChange::SlotCreated {
                key,
                ordinal,
                status,
            });
        }

        if self.phase != RunPhase::Running {
            self.summary.is_running = true;
            self.set_phase(RunPhase::Running, changes);
        }
    }

    fn apply_execution_detail(
        &mut self,
        payload: ExecutionDetailPayload,
        changes: &mut Vec<DashboardChange>,
    ) {
        let key = payload.key;
        let record = self.registry.get_or_create(
            key,
            RecordDefaults::new(payload.text.clone().unwrap_or_default(), None),
        );
        record.adopt_input_text(payload.stt_text.as_deref(), payload.text.as_deref());
        if let Some(sentence) = payload.llm_sentence.as_deref() {
            merge_fragment(record, sentence);
        }
        if let Some(snapshot) = payload.llm_text.as_deref() {
            merge_snapshot(record, snapshot);
        }
        let responding = payload.carries_response_text();
        if responding {
            record.mark_responding();
        }
        changes.push(DashboardChange::RecordUpdated { key });

        if responding {
            self.mirror_slot_status(key, SlotStatus::Responding, changes);
        }
    }

    fn mirror_slot_status(
        &mut self,
        key: TestKey,
        status: SlotStatus,
        changes: &mut Vec<DashboardChange>,
    ) {
        match self.slots.on_status(key, status) {
            StatusOutcome::Updated { ordinal, .. } => {
                changes.push(DashboardChange::SlotStatusChanged {
                    key,
                    ordinal,
                    status,
                });
            }
            StatusOutcome::Unchanged { .. } => {}
            StatusOutcome::Buffered { .. } => {
                changes.push(DashboardChange::StatusBuffered { key, status });
            }
        }
    }

    /// Overall summary when the backend never pushed one.
    pub fn derived_summary(&self) -> RunSummary {
        let successful = self.slots.count_with_status(SlotStatus::Success) as u64;
        let failed = self.slots.count_with_status(SlotStatus::Failed) as u64;
        let total = successful + failed;
        let success_rate = if total == 0 {
            0.0
        } else {
            successful as f64 / total as f64 * 100.0
        };
        RunSummary {
            total,
            successful,
            failed,
            success_rate,
        }
    }
}
