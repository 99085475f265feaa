use stagewatch_protocol::{ProgressPayload, RunSummary, StatusSnapshot};

/// Aggregate counters pushed by the backend; nothing here is derived from slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryAggregator {
    pub progress: u64,
    pub total: u64,
    pub summary: RunSummary,
    pub is_running: bool,
}

impl SummaryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds counters from the load-time status fetch.
    pub fn seed(&mut self, snapshot: &StatusSnapshot) {
        self.progress = snapshot.progress;
        self.total = snapshot.total;
        self.summary = snapshot.summary.clone();
        self.is_running = snapshot.is_running;
    }

    pub fn apply_progress(&mut self, payload: &ProgressPayload) {
        self.progress = payload.progress;
        self.total = payload.total;
        if let Some(summary) = &payload.summary {
            self.summary = summary.clone();
        }
    }

    pub fn apply_summary(&mut self, summary: &RunSummary) {
        self.summary = summary.clone();
    }

    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.progress as f64 / self.total as f64 * 100.0
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
