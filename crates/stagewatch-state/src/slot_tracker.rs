//! Concurrency slot tracker.
//!
//! One slot per execution, appended in the order start notifications arrive.
//! Status notifications may overtake their start notification on the wire;
//! those are parked in a pending buffer and applied when the slot appears.
//! The tracker mirrors whatever status it saw last and does not validate
//! transitions.

use std::collections::HashMap;

use stagewatch_protocol::TestKey;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SlotStatus {
    #[default]
    Waiting,
    Responding,
    Success,
    Failed,
}

impl SlotStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Responding => "responding",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn from_success(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::Failed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrencySlot {
    /// Creation order within the run, starting at 0.
    pub ordinal: usize,
    pub bound_key: TestKey,
    pub status: SlotStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Created {
        ordinal: usize,
        status: SlotStatus,
        /// Set when a buffered status replaced the initial one.
        replayed_pending: bool,
    },
    AlreadyTracked {
        ordinal: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    Updated { ordinal: usize, previous: SlotStatus },
    Unchanged { ordinal: usize },
    /// No slot yet; the status waits in the pending buffer.
    Buffered { superseded: Option<SlotStatus> },
}

#[derive(Debug, Clone, Default)]
pub struct SlotTracker {
    slots: Vec<ConcurrencySlot>,
    by_key: HashMap<TestKey, usize>,
    pending: HashMap<TestKey, SlotStatus>,
}

impl SlotTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(&mut self, key: TestKey, initial_status: SlotStatus) -> StartOutcome {
        if let Some(&ordinal) = self.by_key.get(&key) {
            return StartOutcome::AlreadyTracked { ordinal };
        }

        let ordinal = self.slots.len();
        let (status, replayed_pending) = match self.pending.remove(&key) {
            Some(pending) => {
                debug!(key = %key, status = pending.as_str(), "applying buffered slot status");
                (pending, true)
            }
            None => (initial_status, false),
        };
        self.slots.push(ConcurrencySlot {
            ordinal,
            bound_key: key,
            status,
        });
        self.by_key.insert(key, ordinal);
        StartOutcome::Created {
            ordinal,
            status,
            replayed_pending,
        }
    }

    pub fn on_status(&mut self, key: TestKey, status: SlotStatus) -> StatusOutcome {
        let Some(&ordinal) = self.by_key.get(&key) else {
            let superseded = self.pending.insert(key, status);
            debug!(key = %key, status = status.as_str(), "buffering status for unseen slot");
            return StatusOutcome::Buffered { superseded };
        };

        let slot = &mut self.slots[ordinal];
        if slot.status == status {
            return StatusOutcome::Unchanged { ordinal };
        }
        let previous = slot.status;
        slot.status = status;
        StatusOutcome::Updated { ordinal, previous }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.by_key.clear();
        self.pending.clear();
    }

    pub fn count(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[ConcurrencySlot] {
        &self.slots
    }

    pub fn slot_for(&self, key: &TestKey) -> Option<&ConcurrencySlot> {
        self.by_key.get(key).map(|&ordinal| &self.slots[ordinal])
    }

    pub fn pending_status(&self, key: &TestKey) -> Option<SlotStatus> {
        self.pending.get(key).copied()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn count_with_status(&self, status: SlotStatus) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.status == status)
            .count()
    }
}
