//! Reconciliation core of the stagewatch dashboard.
//!
//! Turns the backend's arrival-ordered notification stream into per-execution
//! records, a stable sequence of concurrency slots, and de-duplicated streamed
//! response text. All mutation goes through [`EventIngress`]; views read the
//! resulting [`DashboardState`] from observer callbacks.

pub mod dashboard_state;
pub mod execution_record;
pub mod ingress;
pub mod registry;
pub mod slot_tracker;
pub mod stream_merger;
pub mod summary;

pub use dashboard_state::{DashboardChange, DashboardState, RunPhase};
pub use execution_record::{ExecutionRecord, ExecutionStatus, RecordDefaults};
pub use ingress::{DashboardObserver, EventIngress, IngestOutcome, IngestStats};
pub use registry::{ResultOutcome, TestRegistry, CONVERSATION_DISPLAY_LIMIT};
pub use slot_tracker::{ConcurrencySlot, SlotStatus, SlotTracker, StartOutcome, StatusOutcome};
pub use stream_merger::{
    merge_fragment, merge_snapshot, resolve_display_text, FragmentMerge, SnapshotMerge,
    AWAITING_RESPONSE_PLACEHOLDER,
};
pub use summary::SummaryAggregator;
