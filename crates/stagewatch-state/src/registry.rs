use std::collections::HashMap;

use stagewatch_protocol::{ExecutionResultPayload, TestKey};

use crate::execution_record::{ExecutionRecord, ExecutionStatus, RecordDefaults};
use crate::stream_merger::{merge_snapshot, SnapshotMerge};

/// Number of records a conversation view shows, newest first.
pub const CONVERSATION_DISPLAY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultOutcome {
    /// The result arrived before anything else for this key.
    pub created: bool,
    pub status: ExecutionStatus,
    pub snapshot: SnapshotMerge,
}

/// Single store of execution records, one per key, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct TestRegistry {
    records: HashMap<TestKey, ExecutionRecord>,
    order: Vec<TestKey>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, key: TestKey, defaults: RecordDefaults) -> &mut ExecutionRecord {
        let order = &mut self.order;
        self.records.entry(key).or_insert_with(|| {
            order.push(key);
            ExecutionRecord::new(key, defaults)
        })
    }

    pub fn apply_result(&mut self, result: &ExecutionResultPayload) -> ResultOutcome {
        let created = !self.records.contains_key(&result.key);
        let record = self.get_or_create(
            result.key,
            RecordDefaults::new(result.text.clone().unwrap_or_default(), result.timestamp),
        );

        record.status = if result.success {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failed
        };
        record.adopt_input_text(result.stt_text.as_deref(), result.text.as_deref());

        let snapshot = match result.llm_text.as_deref() {
            Some(text) => {
                record.completed_text = Some(text.to_string());
                merge_snapshot(record, text)
            }
            None => SnapshotMerge::Ignored,
        };

        if result.error.is_some() {
            record.error.clone_from(&result.error);
        }
        if result.failure_reason.is_some() {
            record.failure_reason.clone_from(&result.failure_reason);
        }
        if !result.timings.is_empty() {
            record.timings = result.timings.clone();
        }

        ResultOutcome {
            created,
            status: record.status,
            snapshot,
        }
    }

    pub fn get(&self, key: &TestKey) -> Option<&ExecutionRecord> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &TestKey) -> bool {
        self.records.contains_key(key)
    }

    /// Records in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &ExecutionRecord> {
        self.order.iter().filter_map(|key| self.records.get(key))
    }

    /// Newest records first, at most `limit` of them.
    pub fn recent(&self, limit: usize) -> impl Iterator<Item = &ExecutionRecord> {
        self.order
            .iter()
            .rev()
            .take(limit)
            .filter_map(|key| self.records.get(key))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear_all(&mut self) {
        self.records.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use stagewatch_protocol::{ExecutionResultPayload, ExecutionTimings, TestKey, TestType};

    use super::TestRegistry;
    use crate::execution_record::{ExecutionStatus, RecordDefaults};
    use crate::stream_merger::{merge_fragment, SnapshotMerge};

    fn key(index: u64) -> TestKey {
        TestKey::new(index, TestType::Order)
    }

    fn result(index: u64, success: bool) -> ExecutionResultPayload {
        ExecutionResultPayload {
            key: key(index),
            success,
            text: Some("order two units".to_string()),
            stt_text: None,
            llm_text: None,
            error: None,
            failure_reason: None,
            timestamp: None,
            timings: ExecutionTimings::default(),
        }
    }

    #[test]
    fn unit_get_or_create_never_duplicates_a_key() {
        let mut registry = TestRegistry::new();
        registry
            .get_or_create(key(1), RecordDefaults::new("first", None))
            .stream_buffer
            .push_str("kept");
        let again = registry.get_or_create(key(1), RecordDefaults::new("second", None));
        assert_eq!(again.input_text, "first");
        assert_eq!(again.stream_buffer, "kept");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn functional_apply_result_creates_missing_record_and_sets_status() {
        let mut registry = TestRegistry::new();
        let mut failed = result(7, false);
        failed.error = Some("tts timeout".to_string());
        failed.failure_reason = Some("timeout".to_string());
        let outcome = registry.apply_result(&failed);
        assert!(outcome.created);
        assert_eq!(outcome.status, ExecutionStatus::Failed);

        let record = registry.get(&key(7)).expect("record");
        assert_eq!(record.input_text, "order two units");
        assert_eq!(record.error.as_deref(), Some("tts timeout"));
        assert_eq!(record.failure_reason.as_deref(), Some("timeout"));
    }

    #[test]
    fn functional_apply_result_prefers_recognized_input_and_caches_final_text() {
        let mut registry = TestRegistry::new();
        let record = registry.get_or_create(key(2), RecordDefaults::new("typed", None));
        merge_fragment(record, "Sure, placing");

        let mut done = result(2, true);
        done.stt_text = Some("spoken".to_string());
        done.llm_text = Some("Sure, placing your order now.".to_string());
        done.timings.total_response_ms = Some(900.0);
        let outcome = registry.apply_result(&done);
        assert!(!outcome.created);
        assert_eq!(outcome.snapshot, SnapshotMerge::CachedOnly);

        let record = registry.get(&key(2)).expect("record");
        assert_eq!(record.status, ExecutionStatus::Success);
        assert_eq!(record.input_text, "spoken");
        assert_eq!(record.stream_buffer, "Sure, placing");
        assert_eq!(
            record.completed_text.as_deref(),
            Some("Sure, placing your order now.")
        );
        assert_eq!(record.timings.total_response_ms, Some(900.0));
    }

    #[test]
    fn unit_recent_lists_newest_first_with_limit() {
        let mut registry = TestRegistry::new();
        for index in [5, 1, 9] {
            registry.get_or_create(key(index), RecordDefaults::new("", None));
        }
        let recent = registry
            .recent(2)
            .map(|record| record.key.index)
            .collect::<Vec<_>>();
        assert_eq!(recent, vec![9, 1]);
        let all = registry
            .iter()
            .map(|record| record.key.index)
            .collect::<Vec<_>>();
        assert_eq!(all, vec![5, 1, 9]);
    }

    #[test]
    fn unit_clear_all_drops_records_and_order() {
        let mut registry = TestRegistry::new();
        registry.get_or_create(key(1), RecordDefaults::new("", None));
        registry.clear_all();
        assert!(registry.is_empty());
        assert_eq!(registry.recent(10).count(), 0);
    }
}
