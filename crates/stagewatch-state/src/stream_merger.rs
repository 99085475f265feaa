//! Merges streamed response fragments and snapshots into one display buffer.
//!
//! Fragments are sentence-level increments; snapshots are the cumulative text
//! so far. Re-delivered fragments are detected by comparing whitespace
//! tokens against the tail of the buffer, so a retransmission that differs
//! only in spacing is still recognized.

use crate::execution_record::ExecutionRecord;

pub const AWAITING_RESPONSE_PLACEHOLDER: &str = "Awaiting response...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentMerge {
    /// The buffer was empty and now holds the fragment.
    Seeded,
    Appended,
    /// The fragment matched the buffer's trailing tokens and was dropped.
    Duplicate,
    /// The fragment had no visible content.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotMerge {
    /// The snapshot seeded an empty buffer and was cached.
    Applied,
    /// The buffer already had streamed content; only the cache was updated.
    CachedOnly,
    Ignored,
}

fn buffer_is_unset(buffer: &str) -> bool {
    let trimmed = buffer.trim();
    trimmed.is_empty() || trimmed == AWAITING_RESPONSE_PLACEHOLDER
}

fn ends_with_tokens(buffer: &str, fragment: &str) -> bool {
    let incoming = fragment.split_whitespace().collect::<Vec<_>>();
    let existing = buffer.split_whitespace().collect::<Vec<_>>();
    if incoming.is_empty() || existing.len() < incoming.len() {
        return false;
    }
    existing[existing.len() - incoming.len()..] == incoming[..]
}

/// Appends a newly completed sentence unless it repeats the buffer's tail.
pub fn merge_fragment(record: &mut ExecutionRecord, sentence: &str) -> FragmentMerge {
    let sentence = sentence.trim();
    if sentence.is_empty() {
        return FragmentMerge::Ignored;
    }
    if buffer_is_unset(&record.stream_buffer) {
        record.stream_buffer = sentence.to_string();
        return FragmentMerge::Seeded;
    }
    if ends_with_tokens(&record.stream_buffer, sentence) {
        return FragmentMerge::Duplicate;
    }
    record.stream_buffer.push(' ');
    record.stream_buffer.push_str(sentence);
    FragmentMerge::Appended
}

/// Caches a cumulative snapshot; it only reaches the buffer while nothing was streamed yet.
pub fn merge_snapshot(record: &mut ExecutionRecord, cumulative_text: &str) -> SnapshotMerge {
    if cumulative_text.trim().is_empty() {
        return SnapshotMerge::Ignored;
    }
    record.final_text = Some(cumulative_text.to_string());
    if buffer_is_unset(&record.stream_buffer) {
        record.stream_buffer = cumulative_text.trim().to_string();
        return SnapshotMerge::Applied;
    }
    SnapshotMerge::CachedOnly
}

/// Picks the text to show for a record.
///
/// Order: the finalized text from the completion result, the cached
/// snapshot, the streamed buffer, then the placeholder.
pub fn resolve_display_text(record: &ExecutionRecord) -> &str {
    [
        record.completed_text.as_deref(),
        record.final_text.as_deref(),
        Some(record.stream_buffer.as_str()),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .find(|text| !text.is_empty() && *text != AWAITING_RESPONSE_PLACEHOLDER)
    .unwrap_or(AWAITING_RESPONSE_PLACEHOLDER)
}
