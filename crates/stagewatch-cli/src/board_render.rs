//! Plain-text rendering of the dashboard board.

use std::fmt::Write as _;

use stagewatch_state::{
    resolve_display_text, DashboardState, ExecutionRecord, ExecutionStatus, RunPhase, SlotStatus,
    CONVERSATION_DISPLAY_LIMIT,
};

const ANSI_RESET: &str = "\x1b[0m";
const ANSI_DIM: &str = "\x1b[2m";
const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_RED: &str = "\x1b[31m";
const ANSI_YELLOW: &str = "\x1b[33m";
const TEXT_PREVIEW_CHARS: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeTier {
    Large,
    Medium,
    Small,
    Tiny,
}

impl SizeTier {
    pub fn for_slot_count(count: usize) -> Self {
        match count {
            0..=10 => Self::Large,
            11..=30 => Self::Medium,
            31..=50 => Self::Small,
            _ => Self::Tiny,
        }
    }

    /// Slots per row of the strip.
    pub fn strip_width(self) -> usize {
        match self {
            Self::Large => 10,
            Self::Medium => 15,
            Self::Small => 25,
            Self::Tiny => 40,
        }
    }

    fn separator(self) -> &'static str {
        match self {
            Self::Large | Self::Medium => " ",
            Self::Small | Self::Tiny => "",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    color: bool,
}

impl Palette {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(self, code: &str, text: &str) -> String {
        if self.color {
            format!("{code}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

pub fn slot_glyph(status: SlotStatus) -> char {
    match status {
        SlotStatus::Waiting => '·',
        SlotStatus::Responding => '~',
        SlotStatus::Success => '+',
        SlotStatus::Failed => 'x',
    }
}

fn slot_color(status: SlotStatus) -> &'static str {
    match status {
        SlotStatus::Waiting => ANSI_DIM,
        SlotStatus::Responding => ANSI_YELLOW,
        SlotStatus::Success => ANSI_GREEN,
        SlotStatus::Failed => ANSI_RED,
    }
}

fn record_color(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Pending => ANSI_DIM,
        ExecutionStatus::Responding => ANSI_YELLOW,
        ExecutionStatus::Success => ANSI_GREEN,
        ExecutionStatus::Failed => ANSI_RED,
    }
}

/// Human duration in the units the run report uses.
pub fn format_duration_ms(ms: f64) -> String {
    if !ms.is_finite() || ms < 0.0 {
        return "n/a".to_string();
    }
    if ms < 1_000.0 {
        format!("{ms:.0} ms")
    } else if ms < 60_000.0 {
        format!("{:.2} s", ms / 1_000.0)
    } else if ms < 3_600_000.0 {
        let minutes = (ms / 60_000.0).floor();
        format!("{minutes:.0}m {:.1}s", (ms % 60_000.0) / 1_000.0)
    } else {
        let hours = (ms / 3_600_000.0).floor();
        format!("{hours:.0}h {:.0}m", ((ms % 3_600_000.0) / 60_000.0).floor())
    }
}

fn preview(text: &str) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= TEXT_PREVIEW_CHARS {
        return single_line;
    }
    let mut cut = single_line
        .chars()
        .take(TEXT_PREVIEW_CHARS)
        .collect::<String>();
    cut.push_str("...");
    cut
}

pub fn render_header(state: &DashboardState, palette: Palette) -> String {
    let counters = state.summary();
    let summary = if counters.summary.total > 0 {
        counters.summary.clone()
    } else {
        state.derived_summary()
    };
    let phase = match state.phase() {
        RunPhase::Idle => palette.paint(ANSI_DIM, RunPhase::Idle.as_str()),
        RunPhase::Running => palette.paint(ANSI_YELLOW, RunPhase::Running.as_str()),
        RunPhase::Completed => palette.paint(ANSI_GREEN, RunPhase::Completed.as_str()),
        RunPhase::Errored => palette.paint(ANSI_RED, RunPhase::Errored.as_str()),
    };
    let mut header = format!(
        "{} phase={} progress={} / {} ({:.1}%) total={} ok={} failed={} rate={:.1}%",
        palette.paint(ANSI_BOLD, "stagewatch"),
        phase,
        counters.progress,
        counters.total,
        counters.progress_percent(),
        summary.total,
        summary.successful,
        summary.failed,
        summary.success_rate,
    );
    if let Some(error) = state.last_error() {
        let _ = write!(header, "\n{}", palette.paint(ANSI_RED, &format!("error: {error}")));
    } else if let Some(message) = state.last_status_message() {
        let _ = write!(header, "\n{}", palette.paint(ANSI_DIM, message));
    }
    header
}

pub fn render_slot_strip(state: &DashboardState, palette: Palette) -> String {
    let slots = state.slots().slots();
    if slots.is_empty() {
        return palette.paint(ANSI_DIM, "(no active slots)");
    }
    let tier = SizeTier::for_slot_count(slots.len());
    slots
        .chunks(tier.strip_width())
        .map(|row| {
            row.iter()
                .map(|slot| {
                    palette.paint(slot_color(slot.status), &slot_glyph(slot.status).to_string())
                })
                .collect::<Vec<_>>()
                .join(tier.separator())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_conversation(record: &ExecutionRecord, palette: Palette) -> String {
    let mut entry = format!(
        "#{:03} [{}] {}",
        record.key.index,
        record.key.test_type,
        palette.paint(record_color(record.status), record.status.as_str()),
    );
    if let Some(total) = record.timings.total_response_ms {
        let _ = write!(entry, " {}", format_duration_ms(total));
    }
    if !record.input_text.trim().is_empty() {
        let _ = write!(entry, "\n  > {}", preview(&record.input_text));
    }
    let _ = write!(
        entry,
        "\n  < {}",
        preview(resolve_display_text(record))
    );
    if let Some(error) = record.error.as_deref() {
        let _ = write!(entry, "\n  ! {}", palette.paint(ANSI_RED, &preview(error)));
    }
    entry
}

pub fn render_board(state: &DashboardState, palette: Palette) -> String {
    let mut board = render_header(state, palette);
    board.push_str("\n\n");
    board.push_str(&render_slot_strip(state, palette));
    let conversations = state
        .registry()
        .recent(CONVERSATION_DISPLAY_LIMIT)
        .map(|record| render_conversation(record, palette))
        .collect::<Vec<_>>();
    if !conversations.is_empty() {
        board.push_str("\n\n");
        board.push_str(&conversations.join("\n"));
    }
    board.push('\n');
    board
}

#[cfg(test)]
mod tests {
    use stagewatch_protocol::{decode_notification, Notification};
    use stagewatch_state::EventIngress;

    use super::{format_duration_ms, render_board, render_slot_strip, Palette, SizeTier};

    fn notification(name: &str, payload: serde_json::Value) -> Notification {
        decode_notification(name, &payload).expect("notification decodes")
    }

    #[test]
    fn unit_size_tier_thresholds() {
        assert_eq!(SizeTier::for_slot_count(10), SizeTier::Large);
        assert_eq!(SizeTier::for_slot_count(11), SizeTier::Medium);
        assert_eq!(SizeTier::for_slot_count(30), SizeTier::Medium);
        assert_eq!(SizeTier::for_slot_count(50), SizeTier::Small);
        assert_eq!(SizeTier::for_slot_count(51), SizeTier::Tiny);
    }

    #[test]
    fn unit_format_duration_ms_picks_units() {
        assert_eq!(format_duration_ms(840.0), "840 ms");
        assert_eq!(format_duration_ms(1830.0), "1.83 s");
        assert_eq!(format_duration_ms(90_000.0), "1m 30.0s");
        assert_eq!(format_duration_ms(-1.0), "n/a");
    }

    #[test]
    fn functional_slot_strip_wraps_by_tier() {
        let mut ingress = EventIngress::new();
        for index in 0..12u64 {
            ingress.dispatch(notification(
                "test_start",
                serde_json::json!({"index": index, "type": "inquiry"}),
            ));
        }
        ingress.dispatch(notification(
            "test_result",
            serde_json::json!({"result": {"index": 0, "type": "inquiry", "success": true}}),
        ));
        let strip = render_slot_strip(ingress.state(), Palette::new(false));
        let rows = strip.lines().collect::<Vec<_>>();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].starts_with("+ ·"));
        assert_eq!(rows[0].split(' ').count(), 12);
    }

    #[test]
    fn functional_board_lists_newest_conversation_first_with_resolved_text() {
        let mut ingress = EventIngress::new();
        ingress.dispatch(notification(
            "test_start",
            serde_json::json!({"index": 1, "type": "inquiry", "text": "price of a"}),
        ));
        ingress.dispatch(notification(
            "test_start",
            serde_json::json!({"index": 2, "type": "purchase", "text": "buy a"}),
        ));
        ingress.dispatch(notification(
            "test_detail_update",
            serde_json::json!({"index": 1, "type": "inquiry", "llm_sentence": "A costs ten."}),
        ));
        let board = render_board(ingress.state(), Palette::new(false));
        let order_at = board.find("#002 [order] pending").expect("order entry");
        let inquiry_at = board.find("#001 [inquiry] responding").expect("inquiry entry");
        assert!(order_at < inquiry_at);
        assert!(board.contains("  < A costs ten."));
        assert!(board.contains("  < Awaiting response..."));
        assert!(board.contains("phase=running"));
        assert!(!board.contains('\x1b'));
    }
}
