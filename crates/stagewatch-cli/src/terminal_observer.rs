//! Line-oriented view binding for the live watch command.

use std::io::Write;

use stagewatch_state::{DashboardChange, DashboardObserver, DashboardState, RunPhase};

use crate::board_render::{render_board, Palette};

/// Prints one line per slot or run-level change and the full board when a
/// run finishes.
pub struct TerminalObserver<W: Write + Send> {
    out: W,
    palette: Palette,
}

impl<W: Write + Send> TerminalObserver<W> {
    pub fn new(out: W, palette: Palette) -> Self {
        Self { out, palette }
    }

    fn line(&self, change: &DashboardChange, state: &DashboardState) -> Option<String> {
        match change {
            DashboardChange::RunReset => Some("run reset".to_string()),
            DashboardChange::PhaseChanged(phase) => Some(format!("phase {}", phase.as_str())),
            DashboardChange::SlotCreated {
                key,
                ordinal,
                status,
            } => Some(format!("slot {ordinal:>3} {key} {}", status.as_str())),
            DashboardChange::SlotStatusChanged {
                key,
                ordinal,
                status,
            } => Some(format!("slot {ordinal:>3} {key} -> {}", status.as_str())),
            DashboardChange::SummaryUpdated => {
                let summary = state.summary();
                Some(format!(
                    "progress {} / {} ({:.1}%)",
                    summary.progress,
                    summary.total,
                    summary.progress_percent()
                ))
            }
            DashboardChange::StatusMessage(message) => Some(format!("status: {message}")),
            DashboardChange::ErrorRaised(error) => Some(format!("error: {error}")),
            DashboardChange::ReportAvailable => {
                Some("report available: run `stagewatch report`".to_string())
            }
            DashboardChange::StatusBuffered { .. } | DashboardChange::RecordUpdated { .. } => None,
        }
    }
}

impl<W: Write + Send> DashboardObserver for TerminalObserver<W> {
    fn on_change(&mut self, change: &DashboardChange, state: &DashboardState) {
        if let Some(line) = self.line(change, state) {
            let _ = writeln!(self.out, "{line}");
        }
        if matches!(
            change,
            DashboardChange::PhaseChanged(RunPhase::Completed | RunPhase::Errored)
        ) {
            let _ = write!(self.out, "{}", render_board(state, self.palette));
        }
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    use serde_json::json;
    use stagewatch_protocol::decode_notification;
    use stagewatch_state::EventIngress;

    use super::TerminalObserver;
    use crate::board_render::Palette;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("buffer lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("buffer lock")).to_string()
        }
    }

    #[test]
    fn functional_observer_prints_slot_lines_and_final_board() {
        let buffer = SharedBuffer::default();
        let mut ingress = EventIngress::new().with_observer(Box::new(TerminalObserver::new(
            buffer.clone(),
            Palette::new(false),
        )));
        for (name, payload) in [
            ("test_started", json!({})),
            ("test_start", json!({"index": 0, "type": "compare", "text": "a or b"})),
            (
                "test_result",
                json!({"result": {"index": 0, "type": "compare", "success": true, "llm_text": "A."}}),
            ),
            (
                "test_completed",
                json!({"summary": {"total": 1, "successful": 1, "failed": 0, "success_rate": 100.0}}),
            ),
        ] {
            ingress.dispatch(decode_notification(name, &payload).expect("decodes"));
        }

        let text = buffer.text();
        assert!(text.contains("run reset"));
        assert!(text.contains("slot   0 0-compare waiting"));
        assert!(text.contains("slot   0 0-compare -> success"));
        assert!(text.contains("phase completed"));
        assert!(text.contains("#000 [compare] success"));
        assert!(text.contains("report available"));
    }
}
