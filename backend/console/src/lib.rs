//! `armdeck-console` — the subscriber-side view model.
//!
//! Reconstructs a display state from a session's stream frames: a bounded
//! scrollback of text lines, the latest joint-position snapshot, and an
//! "awaiting input" flag gating the acknowledge control. The flag follows
//! status frames only, never text heuristics; the server already classified
//! the output.

use armdeck_classifier::parse_table_block;
use armdeck_core::{SessionStatus, StreamMessage, TableTiming};
use std::collections::VecDeque;

const DEFAULT_SCROLLBACK: usize = 500;

/// View state for one session, updated frame by frame.
pub struct Console {
    scrollback_limit: usize,
    scrollback: VecDeque<String>,
    table: Vec<(String, f64)>,
    timing: Option<TableTiming>,
    status: SessionStatus,
}

impl Default for Console {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLLBACK)
    }
}

impl Console {
    pub fn new(scrollback_limit: usize) -> Self {
        Self {
            scrollback_limit,
            scrollback: VecDeque::new(),
            table: Vec::new(),
            timing: None,
            status: SessionStatus::Pending,
        }
    }

    /// Fold one stream frame into the view state.
    pub fn apply(&mut self, frame: &StreamMessage) {
        match frame {
            StreamMessage::Output(text) => self.push_line(text.clone()),
            StreamMessage::Error(text) => self.push_line(format!("error: {text}")),
            StreamMessage::Table(raw) => {
                // Each table frame is a complete snapshot; replace, never
                // merge with the previous one.
                let (fields, timing) = parse_table_block(raw);
                if fields.is_empty() {
                    self.push_line(raw.clone());
                } else {
                    self.table = fields;
                    if timing.is_some() {
                        self.timing = timing;
                    }
                }
            }
            StreamMessage::Status(payload) => {
                self.status = payload.status;
            }
        }
    }

    fn push_line(&mut self, line: String) {
        if self.scrollback.len() == self.scrollback_limit {
            self.scrollback.pop_front();
        }
        self.scrollback.push_back(line);
    }

    pub fn scrollback(&self) -> impl Iterator<Item = &str> {
        self.scrollback.iter().map(String::as_str)
    }

    /// Latest joint-position snapshot, in the order the table printed them.
    pub fn table(&self) -> &[(String, f64)] {
        &self.table
    }

    pub fn timing(&self) -> Option<TableTiming> {
        self.timing
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn awaiting_input(&self) -> bool {
        self.status == SessionStatus::AwaitingInput
    }

    /// Whether the acknowledge control should be enabled. Input while not
    /// awaiting is prevented here rather than relying on the server's
    /// rejection.
    pub fn can_submit(&self) -> bool {
        self.awaiting_input()
    }

    pub fn is_live(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use armdeck_core::StatusPayload;

    use super::*;

    fn status(status: SessionStatus) -> StreamMessage {
        StreamMessage::Status(StatusPayload { status })
    }

    #[test]
    fn scrollback_is_bounded() {
        let mut console = Console::new(3);
        for i in 0..5 {
            console.apply(&StreamMessage::Output(format!("line {i}")));
        }
        let lines: Vec<&str> = console.scrollback().collect();
        assert_eq!(lines, vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn table_frames_replace_the_snapshot_wholesale() {
        let mut console = Console::default();
        console.apply(&StreamMessage::Table(
            "j1.pos | 1.0\nj2.pos | 2.0\ntime: 5.0ms (200 Hz)".into(),
        ));
        console.apply(&StreamMessage::Table("j1.pos | 9.0".into()));

        assert_eq!(console.table(), &[("j1".to_string(), 9.0)]);
        // Timing sticks from the last frame that reported it.
        assert_eq!(console.timing().unwrap().rate_hz, 200.0);
    }

    #[test]
    fn awaiting_flag_follows_status_frames_only() {
        let mut console = Console::default();
        console.apply(&StreamMessage::Output("Press ENTER to continue...".into()));
        assert!(!console.can_submit());

        console.apply(&status(SessionStatus::AwaitingInput));
        assert!(console.can_submit());

        console.apply(&status(SessionStatus::Running));
        assert!(!console.can_submit());
    }

    #[test]
    fn terminal_status_disables_the_console() {
        let mut console = Console::default();
        console.apply(&status(SessionStatus::Running));
        assert!(console.is_live());
        console.apply(&status(SessionStatus::Finished));
        assert!(!console.is_live());
        assert!(!console.can_submit());
    }

    #[test]
    fn errors_land_in_the_scrollback() {
        let mut console = Console::default();
        console.apply(&StreamMessage::Error("process exited with code 2".into()));
        let lines: Vec<&str> = console.scrollback().collect();
        assert_eq!(lines, vec!["error: process exited with code 2"]);
    }

    #[test]
    fn unparseable_table_block_degrades_to_text() {
        let mut console = Console::default();
        console.apply(&StreamMessage::Table("not a table".into()));
        assert!(console.table().is_empty());
        assert_eq!(console.scrollback().count(), 1);
    }
}
