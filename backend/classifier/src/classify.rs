//! The line classifier proper.
//!
//! Sans-IO: the session pump feeds raw lines in with [`Classifier::push`]
//! and drives the table flush timeout itself via
//! [`Classifier::flush_deadline`], so the classifier stays a pure state
//! machine that unit tests can exercise line by line.

use std::time::Instant;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use armdeck_core::{ClassifiedMessage, SessionStatus, TableTiming};

use crate::ansi::clean_line;
use crate::rules::ClassifierRules;

/// `shoulder_pan.pos | 12.5`: one row of a joint position table.
static TABLE_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>[A-Za-z0-9_\-]+)\.pos\s*[|:]\s*(?P<value>-?\d+(?:\.\d+)?)$").unwrap()
});

/// `time: 4.97ms (201 Hz)`: the timing line that closes a table.
static TABLE_TIMING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^time:\s*(?P<ms>\d+(?:\.\d+)?)\s*ms\s*\(\s*(?P<hz>\d+(?:\.\d+)?)\s*Hz\s*\)")
        .unwrap()
});

/// Horizontal rules the CLI prints around tables.
static TABLE_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-{3,}$").unwrap());

/// A table being accumulated, not yet emitted.
struct PendingTable {
    fields: Vec<(String, f64)>,
    timing: Option<TableTiming>,
    raw_lines: Vec<String>,
    last_row_at: Instant,
}

impl PendingTable {
    fn new() -> Self {
        Self {
            fields: Vec::new(),
            timing: None,
            raw_lines: Vec::new(),
            last_row_at: Instant::now(),
        }
    }

    fn into_message(self) -> ClassifiedMessage {
        ClassifiedMessage::Table {
            fields: self.fields,
            timing: self.timing,
            raw: self.raw_lines.join("\n"),
        }
    }
}

/// Stateful per-session classifier.
pub struct Classifier {
    rules: ClassifierRules,
    pending: Option<PendingTable>,
}

impl Classifier {
    pub fn new(rules: ClassifierRules) -> Self {
        Self {
            rules,
            pending: None,
        }
    }

    /// Classify one raw output line. May emit zero messages (table row
    /// absorbed), one, or several (pending table flushed ahead of a plain
    /// line, or a prompt line that also signals `awaiting_input`).
    ///
    /// Classification is line-exclusive: a single line is never both a table
    /// row and a prompt.
    pub fn push(&mut self, raw_line: &str) -> Vec<ClassifiedMessage> {
        let line = clean_line(raw_line);
        if line.is_empty() {
            return Vec::new();
        }

        if self.rules.tables {
            if let Some(captures) = TABLE_ROW.captures(&line) {
                // Well-formed row: accumulate, emit nothing yet.
                let name = captures["name"].to_string();
                let value: f64 = captures["value"].parse().unwrap_or(f64::NAN);
                let table = self.pending.get_or_insert_with(PendingTable::new);
                table.fields.push((name, value));
                table.raw_lines.push(line);
                table.last_row_at = Instant::now();
                return Vec::new();
            }
            if let Some(captures) = TABLE_TIMING.captures(&line) {
                // Timing closes the table.
                let timing = TableTiming {
                    latency_ms: captures["ms"].parse().unwrap_or(f64::NAN),
                    rate_hz: captures["hz"].parse().unwrap_or(f64::NAN),
                };
                let mut table = self.pending.take().unwrap_or_else(PendingTable::new);
                table.timing = Some(timing);
                table.raw_lines.push(line);
                trace!(rows = table.fields.len(), "table closed by timing line");
                return vec![table.into_message()];
            }
            if self.pending.is_some() && TABLE_SEPARATOR.is_match(&line) {
                // Decorative rule inside a table block; keep it in the raw
                // text but contribute no field.
                if let Some(table) = self.pending.as_mut() {
                    table.raw_lines.push(line);
                }
                return Vec::new();
            }
        }

        // Anything else is a non-table line: a pending table is flushed
        // first so stream order matches print order. Malformed table rows
        // (bad separator, non-numeric value) land here too: dropped from the
        // accumulator but still surfaced as plain output so nothing is lost.
        let mut out = Vec::new();
        if let Some(table) = self.pending.take() {
            out.push(table.into_message());
        }

        if self.rules.matches_prompt(&line) {
            out.push(ClassifiedMessage::output(line));
            out.push(ClassifiedMessage::status(SessionStatus::AwaitingInput));
        } else {
            out.push(ClassifiedMessage::output(line));
        }
        out
    }

    /// Flush a pending table unconditionally (stream end, flush timeout).
    pub fn flush(&mut self) -> Option<ClassifiedMessage> {
        self.pending.take().map(PendingTable::into_message)
    }

    /// When the pending table must be flushed even without further input.
    /// `None` while no table is pending.
    pub fn flush_deadline(&self) -> Option<Instant> {
        self.pending
            .as_ref()
            .map(|t| t.last_row_at + self.rules.table_flush)
    }
}

/// Decode a raw table block (as carried by a `table` wire message) back into
/// ordered fields and timing. Used by the client-side console.
pub fn parse_table_block(raw: &str) -> (Vec<(String, f64)>, Option<TableTiming>) {
    let mut fields = Vec::new();
    let mut timing = None;
    for line in raw.lines() {
        let line = line.trim();
        if let Some(captures) = TABLE_ROW.captures(line) {
            if let Ok(value) = captures["value"].parse() {
                fields.push((captures["name"].to_string(), value));
            }
        } else if let Some(captures) = TABLE_TIMING.captures(line) {
            timing = Some(TableTiming {
                latency_ms: captures["ms"].parse().unwrap_or(f64::NAN),
                rate_hz: captures["hz"].parse().unwrap_or(f64::NAN),
            });
        }
    }
    (fields, timing)
}
