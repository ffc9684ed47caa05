//! `armdeck-classifier` — turns raw subprocess output lines into typed
//! messages.
//!
//! Prompt detection is inherently heuristic and coupled to the wording of
//! the wrapped CLI, so it lives behind a rule table: wording changes in the
//! wrapped tool are a data change here, not a redesign.

pub mod ansi;
pub mod classify;
pub mod rules;

pub use ansi::clean_line;
pub use classify::{parse_table_block, Classifier};
pub use rules::ClassifierRules;
