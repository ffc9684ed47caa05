//! Per-command-family classification rules.

use std::time::Duration;

use armdeck_core::OperationKind;

/// Default prompt phrases: case-insensitive substrings that mean the wrapped
/// process is blocked on a terminal read.
pub const DEFAULT_PROMPT_PHRASES: &[&str] = &[
    "press enter",
    "press enter to continue",
    "press enter to stop",
];

/// How long after the last table row a pending table is held before it is
/// flushed anyway.
pub const DEFAULT_TABLE_FLUSH: Duration = Duration::from_millis(500);

/// Rule set for one command family.
#[derive(Debug, Clone)]
pub struct ClassifierRules {
    /// Lowercased prompt phrases, matched as substrings.
    pub prompt_phrases: Vec<String>,
    /// Whether this family prints `<joint>.pos` status tables at all.
    pub tables: bool,
    /// Flush timeout for a pending table.
    pub table_flush: Duration,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            prompt_phrases: DEFAULT_PROMPT_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            tables: true,
            table_flush: DEFAULT_TABLE_FLUSH,
        }
    }
}

impl ClassifierRules {
    /// Build the rule set for a command family. Only the continuous-loop
    /// families (teleoperation, recording) print position tables; the
    /// prompt-driven families keep table accumulation off so nothing is
    /// ever held back.
    pub fn for_kind(kind: OperationKind, prompt_phrases: &[String], table_flush: Duration) -> Self {
        let tables = matches!(
            kind,
            OperationKind::Teleoperation | OperationKind::DatasetRecord
        );
        // Training never reads stdin; a prompt-looking line in its log
        // output must not flip the session to awaiting_input.
        let prompt_phrases = if kind == OperationKind::ModelTraining {
            Vec::new()
        } else {
            prompt_phrases.iter().map(|p| p.to_lowercase()).collect()
        };
        Self {
            prompt_phrases,
            tables,
            table_flush,
        }
    }

    pub fn matches_prompt(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        self.prompt_phrases.iter().any(|p| lower.contains(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_match_is_case_insensitive() {
        let rules = ClassifierRules::default();
        assert!(rules.matches_prompt("Press ENTER to continue..."));
        assert!(rules.matches_prompt("press enter....to proceed"));
        assert!(!rules.matches_prompt("entering calibration mode"));
    }

    #[test]
    fn tables_only_for_loop_families() {
        let phrases: Vec<String> = vec!["press enter".into()];
        let teleop = ClassifierRules::for_kind(
            OperationKind::Teleoperation,
            &phrases,
            DEFAULT_TABLE_FLUSH,
        );
        assert!(teleop.tables);
        let calib =
            ClassifierRules::for_kind(OperationKind::Calibration, &phrases, DEFAULT_TABLE_FLUSH);
        assert!(!calib.tables);
    }

    #[test]
    fn training_is_prompt_less() {
        let phrases: Vec<String> = vec!["press enter".into()];
        let training = ClassifierRules::for_kind(
            OperationKind::ModelTraining,
            &phrases,
            DEFAULT_TABLE_FLUSH,
        );
        assert!(!training.tables);
        assert!(!training.matches_prompt("Press ENTER to continue..."));
    }
}
