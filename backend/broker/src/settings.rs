use std::time::Duration;

use armdeck_classifier::rules::{DEFAULT_PROMPT_PHRASES, DEFAULT_TABLE_FLUSH};

/// Tunables for the session broker.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    /// Bounded per-subscriber buffer. A subscriber that falls further behind
    /// than this loses its oldest messages (and only its own).
    pub channel_capacity: usize,
    /// How long `stop` waits after SIGTERM before a hard kill.
    pub stop_grace: Duration,
    /// How many trailing output lines accompany a terminal failure.
    pub error_tail_lines: usize,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            stop_grace: Duration::from_secs(3),
            error_tail_lines: 8,
        }
    }
}

/// Classifier tunables shared by all command families; the per-family rule
/// set is derived from these at start time.
#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub prompt_phrases: Vec<String>,
    pub table_flush: Duration,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            prompt_phrases: DEFAULT_PROMPT_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            table_flush: DEFAULT_TABLE_FLUSH,
        }
    }
}
