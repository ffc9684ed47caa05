//! Typed configuration schema.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use armdeck_classifier::rules::{DEFAULT_PROMPT_PHRASES, DEFAULT_TABLE_FLUSH};
use armdeck_core::Launcher;

/// Root configuration. Every section is optional in the file; absent
/// sections take their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArmdeckConfig {
    pub gateway: GatewayConfig,
    pub launcher: Launcher,
    pub classifier: ClassifierConfig,
    pub broker: BrokerConfig,
    pub devices: DevicesConfig,
    pub logging: LoggingConfig,
}

/// HTTP/WebSocket listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8710,
        }
    }
}

/// Output classification tunables. Prompt wording lives here so a change in
/// the wrapped CLI's text is a config edit, not a code change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierConfig {
    pub prompt_phrases: Vec<String>,
    pub table_flush_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            prompt_phrases: DEFAULT_PROMPT_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            table_flush_ms: DEFAULT_TABLE_FLUSH.as_millis() as u64,
        }
    }
}

/// Session broker tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrokerConfig {
    pub channel_capacity: usize,
    pub stop_grace_secs: u64,
    pub error_tail_lines: usize,
    pub reap_interval_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            stop_grace_secs: 3,
            error_tail_lines: 8,
            reap_interval_secs: 30,
        }
    }
}

/// Capture device settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DevicesConfig {
    /// Directory holding `video*` capture nodes and `tty*` serial nodes.
    pub dev_root: PathBuf,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            dev_root: PathBuf::from("/dev"),
        }
    }
}

/// Logging settings. `dir` enables an additional rolling NDJSON file log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let config: ArmdeckConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.gateway.port, 8710);
        assert_eq!(config.launcher.program, "python");
        assert_eq!(config.broker.channel_capacity, 256);
        assert!(config.logging.dir.is_none());
    }

    #[test]
    fn sections_accept_camel_case_keys() {
        let yaml = r#"
gateway:
  host: 0.0.0.0
  port: 9000
classifier:
  promptPhrases: ["press enter"]
  tableFlushMs: 250
broker:
  stopGraceSecs: 10
launcher:
  program: python3
  baseArgs: ["-m"]
"#;
        let config: ArmdeckConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.gateway.host, "0.0.0.0");
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.classifier.prompt_phrases, vec!["press enter"]);
        assert_eq!(config.classifier.table_flush_ms, 250);
        assert_eq!(config.broker.stop_grace_secs, 10);
        assert_eq!(config.broker.error_tail_lines, 8);
        assert_eq!(config.launcher.program, "python3");
    }
}
