//! Config file location and loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{debug, info};

use crate::env::resolve_env_vars;
use crate::schema::ArmdeckConfig;

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolve the config directory.
/// Priority: `ARMDECK_CONFIG_DIR` env > `~/.config/armdeck/`.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ARMDECK_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::config_dir()
        .map(|base| base.join("armdeck"))
        .unwrap_or_else(|| PathBuf::from(".armdeck"))
}

/// Full path to the main config file.
pub fn config_file_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Load and parse the config from disk.
///
/// A missing file is a first run and yields defaults. A present but invalid
/// file is an error; starting with silently-ignored config is worse than not
/// starting.
pub async fn load_config(path: &Path) -> Result<ArmdeckConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config file does not exist, using defaults");
        return Ok(ArmdeckConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let value: serde_json::Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse config YAML at: {}", path.display()))?;
    let value = resolve_env_vars(&value)
        .with_context(|| format!("failed to resolve env vars in: {}", path.display()))?;
    let config: ArmdeckConfig = serde_json::from_value(value)
        .with_context(|| format!("invalid config structure in: {}", path.display()))?;

    info!(path = %path.display(), "loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("config.yaml")).await.unwrap();
        assert_eq!(config.gateway.port, 8710);
    }

    #[tokio::test]
    async fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "gateway:\n  port: 9999\n").unwrap();
        let config = load_config(&path).await.unwrap();
        assert_eq!(config.gateway.port, 9999);
        assert_eq!(config.gateway.host, "127.0.0.1");
    }

    #[tokio::test]
    async fn invalid_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "gateway: [not a map").unwrap();
        assert!(load_config(&path).await.is_err());
    }
}
