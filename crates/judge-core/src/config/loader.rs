//! Configuration loader for YAML files

use std::path::Path;
use tokio::fs;

use super::types::JudgeConfig;
use crate::errors::JudgeError;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<JudgeConfig, JudgeError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await.map_err(|e| {
            JudgeError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::from_str(&content)?;

        // Relative problem directories are resolved against the config file.
        if config.problems_dir.is_relative() {
            if let Some(base) = path.parent() {
                config.problems_dir = base.join(&config.problems_dir);
            }
        }
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_str(content: &str) -> Result<JudgeConfig, JudgeError> {
        // serde_yaml rejects an empty document; treat it as all defaults.
        let config: JudgeConfig = if content.trim().is_empty() {
            JudgeConfig::default()
        } else {
            serde_yaml::from_str(content)
                .map_err(|e| JudgeError::ConfigError(format!("Failed to parse YAML config: {}", e)))?
        };

        config.validate()?;
        Ok(config)
    }
}
