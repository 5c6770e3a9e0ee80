//! Configuration types for the judge
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration. The per-language table is deliberately absent: it
//! is fixed in code.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::JudgeError;
use crate::languages::DEFAULT_TIME_LIMIT_MS;
use crate::orchestrator::{ExecutionSettings, DEFAULT_OUTPUT_LIMIT};
use crate::session::manager::{DEFAULT_PIDS_LIMIT, SessionSettings};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JudgeConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub execution: ExecutionSection,
    #[serde(default)]
    pub sessions: SessionSection,
    /// Directory holding `<problemId>.json` test sets for `submit`.
    #[serde(default = "default_problems_dir")]
    pub problems_dir: PathBuf,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            execution: ExecutionSection::default(),
            sessions: SessionSection::default(),
            problems_dir: default_problems_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_true")]
    pub enable_cors: bool,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            enable_cors: true,
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionSection {
    #[serde(default = "default_hard_timeout_ms")]
    pub hard_timeout_ms: u64,
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
    /// Captured bytes kept per output stream.
    #[serde(default = "default_output_limit")]
    pub output_limit_bytes: usize,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            hard_timeout_ms: default_hard_timeout_ms(),
            grace_ms: default_grace_ms(),
            output_limit_bytes: default_output_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSection {
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
    /// Falls back to `<tmp>/judge-sessions`.
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
    #[serde(default = "default_pids_limit")]
    pub pids_limit: i64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            reap_interval_secs: default_reap_interval_secs(),
            workspace_root: None,
            pids_limit: default_pids_limit(),
        }
    }
}

fn default_problems_dir() -> PathBuf {
    PathBuf::from("problems")
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_true() -> bool {
    true
}

fn default_body_limit() -> usize {
    1024 * 1024
}

fn default_hard_timeout_ms() -> u64 {
    DEFAULT_TIME_LIMIT_MS
}

fn default_grace_ms() -> u64 {
    1_000
}

fn default_output_limit() -> usize {
    DEFAULT_OUTPUT_LIMIT
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_reap_interval_secs() -> u64 {
    60
}

fn default_pids_limit() -> i64 {
    DEFAULT_PIDS_LIMIT
}

impl JudgeConfig {
    pub fn validate(&self) -> Result<(), JudgeError> {
        if self.server.bind_addr.trim().is_empty() {
            return Err(JudgeError::ConfigError("server.bind_addr cannot be empty".to_string()));
        }
        if self.server.body_limit_bytes == 0 {
            return Err(JudgeError::ConfigError(
                "server.body_limit_bytes must be greater than 0".to_string(),
            ));
        }
        if self.execution.hard_timeout_ms == 0 {
            return Err(JudgeError::ConfigError(
                "execution.hard_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.execution.output_limit_bytes == 0 {
            return Err(JudgeError::ConfigError(
                "execution.output_limit_bytes must be greater than 0".to_string(),
            ));
        }
        if self.sessions.idle_timeout_secs == 0 {
            return Err(JudgeError::ConfigError(
                "sessions.idle_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.sessions.reap_interval_secs == 0 {
            return Err(JudgeError::ConfigError(
                "sessions.reap_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.sessions.pids_limit <= 0 {
            return Err(JudgeError::ConfigError(
                "sessions.pids_limit must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn execution_settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            hard_timeout: Duration::from_millis(self.execution.hard_timeout_ms),
            grace: Duration::from_millis(self.execution.grace_ms),
            output_limit: self.execution.output_limit_bytes,
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        let defaults = SessionSettings::default();
        SessionSettings {
            idle_timeout: Duration::from_secs(self.sessions.idle_timeout_secs),
            workspace_root: self
                .sessions
                .workspace_root
                .clone()
                .unwrap_or(defaults.workspace_root),
            pids_limit: self.sessions.pids_limit,
        }
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.sessions.reap_interval_secs)
    }
}
