//! Judge configuration: YAML file plus built-in defaults.

pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::*;

#[cfg(test)]
mod tests;

use crate::errors::JudgeError;
use std::path::Path;

/// Load a configuration from a YAML file
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<JudgeConfig, JudgeError> {
    ConfigLoader::from_file(path).await
}
