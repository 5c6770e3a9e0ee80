//! In-sandbox driver harnesses and the artifacts written next to them.
//!
//! Each supported language ships one harness source, embedded at compile time.
//! Per execution three files land in the session's working directory: the
//! user's solution, the serialized test cases, and the harness itself. The
//! harness reads its remaining parameters from the exec environment.

use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::core_types::TestCase;
use crate::errors::JudgeError;
use crate::languages::LanguageProfile;

pub const TESTS_FILENAME: &str = "tests.json";

pub const ENV_RESULT_SENTINEL: &str = "JUDGE_RESULT_SENTINEL";
pub const ENV_ENTRY_STRATEGIES: &str = "JUDGE_ENTRY_STRATEGIES";
pub const ENV_TIME_LIMIT_MS: &str = "JUDGE_TIME_LIMIT_MS";

const PYTHON_HARNESS: &str = include_str!("templates/harness.py");
const JAVASCRIPT_HARNESS: &str = include_str!("templates/harness.js");
const JAVA_HARNESS: &str = include_str!("templates/Harness.java");

/// Returns the harness source for a profile, if one exists.
pub fn template_for(profile: &LanguageProfile) -> Option<&'static str> {
    match profile.name {
        "python" => Some(PYTHON_HARNESS),
        "javascript" => Some(JAVASCRIPT_HARNESS),
        "java" => Some(JAVA_HARNESS),
        _ => None,
    }
}

/// The three files one execution needs, rendered and ready to write.
#[derive(Debug, Clone)]
pub struct Artifacts {
    solution_filename: &'static str,
    solution: String,
    tests: String,
    harness_filename: &'static str,
    harness: &'static str,
}

impl Artifacts {
    pub fn prepare(
        profile: &LanguageProfile,
        code: &str,
        test_cases: &[TestCase],
    ) -> Result<Self, JudgeError> {
        let harness = template_for(profile)
            .ok_or_else(|| JudgeError::MissingHarness(profile.name.to_string()))?;
        let tests = serde_json::to_string(test_cases)?;
        Ok(Self {
            solution_filename: profile.solution_filename,
            solution: code.to_string(),
            tests,
            harness_filename: profile.harness_filename,
            harness,
        })
    }

    /// Writes all artifacts into `dir`, replacing whatever a previous
    /// execution left there.
    pub async fn write_to(&self, dir: &Path) -> Result<(), JudgeError> {
        write_file(&dir.join(self.solution_filename), self.solution.as_bytes()).await?;
        write_file(&dir.join(TESTS_FILENAME), self.tests.as_bytes()).await?;
        write_file(&dir.join(self.harness_filename), self.harness.as_bytes()).await?;
        Ok(())
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<(), JudgeError> {
    let mut file = fs::File::create(path).await.map_err(|e| {
        JudgeError::IoError(format!("Failed to create {}: {}", path.display(), e))
    })?;
    file.write_all(contents).await?;
    file.flush().await?; // Ensure data is written
    Ok(())
}

/// Environment passed to the harness process.
pub fn harness_env(profile: &LanguageProfile, sentinel: &str) -> Result<Vec<String>, JudgeError> {
    let strategies = serde_json::to_string(profile.entry_points)?;
    Ok(vec![
        format!("{}={}", ENV_RESULT_SENTINEL, sentinel),
        format!("{}={}", ENV_ENTRY_STRATEGIES, strategies),
        format!("{}={}", ENV_TIME_LIMIT_MS, profile.time_limit_ms),
        "PYTHONDONTWRITEBYTECODE=1".to_string(),
        "PYTHONIOENCODING=utf-8".to_string(),
    ])
}
