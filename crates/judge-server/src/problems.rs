//! Problem id to test case resolution used by `submit`.

use async_trait::async_trait;
use judge_core::TestCase;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::fs;

use crate::error::{Result, ServerError};

#[async_trait]
pub trait ProblemRepository: Send + Sync {
    /// Full test set of a problem, hidden cases included.
    async fn test_cases(&self, problem_id: &str) -> Result<Vec<TestCase>>;
}

/// Reads `<root>/<problemId>.json`, holding either a bare array of test cases
/// or an object with a `testCases` array.
pub struct FileProblemRepository {
    root: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProblemFile {
    Cases(Vec<TestCase>),
    Wrapped {
        #[serde(rename = "testCases")]
        test_cases: Vec<TestCase>,
    },
}

impl FileProblemRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

/// Problem ids become file names, so only a conservative alphabet is allowed.
fn validate_problem_id(problem_id: &str) -> Result<()> {
    let valid = !problem_id.is_empty()
        && problem_id.len() <= 128
        && problem_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ServerError::invalid_request(format!(
            "Invalid problem id '{}'",
            problem_id
        )))
    }
}

#[async_trait]
impl ProblemRepository for FileProblemRepository {
    async fn test_cases(&self, problem_id: &str) -> Result<Vec<TestCase>> {
        validate_problem_id(problem_id)?;
        let path = self.root.join(format!("{}.json", problem_id));

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ServerError::ProblemNotFound(problem_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let file: ProblemFile = serde_json::from_str(&content).map_err(|e| {
            ServerError::internal(format!("Problem file {} is malformed: {}", path.display(), e))
        })?;
        let cases = match file {
            ProblemFile::Cases(cases) => cases,
            ProblemFile::Wrapped { test_cases } => test_cases,
        };
        log::debug!("Loaded {} test case(s) for problem {}", cases.len(), problem_id);
        Ok(cases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_loads_both_file_shapes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("two-sum.json"),
            r#"[{"id": 1, "input": [[2,7,11,15], 9], "expectedOutput": [0,1]}]"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("smoke.json"),
            r#"{"title": "Smoke", "testCases": [{"id": "a", "input": [1]}, {"id": "b", "input": [2]}]}"#,
        )
        .unwrap();

        let repo = FileProblemRepository::new(dir.path());
        let cases = repo.test_cases("two-sum").await.unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].id, "1");
        assert_eq!(cases[0].expected_output, Some(json!([0, 1])));

        let cases = repo.test_cases("smoke").await.unwrap();
        assert_eq!(cases.len(), 2);
        assert!(cases[1].expected_output.is_none());
    }

    #[tokio::test]
    async fn test_unknown_problem_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileProblemRepository::new(dir.path());
        let err = repo.test_cases("missing").await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_path_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileProblemRepository::new(dir.path());
        for id in ["../etc/passwd", "a/b", "", ".hidden", "a b"] {
            let err = repo.test_cases(id).await.unwrap_err();
            assert_eq!(err.status_code(), 400, "{}", id);
        }
    }

    #[tokio::test]
    async fn test_malformed_file_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let repo = FileProblemRepository::new(dir.path());
        assert_eq!(repo.test_cases("broken").await.unwrap_err().status_code(), 500);
    }
}
