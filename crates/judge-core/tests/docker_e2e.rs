//! End-to-end tests against a real Docker daemon.
//!
//! These pull the language images on first use and take a while, so they are
//! ignored by default:
//!
//! ```text
//! cargo test -p judge-core --test docker_e2e -- --ignored
//! ```

use judge_core::core_types::{ExecutionRequest, TestCase, Verdict};
use judge_core::executors::DockerRuntime;
use judge_core::orchestrator::{ExecutionSettings, JudgeService};
use judge_core::session::{InMemorySessionStore, SessionManager, SessionSettings};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Harness {
    judge: JudgeService,
    _root: tempfile::TempDir,
}

async fn judge() -> Option<Harness> {
    let _ = env_logger::builder().is_test(true).try_init();

    let runtime = DockerRuntime::new().ok()?;
    if !runtime.is_available().await {
        eprintln!("Docker is not available, skipping");
        return None;
    }
    let runtime = Arc::new(runtime);
    let root = tempfile::tempdir().ok()?;
    let sessions = Arc::new(SessionManager::new(
        runtime.clone(),
        Arc::new(InMemorySessionStore::new()),
        SessionSettings {
            workspace_root: root.path().to_path_buf(),
            ..Default::default()
        },
    ));
    Some(Harness {
        judge: JudgeService::new(runtime, sessions, ExecutionSettings::default()),
        _root: root,
    })
}

fn request(language: &str, code: &str, test_cases: Vec<TestCase>) -> ExecutionRequest {
    ExecutionRequest {
        user_id: "e2e".to_string(),
        session_id: format!("e2e-{}", uuid::Uuid::new_v4()),
        language: language.to_string(),
        code: code.to_string(),
        test_cases,
    }
}

fn two_sum_case() -> TestCase {
    TestCase::new("0", vec![json!([2, 7, 11, 15]), json!(9)], Some(json!([0, 1])))
}

#[tokio::test]
#[ignore]
async fn python_two_sum_is_accepted() {
    let Some(h) = judge().await else { return };
    let code = r#"
class Solution:
    def twoSum(self, nums, target):
        print("looking for", target)
        seen = {}
        for i, n in enumerate(nums):
            if target - n in seen:
                return [seen[target - n], i]
            seen[n] = i
"#;
    let result = h.judge.execute(request("python", code, vec![two_sum_case()])).await;

    assert_eq!(result.verdict, Verdict::Accepted, "{:?}", result);
    assert_eq!(result.results().len(), 1);
    assert_eq!(result.results()[0].actual_output, Some(json!([0, 1])));
    assert!(result.results()[0].stdout.contains("looking for 9"));
    h.judge.sessions().shutdown().await;
}

#[tokio::test]
#[ignore]
async fn javascript_type_error_is_runtime_error() {
    let Some(h) = judge().await else { return };
    let code = "function twoSum(nums, target) { return null.length; }\nmodule.exports = { twoSum };\n";
    let cases = vec![two_sum_case(), two_sum_case()];
    let result = h.judge.execute(request("javascript", code, cases)).await;

    assert_eq!(result.verdict, Verdict::RuntimeError, "{:?}", result);
    assert_eq!(result.results().len(), 1);
    assert_eq!(result.results()[0].verdict, Verdict::RuntimeError);
    assert!(!result.results()[0].stderr.is_empty());
    h.judge.sessions().shutdown().await;
}

#[tokio::test]
#[ignore]
async fn java_wrong_answer_runs_every_case() {
    let Some(h) = judge().await else { return };
    let code = r#"
class Solution {
    public int[] twoSum(int[] nums, int target) {
        return new int[] {1, 0};
    }
}
"#;
    let cases = vec![two_sum_case(), two_sum_case(), two_sum_case()];
    let result = h.judge.execute(request("java", code, cases)).await;

    assert_eq!(result.verdict, Verdict::WrongAnswer, "{:?}", result);
    assert_eq!(result.results().len(), 3);
    h.judge.sessions().shutdown().await;
}

#[tokio::test]
#[ignore]
async fn infinite_loop_times_out_and_session_survives() {
    let Some(h) = judge().await else { return };
    let spin = "class Solution:\n    def spin(self, x):\n        while True:\n            pass\n";
    let req = request("python", spin, vec![TestCase::new("0", vec![json!(1)], None)]);

    let started = Instant::now();
    let result = h.judge.execute(req.clone()).await;
    assert_eq!(result.verdict, Verdict::TimeLimitExceeded);
    assert!(result.stderr.contains("Time Limit Exceeded"));
    assert!(started.elapsed() < Duration::from_secs(15));

    let container = h.judge.sessions().list().await[0].container_id.clone();
    let ok = ExecutionRequest {
        code: "class Solution:\n    def ident(self, x):\n        return x\n".to_string(),
        test_cases: vec![TestCase::new("0", vec![json!(1)], Some(json!(1)))],
        ..req
    };
    let result = h.judge.execute(ok).await;
    assert_eq!(result.verdict, Verdict::Accepted, "{:?}", result);
    assert_eq!(h.judge.sessions().list().await[0].container_id, container);
    h.judge.sessions().shutdown().await;
}
