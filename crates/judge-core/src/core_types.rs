//! Shared vocabulary between the harness, the orchestrator and callers.
//!
//! Everything here is plain data. The JSON shapes are the wire contract with
//! both the in-sandbox harness (which produces `TestCaseResult`s) and the HTTP
//! callers (which receive an `ExecutionResult`), so field names are camelCase.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Outcome category of an execution or of a single test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "Accepted")]
    Accepted,
    #[serde(rename = "Wrong Answer")]
    WrongAnswer,
    #[serde(rename = "Time Limit Exceeded")]
    TimeLimitExceeded,
    #[serde(rename = "Runtime Error")]
    RuntimeError,
    #[serde(rename = "Compilation Error")]
    CompilationError,
    #[serde(rename = "Memory Limit Exceeded")]
    MemoryLimitExceeded,
    #[serde(rename = "Internal Error")]
    InternalError,
}

impl Verdict {
    /// All verdicts in severity order.
    pub const ALL: [Verdict; 7] = [
        Verdict::Accepted,
        Verdict::WrongAnswer,
        Verdict::TimeLimitExceeded,
        Verdict::RuntimeError,
        Verdict::CompilationError,
        Verdict::MemoryLimitExceeded,
        Verdict::InternalError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Accepted => "Accepted",
            Verdict::WrongAnswer => "Wrong Answer",
            Verdict::TimeLimitExceeded => "Time Limit Exceeded",
            Verdict::RuntimeError => "Runtime Error",
            Verdict::CompilationError => "Compilation Error",
            Verdict::MemoryLimitExceeded => "Memory Limit Exceeded",
            Verdict::InternalError => "Internal Error",
        }
    }

    /// Parses the display name used on the wire. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Verdict> {
        Verdict::ALL.iter().copied().find(|v| v.as_str() == name)
    }

    /// Whether a per-case verdict stops the remaining cases from running.
    pub fn halts_execution(&self) -> bool {
        matches!(self, Verdict::RuntimeError)
    }

    // Rank used when folding per-case verdicts. Verdicts that per-case
    // comparison never produces rank above everything so they stick.
    fn aggregation_rank(&self) -> u8 {
        match self {
            Verdict::Accepted => 0,
            Verdict::WrongAnswer => 1,
            Verdict::RuntimeError => 2,
            _ => 3,
        }
    }

    /// Folds one test case verdict into the running overall verdict.
    ///
    /// Runtime Error dominates Wrong Answer, which dominates Accepted.
    pub fn escalate(self, case: Verdict) -> Verdict {
        if case.aggregation_rank() > self.aggregation_rank() {
            case
        } else {
            self
        }
    }

    /// Aggregates case verdicts in order, stopping at the first halting one.
    pub fn aggregate<I: IntoIterator<Item = Verdict>>(cases: I) -> Verdict {
        let mut overall = Verdict::Accepted;
        for case in cases {
            overall = overall.escalate(case);
            if case.halts_execution() {
                break;
            }
        }
        overall
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single input/expected-output pair supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Positional arguments passed to the entry point.
    #[serde(default)]
    pub input: Vec<Value>,
    /// `None` means the field was absent and any output is accepted.
    /// An explicit JSON `null` is kept as `Some(Value::Null)`.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub expected_output: Option<Value>,
}

impl TestCase {
    pub fn new(id: impl Into<String>, input: Vec<Value>, expected_output: Option<Value>) -> Self {
        Self {
            id: id.into(),
            input,
            expected_output,
        }
    }
}

/// Result of a single test case, produced by the harness and relayed verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub verdict: Verdict,
    #[serde(default)]
    pub actual_output: Option<Value>,
    #[serde(default)]
    pub expected_output: Option<Value>,
    /// Elapsed time in milliseconds.
    #[serde(default)]
    pub time: f64,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

/// The single, immutable return value of one judge invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub verdict: Verdict,
    pub stdout: String,
    pub stderr: String,
    /// Total elapsed time in milliseconds.
    pub execution_time: f64,
    /// Memory usage in kilobytes, zero when it could not be measured.
    pub memory_usage: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_case_results: Option<Vec<TestCaseResult>>,
}

impl ExecutionResult {
    fn synthesized(verdict: Verdict, stdout: String, stderr: String, execution_time: f64) -> Self {
        Self {
            verdict,
            stdout,
            stderr,
            execution_time,
            memory_usage: 0,
            test_case_results: None,
        }
    }

    /// Infrastructure failure; nothing the submitted code did.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::synthesized(Verdict::InternalError, String::new(), message.into(), 0.0)
    }

    pub fn runtime_error(stdout: String, stderr: String, execution_time: f64) -> Self {
        Self::synthesized(Verdict::RuntimeError, stdout, stderr, execution_time)
    }

    pub fn memory_limit_exceeded(stdout: String, stderr: String, execution_time: f64) -> Self {
        Self::synthesized(Verdict::MemoryLimitExceeded, stdout, stderr, execution_time)
    }

    pub fn time_limit_exceeded(stdout: String, stderr: String, execution_time: f64) -> Self {
        Self::synthesized(Verdict::TimeLimitExceeded, stdout, stderr, execution_time)
    }

    pub fn with_memory_usage(mut self, memory_usage: u64) -> Self {
        self.memory_usage = memory_usage;
        self
    }

    pub fn results(&self) -> &[TestCaseResult] {
        self.test_case_results.as_deref().unwrap_or(&[])
    }
}

/// Input of one orchestrator invocation.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub user_id: String,
    pub session_id: String,
    pub language: String,
    pub code: String,
    pub test_cases: Vec<TestCase>,
}

/// Body of the `run` operation: visible/sample test cases supplied inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub code: String,
    pub language: String,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    pub user_id: String,
    pub session_id: String,
}

/// Body of the `submit` operation: test cases are looked up by problem id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub code: String,
    pub language: String,
    pub problem_id: String,
    pub user_id: String,
    pub session_id: String,
}

impl RunRequest {
    pub fn into_execution(self) -> ExecutionRequest {
        ExecutionRequest {
            user_id: self.user_id,
            session_id: self.session_id,
            language: self.language,
            code: self.code,
            test_cases: self.test_cases,
        }
    }
}

impl SubmitRequest {
    pub fn into_execution(self, test_cases: Vec<TestCase>) -> ExecutionRequest {
        ExecutionRequest {
            user_id: self.user_id,
            session_id: self.session_id,
            language: self.language,
            code: self.code,
            test_cases,
        }
    }
}

// Ids arrive as strings from most callers but some problem sets use numbers.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "test case id must be a string or number, got {}",
            other
        ))),
    }
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verdict_wire_names() {
        assert_eq!(
            serde_json::to_value(Verdict::WrongAnswer).unwrap(),
            json!("Wrong Answer")
        );
        let parsed: Verdict = serde_json::from_value(json!("Time Limit Exceeded")).unwrap();
        assert_eq!(parsed, Verdict::TimeLimitExceeded);
        assert_eq!(Verdict::from_name("Memory Limit Exceeded"), Some(Verdict::MemoryLimitExceeded));
        assert_eq!(Verdict::from_name("Presentation Error"), None);
    }

    #[test]
    fn test_runtime_error_dominates_and_halts() {
        let overall = Verdict::aggregate(vec![
            Verdict::Accepted,
            Verdict::WrongAnswer,
            Verdict::RuntimeError,
            Verdict::Accepted,
        ]);
        assert_eq!(overall, Verdict::RuntimeError);
        assert!(Verdict::RuntimeError.halts_execution());
        assert!(!Verdict::WrongAnswer.halts_execution());
    }

    #[test]
    fn test_wrong_answer_does_not_downgrade() {
        assert_eq!(Verdict::WrongAnswer.escalate(Verdict::Accepted), Verdict::WrongAnswer);
        assert_eq!(Verdict::Accepted.escalate(Verdict::WrongAnswer), Verdict::WrongAnswer);
        assert_eq!(Verdict::RuntimeError.escalate(Verdict::WrongAnswer), Verdict::RuntimeError);
        assert_eq!(Verdict::aggregate(Vec::new()), Verdict::Accepted);
    }

    #[test]
    fn test_expected_output_absent_vs_null() {
        let absent: TestCase = serde_json::from_value(json!({"id": "0", "input": [1]})).unwrap();
        assert_eq!(absent.expected_output, None);

        let null: TestCase =
            serde_json::from_value(json!({"id": "1", "input": [], "expectedOutput": null})).unwrap();
        assert_eq!(null.expected_output, Some(Value::Null));

        // Absent stays absent on the way to the harness.
        let written = serde_json::to_value(&absent).unwrap();
        assert!(written.get("expectedOutput").is_none());
    }

    #[test]
    fn test_numeric_ids_are_accepted() {
        let case: TestCase =
            serde_json::from_value(json!({"id": 7, "input": [[2, 7, 11, 15], 9], "expectedOutput": [0, 1]}))
                .unwrap();
        assert_eq!(case.id, "7");
        assert_eq!(case.input.len(), 2);
    }

    #[test]
    fn test_execution_result_shape() {
        let result = ExecutionResult::internal_error("Unsupported language: cobol");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["verdict"], "Internal Error");
        assert_eq!(value["executionTime"], 0.0);
        assert_eq!(value["memoryUsage"], 0);
        assert!(value.get("testCaseResults").is_none());
    }

    #[test]
    fn test_run_request_camel_case() {
        let request: RunRequest = serde_json::from_value(json!({
            "code": "print(1)",
            "language": "python",
            "testCases": [{"id": "0", "input": []}],
            "userId": "u1",
            "sessionId": "s1"
        }))
        .unwrap();
        let exec = request.into_execution();
        assert_eq!(exec.user_id, "u1");
        assert_eq!(exec.test_cases.len(), 1);
    }
}
