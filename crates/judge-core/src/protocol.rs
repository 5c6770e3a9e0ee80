//! Structured result line handoff between harness and orchestrator.
//!
//! The harness prints one JSON object as (nearly) the last line of its stdout.
//! User code shares that stdout, so the line is located by scanning backwards:
//! first for a line carrying this execution's sentinel prefix, then, for
//! harnesses that do not emit one, for the last line that parses as a JSON
//! object with both `verdict` and `results`.

use serde::Deserialize;
use serde_json::Value;

use crate::core_types::{TestCaseResult, Verdict};

/// What the harness reported about one execution.
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessReport {
    pub verdict: Verdict,
    pub results: Vec<TestCaseResult>,
    /// Harness-measured total time in milliseconds.
    pub time: f64,
    pub stderr: Option<String>,
}

#[derive(Deserialize)]
struct RawReport {
    verdict: String,
    results: Vec<TestCaseResult>,
    #[serde(default)]
    time: Option<f64>,
    #[serde(default)]
    stderr: Option<String>,
}

impl From<RawReport> for HarnessReport {
    fn from(raw: RawReport) -> Self {
        let reported = Verdict::from_name(&raw.verdict).unwrap_or_else(|| {
            log::warn!("Harness reported unknown verdict '{}'", raw.verdict);
            Verdict::InternalError
        });
        // The overall verdict never understates its own case results.
        let verdict = reported.escalate(Verdict::aggregate(raw.results.iter().map(|r| r.verdict)));
        if verdict != reported {
            log::warn!(
                "Harness reported '{}' but its case results aggregate to '{}'",
                reported,
                verdict
            );
        }
        Self {
            verdict,
            results: raw.results,
            time: raw.time.unwrap_or(0.0),
            stderr: raw.stderr.filter(|s| !s.is_empty()),
        }
    }
}

/// Finds the harness's structured line in captured stdout.
pub fn parse_harness_output(stdout: &str, sentinel: &str) -> Option<HarnessReport> {
    if !sentinel.is_empty() {
        let tagged = stdout
            .lines()
            .rev()
            .filter_map(|line| line.trim_start().strip_prefix(sentinel))
            .find_map(parse_line);
        if tagged.is_some() {
            return tagged;
        }
    }
    stdout.lines().rev().find_map(parse_line)
}

fn parse_line(line: &str) -> Option<HarnessReport> {
    let line = line.trim();
    if !line.starts_with('{') {
        return None;
    }
    let value: Value = serde_json::from_str(line).ok()?;
    let object = value.as_object()?;
    if !object.contains_key("verdict") || !object.contains_key("results") {
        return None;
    }
    match serde_json::from_value::<RawReport>(value) {
        Ok(raw) => Some(raw.into()),
        Err(e) => {
            log::debug!("Skipping malformed result line: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENTINEL: &str = "__JUDGE_RESULT_test__";

    fn line(verdict: &str) -> String {
        format!(
            r#"{{"verdict":"{}","results":[{{"id":"0","verdict":"{}","actualOutput":[0,1],"expectedOutput":[0,1],"time":0.4,"stdout":"","stderr":""}}],"time":12.5}}"#,
            verdict, verdict
        )
    }

    #[test]
    fn test_parses_last_line() {
        let stdout = format!("{}\n", line("Accepted"));
        let report = parse_harness_output(&stdout, "").unwrap();
        assert_eq!(report.verdict, Verdict::Accepted);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.time, 12.5);
        assert_eq!(report.results[0].actual_output, Some(serde_json::json!([0, 1])));
    }

    #[test]
    fn test_tolerates_noise_before_and_after() {
        let stdout = format!(
            "debug: starting\n{{not json\n[1,2,3]\n{}\ntrailing garbage\n",
            line("Wrong Answer")
        );
        let report = parse_harness_output(&stdout, "").unwrap();
        assert_eq!(report.verdict, Verdict::WrongAnswer);
    }

    #[test]
    fn test_ignores_objects_missing_required_fields() {
        let stdout = format!("{}\n{{\"verdict\":\"Accepted\"}}\n{{\"results\":[]}}\n", line("Runtime Error"));
        let report = parse_harness_output(&stdout, "").unwrap();
        assert_eq!(report.verdict, Verdict::RuntimeError);
    }

    #[test]
    fn test_sentinel_line_wins_over_later_spoof() {
        // User code printing a verdict-shaped object after the real line
        // must not override the tagged one.
        let stdout = format!("{}{}\n{}\n", SENTINEL, line("Wrong Answer"), line("Accepted"));
        let report = parse_harness_output(&stdout, SENTINEL).unwrap();
        assert_eq!(report.verdict, Verdict::WrongAnswer);
    }

    #[test]
    fn test_falls_back_to_legacy_scan_without_sentinel_line() {
        let stdout = format!("{}\n", line("Accepted"));
        let report = parse_harness_output(&stdout, SENTINEL).unwrap();
        assert_eq!(report.verdict, Verdict::Accepted);
    }

    #[test]
    fn test_no_structured_line() {
        assert!(parse_harness_output("", "").is_none());
        assert!(parse_harness_output("Traceback (most recent call last):\n  boom\n", SENTINEL).is_none());
    }

    #[test]
    fn test_unknown_verdict_becomes_internal_error() {
        let stdout = r#"{"verdict":"Partial","results":[],"stderr":"odd"}"#;
        let report = parse_harness_output(stdout, "").unwrap();
        assert_eq!(report.verdict, Verdict::InternalError);
        assert_eq!(report.stderr.as_deref(), Some("odd"));
        assert_eq!(report.time, 0.0);
    }

    #[test]
    fn test_overall_verdict_follows_case_results() {
        let stdout = r#"{"verdict":"Accepted","results":[{"id":"0","verdict":"Accepted"},{"id":"1","verdict":"Wrong Answer"}]}"#;
        let report = parse_harness_output(stdout, "").unwrap();
        assert_eq!(report.verdict, Verdict::WrongAnswer);

        let stdout = r#"{"verdict":"Wrong Answer","results":[{"id":"0","verdict":"Accepted"}]}"#;
        let report = parse_harness_output(stdout, "").unwrap();
        assert_eq!(report.verdict, Verdict::WrongAnswer);
    }

    #[test]
    fn test_bootstrap_failure_line() {
        let stdout = format!(
            "{}{{\"verdict\":\"Compilation Error\",\"results\":[],\"time\":1.0,\"stderr\":\"SyntaxError: invalid syntax\"}}\n",
            SENTINEL
        );
        let report = parse_harness_output(&stdout, SENTINEL).unwrap();
        assert_eq!(report.verdict, Verdict::CompilationError);
        assert!(report.results.is_empty());
        assert!(report.stderr.unwrap().contains("SyntaxError"));
    }
}
