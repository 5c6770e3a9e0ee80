//! Execution orchestrator.
//!
//! `JudgeService::execute` is the single entry point for running code. It
//! always produces an `ExecutionResult`: every failure below it, from a
//! missing language profile to a dead Docker daemon, is folded into a verdict.

use futures_util::stream::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::core_types::{ExecutionRequest, ExecutionResult, RunRequest, SubmitRequest, TestCase};
use crate::errors::{JudgeError, SandboxError};
use crate::executors::{ExecSpec, OutputChunk, OutputStream, SandboxRuntime, SANDBOX_WORKDIR};
use crate::harness::{harness_env, Artifacts};
use crate::languages::{profile_for, DEFAULT_TIME_LIMIT_MS};
use crate::protocol::parse_harness_output;
use crate::session::{SessionKey, SessionLease, SessionManager};

pub const DEFAULT_GRACE: Duration = Duration::from_millis(1_000);

/// Per-stream cap on output kept on the host.
pub const DEFAULT_OUTPUT_LIMIT: usize = 4 * 1024 * 1024;

/// Exit status of a process killed with SIGKILL, which is what the kernel's
/// OOM killer sends inside a memory-capped container.
const OOM_KILLED_EXIT_CODE: i64 = 137;

#[derive(Debug, Clone)]
pub struct ExecutionSettings {
    /// The harness's own time budget.
    pub hard_timeout: Duration,
    /// Extra wall-clock time granted on top of `hard_timeout`.
    pub grace: Duration,
    /// Bytes kept per output stream. Older output is dropped first.
    pub output_limit: usize,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            hard_timeout: Duration::from_millis(DEFAULT_TIME_LIMIT_MS),
            grace: DEFAULT_GRACE,
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }
}

impl ExecutionSettings {
    pub fn deadline(&self) -> Duration {
        self.hard_timeout + self.grace
    }

    pub fn timeout_marker(&self) -> String {
        format!(
            "Time Limit Exceeded: execution exceeded {} ms",
            self.hard_timeout.as_millis()
        )
    }
}

/// Keeps the last `limit` bytes written to a stream.
///
/// The harness prints its result line last, so it survives truncation of
/// whatever user code wrote before it.
#[derive(Debug)]
struct TailBuffer {
    bytes: Vec<u8>,
    limit: usize,
    dropped: usize,
}

impl TailBuffer {
    fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            dropped: 0,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        if chunk.len() >= self.limit {
            self.dropped += self.bytes.len() + chunk.len() - self.limit;
            self.bytes.clear();
            self.bytes.extend_from_slice(&chunk[chunk.len() - self.limit..]);
            return;
        }
        self.bytes.extend_from_slice(chunk);
        // Compacted lazily; the buffer never holds more than twice the limit.
        if self.bytes.len() > self.limit.saturating_mul(2) {
            let excess = self.bytes.len() - self.limit;
            self.bytes.drain(..excess);
            self.dropped += excess;
        }
    }

    fn excess(&self) -> usize {
        self.bytes.len().saturating_sub(self.limit)
    }

    fn truncated(&self) -> bool {
        self.dropped + self.excess() > 0
    }

    fn text(&self) -> String {
        let tail = String::from_utf8_lossy(&self.bytes[self.excess()..]);
        if self.truncated() {
            format!(
                "[{} bytes of earlier output truncated]\n{}",
                self.dropped + self.excess(),
                tail
            )
        } else {
            tail.into_owned()
        }
    }
}

struct Captured {
    stdout: TailBuffer,
    stderr: TailBuffer,
    timed_out: bool,
    stream_error: Option<SandboxError>,
}

impl Captured {
    fn new(output_limit: usize) -> Self {
        Self {
            stdout: TailBuffer::new(output_limit),
            stderr: TailBuffer::new(output_limit),
            timed_out: false,
            stream_error: None,
        }
    }

    fn stdout(&self) -> String {
        self.stdout.text()
    }

    fn stderr(&self) -> String {
        self.stderr.text()
    }

    fn truncated(&self) -> bool {
        self.stdout.truncated() || self.stderr.truncated()
    }
}

pub struct JudgeService {
    runtime: Arc<dyn SandboxRuntime>,
    sessions: Arc<SessionManager>,
    settings: ExecutionSettings,
}

impl JudgeService {
    pub fn new(
        runtime: Arc<dyn SandboxRuntime>,
        sessions: Arc<SessionManager>,
        settings: ExecutionSettings,
    ) -> Self {
        Self {
            runtime,
            sessions,
            settings,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    /// Runs caller-supplied sample test cases.
    pub async fn run(&self, request: RunRequest) -> ExecutionResult {
        self.execute(request.into_execution()).await
    }

    /// Runs the full test set of a problem, already resolved by the caller.
    pub async fn submit(&self, request: SubmitRequest, test_cases: Vec<TestCase>) -> ExecutionResult {
        self.execute(request.into_execution(test_cases)).await
    }

    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let Some(profile) = profile_for(&request.language) else {
            log::warn!("Rejected execution for unsupported language '{}'", request.language);
            return ExecutionResult::internal_error(
                JudgeError::UnsupportedLanguage(request.language).to_string(),
            );
        };

        // Aliases resolve to the canonical name so "py" and "python" share a session.
        let key = SessionKey::new(&request.user_id, &request.session_id, profile.name);
        let lease = self.sessions.lock(&key).await;
        let started = Instant::now();

        let session = match self.sessions.get_session(&lease, profile).await {
            Ok(session) => session,
            Err(e) => {
                log::error!("Could not obtain session {}: {}", key, e);
                return ExecutionResult::internal_error(e.to_string());
            }
        };

        let artifacts = match Artifacts::prepare(profile, &request.code, &request.test_cases) {
            Ok(artifacts) => artifacts,
            Err(e) => return ExecutionResult::internal_error(e.to_string()),
        };
        if let Err(e) = artifacts.write_to(&session.workdir).await {
            log::error!("Writing artifacts for {} failed: {}", key, e);
            return ExecutionResult::internal_error(e.to_string());
        }

        let sentinel = format!("__JUDGE_RESULT_{}__", Uuid::new_v4().simple());
        let env = match harness_env(profile, &sentinel) {
            Ok(env) => env,
            Err(e) => return ExecutionResult::internal_error(e.to_string()),
        };
        let exec_spec = ExecSpec {
            cmd: profile.command(),
            env,
            working_dir: SANDBOX_WORKDIR.to_string(),
        };

        log::debug!(
            "Executing {} test case(s) for {} in {}",
            request.test_cases.len(),
            key,
            session.container_id
        );
        let handle = match self.runtime.exec(&session.container_id, &exec_spec).await {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("Exec in {} failed: {}", session.container_id, e);
                return ExecutionResult::internal_error(format!("Failed to start execution: {}", e));
            }
        };

        let captured = capture(
            handle.output,
            self.settings.deadline(),
            self.settings.output_limit,
        )
        .await;
        if captured.truncated() {
            log::warn!(
                "Output of {} exceeded {} bytes per stream and was truncated",
                key,
                self.settings.output_limit
            );
        }
        let wall_ms = started.elapsed().as_secs_f64() * 1000.0;

        let (result, session_alive) = if captured.timed_out {
            self.on_timeout(&lease, &session.container_id, &captured, wall_ms)
                .await
        } else {
            let result = self
                .on_completion(&handle.id, &sentinel, &captured, wall_ms)
                .await;
            (result, true)
        };

        if !session_alive {
            log::info!("Execution for {} finished: {}", key, result.verdict);
            return result;
        }

        let memory_kb = match self.runtime.memory_usage(&session.container_id).await {
            Ok(bytes) => bytes / 1024,
            Err(e) => {
                log::debug!("Memory usage unavailable for {}: {}", session.container_id, e);
                0
            }
        };
        self.sessions.touch(&lease).await;
        log::info!(
            "Execution for {} finished: {} in {:.1} ms",
            key,
            result.verdict,
            result.execution_time
        );
        result.with_memory_usage(memory_kb)
    }

    /// Returns the result and whether the session survived.
    async fn on_timeout(
        &self,
        lease: &SessionLease,
        container_id: &str,
        captured: &Captured,
        wall_ms: f64,
    ) -> (ExecutionResult, bool) {
        log::warn!(
            "Execution for {} exceeded {:?}, killing sandbox processes",
            lease.key(),
            self.settings.deadline()
        );
        let killed = match self.runtime.kill_processes(container_id).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    "Could not kill processes in {}: {}. Discarding session",
                    container_id,
                    e
                );
                self.sessions.invalidate(lease).await;
                false
            }
        };

        let stderr = append_line(captured.stderr(), &self.settings.timeout_marker());
        (
            ExecutionResult::time_limit_exceeded(captured.stdout(), stderr, wall_ms),
            killed,
        )
    }

    async fn on_completion(
        &self,
        exec_id: &str,
        sentinel: &str,
        captured: &Captured,
        wall_ms: f64,
    ) -> ExecutionResult {
        let stdout = captured.stdout();
        let stderr = captured.stderr();

        if let Some(report) = parse_harness_output(&stdout, sentinel) {
            let stderr = match &report.stderr {
                Some(extra) => append_line(stderr, extra),
                None => stderr,
            };
            return ExecutionResult {
                verdict: report.verdict,
                stdout,
                stderr,
                execution_time: report.time,
                memory_usage: 0,
                test_case_results: Some(report.results),
            };
        }

        if let Some(e) = &captured.stream_error {
            log::error!("Output stream of exec {} failed: {}", exec_id, e);
            let stderr = append_line(stderr, &format!("Lost connection to the sandbox: {}", e));
            return ExecutionResult {
                stdout,
                stderr,
                execution_time: wall_ms,
                ..ExecutionResult::internal_error("")
            };
        }

        let exit_code = match self.runtime.exec_exit_code(exec_id).await {
            Ok(code) => code,
            Err(e) => {
                log::debug!("Could not inspect exec {}: {}", exec_id, e);
                None
            }
        };

        if exit_code == Some(OOM_KILLED_EXIT_CODE) {
            let stderr = append_line(
                stderr,
                "Memory Limit Exceeded: process was killed by the sandbox",
            );
            return ExecutionResult::memory_limit_exceeded(stdout, stderr, wall_ms);
        }

        let mut message = match exit_code {
            Some(code) => format!(
                "Execution produced no result (harness exited with code {})",
                code
            ),
            None => "Execution produced no result".to_string(),
        };
        if captured.stdout.truncated() {
            message.push_str(&format!(
                "; output exceeded the {} byte limit",
                self.settings.output_limit
            ));
        }
        ExecutionResult::runtime_error(stdout, append_line(stderr, &message), wall_ms)
    }
}

/// Demultiplexes output until the stream ends or the deadline passes.
async fn capture(mut output: OutputStream, deadline: Duration, output_limit: usize) -> Captured {
    let deadline = tokio::time::Instant::now() + deadline;
    let mut captured = Captured::new(output_limit);

    loop {
        match tokio::time::timeout_at(deadline, output.next()).await {
            Err(_) => {
                captured.timed_out = true;
                break;
            }
            Ok(None) => break,
            Ok(Some(Ok(OutputChunk::Stdout(bytes)))) => captured.stdout.push(&bytes),
            Ok(Some(Ok(OutputChunk::Stderr(bytes)))) => captured.stderr.push(&bytes),
            Ok(Some(Err(e))) => {
                captured.stream_error = Some(e);
                break;
            }
        }
    }
    captured
}

fn append_line(mut text: String, line: &str) -> String {
    if line.is_empty() {
        return text;
    }
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(line);
    text
}
