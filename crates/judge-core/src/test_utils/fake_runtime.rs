// src/test_utils/fake_runtime.rs
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::errors::SandboxError;
use crate::executors::{ContainerSpec, ExecHandle, ExecSpec, OutputChunk, SandboxRuntime};
use crate::harness::ENV_RESULT_SENTINEL;

/// Placeholder replaced by the execution's sentinel in scripted stdout.
pub const SENTINEL_PLACEHOLDER: &str = "{sentinel}";

/// What the next `exec` call should do.
#[derive(Debug, Clone)]
pub enum ScriptedExec {
    /// Emit the output, then finish with the exit code.
    Complete {
        stdout: String,
        stderr: String,
        exit_code: i64,
    },
    /// Emit the output, then never finish.
    Hang { stdout: String, stderr: String },
    /// Fail to start the exec at all.
    Fail(String),
}

impl ScriptedExec {
    pub fn stdout(stdout: impl Into<String>) -> Self {
        ScriptedExec::Complete {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct FakeContainer {
    spec: ContainerSpec,
    running: bool,
}

#[derive(Default)]
struct FakeState {
    containers: HashMap<String, FakeContainer>,
    creation_order: Vec<String>,
    next_id: u64,
    script: VecDeque<ScriptedExec>,
    execs: Vec<(String, ExecSpec)>,
    exit_codes: HashMap<String, Option<i64>>,
    kills: Vec<String>,
    stops: Vec<String>,
    pulled: Vec<String>,
    fail_create: bool,
    fail_kill: bool,
    fail_inspect: bool,
    memory: u64,
}

/// In-memory `SandboxRuntime` with scripted exec behaviour.
#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<FakeState>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_exec(&self, exec: ScriptedExec) {
        self.state.lock().unwrap().script.push_back(exec);
    }

    /// Simulates the container dying outside of the judge's control.
    pub fn stop_externally(&self, container_id: &str) {
        if let Some(c) = self.state.lock().unwrap().containers.get_mut(container_id) {
            c.running = false;
        }
    }

    pub fn fail_container_creation(&self, fail: bool) {
        self.state.lock().unwrap().fail_create = fail;
    }

    pub fn fail_kill(&self, fail: bool) {
        self.state.lock().unwrap().fail_kill = fail;
    }

    pub fn fail_inspect(&self, fail: bool) {
        self.state.lock().unwrap().fail_inspect = fail;
    }

    pub fn set_memory_usage(&self, bytes: u64) {
        self.state.lock().unwrap().memory = bytes;
    }

    pub fn containers_created(&self) -> usize {
        self.state.lock().unwrap().creation_order.len()
    }

    pub fn running_containers(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .creation_order
            .iter()
            .filter(|id| state.containers.get(*id).map(|c| c.running).unwrap_or(false))
            .cloned()
            .collect()
    }

    pub fn container_spec(&self, container_id: &str) -> Option<ContainerSpec> {
        self.state
            .lock()
            .unwrap()
            .containers
            .get(container_id)
            .map(|c| c.spec.clone())
    }

    pub fn exec_calls(&self) -> Vec<(String, ExecSpec)> {
        self.state.lock().unwrap().execs.clone()
    }

    pub fn kill_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().kills.clone()
    }

    pub fn stop_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().stops.clone()
    }

    pub fn pulled_images(&self) -> Vec<String> {
        self.state.lock().unwrap().pulled.clone()
    }
}

fn chunks(stdout: String, stderr: String) -> Vec<Result<OutputChunk, SandboxError>> {
    let mut out = Vec::new();
    if !stdout.is_empty() {
        out.push(Ok(OutputChunk::Stdout(stdout.into_bytes())));
    }
    if !stderr.is_empty() {
        out.push(Ok(OutputChunk::Stderr(stderr.into_bytes())));
    }
    out
}

#[async_trait]
impl SandboxRuntime for FakeRuntime {
    async fn ensure_image(&self, image: &str) -> Result<(), SandboxError> {
        let mut state = self.state.lock().unwrap();
        if !state.pulled.iter().any(|i| i == image) {
            state.pulled.push(image.to_string());
        }
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, SandboxError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create {
            return Err(SandboxError::Runtime("docker daemon unavailable".to_string()));
        }
        state.next_id += 1;
        let id = format!("fake-{}", state.next_id);
        state.containers.insert(
            id.clone(),
            FakeContainer {
                spec: spec.clone(),
                running: true,
            },
        );
        state.creation_order.push(id.clone());
        Ok(id)
    }

    async fn is_running(&self, container_id: &str) -> Result<bool, SandboxError> {
        let state = self.state.lock().unwrap();
        if state.fail_inspect {
            return Err(SandboxError::Runtime("inspect failed".to_string()));
        }
        Ok(state
            .containers
            .get(container_id)
            .map(|c| c.running)
            .unwrap_or(false))
    }

    async fn exec(&self, container_id: &str, spec: &ExecSpec) -> Result<ExecHandle, SandboxError> {
        let mut state = self.state.lock().unwrap();
        match state.containers.get(container_id) {
            Some(c) if c.running => {}
            _ => return Err(SandboxError::ContainerNotFound(container_id.to_string())),
        }
        state.execs.push((container_id.to_string(), spec.clone()));
        let exec_id = format!("exec-{}", state.execs.len());

        let sentinel = spec
            .env
            .iter()
            .find_map(|e| e.strip_prefix(&format!("{}=", ENV_RESULT_SENTINEL)))
            .unwrap_or("")
            .to_string();

        let scripted = state.script.pop_front().unwrap_or_else(|| ScriptedExec::stdout(""));
        let output = match scripted {
            ScriptedExec::Complete {
                stdout,
                stderr,
                exit_code,
            } => {
                state.exit_codes.insert(exec_id.clone(), Some(exit_code));
                let stdout = stdout.replace(SENTINEL_PLACEHOLDER, &sentinel);
                stream::iter(chunks(stdout, stderr)).boxed()
            }
            ScriptedExec::Hang { stdout, stderr } => {
                state.exit_codes.insert(exec_id.clone(), None);
                let stdout = stdout.replace(SENTINEL_PLACEHOLDER, &sentinel);
                stream::iter(chunks(stdout, stderr))
                    .chain(stream::pending())
                    .boxed()
            }
            ScriptedExec::Fail(message) => return Err(SandboxError::Runtime(message)),
        };

        Ok(ExecHandle { id: exec_id, output })
    }

    async fn exec_exit_code(&self, exec_id: &str) -> Result<Option<i64>, SandboxError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .exit_codes
            .get(exec_id)
            .copied()
            .flatten())
    }

    async fn kill_processes(&self, container_id: &str) -> Result<(), SandboxError> {
        let mut state = self.state.lock().unwrap();
        state.kills.push(container_id.to_string());
        if state.fail_kill {
            return Err(SandboxError::Runtime("kill exec failed".to_string()));
        }
        for code in state.exit_codes.values_mut() {
            if code.is_none() {
                *code = Some(137);
            }
        }
        Ok(())
    }

    async fn stop_container(&self, container_id: &str) -> Result<(), SandboxError> {
        let mut state = self.state.lock().unwrap();
        state.stops.push(container_id.to_string());
        if let Some(c) = state.containers.get_mut(container_id) {
            c.running = false;
        }
        Ok(())
    }

    async fn memory_usage(&self, _container_id: &str) -> Result<u64, SandboxError> {
        Ok(self.state.lock().unwrap().memory)
    }
}
