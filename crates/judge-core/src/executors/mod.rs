//! Container runtimes that host execution sessions.
//!
//! The orchestrator and the session manager only ever talk to a
//! `SandboxRuntime`. The production implementation drives Docker; tests plug
//! in an in-memory runtime with scripted behaviour.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::errors::SandboxError;

pub mod docker;

pub use docker::DockerRuntime;

/// Fixed in-container path the session directory is mounted at.
pub const SANDBOX_WORKDIR: &str = "/sandbox";

/// Everything needed to start one long-lived session container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// Host directory bind-mounted at `SANDBOX_WORKDIR`.
    pub host_workdir: PathBuf,
    pub memory_bytes: i64,
    pub nano_cpus: i64,
    pub pids_limit: i64,
    pub labels: HashMap<String, String>,
}

/// A command to run inside an existing container.
#[derive(Debug, Clone)]
pub struct ExecSpec {
    pub cmd: Vec<String>,
    pub env: Vec<String>,
    pub working_dir: String,
}

/// One demultiplexed piece of process output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputChunk {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

pub type OutputStream = BoxStream<'static, Result<OutputChunk, SandboxError>>;

/// A started exec with its attached output.
pub struct ExecHandle {
    pub id: String,
    pub output: OutputStream,
}

#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Makes sure the image is present locally, pulling it if needed.
    async fn ensure_image(&self, image: &str) -> Result<(), SandboxError>;

    /// Creates and starts a container, returning its id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, SandboxError>;

    /// Whether the container exists and is running.
    async fn is_running(&self, container_id: &str) -> Result<bool, SandboxError>;

    /// Starts a process inside the container with stdout/stderr attached and
    /// no stdin.
    async fn exec(&self, container_id: &str, spec: &ExecSpec) -> Result<ExecHandle, SandboxError>;

    /// Exit code of a finished exec, `None` while it is still running.
    async fn exec_exit_code(&self, exec_id: &str) -> Result<Option<i64>, SandboxError>;

    /// Kills every process in the container except its init process.
    async fn kill_processes(&self, container_id: &str) -> Result<(), SandboxError>;

    /// Stops (and, with auto-remove, deletes) the container.
    async fn stop_container(&self, container_id: &str) -> Result<(), SandboxError>;

    /// Current memory usage in bytes, best-effort.
    async fn memory_usage(&self, container_id: &str) -> Result<u64, SandboxError>;
}
