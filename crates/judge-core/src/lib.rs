//! Sandboxed multi-language code execution engine.
//!
//! Submitted code runs inside long-lived, resource-capped, network-isolated
//! containers, one per (user, logical session, language). A small driver
//! harness inside the container loads the solution, feeds it the test cases
//! and reports a structured verdict back over stdout.
//!
//! # Architecture Overview
//!
//! - **Verdict/result model** (`core_types`): the closed verdict set and the
//!   result shapes returned to callers
//! - **Language profiles** (`languages`): fixed per-language image, files,
//!   command and resource ceilings
//! - **Harnesses** (`harness`): embedded driver sources and the artifacts
//!   written per execution
//! - **Sandbox runtime** (`executors`): container control behind a trait,
//!   implemented over Docker
//! - **Sessions** (`session`): container reuse, per-key locking, idle reaping
//! - **Orchestrator** (`orchestrator`): runs one execution end to end and
//!   always yields a verdict
//! - **Configuration** (`config`): YAML-backed settings with defaults

pub mod config;
pub mod core_types;
pub mod errors;
pub mod executors;
pub mod harness;
pub mod languages;
pub mod orchestrator;
pub mod protocol;
pub mod session;

pub use config::*;
pub use core_types::{
    ExecutionRequest, ExecutionResult, RunRequest, SubmitRequest, TestCase, TestCaseResult,
    Verdict,
};
pub use errors::{JudgeError, SandboxError};
pub use executors::{DockerRuntime, SandboxRuntime};
pub use languages::{all_profiles, profile_for, EntryPoint, LanguageProfile};
pub use orchestrator::{ExecutionSettings, JudgeService};
pub use session::{InMemorySessionStore, Session, SessionKey, SessionManager, SessionStore};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
