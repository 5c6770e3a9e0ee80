// src/test_utils/mod.rs
pub mod fake_runtime;

pub use fake_runtime::{FakeRuntime, ScriptedExec, SENTINEL_PLACEHOLDER};
