use super::*;
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn test_empty_document_yields_defaults() {
    let config = ConfigLoader::from_str("").unwrap();
    assert_eq!(config, JudgeConfig::default());
    assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
    assert_eq!(config.execution.hard_timeout_ms, 5000);
    assert_eq!(config.execution.grace_ms, 1000);
    assert_eq!(config.execution.output_limit_bytes, 4 * 1024 * 1024);
    assert_eq!(config.sessions.idle_timeout_secs, 600);
    assert_eq!(config.sessions.reap_interval_secs, 60);
    assert_eq!(config.problems_dir, PathBuf::from("problems"));
}

#[test]
fn test_partial_document_keeps_other_defaults() {
    let yaml = r#"
execution:
  grace_ms: 250
  output_limit_bytes: 65536
sessions:
  workspace_root: /var/lib/judge
"#;
    let config = ConfigLoader::from_str(yaml).unwrap();
    assert_eq!(config.execution.hard_timeout_ms, 5000);
    assert_eq!(config.execution.grace_ms, 250);
    assert_eq!(config.sessions.idle_timeout_secs, 600);

    let settings = config.session_settings();
    assert_eq!(settings.workspace_root, PathBuf::from("/var/lib/judge"));
    assert_eq!(settings.idle_timeout, Duration::from_secs(600));
    assert_eq!(config.execution_settings().deadline(), Duration::from_millis(5250));
    assert_eq!(config.execution_settings().output_limit, 65536);
}

#[test]
fn test_validation_rejects_zero_values() {
    let err = ConfigLoader::from_str("execution:\n  hard_timeout_ms: 0\n").unwrap_err();
    assert!(err.to_string().contains("hard_timeout_ms"));

    let err = ConfigLoader::from_str("sessions:\n  reap_interval_secs: 0\n").unwrap_err();
    assert!(err.to_string().contains("reap_interval_secs"));

    let err = ConfigLoader::from_str("execution:\n  output_limit_bytes: 0\n").unwrap_err();
    assert!(err.to_string().contains("output_limit_bytes"));

    let err = ConfigLoader::from_str("server:\n  bind_addr: ''\n").unwrap_err();
    assert!(err.to_string().contains("bind_addr"));
}

#[test]
fn test_malformed_yaml_is_config_error() {
    let err = ConfigLoader::from_str("server: [unclosed").unwrap_err();
    assert!(matches!(err, crate::errors::JudgeError::ConfigError(_)));
}

#[tokio::test]
async fn test_from_file_resolves_problems_dir() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("judge.yaml");
    std::fs::write(&path, "problems_dir: sets\nserver:\n  bind_addr: 127.0.0.1:9000\n").unwrap();

    let config = load_config(&path).await.unwrap();
    assert_eq!(config.server.bind_addr, "127.0.0.1:9000");
    assert_eq!(config.problems_dir, dir.path().join("sets"));
}

#[tokio::test]
async fn test_missing_file_is_config_error() {
    let err = ConfigLoader::from_file("/definitely/not/here.yaml").await.unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
