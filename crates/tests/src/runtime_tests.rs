//! Integration tests for runtime lifecycle and configuration loading.
//!
//! These tests verify the runtime's behavioral contracts rather than
//! implementation details:
//! - Shutdown is safe to call once and notifies every receiver
//! - Builder validation catches configuration errors early
//! - Layered configuration loading honors file and environment sources

use std::io::Write;

use serial_test::serial;
use tokio::time::{timeout, Duration};

use vigil_core::{
    config::EngineConfig,
    runtime::{EngineRuntime, RuntimeError},
};

use crate::mock_infrastructure::{engine_config, error_rate_rule, level, policy};
use vigil_core::alerts::AlertSeverity;

#[tokio::test]
async fn test_shutdown_notifies_every_receiver() {
    let runtime = EngineRuntime::builder()
        .with_config(EngineConfig::default())
        .disable_stale_sweep()
        .build()
        .unwrap();

    let mut rx1 = runtime.shutdown_receiver();
    let mut rx2 = runtime.shutdown_receiver();

    runtime.shutdown().await;

    assert!(timeout(Duration::from_secs(1), rx1.recv()).await.unwrap().is_ok());
    assert!(timeout(Duration::from_secs(1), rx2.recv()).await.unwrap().is_ok());
}

#[tokio::test]
async fn test_builder_rejects_dangling_channel_reference() {
    let mut config = engine_config(
        vec![error_rate_rule(AlertSeverity::Error, 1)],
        vec![policy("p", vec![level(0, "slack-alerts")])],
        vec![],
    );
    config.policies[0].levels[0].channels = vec!["ghost".into()];

    match EngineRuntime::builder().with_config(config).build() {
        Err(RuntimeError::ConfigValidation(msg)) => assert!(msg.contains("unknown channel")),
        other => panic!("expected validation failure, got {:?}", other.err()),
    }
}

#[test]
#[serial]
fn test_load_honors_config_path_env() {
    let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
    file.write_all(b"[engine]\nsweep_interval_seconds = 7\n").unwrap();

    std::env::set_var("VIGIL_CONFIG", file.path());
    let config = EngineConfig::load().unwrap();
    std::env::remove_var("VIGIL_CONFIG");

    assert_eq!(config.engine.sweep_interval_seconds, 7);
}

#[test]
#[serial]
fn test_env_overrides_file_value() {
    let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
    file.write_all(b"[logging]\nlevel = \"info\"\n").unwrap();

    std::env::set_var("VIGIL__LOGGING__LEVEL", "debug");
    let config = EngineConfig::from_file(file.path()).unwrap();
    std::env::remove_var("VIGIL__LOGGING__LEVEL");

    assert_eq!(config.logging.level, "debug");
}
