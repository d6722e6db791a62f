#[path = "../support/env.rs"]
mod env_support;

use blockfront::{ConfigError, ExtQueueId, FrontConfig, IntQueueId, CONFIG_ENV};
use env_support::EnvVarGuard;
use std::fs;
use tempfile::TempDir;

const PARTIAL: &str = r#"{
    "window": { "percent_threshold": 75, "timeout_ms": 5000 },
    "ext_queues": { "get_fast_read": 4000 },
    "lanes": { "huge_puts": { "max_in_flight_count": 3, "max_in_flight_cost": 900 } },
    "access": { "allow_unscoped": true }
}"#;

#[test]
fn load_reads_json_file_over_defaults() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("front.json");
    fs::write(&path, PARTIAL).expect("write config");

    let config = FrontConfig::load(&path).expect("load");
    assert_eq!(config.window.percent_threshold, 75);
    assert!(config.access.allow_unscoped);
    assert_eq!(config.ext_queues.total_cost(ExtQueueId::GetFastRead), 4_000);
    assert_eq!(
        config.ext_queues.total_cost(ExtQueueId::GetLowRead),
        FrontConfig::default().ext_queues.get_low_read
    );
    let huge = config.lanes.limits(IntQueueId::PutHugeForeground);
    assert_eq!((huge.max_in_flight_count, huge.max_in_flight_cost), (3, 900));
    let params = config.window_params(ExtQueueId::GetFastRead);
    assert_eq!(params.total_cost, 4_000);
    assert_eq!(params.window_timeout.as_millis(), 5_000);
}

#[test]
fn missing_or_invalid_files_are_reported() {
    let dir = TempDir::new().expect("tempdir");
    assert!(matches!(
        FrontConfig::load(dir.path().join("absent.json")),
        Err(ConfigError::Io(_))
    ));

    let path = dir.path().join("zero.json");
    fs::write(&path, r#"{"ext_queues":{"put_user_data":0}}"#).expect("write config");
    assert!(matches!(
        FrontConfig::load(&path),
        Err(ConfigError::Zero { .. })
    ));
}

#[test]
fn from_env_uses_named_file_or_defaults() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("front.json");
    fs::write(&path, PARTIAL).expect("write config");

    {
        let _guard = EnvVarGuard::set(CONFIG_ENV, &path);
        let config = FrontConfig::from_env().expect("env config");
        assert_eq!(config.window.percent_threshold, 75);
    }
    {
        let _guard = EnvVarGuard::clear(CONFIG_ENV);
        assert_eq!(FrontConfig::from_env().expect("defaults"), FrontConfig::default());
    }
}
