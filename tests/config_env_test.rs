//! Environment overrides for the layered configuration
//!
//! Kept to a single test: the process environment is shared by every test in
//! this binary.

use boardsight::config::{BoardSightConfig, BASE_URL_ENV};
use boardsight::reconciler::StreamPolicy;
use std::time::Duration;

#[test]
fn test_environment_overrides_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("boardsight.toml");
    std::fs::write(
        &path,
        r#"
[service]
base_url = "http://from-file:8000"

[capture]
interval_ms = 900

[reconcile]
policy = "hold_after_one_shot"
hold_ms = 1500
"#,
    )
    .unwrap();

    let from_file = BoardSightConfig::load_from_file(&path).unwrap();
    assert_eq!(from_file.service.base_url, "http://from-file:8000");
    assert_eq!(from_file.capture.interval(), Duration::from_millis(900));

    std::env::set_var(BASE_URL_ENV, "http://from-env:9000");
    std::env::set_var("BOARDSIGHT_CAPTURE__INTERVAL_MS", "250");
    let layered = BoardSightConfig::load_from_file(&path);
    std::env::remove_var(BASE_URL_ENV);
    std::env::remove_var("BOARDSIGHT_CAPTURE__INTERVAL_MS");

    let layered = layered.unwrap();
    assert_eq!(layered.service.base_url, "http://from-env:9000");
    assert_eq!(layered.capture.interval(), Duration::from_millis(250));
    assert_eq!(
        layered.reconcile.stream_policy().unwrap(),
        StreamPolicy::HoldAfterOneShot {
            hold: Duration::from_millis(1500)
        }
    );

    // A blank override is ignored
    std::env::set_var(BASE_URL_ENV, "   ");
    let blank = BoardSightConfig::load_from_file(&path);
    std::env::remove_var(BASE_URL_ENV);
    assert_eq!(blank.unwrap().service.base_url, "http://from-file:8000");
}
