use super::support::{article, listing, serve, serve_ok};
use crate::error::{CheckError, ConfigError};
use crate::report::report_path;
use crate::results::SeedStatus;
use crate::{DriverKind, LinkChecker};
use std::fs;
use wiremock::MockServer;

const LOCAL_CONFIG: &str = r#"{
    "driver": "static",
    "seed_pattern": "^http://127\\.0\\.0\\.1:\\d+/[\\w\\-]+/$",
    "ui_timeout_secs": 2,
    "probe_timeout_secs": 5
}"#;

#[tokio::test]
async fn test_static_checker_writes_report() {
    let server = MockServer::start().await;
    serve_ok(&server, "/ok").await;
    serve(&server, "/news/", listing(&["/news/a/"], "")).await;
    serve(
        &server,
        "/news/a/",
        article("Article A", &[("gone", "/missing"), ("fine", "/ok")]),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let seed = format!("{}/news/", server.uri());

    let checker = LinkChecker::new(vec![seed.clone()])
        .with_config_str(LOCAL_CONFIG)
        .unwrap()
        .with_output_dir(dir.path())
        .with_max_concurrency(2);
    assert_eq!(checker.config().driver, DriverKind::Static);
    assert_eq!(checker.config().max_concurrency, 2);

    let summary = checker.run().await.unwrap();

    assert_eq!(summary.seeds.len(), 1);
    assert_eq!(summary.total_records(), 1);
    let path = report_path(dir.path(), &seed, "csv");
    assert_eq!(summary.seeds[0].status, SeedStatus::Saved(path.clone()));
    assert_eq!(fs::read_to_string(path).unwrap().lines().count(), 2);
}

#[tokio::test]
async fn test_malformed_seed_is_rejected_before_crawling() {
    let dir = tempfile::tempdir().unwrap();
    let result = LinkChecker::new(vec![
        "https://gemma.by/soveti/".to_string(),
        "https://gemma.by/soveti".to_string(),
    ])
    .with_output_dir(dir.path())
    .run()
    .await;

    match result {
        Err(CheckError::Config(ConfigError::InvalidSeed(seed))) => {
            assert_eq!(seed, "https://gemma.by/soveti")
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_config_file_then_driver_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checker.json");
    fs::write(&path, r#"{"max_pages": 7, "driver": "webdriver"}"#).unwrap();

    let checker = LinkChecker::new(Vec::new())
        .with_config_file(&path)
        .unwrap()
        .with_driver(DriverKind::Static);

    assert_eq!(checker.config().max_pages, 7);
    assert_eq!(checker.config().driver, DriverKind::Static);
}
