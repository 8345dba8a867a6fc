use std::collections::HashMap;
use std::fs;

use folderseed::config::merge::service::MergeService;
use folderseed::config::{ConfigLoader, WORKSPACE_CONFIG_FILE};
use tempfile::TempDir;

fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
    Some(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

#[test]
fn layers_apply_in_precedence_order() {
    let temp_dir = TempDir::new().unwrap();
    let global = temp_dir.path().join("global.toml");
    fs::write(
        &global,
        r#"
template_folder_id = "global-template"
target_parent_folder_id = "global-parent"

[replication]
concurrency = 2
pacing_ms = 250
"#,
    )
    .unwrap();

    let workspace = temp_dir.path().join("workspace");
    fs::create_dir_all(&workspace).unwrap();
    fs::write(
        workspace.join(WORKSPACE_CONFIG_FILE),
        r#"
template_folder_id = "workspace-template"

[replication.retry]
max_attempts = 7
"#,
    )
    .unwrap();

    let config = MergeService::load_layers(
        Some(&global),
        &workspace,
        env(&[("FOLDERSEED__REPLICATION__CONCURRENCY", "6")]),
    )
    .unwrap();

    assert_eq!(config.template_folder_id, "workspace-template");
    assert_eq!(config.target_parent_folder_id, "global-parent");
    assert_eq!(config.replication.concurrency, 6);
    assert_eq!(config.replication.pacing_ms, 250);
    assert_eq!(config.replication.retry.max_attempts, 7);
    assert_eq!(config.replication.retry.initial_backoff_ms, 500);
    assert_eq!(config.credentials.profile, "default");
    assert!(config.validate().is_ok());
}

#[test]
fn missing_files_fall_back_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = MergeService::load_layers(
        Some(&temp_dir.path().join("absent.toml")),
        temp_dir.path(),
        env(&[]),
    )
    .unwrap();

    assert_eq!(config.replication.concurrency, 1);
    assert_eq!(config.replication.pacing_ms, 100);
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("template_folder_id"));
    assert!(err.contains("target_parent_folder_id"));
}

#[test]
fn explicit_config_file_must_exist() {
    let temp_dir = TempDir::new().unwrap();
    assert!(ConfigLoader::load_from_file(&temp_dir.path().join("nope.toml")).is_err());

    let path = temp_dir.path().join("custom.toml");
    fs::write(
        &path,
        r#"
template_folder_id = "t"
target_parent_folder_id = "p"

[drive]
request_timeout_secs = 5
"#,
    )
    .unwrap();
    let config = ConfigLoader::load_from_file(&path).unwrap();
    assert_eq!(config.drive.request_timeout_secs, 5);
    assert_eq!(config.template_folder_id, "t");
}

#[test]
fn malformed_values_are_reported() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join(WORKSPACE_CONFIG_FILE),
        "[replication]\nconcurrency = \"lots\"\n",
    )
    .unwrap();
    assert!(MergeService::load_layers(None, temp_dir.path(), env(&[])).is_err());
}
