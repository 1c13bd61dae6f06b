use std::fs;
use std::path::Path;

use classweave::{canonicalize_or_current, infer_project_name, load_config};
use tempfile::tempdir;
use weave_core::config::WeaveConfig;

#[test]
fn canonicalize_or_current_keeps_existing_absolute_paths() {
    let tmp = tempdir().expect("tempdir");
    let resolved =
        canonicalize_or_current(&tmp.path().to_string_lossy()).expect("canonicalize");
    assert_eq!(resolved, tmp.path().canonicalize().expect("canon tmp"));
}

#[test]
fn canonicalize_or_current_joins_missing_paths_onto_cwd() {
    let resolved = canonicalize_or_current("does-not-exist-anywhere").expect("canonicalize");
    let cwd = std::env::current_dir().expect("cwd");
    assert_eq!(resolved, cwd.join("does-not-exist-anywhere"));
}

#[test]
fn infer_project_name_uses_last_path_component() {
    assert_eq!(infer_project_name(Path::new("/work/classweave-demo")), "classweave-demo");
    assert_eq!(infer_project_name(Path::new("/tmp/project-root")), "project-root");
}

#[test]
fn infer_project_name_falls_back_when_missing() {
    assert_eq!(infer_project_name(Path::new("/")), "unnamed-project");
}

#[test]
fn load_config_picks_the_parser_by_extension() {
    let tmp = tempdir().expect("tempdir");
    let config = WeaveConfig::new("demo");

    let yaml_path = tmp.path().join("classweave.yaml");
    fs::write(&yaml_path, serde_yaml::to_string(&config).expect("yaml")).expect("write yaml");
    assert_eq!(load_config(&yaml_path).expect("load yaml"), config);

    let json_path = tmp.path().join("classweave.json");
    fs::write(&json_path, serde_json::to_string_pretty(&config).expect("json"))
        .expect("write json");
    assert_eq!(load_config(&json_path).expect("load json"), config);
}

#[test]
fn load_config_fills_defaults_for_omitted_fields() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("classweave.yaml");
    fs::write(&path, "name: sparse\n").expect("write");

    let config = load_config(&path).expect("load");
    assert_eq!(config.transform, "entry-monitor");
    assert_eq!(config.state_db, ".classweave/state.db");
    assert!(config.containers.is_empty());
    assert_eq!(config.monitor.class, "com/classweave/runtime/Monitor");
}
