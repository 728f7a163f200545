use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const FACTS: &str = r#"
{
  "components": [
    { "name": "A", "kind": "service", "technology": "rust", "exposed_ports": [8080] },
    { "name": "B", "kind": "service" },
    { "name": "C", "kind": "database" }
  ],
  "relationships": [
    { "source_id": "A", "target_id": "B", "kind": "calls" },
    { "source_id": "B", "target_id": "C", "kind": "queries" }
  ]
}
"#;

#[allow(deprecated)]
fn archmap() -> Command {
    Command::cargo_bin("archmap").expect("binary")
}

fn write_facts(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("facts.json");
    fs::write(&path, FACTS).unwrap();
    path
}

#[test]
fn recover_writes_model_metrics_and_diagrams() {
    let temp = tempdir().unwrap();
    let facts = write_facts(temp.path());
    let out_dir = temp.path().join("out");

    let output = archmap()
        .arg("--quiet")
        .arg("recover")
        .arg(&facts)
        .arg("--repo-name")
        .arg("shop")
        .arg("--output")
        .arg(&out_dir)
        .output()
        .expect("command run");
    assert!(output.status.success());

    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(body["people"], 0);
    assert_eq!(body["systems"], 1);
    assert_eq!(body["containers"], 3);
    assert_eq!(body["relationships"], 2);
    assert_eq!(body["enrichment"]["total"], 0);

    for name in [
        "model.json",
        "metrics.json",
        "graph.json",
        "summary.md",
        "01-system-context.puml",
        "02-container.puml",
    ] {
        assert!(out_dir.join(name).is_file(), "missing {name}");
    }

    let model: Value =
        serde_json::from_str(&fs::read_to_string(out_dir.join("model.json")).unwrap()).unwrap();
    assert_eq!(model["name"], "shop");

    let metrics: Value =
        serde_json::from_str(&fs::read_to_string(out_dir.join("metrics.json")).unwrap()).unwrap();
    assert_eq!(metrics["entry_points"], serde_json::json!(["service_a"]));

    let context = fs::read_to_string(out_dir.join("01-system-context.puml")).unwrap();
    assert!(context.starts_with("@startuml"));
    assert!(context.trim_end().ends_with("@enduml"));
}

#[test]
fn recover_fails_on_missing_facts() {
    let temp = tempdir().unwrap();
    archmap()
        .arg("--quiet")
        .arg("recover")
        .arg(temp.path().join("absent.json"))
        .arg("--output")
        .arg(temp.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load facts"));
}

#[test]
fn annotations_replace_fallback_descriptions() {
    let temp = tempdir().unwrap();
    let facts = write_facts(temp.path());
    let annotations = temp.path().join("annotations.json");
    fs::write(
        &annotations,
        r#"{ "nodes": { "service_a": { "purpose": "Public storefront API" } } }"#,
    )
    .unwrap();
    let out_dir = temp.path().join("out");

    archmap()
        .arg("--quiet")
        .arg("recover")
        .arg(&facts)
        .arg("--annotations")
        .arg(&annotations)
        .arg("--output")
        .arg(&out_dir)
        .assert()
        .success();

    let model: Value =
        serde_json::from_str(&fs::read_to_string(out_dir.join("model.json")).unwrap()).unwrap();
    let containers = model["containers"].as_array().unwrap();
    let a = containers
        .iter()
        .find(|c| c["id"] == "service_a")
        .expect("service_a container");
    assert_eq!(a["description"], "Public storefront API");
    let b = containers.iter().find(|c| c["id"] == "service_b").unwrap();
    assert_eq!(b["description"], "B - service in the system");
}

#[test]
fn config_prints_effective_defaults() {
    archmap()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max_workers = 4"));
}

#[test]
fn config_rejects_unknown_keys() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("archmap.toml");
    fs::write(&path, "[enrichment]\nmax_worker = 2\n").unwrap();

    archmap()
        .arg("config")
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_worker"));
}
