use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::tempdir;

const IMPORT_DOC: &str = r#"{
  "fields": [{"name": "compile_time", "bigger_is_better": false}],
  "runs": [
    {"key": "base", "machine": "M1", "tag": "nightlytest", "run_order": 99},
    {"key": "head", "machine": "M1", "tag": "nightlytest", "run_order": 100}
  ],
  "samples": [
    {"run": "base", "test": "nightlytest.SingleSource/foo", "field": "compile_time", "value": 10.0},
    {"run": "head", "test": "nightlytest.SingleSource/foo", "field": "compile_time", "value": 15.0},
    {"run": "base", "test": "nightlytest.SingleSource/bar", "field": "compile_time", "value": 4.0},
    {"run": "head", "test": "nightlytest.SingleSource/bar", "field": "compile_time", "value": 5.0}
  ],
  "field_changes": [
    {"test": "nightlytest.SingleSource/foo", "field": "compile_time",
     "start_run": "base", "end_run": "head", "old_value": 10.0, "new_value": 15.0},
    {"test": "nightlytest.SingleSource/bar", "field": "compile_time",
     "start_run": "base", "end_run": "head", "new_value": 5.0}
  ]
}"#;

fn perfdb(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("perfdb").unwrap();
    cmd.current_dir(dir)
        .env_remove("PERFDB_DB")
        .env_remove("PERFDB_UNTRIAGED_LIMIT")
        .env_remove("PERFDB_CACHE_ENTRIES")
        .env("PERFDB_LOG", "warn")
        .arg("--db")
        .arg(dir.join("perf.db"));
    cmd
}

fn json_out(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).expect("stdout is JSON")
}

fn imported() -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("import.json"), IMPORT_DOC).unwrap();
    perfdb(dir.path()).args(["import", "import.json"]).assert().success();
    dir
}

#[test]
fn test_version_prints_package_version() {
    let dir = tempdir().unwrap();
    perfdb(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_init_writes_config_once() {
    let dir = tempdir().unwrap();
    perfdb(dir.path())
        .arg("init")
        .assert()
        .success()
        .stderr(predicate::str::contains("created perfdb.yaml"));
    assert!(dir.path().join("perfdb.yaml").exists());

    perfdb(dir.path())
        .arg("init")
        .assert()
        .success()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_browse_imported_suite() {
    let dir = imported();

    let suites = json_out(perfdb(dir.path()).arg("suites"));
    assert_eq!(suites["suites"][0]["name"], "Nightlytest");

    let summary = json_out(perfdb(dir.path()).args(["summary", "--tag", "nightlytest"]));
    assert_eq!(
        summary["test_names"],
        serde_json::json!(["SingleSource/bar", "SingleSource/foo"])
    );

    let runs = json_out(perfdb(dir.path()).args(["runs", "--tag", "nightlytest"]));
    assert_eq!(runs[0]["run_order"], 100);
    assert_eq!(runs[1]["run_order"], 99);

    let head = runs[0]["run"].as_i64().unwrap().to_string();
    let neighbors = json_out(perfdb(dir.path()).args(["neighbors", "--tag", "nightlytest", "--run", &head]));
    assert_eq!(neighbors["previous"], runs[1]["run"]);
    assert!(neighbors["next"].is_null());
}

#[test]
fn test_triage_round_trip() {
    let dir = imported();

    let untriaged = json_out(perfdb(dir.path()).arg("untriaged"));
    let list = untriaged.as_array().unwrap();
    assert_eq!(list.len(), 2);
    let foo = list
        .iter()
        .find(|c| c["field_change"]["test_name"] == "nightlytest.SingleSource/foo")
        .unwrap();
    assert_eq!(foo["comparison"]["delta"], 5.0);
    assert_eq!(foo["comparison"]["pct_delta"], 0.5);
    let ids: Vec<String> = list
        .iter()
        .map(|c| c["field_change"]["id"].as_i64().unwrap().to_string())
        .collect();

    let created = json_out(perfdb(dir.path()).arg("create").args(&ids));
    assert_eq!(created["title"], "Regression of 2 benchmarks: bar, foo");
    assert_eq!(created["state"], "active");
    let id = created["id"].as_i64().unwrap().to_string();
    let active = json_out(perfdb(dir.path()).arg("regressions"));
    assert_eq!(active.as_array().unwrap().len(), 1);

    let untriaged = json_out(perfdb(dir.path()).arg("untriaged"));
    assert!(untriaged.as_array().unwrap().is_empty());

    let edited = json_out(
        perfdb(dir.path()).args(["edit", &id, "--state", "fixed", "--bug", "PR12345"]),
    );
    assert_eq!(edited["state"], "fixed");
    assert_eq!(edited["bug"], "PR12345");

    let fixed = json_out(perfdb(dir.path()).args(["regressions", "--state", "fixed"]));
    assert_eq!(fixed.as_array().unwrap().len(), 1);
    assert_eq!(fixed[0]["size"], 2);

    // The default view shows active regressions only.
    let default_view = json_out(perfdb(dir.path()).arg("regressions"));
    assert!(default_view.as_array().unwrap().is_empty());
    let all = json_out(perfdb(dir.path()).args(["regressions", "--all"]));
    assert_eq!(all.as_array().unwrap().len(), 1);
    perfdb(dir.path())
        .args(["regressions", "--all", "--state", "fixed"])
        .assert()
        .failure();

    perfdb(dir.path()).args(["delete", &id]).assert().success();
    let untriaged = json_out(perfdb(dir.path()).arg("untriaged"));
    assert_eq!(untriaged.as_array().unwrap().len(), 2);
}

#[test]
fn test_error_kinds_map_to_exit_codes() {
    let dir = imported();

    perfdb(dir.path())
        .args(["show", "999"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("not found"));

    perfdb(dir.path()).args(["merge", "1", "1"]).assert().code(4);

    perfdb(dir.path()).args(["ignore", "1"]).assert().success();
    perfdb(dir.path())
        .args(["create", "1"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("ignored"));
}
