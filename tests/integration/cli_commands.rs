#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

fn fixture_dir() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    fs::write(
        dir.path().join("Person.csv"),
        "id,name,age\n1,John,30\n2,Jane,25\n",
    )
    .expect("write vertices");
    fs::write(
        dir.path().join("edge_KNOWS.csv"),
        "start_id,start_vertex_type,end_id,end_vertex_type\n1,Person,2,Person\n",
    )
    .expect("write edges");
    dir
}

fn import(input: &Path, db: &Path) -> Value {
    let output = cargo_bin_cmd!("graphport")
        .args(["--format", "json", "--quiet", "import"])
        .arg(input)
        .arg("--db")
        .arg(db)
        .arg("--create")
        .env_remove("GRAPHPORT_CONFIG")
        .output()
        .expect("run import");
    assert!(output.status.success(), "import failed: {output:?}");
    serde_json::from_slice(&output.stdout).expect("json summary")
}

fn db_in(dir: &TempDir) -> PathBuf {
    dir.path().join("graph.db")
}

#[test]
fn import_then_export_round_trips_files() {
    let input = fixture_dir();
    let work = TempDir::new().expect("tempdir");
    let db = db_in(&work);

    let summary = import(input.path(), &db);
    assert_eq!(summary["vertices"], 2);
    assert_eq!(summary["edges"], 1);

    let out = work.path().join("out");
    let output = cargo_bin_cmd!("graphport")
        .args(["--format", "json", "export"])
        .arg(&out)
        .arg("--db")
        .arg(&db)
        .output()
        .expect("run export");
    assert!(output.status.success(), "export failed: {output:?}");
    let summary: Value = serde_json::from_slice(&output.stdout).expect("json summary");
    assert_eq!(summary["labels"][0]["encoding"], "tabular");

    let edges = fs::read_to_string(out.join("edge_KNOWS.csv")).expect("edge file");
    assert_eq!(
        edges,
        "start_id,start_vertex_type,end_id,end_vertex_type\n1,Person,2,Person\n"
    );
}

#[test]
fn labels_lists_the_catalog() {
    let input = fixture_dir();
    let work = TempDir::new().expect("tempdir");
    let db = db_in(&work);
    import(input.path(), &db);

    let output = cargo_bin_cmd!("graphport")
        .args(["--format", "json", "labels", "--db"])
        .arg(&db)
        .output()
        .expect("run labels");
    assert!(output.status.success());
    let labels: Value = serde_json::from_slice(&output.stdout).expect("json labels");
    let names: Vec<(&str, &str)> = labels
        .as_array()
        .expect("array")
        .iter()
        .map(|l| {
            (
                l["name"].as_str().unwrap_or_default(),
                l["kind"].as_str().unwrap_or_default(),
            )
        })
        .collect();
    assert_eq!(names, vec![("Person", "vertex"), ("KNOWS", "edge")]);
}

#[test]
fn file_failures_exit_with_code_two() {
    let input = fixture_dir();
    fs::write(input.path().join("Broken.csv"), "name\nno id\n").expect("write broken");
    let work = TempDir::new().expect("tempdir");

    let output = cargo_bin_cmd!("graphport")
        .args(["--quiet", "--theme", "plain", "import"])
        .arg(input.path())
        .arg("--db")
        .arg(db_in(&work))
        .arg("--create")
        .output()
        .expect("run import");
    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Broken.csv"), "stdout: {stdout}");
}

#[test]
fn missing_database_is_an_error() {
    let work = TempDir::new().expect("tempdir");
    let output = cargo_bin_cmd!("graphport")
        .args(["labels", "--db"])
        .arg(work.path().join("absent.db"))
        .output()
        .expect("run labels");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("database not found"), "stderr: {stderr}");
}

#[test]
fn profiles_supply_the_database() {
    let input = fixture_dir();
    let work = TempDir::new().expect("tempdir");
    let db = db_in(&work);
    let config = work.path().join("cli.toml");
    fs::write(
        &config,
        format!(
            "default_profile = \"local\"\n\n[profiles.local]\ndatabase = {:?}\nbatch_size = 1\n",
            db.display().to_string()
        ),
    )
    .expect("write config");

    let output = cargo_bin_cmd!("graphport")
        .args(["--format", "json", "import", "--create"])
        .arg(input.path())
        .env("GRAPHPORT_CONFIG", &config)
        .output()
        .expect("run import");
    assert!(output.status.success(), "import failed: {output:?}");
    let summary: Value = serde_json::from_slice(&output.stdout).expect("json summary");
    assert_eq!(summary["files"][0]["stats"]["batches"], 2);
    assert!(db.exists());
}

#[test]
fn completions_are_generated() {
    let output = cargo_bin_cmd!("graphport")
        .args(["completions", "bash"])
        .output()
        .expect("run completions");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("graphport"));
}
