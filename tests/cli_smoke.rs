mod common;

use attendance_migrate::store::SqliteStore;
use attendance_migrate::TableStore;
use common::seed_source;
use serde_json::json;
use std::path::Path;
use std::process::{Command, Output};

fn run_cli(dir: &Path, extra: &[&str]) -> Output {
    let exe = env!("CARGO_BIN_EXE_attendance-migrate");
    Command::new(exe)
        .current_dir(dir)
        .arg("--config")
        .arg(dir.join("migrate.json"))
        .args(extra)
        .env_remove("MIGRATE_SOURCE_URL")
        .env_remove("MIGRATE_SOURCE_KEY")
        .env_remove("MIGRATE_DEST_URL")
        .env_remove("MIGRATE_DEST_KEY")
        .env_remove("RUST_LOG")
        .output()
        .expect("spawn attendance-migrate")
}

fn write_config(dir: &Path, fallback: &str) {
    let cfg = json!({
        "source": { "kind": "sqlite", "path": dir.join("source.sqlite3") },
        "destination": { "kind": "sqlite", "path": dir.join("destination.sqlite3") },
        "fallback_program_name": fallback,
        "chunk_size": 4,
        "backup": { "dir": dir.join("backup_data") },
        "state_dir": dir.join("state")
    });
    std::fs::write(
        dir.join("migrate.json"),
        serde_json::to_string_pretty(&cfg).expect("serialize config"),
    )
    .expect("write config");
}

fn seeded(dir: &Path, attendance: usize) {
    let source =
        SqliteStore::open("source", &dir.join("source.sqlite3")).expect("open source");
    seed_source(&source, attendance);
}

#[test]
fn cli_migrates_and_prints_report() {
    let dir = tempfile::tempdir().expect("temp dir");
    seeded(dir.path(), 10);
    write_config(dir.path(), "Stafford");

    let out = run_cli(dir.path(), &[]);
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let report: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("stdout is the JSON report");
    assert_eq!(report["transform"]["attendance_rows"], json!(10));
    assert_eq!(report["load"]["inserted"]["attendance"], json!(10));

    let dest = SqliteStore::open("destination", &dir.path().join("destination.sqlite3"))
        .expect("open destination");
    assert_eq!(dest.fetch_all("attendance").expect("attendance").len(), 10);

    let backups: Vec<_> = std::fs::read_dir(dir.path().join("backup_data"))
        .expect("backup root")
        .collect::<Result<Vec<_>, _>>()
        .expect("list backups");
    assert_eq!(backups.len(), 1);
    assert!(backups[0].path().join("attendance.json").is_file());
    assert!(backups[0].path().join("manifest.json").is_file());
}

#[test]
fn cli_exits_nonzero_when_fallback_program_is_missing() {
    let dir = tempfile::tempdir().expect("temp dir");
    seeded(dir.path(), 3);
    write_config(dir.path(), "Nowhere");

    let out = run_cli(dir.path(), &[]);
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
    assert!(!dir.path().join("backup_data").exists());
}

#[test]
fn cli_dry_run_leaves_destination_empty() {
    let dir = tempfile::tempdir().expect("temp dir");
    seeded(dir.path(), 6);
    write_config(dir.path(), "Stafford");

    let out = run_cli(dir.path(), &["--dry-run"]);
    assert!(out.status.success());
    let report: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("stdout is the JSON report");
    assert!(report["load"].is_null());

    let dest = SqliteStore::open("destination", &dir.path().join("destination.sqlite3"))
        .expect("open destination");
    assert!(dest.fetch_all("attendance").expect("attendance").is_empty());
}
