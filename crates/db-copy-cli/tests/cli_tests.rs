//! CLI integration tests for db-copy.
//!
//! These tests verify command-line argument parsing, help output,
//! exit codes for various error conditions, and a full SQLite copy.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::Path;

/// Get a command for the db-copy binary.
fn cmd() -> Command {
    Command::cargo_bin("db-copy").unwrap()
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// Create a sample database with `count` users.
fn make_sample(path: &Path, count: u32) {
    cmd()
        .args(["sample", "--db", path_str(path), "--count", &count.to_string()])
        .assert()
        .success();
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("copy"))
        .stdout(predicate::str::contains("sample"));
}

#[test]
fn test_copy_subcommand_help() {
    cmd()
        .args(["copy", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--source"))
        .stdout(predicate::str::contains("--dest"))
        .stdout(predicate::str::contains("--table"))
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn test_sample_subcommand_defaults() {
    cmd()
        .args(["sample", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: sample.db]"))
        .stdout(predicate::str::contains("[default: 1000]"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("db-copy"));
}

#[test]
fn test_global_flags_exist() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--progress"))
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// Exit Code Tests - Config Errors (Exit Code 1)
// =============================================================================

#[test]
fn test_copy_requires_table() {
    cmd()
        .args(["copy", "--source", "a.db", "--dest", "b.db"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--table"));
}

#[test]
fn test_zero_batch_size_exits_with_code_1() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.db");
    make_sample(&source, 5);

    cmd()
        .args(["copy", "-s", path_str(&source), "-d", "dest.db", "-t", "sample_users", "-b", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("batch_size"));
}

#[test]
fn test_negative_batch_size_exits_with_code_1() {
    cmd()
        .args(["copy", "-s", "a.db", "-d", "b.db", "-t", "users", "--batch-size", "-10"])
        .assert()
        .code(1);
}

#[test]
fn test_same_source_and_dest_exits_with_code_1() {
    cmd()
        .args(["copy", "-s", "a.db", "-d", "a.db", "-t", "users"])
        .assert()
        .code(1);
}

#[test]
fn test_missing_config_exits_with_code_7() {
    // Missing file is an IO error (code 7), not config error (code 1)
    cmd()
        .args(["copy", "--config", "nonexistent_copy_config.yaml"])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "source: [unterminated").unwrap();

    cmd()
        .args(["copy", "--config", path_str(file.path())])
        .assert()
        .code(1);
}

#[test]
fn test_config_missing_table_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "source: a.db").unwrap();
    writeln!(file, "dest: b.db").unwrap();

    cmd()
        .args(["copy", "--config", path_str(file.path())])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("table is required"));
}

// =============================================================================
// Exit Code Tests - Runtime Errors
// =============================================================================

#[test]
fn test_missing_source_file_exits_with_code_2() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("missing.db");
    let dest = dir.path().join("dest.db");

    cmd()
        .args(["copy", "-s", path_str(&source), "-d", path_str(&dest), "-t", "users"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("source"));
}

#[test]
fn test_missing_table_exits_with_code_3() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.db");
    let dest = dir.path().join("dest.db");
    make_sample(&source, 10);

    cmd()
        .args(["copy", "-s", path_str(&source), "-d", path_str(&dest), "-t", "orders"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("orders"));
}

// =============================================================================
// End-to-End Tests
// =============================================================================

#[test]
fn test_sample_then_copy_sqlite_to_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.db");
    let dest = dir.path().join("dest.db");

    cmd()
        .args(["sample", "--db", path_str(&source), "--count", "250"])
        .assert()
        .success()
        .stdout(predicate::str::contains("250 records"));

    let output = cmd()
        .args([
            "--output-json",
            "copy",
            "--source",
            path_str(&source),
            "--dest",
            path_str(&dest),
            "--table",
            "sample_users",
            "--batch-size",
            "100",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["table"], "sample_users");
    assert_eq!(result["rows_copied"], 250);
    assert_eq!(result["batches"], 3);
    assert_eq!(result["table_created"], true);
    assert_eq!(result["source_dialect"], "sqlite");
}

#[test]
fn test_config_file_with_flag_override() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.db");
    let dest = dir.path().join("dest.db");
    make_sample(&source, 30);

    let config = dir.path().join("copy.yaml");
    std::fs::write(
        &config,
        format!(
            "source: {}\ndest: {}\ntable: sample_users\nbatch_size: 1000\n",
            path_str(&source),
            path_str(&dest)
        ),
    )
    .unwrap();

    cmd()
        .args(["--output-json", "copy", "--config", path_str(&config), "-b", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"batches\": 3"));
}

#[test]
fn test_progress_lines_on_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.db");
    let dest = dir.path().join("dest.db");
    make_sample(&source, 20);

    cmd()
        .args([
            "--progress",
            "copy",
            "-s",
            path_str(&source),
            "-d",
            path_str(&dest),
            "-t",
            "sample_users",
            "-b",
            "10",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("\"records_copied\":10"))
        .stderr(predicate::str::contains("\"records_copied\":20"))
        .stdout(predicate::str::contains("Copy completed!"));
}
