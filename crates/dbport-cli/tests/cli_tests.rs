//! CLI integration tests for dbport.
//!
//! These tests verify argument parsing, translation through stdin and
//! files, and exit codes for configuration and connection failures.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the dbport binary.
fn cmd() -> Command {
    Command::cargo_bin("dbport").unwrap()
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
        .stdout(predicate::str::contains("translate"))
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_translate_subcommand_help() {
    cmd()
        .args(["translate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--source"))
        .stdout(predicate::str::contains("--target"))
        .stdout(predicate::str::contains("--quote-names"))
        .stdout(predicate::str::contains("--show-types"));
}

#[test]
fn test_generate_subcommand_help() {
    cmd()
        .args(["generate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--mode"))
        .stdout(predicate::str::contains("--output-folder"))
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dbport"));
}

#[test]
fn test_no_subcommand_shows_usage() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// Translate Tests
// =============================================================================

#[test]
fn test_translate_from_stdin() {
    cmd()
        .args(["translate", "--source", "sqlserver", "--target", "postgres"])
        .write_stdin("SELECT ISNULL(col,0) FROM dbo.T")
        .assert()
        .success()
        .stdout(predicate::str::contains("SELECT COALESCE(col,0) FROM T"));
}

#[test]
fn test_translate_from_file_with_quoting() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "SELECT Name FROM dbo.Users").unwrap();

    cmd()
        .args(["translate", "--source", "mssql", "--target", "pg", "--quote-names", "-i"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("SELECT \"Name\" FROM \"Users\""));
}

#[test]
fn test_translate_json_output() {
    cmd()
        .args([
            "translate",
            "--source",
            "sqlserver",
            "--target",
            "mysql",
            "--output-json",
        ])
        .write_stdin("SELECT CAST(Price AS nvarchar(20)) FROM dbo.T")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"text\""))
        .stdout(predicate::str::contains("\"data_types\""))
        .stdout(predicate::str::contains("CHAR"));
}

#[test]
fn test_translate_owner_rewrite() {
    cmd()
        .args([
            "translate",
            "--source",
            "sqlserver",
            "--target",
            "postgres",
            "--source-owner",
            "sales",
            "--target-owner",
            "crm",
        ])
        .write_stdin("SELECT * FROM sales.Orders")
        .assert()
        .success()
        .stdout(predicate::str::contains("SELECT * FROM crm.Orders"));
}

#[test]
fn test_target_owner_requires_source_owner() {
    cmd()
        .args([
            "translate",
            "--source",
            "sqlserver",
            "--target",
            "postgres",
            "--target-owner",
            "crm",
        ])
        .write_stdin("SELECT 1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--source-owner"));
}

#[test]
fn test_unknown_dialect_is_rejected() {
    cmd()
        .args(["translate", "--source", "db2", "--target", "postgres"])
        .write_stdin("SELECT 1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown database type"));
}

#[test]
fn test_missing_input_file() {
    cmd()
        .args([
            "translate",
            "--source",
            "sqlserver",
            "--target",
            "postgres",
            "--input",
            "/nonexistent/definition.sql",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("reading definition"));
}

// =============================================================================
// Configuration Error Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_1() {
    // A missing file is an IO error, not a configuration error.
    cmd()
        .args(["--config", "/nonexistent/config.yaml", "generate"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_invalid_yaml_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "generate"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_source_without_connector_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "source:").unwrap();
    writeln!(file, "  type: oracle").unwrap();
    writeln!(file, "  host: db").unwrap();
    writeln!(file, "  database: sales").unwrap();
    writeln!(file, "  user: app").unwrap();
    writeln!(file, "target:").unwrap();
    writeln!(file, "  type: postgres").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "generate"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("has no connector"));
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[test]
fn test_health_check_reports_unreachable_source() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.db");
    let config = dir.path().join("config.yaml");
    std::fs::write(
        &config,
        format!(
            "source:\n  type: sqlite\n  database: \"{}\"\ntarget:\n  type: postgres\n",
            missing.display()
        ),
    )
    .unwrap();

    cmd()
        .args(["--config", config.to_str().unwrap(), "health-check"])
        .assert()
        .failure()
        .code(3)
        .stdout(predicate::str::contains("Source: FAILED"))
        .stdout(predicate::str::contains("Target: not configured"))
        .stdout(predicate::str::contains("UNHEALTHY"));
}

#[test]
fn test_generate_against_missing_sqlite_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    std::fs::write(
        &config,
        format!(
            "source:\n  type: sqlite\n  database: \"{}\"\ntarget:\n  type: postgres\n",
            dir.path().join("absent.db").display()
        ),
    )
    .unwrap();

    cmd()
        .args(["--config", config.to_str().unwrap(), "generate", "--mode", "schema"])
        .arg("--output-folder")
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .code(3);
}
