//! CLI smoke tests: commands that work without an LLM provider.
//!
//! These run the compiled binary against a temporary config, database and
//! data dictionary and check exit codes and output.

use std::path::Path;
use std::process::Command;

use rusqlite::Connection;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

/// Run sqlmatic with `args` and return (exit_code, stdout, stderr).
fn run_cli(args: &[&str]) -> (i32, String, String) {
    let bin = env!("CARGO_BIN_EXE_sqlmatic");
    let output = Command::new(bin)
        .args(args)
        .env("RUST_LOG", "error")
        .env_remove("SQLMATIC_CONFIG")
        .env_remove("SQLMATIC_DATABASE_PATH")
        .env_remove("SQLMATIC_DICTIONARY_PATH")
        .output()
        .expect("failed to execute sqlmatic binary");
    let code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (code, stdout, stderr)
}

/// Temp dir with a database, a dictionary and a config pointing at both.
fn workspace() -> (TempDir, String) {
    let dir = tempdir().unwrap();
    let db = dir.path().join("shop.db");
    Connection::open(&db)
        .unwrap()
        .execute_batch(
            "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT);
             CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER);",
        )
        .unwrap();
    let dict = dir.path().join("dictionary.csv");
    std::fs::write(
        &dict,
        "Domain,Table,Column,Key_Type,Description\nSales,orders,customer_id,FK,Buyer\n",
    )
    .unwrap();

    let config = dir.path().join("config.json");
    let content = json!({
        "database": {"path": db.display().to_string()},
        "dictionary": {"path": dict.display().to_string()},
    });
    std::fs::write(&config, content.to_string()).unwrap();
    let config = config.display().to_string();
    (dir, config)
}

fn stdout_json(stdout: &str) -> Value {
    serde_json::from_str(stdout).unwrap_or_else(|e| panic!("not JSON ({}): {}", e, stdout))
}

// ============================================================================
// Help & Version
// ============================================================================

#[test]
fn cli_no_args_shows_help() {
    let (code, stdout, _stderr) = run_cli(&[]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("sqlmatic"));
}

#[test]
fn cli_version_command() {
    let (code, stdout, _stderr) = run_cli(&["version"]);
    assert_eq!(code, 0);
    assert!(stdout.starts_with("sqlmatic "));
    assert!(stdout.contains('.'));
}

#[test]
fn cli_unknown_command_fails() {
    let (code, _stdout, stderr) = run_cli(&["frobnicate"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("frobnicate"));
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn cli_config_init_check_show() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");
    let path_str = path.display().to_string();

    let (code, stdout, _) = run_cli(&["config", "init", "--config", &path_str]);
    assert_eq!(code, 0, "init failed: {}", stdout);
    assert!(Path::new(&path).exists());

    // A second init refuses to overwrite.
    let (code, _, stderr) = run_cli(&["config", "init", "--config", &path_str]);
    assert_ne!(code, 0);
    assert!(stderr.contains("already exists"));

    let (code, stdout, _) = run_cli(&["config", "check", "--config", &path_str]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Config file:"));
    assert!(!stdout.contains("[ERROR]"));

    let (code, stdout, _) = run_cli(&["config", "show", "--config", &path_str]);
    assert_eq!(code, 0);
    assert!(stdout.contains("\"max_tool_rounds\": 10"));
}

#[test]
fn cli_config_check_reports_typo() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"databse": {}}"#).unwrap();

    let (code, stdout, _) = run_cli(&["config", "check", "--config", &path.display().to_string()]);
    assert_eq!(code, 0);
    assert!(stdout.contains("[ERROR] databse: Unknown field 'databse', did you mean 'database'?"));
}

// ============================================================================
// Schema & Field
// ============================================================================

#[test]
fn cli_schema_all_tables() {
    let (_dir, config) = workspace();
    let (code, stdout, stderr) = run_cli(&["schema", "--config", &config]);
    assert_eq!(code, 0, "stderr: {}", stderr);

    let payload = stdout_json(&stdout);
    assert_eq!(
        payload["message"],
        "Schema retrieved successfully for sqlite database."
    );
    assert_eq!(payload["schema"]["tables"].as_array().unwrap().len(), 2);
}

#[test]
fn cli_schema_unknown_table() {
    let (_dir, config) = workspace();
    let (code, stdout, _) = run_cli(&["schema", "invoices", "--config", &config]);
    assert_eq!(code, 0);

    let payload = stdout_json(&stdout);
    assert_eq!(payload["available_tables"], json!(["customers", "orders"]));
}

#[test]
fn cli_field_lookup() {
    let (_dir, config) = workspace();
    let (code, stdout, _) = run_cli(&["field", "customer", "--config", &config]);
    assert_eq!(code, 0);

    let payload = stdout_json(&stdout);
    assert_eq!(payload["row_count"], 1);
    assert_eq!(payload["results"][0]["Description"], "Buyer");
}

#[test]
fn cli_schema_missing_database_fails() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.json");
    let content = json!({"database": {"path": dir.path().join("nope.db").display().to_string()}});
    std::fs::write(&config, content.to_string()).unwrap();

    let (code, _, stderr) = run_cli(&["schema", "--config", &config.display().to_string()]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Failed to open database"));
}
