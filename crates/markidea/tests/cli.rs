//! Command-line behavior of the markidea binary

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::{tempdir, TempDir};

fn markidea(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("markidea").unwrap();
    cmd.arg("--data-dir").arg(dir.path()).arg("--user").arg("alice");
    cmd
}

fn json(dir: &TempDir, args: &[&str]) -> Value {
    let output = markidea(dir).arg("--json").args(args).output().unwrap();
    assert!(
        output.status.success(),
        "{:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    let response: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["ok"], true);
    response["data"].clone()
}

#[test]
fn test_notebook_create_and_list() {
    let dir = tempdir().unwrap();

    markidea(&dir)
        .args(["notebook", "create", "diary"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created notebook diary"));

    let data = json(&dir, &["notebook", "list"]);
    assert_eq!(data["notebooks"], serde_json::json!(["diary"]));

    markidea(&dir)
        .args(["notebook", "create", "diary"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_save_show_and_history() {
    let dir = tempdir().unwrap();

    let first = json(&dir, &["note", "save", "diary", "2024-01-01", "--content", "hello"]);
    json(&dir, &["note", "save", "diary", "2024-01-01", "--content", "hello world"]);

    markidea(&dir)
        .args(["note", "show", "diary", "2024-01-01"])
        .assert()
        .success()
        .stdout("hello world");

    let history = json(&dir, &["history", "list", "diary", "2024-01-01"]);
    let versions = history["versions"].as_array().unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[1]["version_ref"], first["version"]);

    let first_ref = first["version"].as_str().unwrap();
    markidea(&dir)
        .args(["history", "show", "diary", "2024-01-01", first_ref])
        .assert()
        .success()
        .stdout("hello");

    let reset = json(&dir, &["history", "reset", "diary", "2024-01-01", first_ref]);
    assert_eq!(reset["content"], "hello");
}

#[test]
fn test_save_from_stdin() {
    let dir = tempdir().unwrap();

    markidea(&dir)
        .args(["note", "save", "work", "todo"])
        .write_stdin("- write tests\n")
        .assert()
        .success();

    let data = json(&dir, &["note", "show", "work", "todo"]);
    assert_eq!(data["content"], "- write tests\n");
}

#[test]
fn test_delete_and_recover_through_trash() {
    let dir = tempdir().unwrap();
    json(&dir, &["note", "save", "diary", "a", "--content", "keep me"]);

    let deleted = json(&dir, &["note", "delete", "diary", "a"]);
    let id = deleted["id"].as_u64().unwrap().to_string();

    let trash = json(&dir, &["trash", "list"]);
    assert_eq!(trash["deleted"].as_array().unwrap().len(), 1);

    json(&dir, &["trash", "recover", id.as_str()]);
    let note = json(&dir, &["note", "show", "diary", "a"]);
    assert_eq!(note["content"], "keep me");

    let cleared = json(&dir, &["trash", "clear", "--all"]);
    assert_eq!(cleared["removed"], 0);
}

#[test]
fn test_missing_note_reports_structured_error() {
    let dir = tempdir().unwrap();

    let output = markidea(&dir)
        .args(["--json", "note", "show", "diary", "missing"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));

    let response: Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(response["ok"], false);
    assert_eq!(response["error"]["code"], "not_found");
}

#[test]
fn test_user_is_required() {
    let dir = tempdir().unwrap();

    Command::cargo_bin("markidea")
        .unwrap()
        .arg("--data-dir")
        .arg(dir.path())
        .args(["notebook", "list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--user is required"));
}

#[test]
fn test_config_init_refuses_overwrite() {
    let dir = tempdir().unwrap();

    markidea(&dir).args(["config", "init"]).assert().success();
    assert!(dir.path().join("config.toml").exists());
    assert!(dir.path().join("notes").is_dir());

    markidea(&dir).args(["config", "init"]).assert().code(4);
    markidea(&dir).args(["config", "init", "--force"]).assert().success();
}

#[test]
fn test_remote_enable_requires_url() {
    let dir = tempdir().unwrap();

    markidea(&dir)
        .args(["remote", "enable"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no remote configured"));

    let config = json(&dir, &["remote", "set", "git@example.com:alice/notes.git"]);
    assert_eq!(config["remote_url"], "git@example.com:alice/notes.git");

    let config = json(&dir, &["remote", "enable"]);
    assert_eq!(config["push_enabled"], true);
}

#[test]
fn test_note_move_renames_with_title() {
    let dir = tempdir().unwrap();
    json(&dir, &["note", "save", "diary", "draft", "--content", "body"]);

    let moved = json(&dir, &["note", "move", "diary", "draft", "diary", "--title", "final"]);
    assert_eq!(moved["to_notebook"], "diary");
    assert_eq!(moved["to_title"], "final");

    let note = json(&dir, &["note", "show", "diary", "final"]);
    assert_eq!(note["content"], "body");
    markidea(&dir)
        .args(["note", "show", "diary", "draft"])
        .assert()
        .code(3);
}

#[test]
fn test_log_level_flag_enables_diagnostics() {
    let dir = tempdir().unwrap();
    json(&dir, &["note", "save", "diary", "a", "--content", "x"]);

    markidea(&dir)
        .env_remove("RUST_LOG")
        .args(["history", "list", "diary", "a"])
        .assert()
        .success()
        .stderr(predicate::str::contains("read path log").not());

    markidea(&dir)
        .env_remove("RUST_LOG")
        .args(["--log-level", "debug", "history", "list", "diary", "a"])
        .assert()
        .success()
        .stderr(predicate::str::contains("read path log"));
}
