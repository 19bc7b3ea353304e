//! CLI integration tests for the basket command-line interface.
//!
//! Each test gets its own config directory and working directory so no
//! user or project config leaks in.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A basket command isolated in `dir`.
fn basket(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("basket").unwrap();
    cmd.current_dir(dir.path())
        .arg("--config-dir")
        .arg(dir.path())
        .env_remove("BASKET_TOKEN_SECRET")
        .env_remove("BASKET_CONFIG_DIR");
    cmd
}

fn with_secret(dir: &TempDir) -> Command {
    let mut cmd = basket(dir);
    cmd.env("BASKET_TOKEN_SECRET", "cli-test-secret");
    cmd
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    basket(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("reap"))
        .stdout(predicate::str::contains("token"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    basket(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("basket"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let dir = TempDir::new().unwrap();
    basket(&dir).arg("checkout").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Token Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_token_issue_and_verify() {
    let dir = TempDir::new().unwrap();

    let output = with_secret(&dir)
        .args(["token", "issue", "ck_support", "--ttl-secs", "600"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let token = String::from_utf8(output.stdout).unwrap().trim().to_string();
    assert_eq!(token.split('.').count(), 3);

    with_secret(&dir)
        .args(["token", "verify", &token])
        .assert()
        .success()
        .stdout(predicate::str::contains("cart_key: ck_support"));
}

#[test]
fn test_token_verify_json_output() {
    let dir = TempDir::new().unwrap();

    let output = with_secret(&dir)
        .args(["token", "issue", "ck_json"])
        .output()
        .unwrap();
    let token = String::from_utf8(output.stdout).unwrap().trim().to_string();

    with_secret(&dir)
        .args(["--json", "token", "verify", &token])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"cart_key\": \"ck_json\""));
}

#[test]
fn test_token_verify_rejects_garbage() {
    let dir = TempDir::new().unwrap();
    with_secret(&dir)
        .args(["token", "verify", "not-a-token"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Token rejected"));
}

#[test]
fn test_token_from_other_secret_rejected() {
    let dir = TempDir::new().unwrap();

    let output = basket(&dir)
        .env("BASKET_TOKEN_SECRET", "first-secret")
        .args(["token", "issue", "ck_a"])
        .output()
        .unwrap();
    let token = String::from_utf8(output.stdout).unwrap().trim().to_string();

    basket(&dir)
        .env("BASKET_TOKEN_SECRET", "second-secret")
        .args(["token", "verify", &token])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bad_signature"));
}

#[test]
fn test_token_requires_secret() {
    let dir = TempDir::new().unwrap();
    basket(&dir)
        .args(["token", "issue", "ck_a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No token secret configured"));
}

#[test]
fn test_token_secret_from_config_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[token]\nsecret = \"file-secret\"\n",
    )
    .unwrap();

    basket(&dir)
        .args(["token", "issue", "ck_file"])
        .assert()
        .success()
        .stderr(predicate::str::contains("plaintext secret"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Reap and Config Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_reap_on_fresh_store() {
    let dir = TempDir::new().unwrap();
    basket(&dir)
        .arg("reap")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to clean"));

    assert!(dir.path().join("basket.db").exists());
}

#[test]
fn test_config_show_redacts_secret() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[token]\nsecret = \"do-not-print\"\n\n[server]\nport = 9123\n",
    )
    .unwrap();

    basket(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("9123"))
        .stdout(predicate::str::contains("<redacted>"))
        .stdout(predicate::str::contains("do-not-print").not());
}

#[test]
fn test_invalid_config_is_a_warning() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("basket.toml"), "this is = = not toml").unwrap();

    basket(&dir)
        .args(["config", "which"])
        .assert()
        .success()
        .stderr(predicate::str::contains("warning"));
}
