// Integration tests for CLI commands
// Run with: cargo test --test cli_commands_test

use std::process::Command;
use tempfile::TempDir;

fn apns_push() -> Command {
    Command::new(env!("CARGO_BIN_EXE_apns-push"))
}

#[test]
fn test_help_lists_send() {
    let output = apns_push().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("send"));
}

#[test]
fn test_send_requires_tokens() {
    let output = apns_push().args(["send", "--alert", "hi"]).output().unwrap();
    assert!(!output.status.success());
}

/// Payload errors are reported before any connection is attempted.
#[test]
fn test_send_rejects_invalid_payload() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("config.json");

    let output = apns_push()
        .args(["send", "--config", config.to_str().unwrap(), "--payload", "{ nope", "abcd"])
        .env_remove("APNS_TEAM_ID")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid --payload JSON"), "stderr: {stderr}");
}

#[test]
fn test_send_rejects_unknown_priority() {
    let output = apns_push()
        .args(["send", "--priority", "urgent", "--alert", "hi", "abcd"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_send_rejects_malformed_config() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("config.json");
    std::fs::write(&config, "not json").unwrap();

    let output = apns_push()
        .args(["send", "--config", config.to_str().unwrap(), "--alert", "hi", "abcd"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid config"), "stderr: {stderr}");
}
