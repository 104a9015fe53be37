#![allow(deprecated)]
use std::path::PathBuf;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn switchboard() -> Command {
    Command::cargo_bin("switchboard").unwrap()
}

fn write_config(dir: &TempDir, yaml: &str) -> PathBuf {
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, yaml).unwrap();
    path
}

const VALID_CONFIG: &str = r#"
version: 1
buttons:
  193: desk
  194: laptop
actions:
  desk:
    steps:
      - type: command
        name: say-desk
        program: "true"
  laptop:
    policy: all_steps
    steps:
      - type: command
        program: echo
        args: ["switching"]
"#;

// ---------------------------------------------------------------------------
// switchboard check
// ---------------------------------------------------------------------------

#[test]
fn check_accepts_valid_config() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, VALID_CONFIG);

    switchboard()
        .args(["check", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

#[test]
fn check_reads_config_path_from_env() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, VALID_CONFIG);

    switchboard()
        .arg("check")
        .env("SWITCHBOARD_CONFIG", &config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

#[test]
fn check_missing_config_file_fails() {
    switchboard()
        .args(["check", "--config", "/nonexistent/switchboard.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn check_flags_undefined_action() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"
version: 1
buttons:
  193: missing
actions: {}
"#,
    );

    switchboard()
        .args(["check", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error]"))
        .stdout(predicate::str::contains("undefined action"))
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn check_flags_batches_without_mqtt() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"
version: 1
batches:
  brightness:
    topic: home/office/light
"#,
    );

    switchboard()
        .args(["check", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stdout(predicate::str::contains("mqtt section is missing"));
}

#[test]
fn check_warns_about_unbound_action() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"
version: 1
actions:
  orphan:
    steps:
      - type: command
        program: "true"
"#,
    );

    switchboard()
        .args(["check", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("[warning]"))
        .stdout(predicate::str::contains("not bound to any button"));
}

#[test]
fn check_warns_about_missing_program() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"
version: 1
buttons:
  192: probe
actions:
  probe:
    steps:
      - type: command
        program: switchboard-no-such-program-on-path
"#,
    );

    switchboard()
        .args(["check", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("not found on PATH"));
}

#[test]
fn check_json_valid_config_has_empty_findings() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, VALID_CONFIG);

    let out = switchboard()
        .args(["check", "--json", "--config"])
        .arg(&config)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert!(v["findings"].as_array().unwrap().is_empty());
}

#[test]
fn check_json_reports_error_findings() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"
version: 1
buttons:
  193: missing
actions: {}
"#,
    );

    let out = switchboard()
        .args(["check", "--json", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();

    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let findings = v["findings"].as_array().unwrap();
    assert!(!findings.is_empty());
    assert_eq!(findings[0]["level"], "error");
}

// ---------------------------------------------------------------------------
// switchboard devices
// ---------------------------------------------------------------------------

#[test]
fn devices_runs_without_config() {
    // Lists whatever /dev/input offers; in CI that is usually nothing.
    switchboard().arg("devices").assert().success();
}

#[test]
fn devices_json_has_devices_key() {
    let out = switchboard()
        .args(["devices", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert!(v["devices"].is_array());
}

// ---------------------------------------------------------------------------
// switchboard run
// ---------------------------------------------------------------------------

#[test]
fn run_refuses_config_errors() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"
version: 1
buttons:
  193: missing
actions: {}
"#,
    );

    switchboard()
        .args(["run", "--config"])
        .arg(&config)
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("refusing to start"));
}

#[test]
fn run_fails_when_device_is_missing() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"
version: 1
device:
  path: /dev/input/switchboard-test-missing
buttons:
  193: desk
actions:
  desk:
    steps:
      - type: command
        program: "true"
"#,
    );

    switchboard()
        .args(["run", "--config"])
        .arg(&config)
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open input device"));
}

// ---------------------------------------------------------------------------
// switchboard test-switch
// ---------------------------------------------------------------------------

#[test]
fn test_switch_requires_gpio_lines() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, VALID_CONFIG);

    switchboard()
        .args(["test-switch", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no gpio lines configured"));
}

#[test]
fn test_switch_respects_gpio_disabled() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"
version: 1
gpio:
  enabled: false
  lines:
    usb-input-1:
      pin: 17
"#,
    );

    switchboard()
        .args(["test-switch", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("gpio is disabled"));
}

#[test]
fn test_switch_rejects_unknown_line() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"
version: 1
gpio:
  lines:
    usb-input-1:
      pin: 17
"#,
    );

    switchboard()
        .args(["test-switch", "--line", "bogus", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("'bogus' is not configured"));
}
