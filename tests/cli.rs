//! End-to-end CLI tests using assert_cmd.
//!
//! These tests run the actual p3270 binary against the fake emulator and
//! verify stdout/stderr/exit codes.

mod common;

use assert_cmd::Command;
use common::fake_emulator;
use predicates::prelude::*;

/// The binary with an empty configuration file, the fake emulator and a
/// client log outside the user's data directory.
fn p3270() -> Command {
    let log = std::env::temp_dir().join(format!("p3270-cli-{}.log", std::process::id()));
    let mut cmd = Command::cargo_bin("p3270").unwrap();
    cmd.env("P3270_CONFIG", "/dev/null")
        .env("P3270_EMULATOR", fake_emulator())
        .env("P3270_LOG_FILE", log);
    cmd
}

#[test]
fn test_help() {
    Command::cargo_bin("p3270")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Script a 3270 host session"))
        .stdout(predicate::str::contains("screen"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("--emulator"));
}

#[test]
fn test_version() {
    Command::cargo_bin("p3270")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("p3270"));
}

#[test]
fn test_config_from_file_with_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("p3270.cfg");
    std::fs::write(
        &path,
        "# test host\nhostname = mvs.example.com\nmodel\t= 3278-5\ncodePage = cp870\n",
    )
    .unwrap();

    p3270()
        .env("P3270_CONFIG", &path)
        .args(["--port", "992", "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Host Name      : mvs.example.com"))
        .stdout(predicate::str::contains("Host Port      : 992"))
        .stdout(predicate::str::contains("Terminal Model : 3278-5"))
        .stdout(predicate::str::contains("cp870"));
}

#[test]
fn test_config_json() {
    let output = p3270()
        .args(["--host", "zos", "--lu", "LU01", "config", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["host"], "zos");
    assert_eq!(json["lu_name"], "LU01");
    assert_eq!(json["port"], 23);
    assert_eq!(json["model"], "3279-2");
}

#[test]
fn test_invalid_config_fails() {
    p3270()
        .args(["--model", "3277-9", "--code-page", "cp930", "config"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("3277-9"))
        .stderr(predicate::str::contains("cp930"));
}

#[test]
fn test_screen() {
    p3270()
        .arg("screen")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("*".repeat(80)))
        .stdout(predicate::str::contains("FAKE S3270 -model 3279-2"))
        .stdout(predicate::str::contains("READY"));
}

#[test]
fn test_read() {
    p3270()
        .args(["read", "1", "1", "5"])
        .assert()
        .success()
        .stdout("READY\n");
}

#[test]
fn test_read_out_of_bounds() {
    p3270()
        .args(["read", "25", "1", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("outside the 24x80 screen"));
}

#[test]
fn test_run_script_from_stdin() {
    p3270()
        .arg("run")
        .write_stdin("# log on\nwait-field\nfill 1 1 \"READY\"\nenter\nread 1 1 5\npf 3\n")
        .assert()
        .success()
        .stdout("READY\n");
}

#[test]
fn test_run_script_file() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("logon.p3270");
    std::fs::write(&script, "tab\nexpect 1 1 \"READY\"\nstatus\n").unwrap();
    p3270()
        .arg("run")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"keyboard\":\"unlocked\""));
}

#[test]
fn test_run_stops_at_failing_line() {
    p3270()
        .arg("run")
        .write_stdin("enter\ntext \"CRASH\"\nenter\n")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("line 2"))
        .stderr(predicate::str::contains("fake emulator crashed"));
}

#[test]
fn test_run_rejects_bad_script_before_connecting() {
    p3270()
        .env("P3270_EMULATOR", "/nonexistent/bin/s3270")
        .arg("run")
        .write_stdin("enter\nlaunch missiles\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"));
}

#[test]
fn test_missing_emulator() {
    p3270()
        .args(["--emulator", "/nonexistent/bin/s3270", "screen"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("/nonexistent/bin/s3270"))
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_client_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("logs").join("session.log");
    p3270()
        .env("P3270_LOG_FILE", &log)
        .args(["--host", "mvs.example.com", "read", "1", "1", "5"])
        .assert()
        .success();

    let text = std::fs::read_to_string(&log).unwrap();
    assert!(text.contains("Connect to host [mvs.example.com]"));
    assert!(text.contains("INFO"));
}

#[test]
fn test_unwritable_default_log_is_not_fatal() {
    // The default location is derived from the data directory; make it a file.
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("data");
    std::fs::write(&blocker, "").unwrap();
    p3270()
        .env_remove("P3270_LOG_FILE")
        .env("XDG_DATA_HOME", &blocker)
        .env("HOME", dir.path())
        .arg("screen")
        .assert()
        .success()
        .stderr(predicate::str::contains("client log disabled"));
}
