use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = format!(
        r#"
[sampling]
oversample = 4
interval_ms = 5

[calibration]
file = "{}"
"#,
        dir.path().join("calibration.json").display()
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn is_time_of_day(s: &str) -> bool {
    let parts: Vec<&str> = s.split(':').collect();
    parts.len() == 3
        && parts.iter().all(|p| p.len() == 2 && p.bytes().all(|b| b.is_ascii_digit()))
        && parts[0] < "24"
        && parts[1] < "60"
        && parts[2] < "60"
}

/// Every stdout line of `run` is one telemetry object with exactly four keys.
#[rstest]
fn telemetry_line_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = Command::cargo_bin("cellmon_cli")
        .unwrap()
        .env_remove("RUST_LOG")
        .arg("--json")
        .arg("--log-level")
        .arg("info")
        .arg("--config")
        .arg(&cfg)
        .args(["run", "--cycles", "3"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8(out.stdout).unwrap();
    let mut lines = 0;
    for line in stdout.lines() {
        let v: serde_json::Value = serde_json::from_str(line).expect("telemetry is JSON");
        let obj = v.as_object().expect("telemetry is an object");
        assert_eq!(obj.len(), 4, "unexpected keys in {line}");

        assert!(is_time_of_day(v["t"].as_str().unwrap()), "bad t in {line}");
        let mv = v["v"].as_array().unwrap();
        let soc = v["soc"].as_array().unwrap();
        assert_eq!(mv.len(), 4);
        assert_eq!(soc.len(), 4);
        assert!(soc.iter().all(|s| s.as_u64().is_some_and(|s| s <= 100)));
        let sum: u64 = mv.iter().map(|x| x.as_u64().unwrap()).sum();
        let tot = v["tot"].as_u64().unwrap();
        // Cells are rounded individually; the total is rounded once.
        assert!(sum.abs_diff(tot) <= 2, "{sum} vs {tot}");
        lines += 1;
    }
    assert_eq!(lines, 3);

    // Logs went to stderr, one JSON object per line.
    let stderr = String::from_utf8(out.stderr).unwrap();
    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
        let v: serde_json::Value = serde_json::from_str(line).expect("log line is JSON");
        assert!(v.get("level").is_some(), "no level in {line}");
    }
}

/// With --json, failures are reported as one structured object on stderr.
#[rstest]
#[case(&["calibrate", "--v", "1,2,3,4"], "InvalidCalibrationInput", 5)]
#[case(&["clear-log"], "Error", 1)]
fn error_schema(#[case] args: &[&str], #[case] reason: &str, #[case] code: i64) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = Command::cargo_bin("cellmon_cli")
        .unwrap()
        .env_remove("RUST_LOG")
        .arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .args(args)
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(code as i32));

    let stderr = String::from_utf8(out.stderr).unwrap();
    let last = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .expect("error line");
    let v: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(v["reason"], reason);
    assert_eq!(v["exit_code"], code);
    assert!(v["message"].as_str().unwrap().starts_with("What happened") || code == 1);
    assert!(!dir.path().join("calibration.json").exists());
}
