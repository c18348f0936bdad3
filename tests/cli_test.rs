use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn treeprogress() -> Command {
    Command::cargo_bin("treeprogress").unwrap()
}

#[test]
fn test_check_prints_layout() {
    treeprogress()
        .args(["check", "tests/fixtures/build.yml"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("build (3 units, 100.0%)"))
        .stdout(predicate::str::contains("    classes (4 units, 16.7%)"));
}

#[test]
fn test_check_json() {
    let output = treeprogress()
        .args(["check", "tests/fixtures/build.yml", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["description"], "build");
    assert_eq!(json["children"][1]["children"][0]["units"], 8);
}

#[test]
fn test_check_rejects_bad_weights() {
    treeprogress()
        .args(["check", "tests/fixtures/bad_weights.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("'push' carries fraction 0.25"));
}

#[test]
fn test_replay_draws_bar() {
    treeprogress()
        .args([
            "replay",
            "tests/fixtures/build.yml",
            "tests/fixtures/events.yml",
            "--width",
            "20",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "\x1b[1AExecuting tasks [{}] 100.0% complete",
            "=".repeat(20)
        )))
        .stdout(predicate::str::contains("Progress: 100.0%"));
}

#[test]
fn test_replay_json_snapshot() {
    let output = treeprogress()
        .args([
            "replay",
            "tests/fixtures/build.yml",
            "tests/fixtures/partial.yml",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let progress = json["progress"].as_f64().unwrap();
    assert!((progress - (1.0 / 3.0 + 1.0 / 24.0)).abs() < 1e-9);
    assert_eq!(json["allocations"][1]["path"], "pull base image");
    assert_eq!(json["allocations"][1]["state"], "complete");
}

#[test]
fn test_replay_overflow_fails() {
    treeprogress()
        .args([
            "replay",
            "tests/fixtures/build.yml",
            "tests/fixtures/overflow.yml",
            "--json",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Progress exceeds max for 'push image': 6 > 5",
        ));
}

#[test]
fn test_replay_uses_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("config.yml");
    std::fs::write(&config, "bar_width: 10\nlabel: Building\n").unwrap();

    treeprogress()
        .args(["replay", "tests/fixtures/build.yml", "tests/fixtures/events.yml"])
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Building [==========] 100.0% complete"));
}

#[test]
fn test_replay_unknown_allocation() {
    let temp_dir = TempDir::new().unwrap();
    let events = temp_dir.path().join("events.yml");
    std::fs::write(&events, "events:\n  - allocation: deploy\n    units: 1\n").unwrap();

    treeprogress()
        .args(["replay", "tests/fixtures/build.yml"])
        .arg(&events)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No allocation at path 'deploy'"));
}
