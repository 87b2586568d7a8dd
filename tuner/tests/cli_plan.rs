//! CLI tests for `tuner plan` and `tuner run`.
//!
//! Spawns the tuner binary and checks exit codes and written artifacts.

use std::fs;
use std::process::Command;

use tuner::exit_codes;
use tuner::plan::INFO_FILE;
use tuner::test_support::SweepFixture;

const WALKER: &str = "\
behaviors:
  Walker:
    trainer_type: ppo
    hyperparameters:
      beta:
        opt_values: [0.001, 0.01]
      epsilon:
        opt_values: [0.1, 0.2, 0.3]
";

#[test]
fn plan_writes_one_file_per_combination() {
    let fixture = SweepFixture::new("walker.yaml", WALKER);
    let output = Command::new(env!("CARGO_BIN_EXE_tuner"))
        .current_dir(fixture.path())
        .args(["plan", "walker.yaml", "--run-id", "ppo"])
        .output()
        .expect("tuner plan");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    for n in 0..6 {
        assert!(fixture.path().join(format!("walker-{n}.yaml")).exists());
    }
    assert!(!fixture.path().join("walker-6.yaml").exists());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ppo-5"));

    let info = fs::read_to_string(fixture.path().join(INFO_FILE)).expect("read info");
    assert!(info.contains("ppo-0\n- Walker (ppo-0/Walker)\n  - beta: 0.001\n  - epsilon: 0.1\n"));
    assert!(info.contains("ppo-1\n- Walker (ppo-1/Walker)\n  - beta: 0.001\n  - epsilon: 0.2\n"));
}

#[test]
fn plan_honours_out_dir() {
    let fixture = SweepFixture::new("walker.yaml", WALKER);
    let status = Command::new(env!("CARGO_BIN_EXE_tuner"))
        .current_dir(fixture.path())
        .args(["plan", "walker.yaml", "--out-dir", "jobs"])
        .status()
        .expect("tuner plan");

    assert_eq!(status.code(), Some(exit_codes::OK));
    assert!(fixture.path().join("jobs").join("walker-0.yaml").exists());
    assert!(!fixture.path().join("walker-0.yaml").exists());
}

#[test]
fn invalid_document_exits_with_invalid_code() {
    let fixture = SweepFixture::new(
        "broken.yaml",
        "behaviors:\n  Walker:\n    opt_values: [1, 2]\n",
    );
    let output = Command::new(env!("CARGO_BIN_EXE_tuner"))
        .current_dir(fixture.path())
        .args(["plan", "broken.yaml"])
        .output()
        .expect("tuner plan");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("opt_values"));
    assert!(!fixture.path().join("broken-0.yaml").exists());
}

#[test]
fn missing_document_exits_with_invalid_code() {
    let fixture = SweepFixture::new("walker.yaml", WALKER);
    let status = Command::new(env!("CARGO_BIN_EXE_tuner"))
        .current_dir(fixture.path())
        .args(["plan", "nope.yaml"])
        .status()
        .expect("tuner plan");
    assert_eq!(status.code(), Some(exit_codes::INVALID));
}

#[test]
fn run_with_bad_config_exits_with_invalid_code() {
    let fixture = SweepFixture::new("walker.yaml", WALKER);
    fs::write(fixture.path().join("tuner.toml"), "poll_interval_secs = 0\n").expect("write config");
    let status = Command::new(env!("CARGO_BIN_EXE_tuner"))
        .current_dir(fixture.path())
        .args(["run", "walker.yaml"])
        .status()
        .expect("tuner run");
    assert_eq!(status.code(), Some(exit_codes::INVALID));
}
