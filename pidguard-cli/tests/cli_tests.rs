//! CLI integration tests

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::PathBuf;

/// Build command for the pidguard-cli binary (finds it in target/debug when run via cargo test).
fn pidguard_cli() -> Command {
    cargo_bin_cmd!("pidguard-cli")
}

/// Path to pidguard library test fixtures (relative to workspace).
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("pidguard")
        .join("tests")
        .join("fixtures")
}

#[test]
fn test_cli_help() {
    let mut cmd = pidguard_cli();

    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("P&ID"));
}

#[test]
fn test_cli_version() {
    let mut cmd = pidguard_cli();

    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_check_compliant_file() {
    let mut cmd = pidguard_cli();
    let path = fixtures_dir().join("compliant_ecs.json");

    cmd.arg("check").arg(path).arg("--fail-on").arg("info");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("No violations found"));
}

#[test]
fn test_cli_check_reports_violation() {
    let mut cmd = pidguard_cli();
    let path = fixtures_dir().join("sampling_port_upstream.json");

    cmd.arg("check").arg(path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("BWMS-001"))
        .stdout(predicate::str::contains("ERROR"));
}

#[test]
fn test_cli_fail_on_error() {
    let mut cmd = pidguard_cli();
    let path = fixtures_dir().join("sampling_port_upstream.json");

    cmd.arg("check").arg(path).arg("--fail-on").arg("error");

    cmd.assert().code(1);
}

#[test]
fn test_cli_enable_filters_builtins() {
    let mut cmd = pidguard_cli();
    let path = fixtures_dir().join("sampling_port_upstream.json");

    cmd.arg("check")
        .arg(path)
        .arg("--enable")
        .arg("BWMS-003")
        .arg("--fail-on")
        .arg("error");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("BWMS-001").not());
}

#[test]
fn test_cli_scale_option() {
    let path = fixtures_dir().join("tsu_far_from_apu.json");

    let mut cmd = pidguard_cli();
    cmd.arg("check").arg(&path).arg("--fail-on").arg("warning");
    cmd.assert().code(1);

    let mut cmd = pidguard_cli();
    cmd.arg("check")
        .arg(&path)
        .arg("--scale")
        .arg("200")
        .arg("--fail-on")
        .arg("warning");
    cmd.assert().code(0);
}

#[test]
fn test_cli_check_json_output() {
    let mut cmd = pidguard_cli();
    let path = fixtures_dir().join("sampling_port_upstream.json");

    cmd.arg("check").arg(path).arg("--format").arg("json");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"run_id\""))
        .stdout(predicate::str::contains("\"violations\""));
}

#[test]
fn test_cli_github_format() {
    let mut cmd = pidguard_cli();
    let path = fixtures_dir().join("sampling_port_upstream.json");

    cmd.arg("check").arg(path).arg("--format").arg("github");

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("::error file="));
}

#[test]
fn test_cli_check_with_rules_file() {
    let mut cmd = pidguard_cli();

    cmd.arg("check")
        .arg(fixtures_dir().join("compliant_ecs.json"))
        .arg("--rules")
        .arg(fixtures_dir().join("dynamic_rules.json"));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("YARD-003"))
        .stdout(predicate::str::contains("MANUAL REVIEW"))
        .stderr(predicate::str::contains("YARD-005"));
}

#[test]
fn test_cli_calibration_file() {
    let mut calibration = tempfile::NamedTempFile::new().unwrap();
    write!(calibration, r#"{{"default_px_per_m": 200}}"#).unwrap();

    let mut cmd = pidguard_cli();
    cmd.arg("check")
        .arg(fixtures_dir().join("tsu_far_from_apu.json"))
        .arg("--calibration")
        .arg(calibration.path())
        .arg("--fail-on")
        .arg("warning");

    cmd.assert().code(0);
}

#[test]
fn test_cli_invalid_calibration_rejected() {
    let mut calibration = tempfile::NamedTempFile::new().unwrap();
    write!(calibration, r#"{{"default_px_per_m": -5}}"#).unwrap();

    let mut cmd = pidguard_cli();
    cmd.arg("check")
        .arg(fixtures_dir().join("tsu_far_from_apu.json"))
        .arg("--calibration")
        .arg(calibration.path());

    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"))
        .stderr(predicate::str::contains("default_px_per_m"));
}

#[test]
fn test_cli_custom_catalogue() {
    // Only ECUs are recognised, so the sampling port rule has nothing to check.
    let mut catalogue = tempfile::NamedTempFile::new().unwrap();
    write!(
        catalogue,
        r#"{{"equipment": [{{"priority": 1, "kind": "ECU", "pattern": "\bECU\b"}}]}}"#
    )
    .unwrap();

    let mut cmd = pidguard_cli();
    cmd.arg("check")
        .arg(fixtures_dir().join("sampling_port_upstream.json"))
        .arg("--catalogue")
        .arg(catalogue.path())
        .arg("--fail-on")
        .arg("error");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("BWMS-001").not());
}

#[test]
fn test_cli_invalid_catalogue_rejected() {
    let mut catalogue = tempfile::NamedTempFile::new().unwrap();
    write!(
        catalogue,
        r#"{{"equipment": [{{"priority": 1, "kind": "ECU", "pattern": "ECU("}}]}}"#
    )
    .unwrap();

    let mut cmd = pidguard_cli();
    cmd.arg("check")
        .arg(fixtures_dir().join("sampling_port_upstream.json"))
        .arg("--catalogue")
        .arg(catalogue.path());

    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid tag pattern"));
}

#[test]
fn test_cli_check_nonexistent_file() {
    let mut cmd = pidguard_cli();

    cmd.arg("check").arg("does_not_exist.json");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_cli_check_invalid_structure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{"symbols": "ECU"}"#).unwrap();

    let mut cmd = pidguard_cli();
    cmd.arg("check").arg(&path);

    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid input"));
}

#[test]
fn test_cli_rules_command() {
    let mut cmd = pidguard_cli();

    cmd.arg("rules");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("BWMS-001"))
        .stdout(predicate::str::contains("BWMS-009"));
}

#[test]
fn test_cli_rules_verbose() {
    let mut cmd = pidguard_cli();

    cmd.arg("rules").arg("--verbose");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Standard:"));
}

#[test]
fn test_cli_template_is_loadable() {
    let mut cmd = pidguard_cli();
    let output = cmd.arg("template").output().unwrap();
    assert!(output.status.success());

    let dir = tempfile::tempdir().unwrap();
    let rules = dir.path().join("rules.json");
    std::fs::write(&rules, &output.stdout).unwrap();

    let mut cmd = pidguard_cli();
    cmd.arg("check")
        .arg(fixtures_dir().join("compliant_ecs.json"))
        .arg("--rules")
        .arg(&rules);
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("skipped rule").not());
}

#[test]
fn test_cli_output_formats_are_different() {
    let path = fixtures_dir().join("sampling_port_upstream.json");

    let mut cmd_human = pidguard_cli();
    cmd_human.arg("check").arg(&path).arg("--format").arg("human");
    let human_output = cmd_human.output().unwrap();

    let mut cmd_json = pidguard_cli();
    cmd_json.arg("check").arg(&path).arg("--format").arg("json");
    let json_output = cmd_json.output().unwrap();

    assert_ne!(
        human_output.stdout, json_output.stdout,
        "Different formats should produce different output"
    );
}
