use assert_cmd::prelude::*;
use predicates::str::contains;
use std::process::Command;

#[test]
fn prints_help() {
    let mut cmd = Command::cargo_bin("survey-digest").unwrap();
    cmd.arg("--help");
    cmd.assert().success().stdout(contains("demographic segment"));
}

#[test]
fn report_requires_input() {
    let mut cmd = Command::cargo_bin("survey-digest").unwrap();
    cmd.arg("report");
    let assert = cmd.assert().failure();
    // clap should error about missing argument
    assert.stderr(contains("--input"));
}
