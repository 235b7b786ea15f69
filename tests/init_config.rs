use assert_cmd::prelude::*;
use predicates::str::contains;
use std::fs;
use std::process::Command;

#[test]
fn init_writes_config_to_xdg_config_home() {
    let temp = tempfile::tempdir().unwrap();
    let xdg_config_home = temp.path().join(".config");
    fs::create_dir_all(&xdg_config_home).unwrap();

    let mut cmd = Command::cargo_bin("survey-digest").unwrap();
    cmd.env("XDG_CONFIG_HOME", &xdg_config_home)
        .args([
            "init",
            "--provider", "mock",
            "--default-model", "gpt-4o-mini",
            "--temperature", "0.2",
            "--context-window", "8000",
            "--profile", "default",
        ]);
    cmd.assert().success().stdout(contains("config written:"));

    let cfg_path = xdg_config_home.join("survey-digest").join("config.toml");
    let contents = fs::read_to_string(cfg_path).unwrap();
    assert!(contents.contains("default_profile"));
    assert!(contents.contains("mock"));
    assert!(contents.contains("8000"));
}

#[test]
fn report_uses_profile_provider() {
    let temp = tempfile::tempdir().unwrap();
    let xdg_config_home = temp.path().join(".config");
    fs::create_dir_all(xdg_config_home.join("survey-digest")).unwrap();
    fs::write(
        xdg_config_home.join("survey-digest").join("config.toml"),
        "default_profile = \"default\"\n\n[profiles.default]\nprovider = \"mock\"\nmodel = \"m\"\n",
    )
    .unwrap();
    let input = temp.path().join("data.csv");
    fs::write(&input, "sexo,age,st_text\nFEM,22,hello\n").unwrap();

    let mut cmd = Command::cargo_bin("survey-digest").unwrap();
    cmd.current_dir(temp.path())
        .env("XDG_CONFIG_HOME", &xdg_config_home)
        .args(["report", "--input", input.to_str().unwrap(), "--output", temp.path().join("r.html").to_str().unwrap(), "--json"]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["provider"], "mock");
    assert_eq!(v["model"], "m");
}

#[test]
fn init_rejects_bad_temperature() {
    let temp = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("survey-digest").unwrap();
    cmd.env("XDG_CONFIG_HOME", temp.path().join(".config"))
        .args(["init", "--provider", "mock", "--temperature", "5"]);
    cmd.assert().failure().stderr(contains("invalid temperature"));
}
