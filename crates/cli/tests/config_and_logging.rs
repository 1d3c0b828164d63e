use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn fails_when_config_missing() {
    let tmp = tempdir().unwrap();
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vdx"));
    cmd.env("XDG_CONFIG_HOME", tmp.path()); // empty dir → no config
    cmd.arg("index");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error loading config"))
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn fails_for_unknown_profile() {
    let tmp = tempdir().unwrap();
    let config_path = tmp.path().join("config.toml");
    fs::write(
        &config_path,
        format!("version = 1\n[profiles.default]\nvault_root = \"{}\"\n", tmp.path().display()),
    )
    .unwrap();

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vdx"));
    cmd.arg("--config").arg(&config_path).args(["--profile", "work", "index"]);
    cmd.assert().failure().stderr(predicate::str::contains("profile 'work' not found"));
}

#[test]
fn fails_when_vault_root_missing() {
    let tmp = tempdir().unwrap();
    let config_path = tmp.path().join("config.toml");
    fs::write(
        &config_path,
        format!(
            "version = 1\n[profiles.default]\nvault_root = \"{}\"\n",
            tmp.path().join("nowhere").display()
        ),
    )
    .unwrap();

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vdx"));
    cmd.arg("--config").arg(&config_path).arg("index");
    cmd.assert().failure().stderr(predicate::str::contains("Error: indexing"));
}

#[test]
fn logs_to_file_when_configured() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let vault = root.join("vault");
    let log_file = root.join("logs").join("vdx.log");
    fs::create_dir_all(&vault).unwrap();
    fs::write(vault.join("note.md"), "# Note\n").unwrap();

    let config_path = root.join("config.toml");
    let config_content = format!(
        r#"
version = 1
[profiles.default]
vault_root = "{}"

[logging]
level = "warn"
file_level = "debug"
file = "{}"
"#,
        vault.display(),
        log_file.display()
    );
    fs::write(&config_path, &config_content).unwrap();

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vdx"));
    cmd.arg("--config").arg(&config_path).arg("index").assert().success();

    assert!(log_file.exists(), "Log file should be created");
    let log = fs::read_to_string(&log_file).unwrap();
    assert!(log.contains("indexed 1 documents"), "log was: {log}");
}
