//! Integration tests for the satchel binary

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn satchel_cmd(project: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("satchel");
    cmd.arg("--quiet").arg("--project").arg(project);
    cmd
}

/// Write a minimal plugin package the CLI can install from a local source
fn write_demo_plugin(dir: &Path) -> PathBuf {
    let plugin_dir = dir.join("demo-plugin");
    fs::create_dir_all(plugin_dir.join("skills")).expect("plugin dirs");
    fs::write(
        plugin_dir.join("plugin.toml"),
        r#"[plugin]
name = "demo"
version = "1.0.0"

[[skills]]
name = "hello"
context = "./skills/hello.md"
"#,
    )
    .expect("descriptor");
    fs::write(
        plugin_dir.join("skills/hello.md"),
        "Hello from {{ plugin.name }}",
    )
    .expect("context");
    plugin_dir
}

#[test]
fn test_version() {
    let temp = TempDir::new().expect("temp dir");
    satchel_cmd(temp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("satchel"));
}

#[test]
fn test_help() {
    let temp = TempDir::new().expect("temp dir");
    satchel_cmd(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Plugin installer"));
}

#[test]
fn test_invalid_command() {
    let temp = TempDir::new().expect("temp dir");
    satchel_cmd(temp.path()).arg("invalid").assert().failure();
}

#[test]
fn test_init_writes_config() {
    let temp = TempDir::new().expect("temp dir");
    satchel_cmd(temp.path()).arg("init").assert().success();

    let config = fs::read_to_string(temp.path().join("satchel.toml")).expect("config written");
    assert!(config.contains("platform = \"claude\""));

    // Second init leaves the existing file alone
    satchel_cmd(temp.path()).arg("init").assert().success();
}

#[test]
fn test_list_empty_project() {
    let temp = TempDir::new().expect("temp dir");
    satchel_cmd(temp.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No plugins installed"));
}

#[test]
fn test_install_list_remove_roundtrip() {
    let temp = TempDir::new().expect("temp dir");
    let plugin_dir = write_demo_plugin(temp.path());

    satchel_cmd(temp.path())
        .args(["install", "demo", "--source"])
        .arg(&plugin_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("installed demo 1.0.0"));

    let skill = temp.path().join(".claude/skills/hello/SKILL.md");
    assert!(skill.is_file());
    assert!(temp.path().join("satchel.lock").is_file());

    satchel_cmd(temp.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("demo"))
        .stdout(predicate::str::contains("1.0.0"));

    satchel_cmd(temp.path())
        .args(["remove", "demo"])
        .assert()
        .success();
    assert!(!skill.exists());
    assert!(!temp.path().join(".claude").exists());
}

#[test]
fn test_install_conflict_fails_without_force() {
    let temp = TempDir::new().expect("temp dir");
    let plugin_dir = write_demo_plugin(temp.path());

    let user_file = temp.path().join(".claude/skills/hello/SKILL.md");
    fs::create_dir_all(user_file.parent().expect("parent")).expect("user dirs");
    fs::write(&user_file, "user content").expect("user file");

    satchel_cmd(temp.path())
        .args(["install", "demo", "--source"])
        .arg(&plugin_dir)
        .assert()
        .failure();
    assert_eq!(
        fs::read_to_string(&user_file).expect("user file intact"),
        "user content"
    );

    satchel_cmd(temp.path())
        .args(["install", "demo", "--force", "--source"])
        .arg(&plugin_dir)
        .assert()
        .success();
    assert_eq!(
        fs::read_to_string(&user_file).expect("installed file"),
        "Hello from demo"
    );
}

#[test]
fn test_install_from_declared_config() {
    let temp = TempDir::new().expect("temp dir");
    let plugin_dir = write_demo_plugin(temp.path());

    fs::write(
        temp.path().join("satchel.toml"),
        format!(
            r#"[project]
platform = "claude"

[plugins]
demo = {{ source = "{}" }}
"#,
            plugin_dir.display()
        ),
    )
    .expect("project config");

    satchel_cmd(temp.path()).arg("install").assert().success();
    assert!(temp.path().join(".claude/skills/hello/SKILL.md").is_file());
}

#[test]
fn test_remove_unknown_plugin_is_not_fatal() {
    let temp = TempDir::new().expect("temp dir");
    satchel_cmd(temp.path())
        .args(["remove", "ghost"])
        .assert()
        .success();
}
