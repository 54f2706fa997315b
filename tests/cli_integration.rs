//! End-to-end tests of the `gitdeck` binary.
//!
//! Each test gets its own home, config and workspace so nothing from the
//! machine running the tests leaks in.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct CliEnv {
    dir: TempDir,
    config: PathBuf,
}

impl CliEnv {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.toml");
        std::fs::write(
            &config,
            format!(
                "workspace = \"{}\"\n\n[author]\nname = \"CLI Tester\"\nemail = \"cli@example.com\"\n\n[secrets]\nprovider = \"memory\"\n",
                dir.path().join("deck").display()
            ),
        )
        .unwrap();
        Self { dir, config }
    }

    /// `gitdeck` acting as `user`.
    fn as_user(&self, user: &str) -> Command {
        let mut cmd = Command::cargo_bin("gitdeck").unwrap();
        cmd.env("HOME", self.dir.path())
            .env("XDG_CONFIG_HOME", self.dir.path().join("xdg"))
            .env_remove("GITDECK_CONFIG")
            .env_remove("GITDECK_PROJECT")
            .env_remove("GITDECK_LOG")
            .env_remove("GITDECK_TOKEN")
            .arg("--config")
            .arg(&self.config)
            .args(["--user", user]);
        cmd
    }

    fn alice(&self) -> Command {
        self.as_user("alice")
    }

    fn project_dir(&self, name: &str) -> PathBuf {
        self.dir.path().join("deck").join("projects").join(name)
    }
}

fn json(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).expect("stdout is JSON")
}

fn write(dir: &Path, path: &str, content: &str) {
    std::fs::write(dir.join(path), content).unwrap();
}

#[test]
fn version_flag_works() {
    Command::cargo_bin("gitdeck")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("gitdeck"));
}

#[test]
fn help_lists_commands() {
    Command::cargo_bin("gitdeck")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("projects"))
        .stdout(predicate::str::contains("pull"));
}

#[test]
fn workspace_reports_available() {
    let env = CliEnv::new();
    let out = env.alice().arg("available").assert().success();
    assert_eq!(json(&out.get_output().stdout)["available"], true);
}

#[test]
fn edit_commit_and_read_back() {
    let env = CliEnv::new();
    env.alice()
        .args(["projects", "create", "notes", "--template", "-d", "Notes"])
        .assert()
        .success();
    env.alice()
        .args(["projects", "activate", "notes"])
        .assert()
        .success();

    write(&env.project_dir("notes"), "todo.md", "- ship\n");
    env.alice().args(["stage", "todo.md"]).assert().success();
    let out = env
        .alice()
        .args(["commit", "-m", "Add todo"])
        .assert()
        .success();
    assert_eq!(json(&out.get_output().stdout)["summary"], "Add todo");

    let out = env.alice().args(["log", "-n", "1"]).assert().success();
    let page = json(&out.get_output().stdout);
    assert_eq!(page["commits"][0]["summary"], "Add todo");
    assert!(!page["next"].is_null());

    env.alice()
        .args(["cat", "todo.md", "--from", "head"])
        .assert()
        .success()
        .stdout("- ship\n");

    let out = env.alice().arg("status").assert().success();
    let status = json(&out.get_output().stdout);
    assert_eq!(status["branch"], "main");
    assert_eq!(status["merge"]["state"], "clean");
}

#[test]
fn project_flag_overrides_active() {
    let env = CliEnv::new();
    env.alice()
        .args(["projects", "create", "one"])
        .assert()
        .success();
    let out = env
        .as_user("bob")
        .args(["--project", "one", "branches"])
        .assert()
        .success();
    assert!(json(&out.get_output().stdout).is_array());
}

#[test]
fn missing_project_is_not_found() {
    let env = CliEnv::new();
    env.alice()
        .args(["projects", "show", "ghost"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("not_found"));
}

#[test]
fn no_active_project_is_reported() {
    let env = CliEnv::new();
    env.as_user("bob")
        .arg("status")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("active project"));
}

#[test]
fn invalid_names_are_invalid_input() {
    let env = CliEnv::new();
    env.alice()
        .args(["projects", "create", "../escape"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("invalid_argument"));
}

#[test]
fn delete_active_project_is_refused() {
    let env = CliEnv::new();
    env.alice()
        .args(["projects", "create", "notes"])
        .assert()
        .success();
    env.alice()
        .args(["projects", "activate", "notes"])
        .assert()
        .success();
    env.alice()
        .args(["projects", "delete", "notes"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("active_project_busy"));

    // bob may delete it while nobody is working on it
    env.as_user("bob")
        .args(["projects", "delete", "notes"])
        .assert()
        .success();
    let out = env.alice().args(["projects", "active"]).assert().success();
    assert!(json(&out.get_output().stdout).is_null());
}

#[test]
fn quiet_suppresses_output() {
    let env = CliEnv::new();
    env.alice()
        .args(["-q", "projects", "create", "notes"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn config_show_reflects_file() {
    let env = CliEnv::new();
    let out = env.alice().args(["config", "show"]).assert().success();
    let config = json(&out.get_output().stdout);
    assert_eq!(config["default_branch"], "main");
    assert_eq!(config["secrets"]["provider"], "memory");
    assert_eq!(config["author"]["name"], "CLI Tester");
}

#[test]
fn completion_generates_script() {
    Command::cargo_bin("gitdeck")
        .unwrap()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gitdeck"));
}
