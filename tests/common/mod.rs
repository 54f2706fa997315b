//! Shared fixtures for integration tests.
//!
//! A [`TestDeck`] is a workspace in a temporary directory with an engine
//! over it. Remotes are bare repositories created with the `git` binary.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;

use gitdeck::core::active::GitCheckout;
use gitdeck::core::config::{AuthorConfig, Config, GlobalConfig};
use gitdeck::core::types::{BranchName, ProjectName, UserId};
use gitdeck::engine::{Engine, ProjectSource, ProjectSpec};
use gitdeck::secrets::MemorySecretStore;

pub const AUTHOR_NAME: &str = "Deck Tester";
pub const AUTHOR_EMAIL: &str = "tester@example.com";

/// A workspace with an engine over it.
pub struct TestDeck {
    pub dir: TempDir,
    pub engine: Engine,
    pub secrets: Arc<MemorySecretStore>,
}

impl TestDeck {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let secrets = Arc::new(MemorySecretStore::new());
        let engine = Self::engine_at(dir.path(), Arc::clone(&secrets));
        Self {
            dir,
            engine,
            secrets,
        }
    }

    /// Configuration pointing at `workspace`, with a commit identity.
    pub fn config(workspace: &Path) -> Config {
        Config::from_global(GlobalConfig {
            workspace: Some(workspace.join("deck").to_string_lossy().into_owned()),
            author: Some(AuthorConfig {
                name: Some(AUTHOR_NAME.to_string()),
                email: Some(AUTHOR_EMAIL.to_string()),
            }),
            ..GlobalConfig::default()
        })
        .expect("valid config")
    }

    fn engine_at(root: &Path, secrets: Arc<MemorySecretStore>) -> Engine {
        Engine::with_components(Self::config(root), secrets, Arc::new(GitCheckout))
            .expect("engine")
    }

    /// A second engine over the same workspace, as after a restart.
    pub fn reopen(&self) -> Engine {
        Self::engine_at(self.dir.path(), Arc::clone(&self.secrets))
    }

    /// A template project: one commit of README.md and .gitignore.
    pub async fn project(&self, user: &UserId, name: &str) -> ProjectName {
        let name = project(name);
        let spec = ProjectSpec {
            name: name.clone(),
            description: String::new(),
            source: ProjectSource::Template {
                files: Default::default(),
            },
        };
        self.engine
            .create_project(user, spec)
            .await
            .expect("create project");
        name
    }

    pub fn project_path(&self, name: &ProjectName) -> PathBuf {
        self.engine.paths().project_dir(name)
    }

    /// Write a file into a project's working tree.
    pub fn write(&self, name: &ProjectName, path: &str, content: &str) {
        let full = self.project_path(name).join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
    }

    pub fn read(&self, name: &ProjectName, path: &str) -> String {
        std::fs::read_to_string(self.project_path(name).join(path)).unwrap()
    }

    /// Stage `path` with `content` and commit it through the engine.
    pub async fn commit_file(
        &self,
        user: &UserId,
        name: &ProjectName,
        path: &str,
        content: &str,
        message: &str,
    ) {
        self.write(name, path, content);
        self.engine
            .stage_files(user, name, vec![path.to_string()])
            .await
            .expect("stage");
        self.engine
            .commit(user, name, message)
            .await
            .expect("commit");
    }
}

pub fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

pub fn project(name: &str) -> ProjectName {
    ProjectName::new(name).unwrap()
}

pub fn branch(name: &str) -> BranchName {
    BranchName::new(name).unwrap()
}

/// Run git in `dir`, panicking on failure, and return stdout.
pub fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", &format!("user.name={AUTHOR_NAME}")])
        .args(["-c", &format!("user.email={AUTHOR_EMAIL}")])
        .args(["-c", "init.defaultBranch=main"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// An empty bare repository with `main` as its default branch.
pub fn bare_remote(root: &Path, name: &str) -> PathBuf {
    let path = root.join(format!("{name}.git"));
    std::fs::create_dir_all(&path).unwrap();
    run_git(&path, &["init", "--bare"]);
    run_git(&path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    path
}

/// Commit `files` to `branch` of `remote` from a scratch clone.
pub fn push_to_remote(remote: &Path, branch: &str, files: &[(&str, &str)], message: &str) {
    let scratch = TempDir::new().unwrap();
    let work = scratch.path().join("work");
    run_git(
        scratch.path(),
        &["clone", "-q", &remote.to_string_lossy(), "work"],
    );
    let has_remote_branch = run_git(&work, &["branch", "-r"]).contains(&format!("origin/{branch}"));
    if has_remote_branch {
        run_git(&work, &["checkout", "-q", "-B", branch, &format!("origin/{branch}")]);
    } else {
        // empty remote: start the branch unborn
        run_git(&work, &["symbolic-ref", "HEAD", &format!("refs/heads/{branch}")]);
    }
    for (path, content) in files {
        let full = work.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
        run_git(&work, &["add", path]);
    }
    run_git(&work, &["commit", "-q", "-m", message]);
    run_git(&work, &["push", "-q", "origin", &format!("HEAD:refs/heads/{branch}")]);
}

/// Tip of `branch` in a bare repository.
pub fn remote_tip(remote: &Path, branch: &str) -> String {
    run_git(remote, &["rev-parse", &format!("refs/heads/{branch}")])
}
