//! Architecture enforcement tests.
//!
//! The layering rules are easy to erode one convenient import at a time.
//! These tests read the source tree and fail when:
//!
//! 1. **git2 leaks** - anything outside `src/git/` names `git2`
//! 2. **CLI reaches past the engine** - a command handler opens a
//!    repository or touches the registry directly

use std::fs;
use std::path::{Path, PathBuf};

fn rust_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

fn src() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src")
}

#[test]
fn git2_is_confined_to_the_git_module() {
    let git_dir = src().join("git");
    let offenders: Vec<PathBuf> = rust_files(&src())
        .into_iter()
        .filter(|path| !path.starts_with(&git_dir))
        .filter(|path| fs::read_to_string(path).unwrap().contains("git2::"))
        .collect();
    assert!(
        offenders.is_empty(),
        "git2 used outside src/git: {offenders:?}"
    );
}

#[test]
fn cli_goes_through_the_engine() {
    const FORBIDDEN: &[&str] = &["Git::open", "ProjectRegistry", "RegistryStore", "OperationSerializer"];
    let mut offenders = Vec::new();
    for path in rust_files(&src().join("cli")) {
        let source = fs::read_to_string(&path).unwrap();
        for pattern in FORBIDDEN {
            if source.contains(pattern) {
                offenders.push(format!("{}: {pattern}", path.display()));
            }
        }
    }
    assert!(offenders.is_empty(), "CLI bypasses the engine: {offenders:?}");
}
