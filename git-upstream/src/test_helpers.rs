//! Centralized test helpers for git-upstream: hermetic git environment
//! setup and repository fixtures shared by unit and integration tests.

use std::env;
use std::path::Path;
use std::process::{Command, Stdio};

use tempfile::{tempdir, TempDir};

/// Hermetic git environment variables: isolates test repos from the
/// user's global/system git config and pins author/committer identity so
/// commit ids are reproducible across runs.
pub fn hermetic_git_env_vars() -> [(&'static str, &'static str); 6] {
    [
        ("GIT_CONFIG_NOSYSTEM", "true"),
        ("GIT_CONFIG_GLOBAL", "/dev/null"),
        ("GIT_AUTHOR_NAME", "testuser"),
        ("GIT_AUTHOR_EMAIL", "testuser@example.com"),
        ("GIT_COMMITTER_NAME", "testuser"),
        ("GIT_COMMITTER_EMAIL", "testuser@example.com"),
    ]
}

pub fn hermetic_git_env() {
    for (k, v) in hermetic_git_env_vars() {
        env::set_var(k, v);
    }
}

/// Runs a git command in `dir` under the hermetic environment, panicking
/// on failure. For fixture setup only; production code never panics.
pub fn run_git_command(args: &[&str], dir: &Path) {
    assert!(Command::new("git")
        .args(args)
        .envs(hermetic_git_env_vars())
        .current_dir(dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("failed to spawn git")
        .success());
}

pub fn commit_file(dir: &Path, name: &str, contents: &str, message: &str) {
    std::fs::write(dir.join(name), contents).expect("failed to write fixture file");
    run_git_command(&["add", name], dir);
    run_git_command(&["commit", "-m", message], dir);
}

/// Bare `git init` plus one empty commit on `master`.
pub fn init_repo(dir: &Path) {
    run_git_command(&["init", "--initial-branch", "master"], dir);
    run_git_command(&["commit", "--allow-empty", "-m", "Initial commit"], dir);
}

pub fn dir_with_repo() -> TempDir {
    let tempdir = tempdir().unwrap();
    init_repo(tempdir.path());
    tempdir
}

/// Creates a tracking branch `name` at the current `HEAD`, mimicking a
/// vendored `upstream/*` remote-tracking ref without a real remote.
pub fn make_upstream_branch(dir: &Path, name: &str) {
    run_git_command(&["update-ref", &format!("refs/remotes/{name}"), "HEAD"], dir);
}

pub fn write_gitupstreamconfig(dir: &Path, content: &str) {
    std::fs::write(dir.join(".gitupstreamconfig"), content).expect("failed to write .gitupstreamconfig");
}

/// RAII guard restoring the process's current directory on drop, so a
/// test that `chdir`s into a fixture doesn't leak that into later tests.
pub struct DirGuard {
    original_dir: std::path::PathBuf,
}

impl DirGuard {
    pub fn new(new_dir: &Path) -> Self {
        let original_dir = env::current_dir().expect("failed to read current directory");
        env::set_current_dir(new_dir).expect("failed to change directory");
        DirGuard { original_dir }
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        let _ = env::set_current_dir(&self.original_dir);
    }
}

/// Hermetic-env repo fixture with the current directory switched into it
/// for the duration of the closure.
pub fn with_isolated_cwd_git<F, R>(f: F) -> R
where
    F: FnOnce(&Path) -> R,
{
    hermetic_git_env();
    let temp_dir = dir_with_repo();
    let _guard = DirGuard::new(temp_dir.path());
    f(temp_dir.path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_with_repo() {
        let repo = dir_with_repo();
        let out = Command::new("git")
            .args(["rev-parse", "--is-inside-work-tree"])
            .current_dir(repo.path())
            .output()
            .unwrap();
        assert!(out.status.success());
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "true");
    }
}
