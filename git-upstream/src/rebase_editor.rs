//! Rebase editor (spec §4.6): drives `git rebase -i` onto `<import>-base`
//! using a synthetic todo list and a child process acting as the
//! sequence-editor.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::Command;

use defer::defer;
use log::debug;

use crate::git::definitions::{
    GIT_UPSTREAM_TODO_PATH, SEQUENCE_EDITOR_MIN_VERSION, TODO_EPILOGUE_MIN_VERSION,
};
use crate::git::{driver, GitError};

const TODO_EPILOGUE: &str = "\n\n# Rebase %SHORTREVISIONS% onto %SHORTONTO%\n#\n\
# All commands from normal rebase instructions files are supported\n#\n\
# If you remove a line, that commit will be dropped.\n\
# Removing all commits will abort the rebase.\n#\n";

/// Pre-2.6.0 git never learned to render `%SHORTREVISIONS%..%SHORTONTO%` in
/// its own todo epilogue, so ours stays silent about it rather than
/// doubling up on a range git already can't describe the same way.
const TODO_EPILOGUE_LEGACY: &str = "\n\n# All commands from normal rebase instructions files are supported\n#\n\
# If you remove a line, that commit will be dropped.\n\
# Removing all commits will abort the rebase.\n#\n";

pub enum InteractiveMode {
    NonInteractive,
    Interactive,
    /// Same protocol as `Interactive` but runs as an ordinary subprocess
    /// instead of replacing the process image, so tests can capture output
    /// deterministically. Selected via `TEST_GIT_UPSTREAM_REBASE_EDITOR`.
    Debug,
}

pub struct RebaseOutcome {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

pub struct RebaseEditor {
    finish_args: Vec<String>,
    mode: InteractiveMode,
    self_exe: PathBuf,
    git_version: (u32, u32, u32),
}

fn todo_path() -> Result<PathBuf, GitError> {
    let git_dir = driver::run(&["rev-parse", "--git-dir"])?.stdout.trim().to_string();
    Ok(PathBuf::from(git_dir).join(GIT_UPSTREAM_TODO_PATH))
}

/// Removes the custom todo file, if one is still present. Safe to call from
/// any process that might have driven or inherited a rebase started by
/// `RebaseEditor::run`, including a fresh `--finish` process spawned after
/// an `Interactive`-mode `exec()` replaced this one before it could clean up.
pub fn cleanup_todo_file() {
    if let Ok(path) = todo_path() {
        let _ = std::fs::remove_file(path);
    }
}

fn shorten(commit: Option<&str>) -> String {
    match commit {
        None => "<none>".to_string(),
        Some(id) => driver::rev_parse_short(id).unwrap_or_else(|_| id.to_string()),
    }
}

impl RebaseEditor {
    pub fn new(finish_args: Vec<String>, mode: InteractiveMode, git_version: (u32, u32, u32)) -> Self {
        RebaseEditor {
            finish_args,
            mode,
            self_exe: std::env::current_exe().unwrap_or_else(|_| PathBuf::from("git-upstream")),
            git_version,
        }
    }

    /// Writes the todo file: one `pick` line per commit in input order,
    /// then an `exec` line re-invoking this binary with `--finish` (unless
    /// the test harness asks for a bare todo file), then the epilogue.
    fn write_todo(&self, commits: &[crate::commit::Commit], onto: &str) -> Result<PathBuf, GitError> {
        let path = todo_path()?;
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut root: Option<&str> = None;
        let mut tip: Option<&str> = None;
        let mut body = String::new();
        for commit in commits {
            if root.is_none() {
                root = commit.first_parent();
            }
            tip = Some(commit.id.as_str());
            let short = shorten(Some(&commit.id));
            body.push_str(&format!("pick {short} {}\n", commit.subject));
        }

        let test_mode = std::env::var("TEST_GIT_UPSTREAM_REBASE_EDITOR").unwrap_or_default();
        if test_mode != "1" && !self.finish_args.is_empty() {
            body.push_str(&format!("exec {}", self.finish_args.join(" ")));
        } else if root.is_none() {
            body.push_str("noop\n");
        }

        let epilogue = if self.git_version >= TODO_EPILOGUE_MIN_VERSION {
            TODO_EPILOGUE
                .replace("%SHORTREVISIONS%", &format!("{}..{}", shorten(root), shorten(tip)))
                .replace("%SHORTONTO%", &shorten(Some(onto)))
        } else {
            TODO_EPILOGUE_LEGACY.to_string()
        };
        body.push_str(&epilogue);

        std::fs::write(&path, body)?;
        Ok(path)
    }

    pub fn cleanup(&self) {
        cleanup_todo_file();
    }

    fn sequence_editor_env(&self, editor: &str) -> Vec<(String, String)> {
        let mut env = Vec::new();
        if self.git_version >= SEQUENCE_EDITOR_MIN_VERSION {
            env.push(("GIT_SEQUENCE_EDITOR".to_string(), editor.to_string()));
        } else if let Ok(preferred) = std::env::var("GIT_EDITOR") {
            env.push(("GIT_UPSTREAM_GIT_EDITOR".to_string(), preferred));
            env.push(("GIT_EDITOR".to_string(), editor.to_string()));
        } else {
            env.push(("GIT_EDITOR".to_string(), editor.to_string()));
        }
        env
    }

    /// Writes the todo list, then drives `git rebase -i --onto <onto>
    /// <first_parent> <import_branch>` through whichever of the three
    /// execution modes was selected at construction.
    pub fn run(
        &self,
        commits: &[crate::commit::Commit],
        first_parent: &str,
        import_branch: &str,
        onto: &str,
    ) -> Result<RebaseOutcome, GitError> {
        let todo_file = self.write_todo(commits, onto)?;

        if matches!(self.mode, InteractiveMode::Interactive) {
            if let Ok(editor) = std::env::var("GIT_SEQUENCE_EDITOR").or_else(|_| std::env::var("EDITOR")) {
                let status = Command::new("sh")
                    .arg("-c")
                    .arg(format!("{editor} {}", todo_file.display()))
                    .status();
                match status {
                    Ok(s) if !s.success() => {
                        return Ok(RebaseOutcome {
                            status: s.code().unwrap_or(1),
                            stdout: String::new(),
                            stderr: "Editor returned non-zero exit code".to_string(),
                        });
                    }
                    Err(e) => return Err(GitError::Io(e)),
                    _ => {}
                }
            }
        }

        let editor_cmd = format!(
            "{} __rebase-editor {}",
            self.self_exe.display(),
            todo_file.display()
        );
        let env = self.sequence_editor_env(&editor_cmd);
        let env_refs: Vec<(&str, &str)> = env.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

        let args = ["--interactive", "--onto", onto, first_parent, import_branch];

        match self.mode {
            InteractiveMode::Debug | InteractiveMode::NonInteractive => {
                defer!(self.cleanup());
                if matches!(self.mode, InteractiveMode::Debug) {
                    debug!("rebase-editor debug mode: running rebase as captured subprocess");
                }
                let (status, stdout, stderr) = driver::rebase_capture(&args, &env_refs);
                Ok(RebaseOutcome { status, stdout, stderr })
            }
            InteractiveMode::Interactive => self.exec_replace(&args, &env),
        }
    }

    #[cfg(unix)]
    fn exec_replace(&self, args: &[&str], env: &[(String, String)]) -> Result<RebaseOutcome, GitError> {
        use std::os::unix::process::CommandExt;
        let mut cmd = Command::new("git");
        cmd.arg("rebase").args(args).envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        // Replaces this process; only returns on failure to exec.
        let err = cmd.exec();
        Err(GitError::Io(err))
    }

    #[cfg(not(unix))]
    fn exec_replace(&self, args: &[&str], env: &[(String, String)]) -> Result<RebaseOutcome, GitError> {
        let env_refs: Vec<(&str, &str)> = env.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let (status, stdout, stderr) = driver::rebase_capture(args, &env_refs);
        self.cleanup();
        Ok(RebaseOutcome { status, stdout, stderr })
    }
}

/// Entry point for the hidden `__rebase-editor <path>` subcommand: git
/// invokes this once per file it wants edited. Distinguish the rebase
/// todo file from a commit-message file by basename; only the todo file
/// is ours to rewrite.
pub fn run_editor_helper(path: &std::path::Path) -> std::io::Result<()> {
    let basename = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if basename == "COMMIT_EDITMSG" {
        if let Ok(preferred) = std::env::var("GIT_UPSTREAM_GIT_EDITOR") {
            let status = Command::new("sh")
                .arg("-c")
                .arg(format!("{preferred} {}", path.display()))
                .status()?;
            if !status.success() {
                return Err(std::io::Error::other("preferred editor failed"));
            }
        }
        return Ok(());
    }

    let prepared = todo_path().map_err(std::io::Error::other)?;
    let contents = std::fs::read_to_string(&prepared)?;
    let mut file = std::fs::OpenOptions::new().write(true).truncate(true).open(path)?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorten_none_is_placeholder() {
        assert_eq!(shorten(None), "<none>");
    }
}
