//! Higher-level git operations built on top of [`super::lowlevel`].
//!
//! Argument order matters for some of these (notably `rev-list --not …`);
//! every helper here passes its arguments through in the order the caller
//! gave them rather than collecting them into a map and re-emitting them.

use super::lowlevel::{capture_git_output, feed_git_command};
use super::types::{GitError, GitOutput, Reference};

pub fn run(args: &[&str]) -> Result<GitOutput, GitError> {
    capture_git_output(args)
}

pub fn rev_parse(rev: &str) -> Result<String, GitError> {
    let out = capture_git_output(&["rev-parse", "--verify", "-q", rev]).map_err(|e| match e {
        GitError::ExecError { .. } => GitError::MissingRef {
            refname: rev.to_string(),
        },
        other => other,
    })?;
    Ok(out.stdout.trim().to_string())
}

pub fn rev_parse_short(rev: &str) -> Result<String, GitError> {
    let out = capture_git_output(&["rev-parse", "--short", rev])?;
    Ok(out.stdout.trim().to_string())
}

/// `git for-each-ref` over the given patterns, NUL-separated
/// `%(refname)\t%(objectname)` format for unambiguous parsing.
pub fn for_each_ref(patterns: &[String]) -> Result<Vec<Reference>, GitError> {
    let mut args: Vec<&str> = vec!["for-each-ref", "--format=%(refname)%09%(objectname)"];
    args.extend(patterns.iter().map(String::as_str));
    let out = capture_git_output(&args)?;
    Ok(out
        .stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(2, '\t');
            let refname = parts.next()?.to_string();
            let oid = parts.next()?.to_string();
            Some(Reference { refname, oid })
        })
        .collect())
}

pub fn rev_list(args: &[&str]) -> Result<Vec<String>, GitError> {
    let mut full: Vec<&str> = vec!["rev-list"];
    full.extend(args.iter().copied());
    let out = capture_git_output(&full)?;
    Ok(out.stdout.lines().map(str::to_string).collect())
}

/// Returns `None` when there is no common ancestor (git exits non-zero).
pub fn merge_base(a: &str, b: &str) -> Result<Option<String>, GitError> {
    match capture_git_output(&["merge-base", a, b]) {
        Ok(out) => Ok(Some(out.stdout.trim().to_string())),
        Err(GitError::ExecError { code: Some(1), .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn describe(args: &[&str]) -> Result<String, GitError> {
    let mut full: Vec<&str> = vec!["describe"];
    full.extend(args.iter().copied());
    let out = capture_git_output(&full)?;
    Ok(out.stdout.trim().to_string())
}

pub fn show_ref_exists(refname: &str) -> bool {
    capture_git_output(&["show-ref", "--verify", "--quiet", refname]).is_ok()
}

pub fn show_ref_is_tag(refname: &str) -> bool {
    capture_git_output(&["show-ref", "--verify", "--quiet", &format!("refs/tags/{refname}")]).is_ok()
}

pub fn symbolic_ref(name: &str) -> Result<Option<String>, GitError> {
    match capture_git_output(&["symbolic-ref", "-q", name]) {
        Ok(out) => Ok(Some(out.stdout.trim().to_string())),
        Err(GitError::ExecError { code: Some(1), .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn is_detached() -> bool {
    symbolic_ref("HEAD").ok().flatten().is_none()
}

pub fn current_branch() -> Result<Option<String>, GitError> {
    Ok(symbolic_ref("HEAD")?.map(|r| r.trim_start_matches("refs/heads/").to_string()))
}

pub fn notes_show(commit: &str, note_ref: &str) -> Result<Option<String>, GitError> {
    match capture_git_output(&["notes", "--ref", note_ref, "show", commit]) {
        Ok(out) => Ok(Some(out.stdout)),
        Err(GitError::ExecError { code: Some(1), .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn notes_append(commit: &str, message: &str, note_ref: &str) -> Result<(), GitError> {
    capture_git_output(&["notes", "--ref", note_ref, "append", "-m", message, commit])?;
    Ok(())
}

pub fn notes_add(commit: &str, message: &str, note_ref: &str, force: bool) -> Result<(), GitError> {
    if force {
        capture_git_output(&["notes", "--ref", note_ref, "add", "-f", "-m", message, commit])?;
        return Ok(());
    }
    match capture_git_output(&["notes", "--ref", note_ref, "add", "-m", message, commit]) {
        Ok(_) => Ok(()),
        Err(GitError::ExecError { code: Some(1), .. }) => Err(GitError::NoteAlreadyExists),
        Err(e) => Err(e),
    }
}

pub fn branch_force(name: &str, commit: &str) -> Result<(), GitError> {
    capture_git_output(&["branch", "--force", name, commit])?;
    Ok(())
}

pub fn checkout(args: &[&str]) -> Result<GitOutput, GitError> {
    let mut full: Vec<&str> = vec!["checkout"];
    full.extend(args.iter().copied());
    capture_git_output(&full)
}

pub fn reset_hard(commit: &str) -> Result<(), GitError> {
    capture_git_output(&["reset", "--hard", commit])?;
    Ok(())
}

pub fn merge(args: &[&str]) -> Result<GitOutput, GitError> {
    let mut full: Vec<&str> = vec!["merge"];
    full.extend(args.iter().copied());
    capture_git_output(&full)
}

pub fn read_tree(args: &[&str]) -> Result<(), GitError> {
    let mut full: Vec<&str> = vec!["read-tree"];
    full.extend(args.iter().copied());
    capture_git_output(&full)?;
    Ok(())
}

pub fn commit(args: &[&str]) -> Result<(), GitError> {
    let mut full: Vec<&str> = vec!["commit"];
    full.extend(args.iter().copied());
    capture_git_output(&full)?;
    Ok(())
}

pub fn tree_of(commit: &str) -> Result<String, GitError> {
    rev_parse(&format!("{commit}^{{tree}}"))
}

pub fn config_get(key: &str) -> Result<Option<String>, GitError> {
    match capture_git_output(&["config", key]) {
        Ok(out) => Ok(Some(out.stdout.trim().to_string())),
        Err(GitError::ExecError { code: Some(1), .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Runs `git rebase` with the given positional/flag arguments, capturing
/// output instead of attaching to the terminal. Interactive replacement of
/// the current process is handled by the rebase editor module, not here.
pub fn rebase_capture(args: &[&str], env: &[(&str, &str)]) -> (i32, String, String) {
    use std::process::{Command, Stdio};
    let mut cmd = Command::new("git");
    cmd.arg("rebase")
        .args(args)
        .envs(env.iter().copied())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    match cmd.output() {
        Ok(out) => (
            out.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&out.stdout).into_owned(),
            String::from_utf8_lossy(&out.stderr).into_owned(),
        ),
        Err(e) => (-1, String::new(), e.to_string()),
    }
}

pub fn rebase_abort() {
    let _ = capture_git_output(&["rebase", "--abort"]);
}

/// Batch ref mutation via `update-ref --stdin`, used where the importer
/// wants an all-or-nothing ref transaction.
pub fn update_ref_stdin(commands: &str) -> Result<(), GitError> {
    feed_git_command(&["update-ref", "--stdin"], commands)?;
    Ok(())
}
