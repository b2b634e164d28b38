//! Commit records and note access (spec §4.2).
//!
//! `read_note`/`append_note`/`add_note` are free functions over a commit
//! id rather than methods monkey-patched onto a commit object, per
//! spec §9's design note.

use crate::git::{driver, GitError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: String,
    pub parents: Vec<String>,
    pub subject: String,
    pub message: String,
}

impl Commit {
    pub fn is_merge(&self) -> bool {
        self.parents.len() >= 2
    }

    pub fn first_parent(&self) -> Option<&str> {
        self.parents.first().map(String::as_str)
    }
}

/// Separator sequence unlikely to appear in a commit subject/body, used to
/// split `git log`'s `--pretty` output back into records. `%x00` between
/// fields, `%x01` between the parent list and records.
const FIELD_SEP: &str = "\x00";
const RECORD_SEP: &str = "\x01";

/// Format string passed to `git log`/`git rev-list --pretty=format:`. Using
/// an explicit NUL/SOH separated format (rather than the default `raw`
/// format) keeps blank lines inside commit messages intact, which the
/// original project's own history shows is otherwise easy to mangle.
pub fn pretty_format() -> String {
    format!("--pretty=format:%H{FIELD_SEP}%P{FIELD_SEP}%s{FIELD_SEP}%B{RECORD_SEP}")
}

/// Parses the output of a `git log`/`git rev-list` invocation built with
/// [`pretty_format`] into [`Commit`] records, in the order git emitted them.
pub fn parse_commits(raw: &str) -> Vec<Commit> {
    raw.split(RECORD_SEP)
        .map(str::trim)
        .filter(|record| !record.is_empty())
        .filter_map(|record| {
            let mut fields = record.splitn(4, FIELD_SEP);
            let id = fields.next()?.trim().to_string();
            if id.is_empty() {
                return None;
            }
            let parents = fields
                .next()?
                .split_whitespace()
                .map(str::to_string)
                .collect();
            let subject = fields.next()?.to_string();
            let message = fields.next().unwrap_or_default().trim_end().to_string();
            Some(Commit {
                id,
                parents,
                subject,
                message,
            })
        })
        .collect()
}

/// Loads commits for the given `rev-list` revision arguments (e.g.
/// `["C..B"]` or `["--topo-order", "A", "B"]`), in rev-list's own order.
pub fn load_commits(rev_args: &[&str]) -> Result<Vec<Commit>, GitError> {
    let fmt = pretty_format();
    let mut args: Vec<&str> = vec!["rev-list"];
    args.push(&fmt);
    args.extend(rev_args.iter().copied());
    let out = driver::run(&args)?;
    Ok(parse_commits(&out.stdout))
}

pub fn read_note(commit: &str, note_ref: &str) -> Result<Option<String>, GitError> {
    driver::notes_show(commit, note_ref)
}

pub fn append_note(commit: &str, message: &str, note_ref: &str) -> Result<(), GitError> {
    driver::notes_append(commit, message, note_ref)
}

pub fn add_note(commit: &str, message: &str, note_ref: &str, force: bool) -> Result<(), GitError> {
    driver::notes_add(commit, message, note_ref, force)
}

/// Returns the footer block of a commit message: the last run of
/// consecutive non-blank lines, reading from the end backward until the
/// first blank line. Gerrit-style `Change-Id:` lines live here.
pub fn footer(message: &str) -> Vec<&str> {
    let lines: Vec<&str> = message.lines().collect();
    let mut end = lines.len();
    while end > 0 && lines[end - 1].trim().is_empty() {
        end -= 1;
    }
    let mut start = end;
    while start > 0 && !lines[start - 1].trim().is_empty() {
        start -= 1;
    }
    lines[start..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_commits_roundtrip() {
        let raw = format!(
            "abc123{FIELD_SEP}def456 789abc{FIELD_SEP}subject line{FIELD_SEP}subject line\n\nbody with\n\nblank lines{RECORD_SEP}"
        );
        let commits = parse_commits(&raw);
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].id, "abc123");
        assert_eq!(commits[0].parents, vec!["def456", "789abc"]);
        assert!(commits[0].message.contains("blank lines"));
        assert!(commits[0].is_merge());
    }

    #[test]
    fn parse_commits_root() {
        let raw = format!("abc123{FIELD_SEP}{FIELD_SEP}subject{FIELD_SEP}subject{RECORD_SEP}");
        let commits = parse_commits(&raw);
        assert_eq!(commits.len(), 1);
        assert!(commits[0].parents.is_empty());
        assert!(!commits[0].is_merge());
    }

    #[test]
    fn footer_extracts_trailing_block() {
        let message = "Subject\n\nBody text here.\n\nChange-Id: Iabc123\nSigned-off-by: x";
        let f = footer(message);
        assert_eq!(f, vec!["Change-Id: Iabc123", "Signed-off-by: x"]);
    }

    #[test]
    fn footer_whole_message_when_no_blank_line() {
        let message = "Subject only";
        assert_eq!(footer(message), vec!["Subject only"]);
    }
}
