//! Filter chain (spec §4.4): each filter consumes a lazy commit sequence
//! and emits a lazy commit sequence. Polymorphism across filters is a
//! single capability, `Filter::apply`, rather than a class hierarchy.

use std::collections::HashSet;

use regex::Regex;

use crate::commit::{self, Commit};
use crate::git::{definitions, driver, GitError};

pub type CommitIter = Box<dyn Iterator<Item = Commit>>;

pub trait Filter {
    fn apply(&self, commits: CommitIter) -> Result<CommitIter, GitError>;
}

/// Emit only commits with fewer than two parents.
pub struct NoMergeCommitFilter;

impl Filter for NoMergeCommitFilter {
    fn apply(&self, commits: CommitIter) -> Result<CommitIter, GitError> {
        Ok(Box::new(commits.filter(|c| !c.is_merge())))
    }
}

/// Materialises the input and emits it in reverse order. Must run last,
/// since every filter after it would otherwise see stale ordering.
pub struct ReverseCommitFilter;

impl Filter for ReverseCommitFilter {
    fn apply(&self, commits: CommitIter) -> Result<CommitIter, GitError> {
        let mut collected: Vec<Commit> = commits.collect();
        collected.reverse();
        Ok(Box::new(collected.into_iter()))
    }
}

/// Skips commits whose note in the annotation namespace carries a
/// `Dropped:` header.
pub struct DroppedCommitFilter {
    pub note_ref: String,
}

impl Default for DroppedCommitFilter {
    fn default() -> Self {
        DroppedCommitFilter {
            note_ref: definitions::NOTE_REF.to_string(),
        }
    }
}

impl Filter for DroppedCommitFilter {
    fn apply(&self, commits: CommitIter) -> Result<CommitIter, GitError> {
        let note_ref = self.note_ref.clone();
        let pattern = Regex::new(&format!("(?im)^{}", regex::escape(definitions::DROPPED_HEADER))).unwrap();
        let mut out = Vec::new();
        for commit in commits {
            let note = commit::read_note(&commit.id, &note_ref)?;
            let dropped = note.as_deref().is_some_and(|n| pattern.is_match(n));
            if !dropped {
                out.push(commit);
            }
        }
        Ok(Box::new(out.into_iter()))
    }
}

/// Collects the footer `Change-Id:` values present anywhere in
/// `limit..search_ref`, used by both duplicate-detection filters below.
fn change_ids_in_range(limit: &str, search_ref: &str) -> Result<HashSet<String>, GitError> {
    let commits = commit::load_commits(&[&format!("{limit}..{search_ref}")])?;
    let change_id_line = Regex::new(r"(?i)^Change-Id:\s*(\S+)\s*$").unwrap();
    let mut ids = HashSet::new();
    for c in commits {
        for line in commit::footer(&c.message) {
            if let Some(caps) = change_id_line.captures(line.trim()) {
                ids.insert(caps[1].to_string());
            }
        }
    }
    Ok(ids)
}

fn footer_change_id(message: &str) -> Option<String> {
    let change_id_line = Regex::new(r"(?i)^Change-Id:\s*(\S+)\s*$").unwrap();
    commit::footer(message)
        .into_iter()
        .find_map(|line| change_id_line.captures(line.trim()).map(|c| c[1].to_string()))
}

/// Drops a commit when its footer `Change-Id` also appears in the footer
/// of some commit in `limit..search_ref`.
pub struct DiscardDuplicateGerritChangeId {
    pub search_ref: String,
    pub limit: String,
}

impl Filter for DiscardDuplicateGerritChangeId {
    fn apply(&self, commits: CommitIter) -> Result<CommitIter, GitError> {
        let known = change_ids_in_range(&self.limit, &self.search_ref)?;
        let mut out = Vec::new();
        for commit in commits {
            let duplicate = footer_change_id(&commit.message)
                .map(|id| known.contains(&id))
                .unwrap_or(false);
            if !duplicate {
                out.push(commit);
            }
        }
        Ok(Box::new(out.into_iter()))
    }
}

/// Drops a commit only when every `Superseded-by:` change-id in its note
/// is resolved (found in the footer of some commit in `limit..search_ref`).
pub struct SupersededCommitFilter {
    pub search_ref: String,
    pub limit: String,
    pub note_ref: String,
}

impl SupersededCommitFilter {
    pub fn new(search_ref: impl Into<String>, limit: impl Into<String>) -> Self {
        SupersededCommitFilter {
            search_ref: search_ref.into(),
            limit: limit.into(),
            note_ref: definitions::NOTE_REF.to_string(),
        }
    }
}

impl Filter for SupersededCommitFilter {
    fn apply(&self, commits: CommitIter) -> Result<CommitIter, GitError> {
        let known = change_ids_in_range(&self.limit, &self.search_ref)?;
        let header_line =
            Regex::new(&format!("(?im)^{}\\s*(.+)$", regex::escape(definitions::SUPERSEDE_HEADER))).unwrap();

        let mut out = Vec::new();
        for commit in commits {
            let note = driver::notes_show(&commit.id, &self.note_ref)?;
            let Some(note) = note else {
                out.push(commit);
                continue;
            };
            let superseding: Vec<String> = header_line
                .captures_iter(&note)
                .map(|c| c[1].trim().to_string())
                .collect();
            if superseding.is_empty() {
                out.push(commit);
                continue;
            }
            let all_resolved = superseding.iter().all(|id| known.contains(id));
            if !all_resolved {
                out.push(commit);
            }
        }
        Ok(Box::new(out.into_iter()))
    }
}

/// Runs a sequence of filters over a commit iterator, in order.
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        FilterChain { filters }
    }

    pub fn apply(&self, mut commits: CommitIter) -> Result<CommitIter, GitError> {
        for filter in &self.filters {
            commits = filter.apply(commits)?;
        }
        Ok(commits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(id: &str, parents: &[&str], message: &str) -> Commit {
        Commit {
            id: id.to_string(),
            parents: parents.iter().map(|s| s.to_string()).collect(),
            subject: message.lines().next().unwrap_or_default().to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn no_merge_filter_drops_merges() {
        let commits = vec![
            commit("a", &[], "a"),
            commit("b", &["a", "x"], "merge"),
            commit("c", &["a"], "c"),
        ];
        let filtered: Vec<_> = NoMergeCommitFilter
            .apply(Box::new(commits.into_iter()))
            .unwrap()
            .collect();
        assert_eq!(filtered.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn reverse_filter_reverses_order() {
        let commits = vec![commit("a", &[], "a"), commit("b", &["a"], "b")];
        let filtered: Vec<_> = ReverseCommitFilter
            .apply(Box::new(commits.into_iter()))
            .unwrap()
            .collect();
        assert_eq!(filtered.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn footer_change_id_extracts_id() {
        let message = "Subject\n\nBody\n\nChange-Id: I0123456789abcdef\n";
        assert_eq!(footer_change_id(message), Some("I0123456789abcdef".to_string()));
    }

    #[test]
    fn footer_change_id_absent() {
        assert_eq!(footer_change_id("Subject only"), None);
    }
}
