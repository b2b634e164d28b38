//! `supersede` (spec §4.8): mark a commit as superseded by upstream
//! change-ids.

use regex::Regex;

use crate::error::{Error, Result};
use crate::git::{definitions, driver};

fn change_id_pattern() -> Regex {
    Regex::new(definitions::CHANGE_ID_PATTERN).unwrap()
}

fn found_in_branch(change_id: &str, upstream_branch: &str) -> Result<bool> {
    let pattern = format!("^Change-Id:\\s*{}$", regex::escape(change_id));
    let out = driver::run(&[
        "log",
        "--extended-regexp",
        &format!("--grep={pattern}"),
        "--max-count=1",
        "--pretty=%H",
        upstream_branch,
    ])?;
    Ok(!out.stdout.trim().is_empty())
}

fn existing_change_ids(note: &str) -> Vec<String> {
    let header_line =
        Regex::new(&format!("(?im)^{}\\s*(.+)$", regex::escape(definitions::SUPERSEDE_HEADER))).unwrap();
    header_line.captures_iter(note).map(|c| c[1].trim().to_string()).collect()
}

pub fn run(commit: &str, change_ids: Vec<String>, upstream_branch: &str, force: bool) -> Result<()> {
    if change_ids.is_empty() {
        return Err(Error::Validation("at least one change-id should be provided".into()));
    }

    let resolved = driver::rev_parse(commit).map_err(|_| Error::Ref(format!("'{commit}' not found (or ambiguous)")))?;

    let pattern = change_id_pattern();
    for id in &change_ids {
        if !pattern.is_match(id) {
            return Err(Error::Validation(format!("invalid Change-Id '{id}'")));
        }
        if found_in_branch(id, upstream_branch)? {
            continue;
        }
        if force {
            log::warn!("change-id '{id}' not found in '{upstream_branch}'");
        } else {
            return Err(Error::Import(format!(
                "Change-Id '{id}' not found in branch '{upstream_branch}'"
            )));
        }
    }

    let existing_note = driver::notes_show(&resolved, definitions::NOTE_REF)?;
    let already_present = existing_note.as_deref().map(existing_change_ids).unwrap_or_default();

    let mut note = String::new();
    for id in &change_ids {
        if already_present.iter().any(|existing| existing == id) {
            log::warn!("Change-Id '{id}' already present in the note for commit '{resolved}'");
            continue;
        }
        note.push_str(&format!("{} {id}\n", definitions::SUPERSEDE_HEADER));
    }

    if note.is_empty() {
        log::warn!("note has not been added");
        return Ok(());
    }

    driver::notes_append(&resolved, &note, definitions::NOTE_REF)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_change_id_format() {
        let pattern = change_id_pattern();
        assert!(pattern.is_match("I0123456789"));
        assert!(!pattern.is_match("not-a-change-id"));
        assert!(!pattern.is_match("I12"));
    }

    #[test]
    fn extracts_existing_change_ids() {
        let note = "Superseded-by: Iabc123\nSuperseded-by: Idef456\n";
        assert_eq!(existing_change_ids(note), vec!["Iabc123".to_string(), "Idef456".to_string()]);
    }
}
