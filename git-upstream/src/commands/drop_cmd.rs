//! `drop` (spec §4.8): mark a commit to be dropped on the next import.

use regex::Regex;

use crate::error::{Error, Result};
use crate::git::{definitions, driver};

fn default_author() -> Result<String> {
    let name = driver::config_get("user.name")?.unwrap_or_default();
    let email = driver::config_get("user.email")?.unwrap_or_default();
    Ok(format!("{name} <{email}>"))
}

fn has_dropped_header(note: &str) -> bool {
    let pattern = Regex::new(&format!("(?im)^{}", regex::escape(definitions::DROPPED_HEADER))).unwrap();
    pattern.is_match(note)
}

pub fn run(commit: &str, author: Option<String>) -> Result<()> {
    if driver::is_detached() {
        return Err(Error::Repo("in 'detached HEAD' state".into()));
    }
    let resolved = driver::rev_parse(commit).map_err(|_| Error::Ref(format!("'{commit}' not found (or ambiguous)")))?;
    let author = match author {
        Some(a) => a,
        None => default_author()?,
    };

    let existing = driver::notes_show(&resolved, definitions::NOTE_REF)?;
    if existing.as_deref().is_some_and(has_dropped_header) {
        log::warn!("drop note has not been added as '{resolved}' already has one");
        return Ok(());
    }

    let note = format!("{} {author}\n", definitions::DROPPED_HEADER);
    driver::notes_append(&resolved, &note, definitions::NOTE_REF)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_existing_dropped_header() {
        assert!(has_dropped_header("Dropped: Jane Doe <jane@example.com>\n"));
        assert!(has_dropped_header("dropped: jane\n"));
        assert!(!has_dropped_header("Superseded-by: Iabc123\n"));
    }
}
