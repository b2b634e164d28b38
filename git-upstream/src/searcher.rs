//! Previous-import locator (spec §4.3).

use std::collections::HashSet;

use itertools::Itertools;

use crate::commit::{self, Commit};
use crate::git::{driver, GitError};

pub struct Searcher {
    pub branch: String,
    pub patterns: Vec<String>,
    pub search_tags: bool,
}

/// The previous-import merge commit, plus the parent kept on its
/// downstream side and the set of commit ids excluded from future walks
/// (unrelated auxiliary-branch parents, superseded mainline parents).
#[derive(Debug, Clone)]
pub struct PreviousImport {
    pub merge: String,
    pub kept_parent: String,
    pub excluded: Vec<String>,
}

fn expand_patterns(patterns: &[String], search_tags: bool) -> Vec<String> {
    let mut globs = Vec::new();
    for p in patterns {
        if p.starts_with("refs/") {
            globs.push(p.clone());
            continue;
        }
        globs.push(format!("refs/heads/{p}"));
        globs.push(format!("refs/remotes/{p}"));
        if search_tags {
            globs.push(format!("refs/tags/{p}"));
        }
    }
    globs
}

impl Searcher {
    pub fn new(branch: impl Into<String>, patterns: Vec<String>, search_tags: bool) -> Self {
        Searcher {
            branch: branch.into(),
            patterns,
            search_tags,
        }
    }

    /// Locates the single commit reachable from both `branch` and some ref
    /// matching `patterns`, choosing the topologically latest merge-base
    /// when several tips are candidates. Spec §4.3 steps 1-5.
    pub fn find(&self) -> Result<String, GitError> {
        let globs = expand_patterns(&self.patterns, self.search_tags);
        let refs = driver::for_each_ref(&globs)?;
        if refs.is_empty() {
            return Err(GitError::NoCommonAncestor);
        }
        // Several matching refs (a branch and its tag) often share a tip;
        // dedupe so the same commit isn't walked from twice below.
        let tips: Vec<String> = refs.into_iter().map(|r| r.oid).unique().collect();

        let mut first_parents = Vec::new();
        for tip in &tips {
            if let Some(c) = commit::load_commits(&["--max-count=1", "--no-walk", tip])?.into_iter().next() {
                if let Some(p) = c.first_parent() {
                    first_parents.push(p.to_string());
                }
            }
        }

        // T' = rev-list T --not P(T): tips not reachable from another
        // tip's first parent, i.e. tips that are not themselves subsumed.
        let mut rev_args: Vec<&str> = tips.iter().map(String::as_str).collect();
        rev_args.push("--not");
        rev_args.extend(first_parents.iter().map(String::as_str));
        let reachable: HashSet<String> = driver::rev_list(&rev_args)?.into_iter().collect();
        let surviving_tips: Vec<&String> = tips.iter().filter(|t| reachable.contains(*t)).collect();

        let mut merge_bases = Vec::new();
        for tip in surviving_tips {
            if let Some(mb) = driver::merge_base(&self.branch, tip)? {
                merge_bases.push(mb);
            }
        }
        if merge_bases.is_empty() {
            return Err(GitError::NoCommonAncestor);
        }
        let merge_bases: Vec<String> = merge_bases.into_iter().unique().collect();

        let mut args: Vec<&str> = vec!["--topo-order", "--max-count=1", "--no-walk"];
        args.extend(merge_bases.iter().map(String::as_str));
        driver::rev_list(&args)?
            .into_iter()
            .next()
            .ok_or(GitError::NoCommonAncestor)
    }

    /// Scans `rev-list --ancestry-path --merges C..branch` for the merge
    /// that replaced the tree with upstream's, applying the previous-import
    /// recognition rule from spec §4.3 to each (merge, parent) pair.
    pub fn find_previous_import(&self, c: &str) -> Result<Option<PreviousImport>, GitError> {
        let merges = commit::load_commits(&[
            "--ancestry-path",
            "--merges",
            &format!("{c}..{}", self.branch),
        ])?;

        let mut result: Option<PreviousImport> = None;
        // Exclusions seen before the true previous-import merge is
        // classified (newer unrelated-history auxiliary merges, since
        // `merges` iterates newest-first) can't be recorded anywhere yet;
        // queue them here and splice them in once `result` is set.
        let mut pending_excluded: Vec<String> = Vec::new();
        let last_index = merges.len().saturating_sub(1);

        for (idx, m) in merges.iter().enumerate() {
            let is_last = idx == last_index;
            for p in &m.parents {
                let mb = driver::merge_base(p, c)?;
                match mb {
                    None => {
                        // unrelated-history auxiliary branch merge: exclude
                        // every parent, never classify m as the import.
                        for pp in &m.parents {
                            push_excluded(&mut result, &mut pending_excluded, pp.clone());
                        }
                    }
                    Some(mb_commit) => {
                        let tree_p = driver::tree_of(p)?;
                        let tree_m = driver::tree_of(&m.id)?;
                        if tree_p != tree_m {
                            // p contributes changes; leave m uninspected.
                            continue;
                        } else if mb_commit == c && m.parents.len() > 1 {
                            let mut excluded: Vec<String> = pending_excluded.drain(..).collect();
                            for pp in &m.parents {
                                if pp != p && !excluded.contains(pp) {
                                    excluded.push(pp.clone());
                                }
                            }
                            result = Some(PreviousImport {
                                merge: m.id.clone(),
                                kept_parent: p.clone(),
                                excluded,
                            });
                        } else if is_last && mb_commit != c {
                            let mut excluded: Vec<String> = pending_excluded.drain(..).collect();
                            if !excluded.contains(p) {
                                excluded.push(p.clone());
                            }
                            result = Some(PreviousImport {
                                merge: m.id.clone(),
                                kept_parent: m.parents[0].clone(),
                                excluded,
                            });
                        }
                    }
                }
            }
        }

        Ok(result)
    }

    /// Enumerates carried commits. Without `upstream` this is a plain
    /// topological walk (tests/diagnostics only); with it, the production
    /// regime locates the previous import and stitches two ordered walks
    /// across that boundary so ordering stays deterministic.
    pub fn list(&self, c: &str, upstream: Option<&str>) -> Result<Vec<Commit>, GitError> {
        let Some(upstream) = upstream else {
            return commit::load_commits(&["--topo-order", &format!("{c}..{}", self.branch)]);
        };

        match self.find_previous_import(c)? {
            None => {
                let args = vec![
                    "--cherry-pick".to_string(),
                    "--left-only".to_string(),
                    "--topo-order".to_string(),
                    self.branch.clone(),
                    format!("^{upstream}"),
                    format!("^{c}"),
                ];
                let refs: Vec<&str> = args.iter().map(String::as_str).collect();
                commit::load_commits(&refs)
            }
            Some(prev) => {
                let mut walk1_args = vec![
                    "--cherry-pick".to_string(),
                    "--left-only".to_string(),
                    "--topo-order".to_string(),
                    format!("{}..{}", prev.merge, self.branch),
                    format!("^{upstream}"),
                    format!("^{c}"),
                ];
                for ex in &prev.excluded {
                    walk1_args.push(format!("^{ex}"));
                }
                let walk1_refs: Vec<&str> = walk1_args.iter().map(String::as_str).collect();
                let mut combined = commit::load_commits(&walk1_refs)?;

                let walk2_args = vec![format!("{c}..{}", prev.merge), format!("^{}~1", prev.merge)];
                let walk2_refs: Vec<&str> = walk2_args.iter().map(String::as_str).collect();
                combined.extend(commit::load_commits(&walk2_refs)?);

                Ok(combined)
            }
        }
    }
}

fn push_excluded(result: &mut Option<PreviousImport>, pending: &mut Vec<String>, id: String) {
    match result {
        Some(prev) => {
            if !prev.excluded.contains(&id) {
                prev.excluded.push(id);
            }
        }
        None => {
            if !pending.contains(&id) {
                pending.push(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_patterns_adds_namespaces() {
        let globs = expand_patterns(&["upstream/*".to_string()], true);
        assert_eq!(
            globs,
            vec![
                "refs/heads/upstream/*".to_string(),
                "refs/remotes/upstream/*".to_string(),
                "refs/tags/upstream/*".to_string(),
            ]
        );
    }

    #[test]
    fn expand_patterns_skips_namespacing_for_explicit_refs() {
        let globs = expand_patterns(&["refs/heads/foo".to_string()], false);
        assert_eq!(globs, vec!["refs/heads/foo".to_string()]);
    }

    #[test]
    fn expand_patterns_without_tags() {
        let globs = expand_patterns(&["upstream/master".to_string()], false);
        assert_eq!(
            globs,
            vec![
                "refs/heads/upstream/master".to_string(),
                "refs/remotes/upstream/master".to_string(),
            ]
        );
    }
}
