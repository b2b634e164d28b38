//! Importer (spec §4.7): create / apply / finish / already-synced.

use std::collections::HashSet;

use crate::commit::Commit;
use crate::error::{Error, Result};
use crate::git::types::GitOutput;
use crate::git::{driver, GitError};
use crate::notice;
use crate::rebase_editor::{InteractiveMode, RebaseEditor};
use crate::strategy::Strategy;

pub struct Importer {
    pub branch: String,
    pub upstream: String,
    pub extra_branches: Vec<String>,
    import_branch_template: String,
    import_branch: Option<String>,
    base_branch: Option<String>,
}

impl Importer {
    /// Validates the repository is non-bare, resolves `branch == "HEAD"`
    /// to the current branch name, and checks every ref resolves.
    pub fn new(
        branch: &str,
        upstream: &str,
        import_branch_template: &str,
        extra_branches: Vec<String>,
    ) -> Result<Self> {
        let is_bare = driver::run(&["rev-parse", "--is-bare-repository"])?
            .stdout
            .trim()
            == "true";
        if is_bare {
            return Err(Error::Repo("cannot import into a bare repository".into()));
        }

        let branch = if branch == "HEAD" {
            driver::current_branch()?
                .ok_or_else(|| Error::Repo("in 'detached HEAD' state".into()))?
        } else {
            branch.to_string()
        };

        let mut to_validate = vec![branch.clone(), upstream.to_string()];
        to_validate.extend(extra_branches.iter().cloned());
        for r in &to_validate {
            driver::rev_parse(r).map_err(|_| Error::Ref(format!("'{r}' does not resolve to a commit")))?;
        }

        // `import_branch_template` doubles as the already-resolved import
        // branch name when a fresh process is constructed for `--finish`
        // (the `{describe}` placeholder has been expanded by the time
        // `cli.rs` spawns that invocation). `create_import` overwrites this
        // with the real resolved name when it runs in the same process.
        Ok(Importer {
            branch,
            upstream: upstream.to_string(),
            extra_branches,
            import_branch_template: import_branch_template.to_string(),
            import_branch: Some(import_branch_template.to_string()),
            base_branch: None,
        })
    }

    pub fn import_branch(&self) -> Option<&str> {
        self.import_branch.as_deref()
    }

    fn set_branch(&self, name: &str, commit: &str, checkout: bool, force: bool) -> Result<()> {
        let current = driver::current_branch()?;
        if current.as_deref() == Some(name) {
            driver::reset_hard(commit)?;
        } else if checkout {
            let mode = if force { "-B" } else { "-b" };
            driver::checkout(&[mode, name, commit])?;
        } else {
            driver::branch_force(name, commit)?;
        }
        Ok(())
    }

    /// Builds `<import>-base` at the new upstream tip, expanding
    /// `import_branch_template`'s `{describe}` placeholder, and unions in
    /// any auxiliary branches via the inverse-`ours` idiom.
    pub fn create_import(&mut self, commit: Option<&str>, checkout: bool, force: bool) -> Result<()> {
        if driver::is_detached() {
            return Err(Error::Repo("in 'detached HEAD' state".into()));
        }

        let commit = commit.unwrap_or(&self.upstream).to_string();
        let resolved = driver::rev_parse(&format!("{commit}^{{commit}}"))
            .map_err(|_| Error::Ref(format!("'{commit}' does not resolve to a commit")))?;

        let describe_commit = if driver::show_ref_is_tag(&commit) {
            commit.clone()
        } else {
            match driver::describe(&["--tags", &resolved]) {
                Ok(d) if !d.is_empty() => d,
                _ => {
                    log::warn!("no tag reachable from '{commit}', falling back to --always --tags");
                    driver::describe(&["--always", "--tags", &resolved])?
                }
            }
        };

        let mut describe_parts = vec![describe_commit];
        for extra in &self.extra_branches {
            describe_parts.push(driver::rev_parse_short(extra)?);
        }
        let import_describe = describe_parts.join("-");
        let import_branch = self.import_branch_template.replace("{describe}", &import_describe);
        let base_branch = format!("{import_branch}-base");

        if driver::show_ref_exists(&format!("refs/heads/{base_branch}")) && !force {
            return Err(Error::Import(format!(
                "'{base_branch}' already exists, use --force to overwrite"
            )));
        }

        self.set_branch(&base_branch, &resolved, checkout, force)?;

        if !self.extra_branches.is_empty() {
            driver::checkout(&[&base_branch])?;
            let mut merge_args: Vec<&str> = vec!["-s", "ours", "--no-commit"];
            merge_args.extend(self.extra_branches.iter().map(String::as_str));
            driver::merge(&merge_args)?;
            driver::read_tree(&["--empty"])?;
            let mut read_tree_args: Vec<&str> = vec!["HEAD"];
            read_tree_args.extend(self.extra_branches.iter().map(String::as_str));
            driver::read_tree(&read_tree_args)?;
            driver::checkout(&["--", "."])?;
            driver::commit(&["--no-edit"])?;
        }

        self.import_branch = Some(import_branch);
        self.base_branch = Some(base_branch);
        Ok(())
    }

    /// True iff the located previous-upstream commit equals the current
    /// upstream tip and the auxiliary-branch set hasn't changed.
    pub fn already_synced(&self, strategy: &Strategy) -> Result<bool> {
        let len = strategy.len()?;
        let prev_merge: Option<Commit> = if len > 0 {
            strategy.get(len - 1)?.cloned()
        } else {
            None
        };

        let previous_upstream = strategy.previous_upstream()?.to_string();
        let additional_commits: Option<HashSet<String>> = prev_merge.and_then(|merge| {
            if merge.parents.len() > 1 {
                Some(
                    merge
                        .parents
                        .into_iter()
                        .filter(|p| *p != previous_upstream)
                        .collect(),
                )
            } else {
                None
            }
        });

        let current_upstream_tip = driver::rev_parse(&self.upstream)?;
        if previous_upstream != current_upstream_tip {
            return Ok(false);
        }

        match additional_commits {
            None => Ok(true),
            Some(previous_set) => {
                let mut current_set = HashSet::new();
                for b in &self.extra_branches {
                    current_set.insert(driver::rev_parse(b)?);
                }
                Ok(previous_set == current_set)
            }
        }
    }

    /// Best-effort linearisation: repeatedly finds the newest merge whose
    /// parents aren't all already-known ancestors and rebases that segment
    /// with `-p --onto <prev-tip>`. Any failure aborts the rebase; the
    /// caller falls back to the non-linearised tip, per spec §4.7.
    fn linearise(&self, commits: &[Commit], previous_import: &str) -> Result<()> {
        let import_branch = self
            .import_branch
            .as_deref()
            .expect("import branch set before linearise runs");

        let mut prev_tip = previous_import.to_string();
        let mut segment_end = commits.len();
        let mut guard = commits.len() + 1;

        loop {
            if guard == 0 {
                break;
            }
            guard -= 1;

            let mut ancestors: HashSet<String> = HashSet::new();
            ancestors.insert(prev_tip.clone());
            let mut boundary = None;
            for (idx, c) in commits[..segment_end].iter().enumerate() {
                if c.is_merge() && !c.parents.iter().all(|p| ancestors.contains(p)) {
                    boundary = Some(idx);
                }
                ancestors.insert(c.id.clone());
            }

            let Some(idx) = boundary else {
                break;
            };

            let root = commits[idx].first_parent().unwrap_or(&prev_tip).to_string();
            let (status, stdout, stderr) =
                driver::rebase_capture(&["-p", "--onto", &prev_tip, &root, import_branch], &[]);
            if status != 0 {
                driver::rebase_abort();
                return Err(Error::GitSubprocess(GitError::ExecError {
                    code: Some(status),
                    output: GitOutput { stdout, stderr },
                }));
            }
            prev_tip = driver::rev_parse(import_branch).map_err(Error::GitSubprocess)?;
            segment_end = idx;
        }

        Ok(())
    }

    /// Materialises the filtered commit list and drives it through the
    /// rebase editor onto `<import>-base`. Returns `false` on user
    /// cancellation or rebase failure requiring manual intervention.
    pub fn apply(
        &mut self,
        strategy: &Strategy,
        mode: InteractiveMode,
        git_version: (u32, u32, u32),
        finish_args: Vec<String>,
    ) -> Result<bool> {
        let commit_list = strategy.filtered_list()?;
        if commit_list.is_empty() {
            notice!("All carried changes gone upstream");
            let upstream_tip = driver::rev_parse(&self.upstream)?;
            let import_branch_name = self
                .import_branch
                .clone()
                .unwrap_or_else(|| self.import_branch_template.clone());
            driver::branch_force(&import_branch_name, &upstream_tip)?;
            self.import_branch = Some(import_branch_name);
            if finish_args.is_empty() {
                return Ok(true);
            }
            return self.finish();
        }

        let branch_tip = driver::rev_parse(&self.branch)?;
        let import_branch_name = self
            .import_branch
            .clone()
            .unwrap_or_else(|| self.import_branch_template.clone());
        driver::branch_force(&import_branch_name, &branch_tip)?;
        self.import_branch = Some(import_branch_name.clone());

        let previous = strategy.previous_upstream()?.to_string();
        if let Err(e) = self.linearise(&commit_list, &previous) {
            log::warn!("linearisation failed, proceeding against non-linear tip: {e}");
            driver::rebase_abort();
            driver::branch_force(&import_branch_name, &branch_tip)?;
        }

        let base_branch = self
            .base_branch
            .clone()
            .ok_or_else(|| Error::Import("create_import must run before apply".into()))?;
        let first_parent = commit_list[0]
            .first_parent()
            .unwrap_or(&previous)
            .to_string();

        let editor = RebaseEditor::new(finish_args, mode, git_version);
        let outcome = editor.run(&commit_list, &first_parent, &import_branch_name, &base_branch)?;

        if outcome.status != 0 {
            if outcome.stderr.starts_with("Nothing to do") {
                notice!("Cancelled by user");
                return Ok(false);
            }
            crate::log_dedent!(
                log::Level::Error,
                "rebase failed, manual intervention required:
                 {}
                 {}",
                outcome.stdout,
                outcome.stderr
            );
            return Ok(false);
        }

        driver::checkout(&[&self.branch])?;
        Ok(true)
    }

    /// May be called from a detached HEAD, when invoked by the `exec`
    /// step inside a running rebase. Synthesises a tree-replacing merge
    /// onto `branch` and verifies tree equality.
    pub fn finish(&mut self) -> Result<bool> {
        // By the time `finish` runs, the rebase that drove us here (via the
        // todo file's trailing `exec` line) has applied every pick; nothing
        // still needs the todo file, interactive mode included, where the
        // rebase process never returns to `RebaseEditor::run` to clean it up.
        crate::rebase_editor::cleanup_todo_file();

        let detached = driver::is_detached();
        let detached_commit = if detached {
            Some(driver::rev_parse("HEAD")?)
        } else {
            None
        };

        let target_sha = if let Some(ref sha) = detached_commit {
            sha.clone()
        } else {
            let import_branch = self
                .import_branch
                .as_deref()
                .ok_or_else(|| Error::Import("no import branch to finish".into()))?;
            driver::rev_parse(import_branch)?
        };

        driver::checkout(&[&self.branch])?;
        let current_sha = driver::rev_parse("HEAD")?;

        let import_branch_name = self.import_branch.as_deref().unwrap_or(&self.upstream);
        let message = format!(
            "Merge branch '{}' into {}\n\nImport of '{}' into '{}'.",
            import_branch_name, self.branch, self.upstream, self.branch
        );

        let result: Result<()> = (|| {
            driver::merge(&["-s", "ours", "--no-commit", &target_sha])?;
            driver::read_tree(&["-u", "--reset", &target_sha])?;
            driver::commit(&["-m", &message])?;

            let head_tree = driver::tree_of("HEAD")?;
            let target_tree = driver::tree_of(&target_sha)?;
            if head_tree != target_tree {
                return Err(Error::Import("resulting tree does not match import".into()));
            }
            Ok(())
        })();

        if let Err(e) = result {
            log::error!("finish failed: {e}");
            driver::branch_force(&self.branch, &current_sha)?;
            driver::checkout(&[&self.branch])?;
            return Ok(false);
        }

        if let Some(sha) = detached_commit {
            driver::checkout(&[&sha])?;
        }

        Ok(true)
    }
}
