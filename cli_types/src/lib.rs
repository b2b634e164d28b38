use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Log verbosity levels accepted by `--log-level`, mirrored onto the
/// underlying `log::LevelFilter` plus two levels git-upstream's own
/// notice-level diagnostics need (`critical`, `notice`).
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[value(rename_all = "lowercase")]
pub enum LogLevel {
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
    Notset,
}

/// Locate-changes strategy used to build the commit filter chain for `import`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[value(rename_all = "lowercase")]
pub enum Strategy {
    /// Discard merges, duplicates and annotated commits, replay the rest.
    Drop,
}

#[derive(Parser, Debug)]
#[command(
    name = "git-upstream",
    about = "Manage a downstream fork against a moving upstream branch",
    long_about = None,
    disable_help_subcommand = true,
)]
pub struct Cli {
    /// Increase logging verbosity. May be repeated.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all but warning-and-above output. Conflicts with -v.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Explicit log level, bypassing the -v/-q verbosity count.
    #[arg(long, global = true, hide = true)]
    pub log_level: Option<LogLevel>,

    /// Write logs to the given file in addition to stderr.
    #[arg(long, global = true, hide = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print usage for git-upstream or one of its subcommands.
    Help {
        /// Subcommand to show help for.
        subcommand: Option<String>,
    },

    /// Locate commits carried on top of upstream, replay them on the new
    /// upstream tip, and merge the result back.
    ///
    /// The pipeline runs in two halves, joined by a rebase: the first half
    /// computes the set of carried commits and drives `git rebase -i`; the
    /// second half runs via `--finish`, invoked by the rebase itself as an
    /// `exec` step, to synthesise the tree-replacing merge back onto the
    /// target branch. Re-running `import --finish` after manually resolving
    /// a stalled rebase is the supported recovery path; there is no
    /// automatic resume.
    Import(ImportArgs),

    /// Mark a commit to be dropped on the next import.
    Drop {
        /// Commit to mark as dropped.
        commit: String,

        /// Identity recorded in the `Dropped:` note header.
        /// Defaults to the repository's configured user.name/user.email.
        #[arg(short, long)]
        author: Option<String>,
    },

    /// Mark a commit as superseded by one or more upstream Change-Ids.
    Supersede {
        /// Commit to mark as superseded.
        commit: String,

        /// One or more Gerrit-style Change-Ids (`I` + 6-40 hex chars) that
        /// make this commit obsolete.
        #[arg(required = true, num_args = 1..)]
        change_id: Vec<String>,

        /// Skip verifying that each change-id is reachable from
        /// upstream_branch.
        #[arg(short, long)]
        force: bool,

        /// Branch to search for the given change-ids.
        #[arg(short = 'u', long, default_value = "upstream/master")]
        upstream_branch: String,
    },

    /// Print the commits carried on top of upstream. Pure diagnostic.
    Carrying {
        /// Upstream reference to diff against.
        #[arg(default_value = "upstream/master")]
        upstream_branch: String,

        /// Extra arguments forwarded verbatim to `git log`.
        #[arg(last = true)]
        extra_args: Vec<String>,
    },

    /// Internal: acts as the `GIT_SEQUENCE_EDITOR`/`GIT_EDITOR` for a
    /// driven rebase. Not part of the documented CLI surface.
    #[command(name = "__rebase-editor", hide = true)]
    RebaseEditorHelper {
        /// Path git passes in: either the rebase todo file or a commit
        /// message file, distinguished by basename.
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Upstream branch or tag to import from.
    #[arg(default_value = "upstream/master")]
    pub upstream_branch: String,

    /// Auxiliary branches to co-merge into the import base.
    pub branches: Vec<String>,

    /// Open the rebase todo list for review before applying it.
    #[arg(short, long)]
    pub interactive: bool,

    /// Print the commits that would be replayed and exit.
    #[arg(short, long)]
    pub dry_run: bool,

    /// Overwrite an existing `<import>-base` branch.
    #[arg(short, long)]
    pub force: bool,

    /// Perform only the final merge step. Implies upstream_branch defaults
    /// to the current import branch rather than upstream/master.
    #[arg(long)]
    pub finish: bool,

    /// Perform the final merge after a successful rebase. Default true;
    /// pass --no-merge to stop after the rebase and merge manually later.
    #[arg(long, default_value_t = true, action = clap::ArgAction::SetTrue, overrides_with = "no_merge")]
    pub merge: bool,

    #[arg(long = "no-merge", action = clap::ArgAction::SetTrue)]
    pub no_merge: bool,

    /// Glob pattern(s) used to discover upstream refs. Repeatable.
    #[arg(long = "search-refs", default_values_t = vec!["upstream/*".to_string()])]
    pub search_refs: Vec<String>,

    /// Locate-changes strategy.
    #[arg(short, long, value_enum, default_value_t = Strategy::Drop)]
    pub strategy: Strategy,

    /// Branch the result is merged into.
    #[arg(long, default_value = "HEAD")]
    pub into: String,

    /// Template for the import branch name. The sole placeholder
    /// `{describe}` expands to a describe-string of the upstream tip.
    #[arg(long, default_value = "import/{describe}")]
    pub import_branch: String,
}

impl ImportArgs {
    /// Resolves the effective `--merge`/`--no-merge` pair: `--no-merge`
    /// always wins over the default-true `--merge`.
    pub fn merge_requested(&self) -> bool {
        self.merge && !self.no_merge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn import_defaults() {
        let cli = Cli::parse_from(["git-upstream", "import"]);
        match cli.command {
            Commands::Import(args) => {
                assert_eq!(args.upstream_branch, "upstream/master");
                assert_eq!(args.search_refs, vec!["upstream/*".to_string()]);
                assert_eq!(args.import_branch, "import/{describe}");
                assert_eq!(args.into, "HEAD");
                assert!(args.merge_requested());
                assert!(!args.force);
            }
            _ => panic!("expected import subcommand"),
        }
    }

    #[test]
    fn import_no_merge_overrides_merge() {
        let cli = Cli::parse_from(["git-upstream", "import", "--no-merge"]);
        match cli.command {
            Commands::Import(args) => assert!(!args.merge_requested()),
            _ => panic!("expected import subcommand"),
        }
    }

    #[test]
    fn supersede_requires_change_id() {
        let result = Cli::try_parse_from(["git-upstream", "supersede", "abc123"]);
        assert!(result.is_err());
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["git-upstream", "-q", "-v", "carrying"]);
        assert!(result.is_err());
    }
}
