use clap::{CommandFactory, Parser};
use git_upstream_cli_types::{Cli, Commands, Strategy as CliStrategy};

use crate::commands::{carrying, drop_cmd, supersede};
use crate::config;
use crate::error::{Error, Result};
use crate::git::lowlevel::check_git_version;
use crate::importer::Importer;
use crate::logging;
use crate::rebase_editor::{run_editor_helper, InteractiveMode};
use crate::strategy::Strategy;

/// Parses argv, initialises logging, checks the git version, and
/// dispatches to the requested subcommand. Returns the process exit code.
pub fn run() -> i32 {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet, cli.log_level, cli.log_file.as_deref());

    match dispatch(cli) {
        Ok(()) => 0,
        Err(e) => {
            log::error!("{e}");
            e.exit_code()
        }
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Help { subcommand } => {
            print_help(subcommand.as_deref());
            Ok(())
        }
        Commands::Import(args) => run_import(args),
        Commands::Drop { commit, author } => drop_cmd::run(&commit, author),
        Commands::Supersede {
            commit,
            change_id,
            force,
            upstream_branch,
        } => supersede::run(&commit, change_id, &upstream_branch, force),
        Commands::Carrying {
            upstream_branch,
            extra_args,
        } => carrying::run(&upstream_branch, &extra_args),
        Commands::RebaseEditorHelper { path } => {
            run_editor_helper(&path).map_err(|e| Error::Import(e.to_string()))
        }
    }
}

fn print_help(subcommand: Option<&str>) {
    let mut cmd = Cli::command();
    match subcommand {
        Some(name) => {
            if let Some(sub) = cmd.find_subcommand_mut(name) {
                let _ = sub.print_help();
                println!();
                return;
            }
            let _ = cmd.print_help();
        }
        None => {
            let _ = cmd.print_help();
        }
    }
    println!();
}

fn run_import(mut args: git_upstream_cli_types::ImportArgs) -> Result<()> {
    let git_version = check_git_version()?;

    let defaults = config::read_import_defaults();
    if args.search_refs == vec!["upstream/*".to_string()] {
        if let Some(cfg_refs) = defaults.search_refs {
            args.search_refs = cfg_refs;
        }
    }
    if args.import_branch == "import/{describe}" {
        if let Some(cfg_branch) = defaults.import_branch {
            args.import_branch = cfg_branch;
        }
    }

    if args.finish {
        if !args.merge_requested() {
            return Err(Error::Validation("--finish --no-merge is not a valid combination".into()));
        }
        let mut importer = Importer::new("HEAD", &args.upstream_branch, &args.import_branch, vec![])?;
        let ok = importer.finish()?;
        return if ok {
            Ok(())
        } else {
            Err(Error::Import("finish failed, repository left for manual recovery".into()))
        };
    }

    let mut importer = Importer::new(&args.into, &args.upstream_branch, &args.import_branch, args.branches.clone())?;

    let strategy = match args.strategy {
        CliStrategy::Drop => Strategy::drop_strategy(
            importer.branch.clone(),
            args.upstream_branch.clone(),
            args.search_refs.clone(),
        ),
    };

    if args.dry_run {
        for commit in strategy.filtered_list()? {
            println!("{} {}", commit.id, commit.subject);
        }
        return Ok(());
    }

    if importer.already_synced(&strategy)? {
        log::info!("already in sync with upstream, nothing to import");
        return Ok(());
    }

    importer.create_import(None, true, args.force)?;

    let self_path = std::env::current_exe().unwrap_or_else(|_| "git-upstream".into());
    let mut finish_args: Vec<String> = vec![
        self_path.display().to_string(),
        "import".to_string(),
        "--finish".to_string(),
        "--into".to_string(),
        importer.branch.clone(),
        "--import-branch".to_string(),
        importer.import_branch().unwrap_or(&args.import_branch).to_string(),
        args.upstream_branch.clone(),
    ];
    finish_args.extend(args.branches.clone());
    if !args.merge_requested() {
        finish_args.clear();
    }

    let mode = if args.interactive {
        InteractiveMode::Interactive
    } else if std::env::var("TEST_GIT_UPSTREAM_REBASE_EDITOR").as_deref() == Ok("debug") {
        InteractiveMode::Debug
    } else {
        InteractiveMode::NonInteractive
    };

    let ok = importer.apply(&strategy, mode, git_version, finish_args)?;
    if !ok {
        return Err(Error::Import("apply did not complete; see log for details".into()));
    }
    Ok(())
}
