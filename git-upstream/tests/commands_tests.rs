//! Integration coverage for the `drop`/`supersede`/`carrying` commands and
//! `Importer::finish` (spec §4.7-§4.8) against real repositories.

use std::env::{self, set_current_dir};
use std::path::Path;
use std::process::{Command, Stdio};

use serial_test::serial;
use tempfile::{tempdir, TempDir};

fn envs() -> [(&'static str, &'static str); 6] {
    [
        ("GIT_CONFIG_NOSYSTEM", "true"),
        ("GIT_CONFIG_GLOBAL", "/dev/null"),
        ("GIT_AUTHOR_NAME", "testuser"),
        ("GIT_AUTHOR_EMAIL", "testuser@example.com"),
        ("GIT_COMMITTER_NAME", "testuser"),
        ("GIT_COMMITTER_EMAIL", "testuser@example.com"),
    ]
}

fn git(args: &[&str], dir: &Path) {
    assert!(Command::new("git")
        .args(args)
        .envs(envs())
        .current_dir(dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap()
        .success());
}

fn git_with_message(args: &[&str], dir: &Path, message: &str) {
    let out = Command::new("git")
        .args(args)
        .envs(envs())
        .current_dir(dir)
        .arg("-m")
        .arg(message)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
}

fn commit_file(dir: &Path, name: &str, contents: &str, message: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
    git(&["add", name], dir);
    git_with_message(&["commit"], dir, message);
}

fn head(dir: &Path) -> String {
    String::from_utf8(
        Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(dir)
            .output()
            .unwrap()
            .stdout,
    )
    .unwrap()
    .trim()
    .to_string()
}

fn hermetic_git_env() {
    for (k, v) in envs() {
        env::set_var(k, v);
    }
}

fn dir_with_repo() -> TempDir {
    let tempdir = tempdir().unwrap();
    git(&["init", "--initial-branch", "master"], tempdir.path());
    git_with_message(&["commit", "--allow-empty"], tempdir.path(), "root");
    tempdir
}

#[test]
#[serial]
fn supersede_requires_change_id_reachable_from_upstream() {
    let repo = dir_with_repo();
    hermetic_git_env();
    set_current_dir(repo.path()).unwrap();

    git(&["update-ref", "refs/remotes/upstream/master", "HEAD"], repo.path());
    commit_file(repo.path(), "a.txt", "a", "Carried change");
    let carried = head(repo.path());

    let err = git_upstream::commands::supersede::run(
        &carried,
        vec!["Iabc1234567890".to_string()],
        "refs/remotes/upstream/master",
        false,
    )
    .unwrap_err();
    assert!(err.to_string().contains("not found"));

    git_upstream::commands::supersede::run(
        &carried,
        vec!["Iabc1234567890".to_string()],
        "refs/remotes/upstream/master",
        true,
    )
    .expect("force should bypass the reachability check");

    let note = git_upstream::commit::read_note(&carried, git_upstream::git::definitions::NOTE_REF)
        .unwrap()
        .unwrap();
    assert!(note.contains("Superseded-by: Iabc1234567890"));
}

#[test]
#[serial]
fn drop_is_idempotent_against_an_existing_note() {
    let repo = dir_with_repo();
    hermetic_git_env();
    set_current_dir(repo.path()).unwrap();

    commit_file(repo.path(), "a.txt", "a", "Some change");
    let sha = head(repo.path());

    git_upstream::commands::drop_cmd::run(&sha, Some("Jane <jane@example.com>".to_string())).unwrap();
    git_upstream::commands::drop_cmd::run(&sha, Some("Someone Else <else@example.com>".to_string())).unwrap();

    let note = git_upstream::commit::read_note(&sha, git_upstream::git::definitions::NOTE_REF)
        .unwrap()
        .unwrap();
    assert_eq!(note.matches("Dropped:").count(), 1, "second drop must not add a duplicate header");
}

/// `Importer::finish` synthesises a tree-replacing merge commit onto
/// `branch` and leaves the working tree matching the import branch's tree.
#[test]
#[serial]
fn finish_merges_import_branch_tree_onto_target() {
    let repo = dir_with_repo();
    hermetic_git_env();
    set_current_dir(repo.path()).unwrap();

    git(&["update-ref", "refs/remotes/upstream/master", "HEAD"], repo.path());
    commit_file(repo.path(), "old.txt", "old content", "Pre-import state");

    git(&["checkout", "-b", "import/done"], repo.path());
    commit_file(repo.path(), "new.txt", "new content", "Import result");
    git(&["checkout", "master"], repo.path());

    let mut importer = git_upstream::importer::Importer::new(
        "master",
        "refs/remotes/upstream/master",
        "import/done",
        vec![],
    )
    .unwrap();

    let ok = importer.finish().expect("finish should not error");
    assert!(ok);
    assert!(repo.path().join("new.txt").exists());
    assert!(repo.path().join("old.txt").exists());

    let log = String::from_utf8(
        Command::new("git")
            .args(["log", "-1", "--pretty=%s"])
            .current_dir(repo.path())
            .output()
            .unwrap()
            .stdout,
    )
    .unwrap();
    assert!(log.contains("Merge branch 'import/done' into master"));
}

/// Everything upstreamed (spec §8 seed scenario): `master` has no commits
/// of its own beyond the common ancestor, so the carried list is empty,
/// even though upstream has since advanced to a distinct tip. `Importer::
/// apply` must fast-forward the import branch to upstream and still call
/// `finish` when a resume command line was supplied, rather than returning
/// early without merging.
#[test]
#[serial]
fn everything_upstreamed_fast_forwards_import_branch_and_still_finishes() {
    let repo = dir_with_repo();
    hermetic_git_env();
    set_current_dir(repo.path()).unwrap();

    git(&["update-ref", "refs/remotes/upstream/master", "HEAD"], repo.path());
    git(&["checkout", "-b", "upstream-work"], repo.path());
    commit_file(repo.path(), "feature.txt", "upstream content", "Upstream advance");
    let upstream_new_tip = head(repo.path());
    git(&["update-ref", "refs/remotes/upstream/master", &upstream_new_tip], repo.path());
    git(&["checkout", "master"], repo.path());

    let strategy = git_upstream::strategy::Strategy::drop_strategy(
        "master",
        "refs/remotes/upstream/master",
        vec!["refs/remotes/upstream/master".to_string()],
    );
    assert!(
        strategy.filtered_list().unwrap().is_empty(),
        "master has no commits of its own to carry"
    );

    let mut importer = git_upstream::importer::Importer::new(
        "master",
        "refs/remotes/upstream/master",
        "import/upstreamed",
        vec![],
    )
    .unwrap();

    let ok = importer
        .apply(
            &strategy,
            git_upstream::rebase_editor::InteractiveMode::NonInteractive,
            (2, 30, 0),
            vec!["git-upstream".to_string(), "import".to_string(), "--finish".to_string()],
        )
        .expect("apply should not error");
    assert!(ok, "apply should fast-forward and finish rather than stop early");

    let import_branch_tip = String::from_utf8(
        Command::new("git")
            .args(["rev-parse", "refs/heads/import/upstreamed"])
            .current_dir(repo.path())
            .output()
            .unwrap()
            .stdout,
    )
    .unwrap()
    .trim()
    .to_string();
    assert_eq!(import_branch_tip, upstream_new_tip);

    let log = String::from_utf8(
        Command::new("git")
            .args(["log", "-1", "--pretty=%s"])
            .current_dir(repo.path())
            .output()
            .unwrap()
            .stdout,
    )
    .unwrap();
    assert!(log.contains("Merge branch 'import/upstreamed' into master"));
}
