//! Integration coverage for the searcher/strategy pipeline (spec §4.3-§4.5)
//! against real, disposable git repositories.

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

fn commit_file(dir: &Path, name: &str, contents: &str, message: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
    git(&["add", name], dir);
    git(&["commit", "-m", message], dir);
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
    git(&["commit", "--allow-empty", "-m", "root"], tempdir.path());
    tempdir
}

/// Basic carry (spec §8 seed scenario 1): branch has one commit on top of
/// upstream's tip. Searcher locates that tip as the previous import and the
/// strategy's filtered list contains exactly the carried commit.
#[test]
#[serial]
fn basic_carry_is_found_and_filtered() {
    let repo = dir_with_repo();
    hermetic_git_env();
    set_current_dir(repo.path()).unwrap();

    git(&["update-ref", "refs/remotes/upstream/master", "HEAD"], repo.path());
    commit_file(repo.path(), "feature.txt", "local work", "Carried change");

    let searcher = git_upstream::searcher::Searcher::new(
        "master".to_string(),
        vec![
            "refs/heads/upstream/master".to_string(),
            "refs/remotes/upstream/master".to_string(),
        ],
        false,
    );
    let previous = searcher.find().expect("previous import should be found");

    let upstream_tip = String::from_utf8(
        Command::new("git")
            .args(["rev-parse", "refs/remotes/upstream/master"])
            .current_dir(repo.path())
            .output()
            .unwrap()
            .stdout,
    )
    .unwrap()
    .trim()
    .to_string();
    assert_eq!(previous, upstream_tip);

    let strategy = git_upstream::strategy::Strategy::drop_strategy(
        "master",
        "refs/remotes/upstream/master",
        vec!["refs/heads/upstream/master".to_string(), "refs/remotes/upstream/master".to_string()],
    );
    let filtered = strategy.filtered_list().expect("filtered list should succeed");
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].subject, "Carried change");
}

/// A merge commit on the carried branch is dropped by `NoMergeCommitFilter`
/// even though it's part of the raw carried range.
#[test]
#[serial]
fn merge_commits_are_dropped_from_filtered_list() {
    let repo = dir_with_repo();
    hermetic_git_env();
    set_current_dir(repo.path()).unwrap();

    git(&["update-ref", "refs/remotes/upstream/master", "HEAD"], repo.path());
    git(&["checkout", "-b", "side"], repo.path());
    commit_file(repo.path(), "side.txt", "side work", "Side change");
    git(&["checkout", "master"], repo.path());
    commit_file(repo.path(), "main.txt", "main work", "Main change");
    git(&["merge", "--no-ff", "-m", "Merge side", "side"], repo.path());

    let strategy = git_upstream::strategy::Strategy::drop_strategy(
        "master",
        "refs/remotes/upstream/master",
        vec!["refs/heads/upstream/master".to_string(), "refs/remotes/upstream/master".to_string()],
    );
    let filtered = strategy.filtered_list().unwrap();
    assert!(filtered.iter().all(|c| !c.is_merge()));
    let subjects: Vec<&str> = filtered.iter().map(|c| c.subject.as_str()).collect();
    assert!(subjects.contains(&"Main change"));
    assert!(subjects.contains(&"Side change"));
    assert!(!subjects.contains(&"Merge side"));
}

/// A commit noted `Dropped:` is excluded from the filtered list even though
/// it is still present in the raw carried range.
#[test]
#[serial]
fn dropped_commit_is_excluded() {
    let repo = dir_with_repo();
    hermetic_git_env();
    set_current_dir(repo.path()).unwrap();

    git(&["update-ref", "refs/remotes/upstream/master", "HEAD"], repo.path());
    commit_file(repo.path(), "a.txt", "a", "Keep me");
    commit_file(repo.path(), "b.txt", "b", "Drop me");

    let dropped_sha = String::from_utf8(
        Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(repo.path())
            .output()
            .unwrap()
            .stdout,
    )
    .unwrap()
    .trim()
    .to_string();

    git_upstream::commands::drop_cmd::run(&dropped_sha, Some("tester <tester@example.com>".to_string()))
        .expect("drop should succeed");

    let strategy = git_upstream::strategy::Strategy::drop_strategy(
        "master",
        "refs/remotes/upstream/master",
        vec!["refs/heads/upstream/master".to_string(), "refs/remotes/upstream/master".to_string()],
    );
    let filtered = strategy.filtered_list().unwrap();
    let subjects: Vec<&str> = filtered.iter().map(|c| c.subject.as_str()).collect();
    assert_eq!(subjects, vec!["Keep me"]);
}

/// Additional branch previously merged (spec §8 seed scenario): an
/// unrelated-history auxiliary-branch merge sits strictly newer than the
/// true previous-import merge. `find_previous_import` must still classify
/// the older merge correctly, carrying the newer merge's parents forward
/// into its `excluded` set rather than dropping them.
#[test]
#[serial]
fn additional_branch_merge_exclusions_are_preserved_for_older_previous_import() {
    let repo = dir_with_repo();
    hermetic_git_env();
    set_current_dir(repo.path()).unwrap();
    let r = head(repo.path());

    git(&["checkout", "-b", "import-branch"], repo.path());
    commit_file(repo.path(), "import.txt", "import content", "Import content change");
    let import_branch_tip = head(repo.path());

    git(&["checkout", "master"], repo.path());
    git(&["merge", "-s", "ours", "--no-commit", "import-branch"], repo.path());
    git(&["read-tree", "-u", "--reset", "import-branch"], repo.path());
    git(&["commit", "-m", "Merge branch 'import-branch' into master"], repo.path());
    let m1 = head(repo.path());

    commit_file(repo.path(), "post.txt", "post content", "Carried post-M1");
    let master_before_aux = head(repo.path());

    git(&["checkout", "--orphan", "aux"], repo.path());
    git(&["rm", "-rf", "."], repo.path());
    commit_file(repo.path(), "aux.txt", "aux content", "Aux root commit");
    let aux_tip = head(repo.path());

    git(&["checkout", "master"], repo.path());
    git(
        &["merge", "--no-ff", "--allow-unrelated-histories", "-m", "Merge aux", "aux"],
        repo.path(),
    );

    let searcher = git_upstream::searcher::Searcher::new("master".to_string(), vec![], false);
    let previous = searcher
        .find_previous_import(&r)
        .expect("find_previous_import should not error")
        .expect("the older merge must still be classified as the previous import");

    assert_eq!(previous.merge, m1);
    assert_eq!(previous.kept_parent, import_branch_tip);
    assert!(previous.excluded.contains(&r), "excluded: {:?}", previous.excluded);
    assert!(previous.excluded.contains(&master_before_aux), "excluded: {:?}", previous.excluded);
    assert!(previous.excluded.contains(&aux_tip), "excluded: {:?}", previous.excluded);
}
