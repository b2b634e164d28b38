/// Minimum supported git version. Below this the driver refuses to run.
pub const EXPECTED_VERSION: (u32, u32, u32) = (1, 7, 5);

/// `GIT_SEQUENCE_EDITOR` is only honoured from this version on; below it
/// the driver must fall back to `GIT_EDITOR`.
pub const SEQUENCE_EDITOR_MIN_VERSION: (u32, u32, u32) = (1, 7, 8);

/// The rebase todo-file epilogue format (comment block naming
/// shortrevisions/shortonto) matches git's own from this version on.
pub const TODO_EPILOGUE_MIN_VERSION: (u32, u32, u32) = (2, 6, 0);

/// Default notes namespace carrying `Dropped:`/`Superseded-by:` headers.
pub const NOTE_REF: &str = "refs/notes/upstream-merge";

pub const DROPPED_HEADER: &str = "Dropped:";
pub const SUPERSEDE_HEADER: &str = "Superseded-by:";

/// Gerrit-style Change-Id: `I` followed by 6-40 lowercase hex characters.
pub const CHANGE_ID_PATTERN: &str = r"^I[0-9a-f]{6,40}$";

pub const GIT_UPSTREAM_TODO_PATH: &str = "git-upstream/git-rebase-todo";
