use std::io;

/// Captured stdout/stderr of a finished git subprocess.
#[derive(Debug, Clone, Default)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
}

/// A resolved ref: its full name and the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub refname: String,
    pub oid: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("ref '{refname}' does not resolve to a commit")]
    MissingRef { refname: String },

    #[error("failed to lock ref: {}", output.stderr)]
    RefFailedToLock { output: GitOutput },

    #[error("ref was concurrently modified: {}", output.stderr)]
    RefConcurrentModification { output: GitOutput },

    #[error("object not found: {object}")]
    BadObject { object: String },

    #[error("no common ancestor found")]
    NoCommonAncestor,

    #[error("note not found")]
    NoteNotFound,

    #[error("note already exists for this object")]
    NoteAlreadyExists,

    #[error("git command failed (exit {code:?}): {}", output.stderr)]
    ExecError { code: Option<i32>, output: GitOutput },

    #[error(transparent)]
    Io(#[from] io::Error),
}
