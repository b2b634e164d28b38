use crate::git::GitError;

/// Error kinds from spec §7. Each maps to an exit code in [`exit_code`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Repo(String),

    #[error("{0}")]
    Ref(String),

    #[error("{0}")]
    Import(String),

    #[error("rebase failed: {stderr}")]
    Rebase { stderr: String },

    #[error("note already exists")]
    NoteExists,

    #[error(transparent)]
    GitSubprocess(#[from] GitError),

    #[error("{0}")]
    Validation(String),
}

impl Error {
    /// Exit code policy from spec §7: validation errors are 2, everything
    /// else that reaches the top is a runtime failure at 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Validation(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
