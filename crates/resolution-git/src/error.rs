//! Error types for the git resolver

use git2::ErrorClass;
use resolution_framework::ResolverError;
use thiserror::Error;

/// Errors from resolving a file out of a git remote
#[derive(Debug, Error)]
pub enum GitError {
    /// Params missing or conflicting
    #[error("{0}")]
    InvalidParams(String),

    /// Requested branch (or the remote's default branch) is not advertised
    #[error("clone error: couldn't find remote ref \"{0}\"")]
    RefNotFound(String),

    /// Requested commit is not in the fetched history
    #[error("checkout error: object not found")]
    ObjectNotFound,

    /// Path is absent from the resolved tree, or is not a file
    #[error("error opening file \"{0}\": file does not exist")]
    FileNotFound(String),

    /// Talking to the remote failed
    #[error("clone error: {}", .0.message())]
    Clone(#[source] git2::Error),

    /// Reading objects out of the fetched repository failed
    #[error("checkout error: {}", .0.message())]
    Checkout(#[source] git2::Error),

    /// The caller gave up before the fetch finished
    #[error("context deadline exceeded")]
    Cancelled,

    /// Scratch directory could not be created
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Background task failed
    #[error("internal error: {0}")]
    Internal(String),
}

impl GitError {
    /// Whether a later attempt could plausibly succeed
    ///
    /// Only transport-level failures qualify. Missing refs, objects and files
    /// are facts about the repository and will not change on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            GitError::Clone(e) => matches!(
                e.class(),
                ErrorClass::Net
                    | ErrorClass::Http
                    | ErrorClass::Ssh
                    | ErrorClass::Ssl
                    | ErrorClass::Os
            ),
            GitError::Io(_) => true,
            _ => false,
        }
    }
}

impl From<GitError> for ResolverError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::InvalidParams(msg) => ResolverError::InvalidParams(msg),
            GitError::Cancelled => ResolverError::DeadlineExceeded,
            e if e.is_transient() => ResolverError::transient(e.to_string()),
            e => ResolverError::failed(e.to_string()),
        }
    }
}
