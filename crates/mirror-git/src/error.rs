//! Error types for mirror-git

use std::path::PathBuf;

/// Result type for mirror-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mirror-git operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Repository at {path} is unusable: {reason}")]
    RepositoryState { path: PathBuf, reason: String },

    #[error("Failed to clone {uri}: {message}")]
    Clone { uri: String, message: String },

    #[error("Remote '{name}' already exists")]
    RemoteExists { name: String },

    #[error("Remote '{name}' not found")]
    RemoteNotFound { name: String },

    #[error("Branch '{name}' not found")]
    BranchNotFound { name: String },

    #[error("Remote branch '{remote}/{branch}' not found (was the remote fetched?)")]
    RemoteBranchNotFound { remote: String, branch: String },

    #[error("Fetch from '{remote}' failed: {message}")]
    Fetch { remote: String, message: String },

    #[error("Push to '{remote}' failed: {message}")]
    Push { remote: String, message: String },

    #[error("Push of {reference} to '{remote}' was rejected: {message}")]
    PushRejected {
        remote: String,
        reference: String,
        message: String,
    },

    #[error("Merging '{feature}' into '{base}' produced conflicts in: {}", paths.join(", "))]
    MergeConflict {
        base: String,
        feature: String,
        paths: Vec<String>,
    },

    #[error("Invalid short commit id '{value}': expected 8 hex characters")]
    InvalidShortSha { value: String },

    #[error("Invalid PR branch name '{name}': expected pr_base_<sha>_upstream_<sha>")]
    InvalidPrBranch { name: String },
}

/// Coarse classification of an [`Error`], used by callers that react to the
/// failure category rather than the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Clone/open produced a bare or dirty working copy.
    Setup,
    /// A remote is missing or duplicated.
    Remote,
    /// A local or remote-tracking branch is missing.
    Branch,
    /// A merge conflicted and forced commits were disabled.
    MergeConflict,
    /// Transport failure while talking to a remote.
    Network,
    /// Caller supplied a malformed identifier.
    Input,
    /// Any other libgit2 failure.
    Git,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RepositoryState { .. } => ErrorKind::Setup,
            Self::RemoteExists { .. } | Self::RemoteNotFound { .. } => ErrorKind::Remote,
            Self::BranchNotFound { .. } | Self::RemoteBranchNotFound { .. } => ErrorKind::Branch,
            Self::MergeConflict { .. } => ErrorKind::MergeConflict,
            Self::Clone { .. } | Self::Fetch { .. } | Self::Push { .. } | Self::PushRejected { .. } => {
                ErrorKind::Network
            }
            Self::InvalidShortSha { .. } | Self::InvalidPrBranch { .. } => ErrorKind::Input,
            Self::Git(_) => ErrorKind::Git,
        }
    }
}
