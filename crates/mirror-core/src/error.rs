//! Error types for mirror-core

use std::fmt;
use std::path::PathBuf;

/// Result type for mirror-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// A step of a mirror run, named in errors so the failing stage is obvious.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStep {
    OpenWorkingCopy,
    AddRemote,
    Fetch,
    CheckoutSource,
    CheckoutUpstream,
    Merge,
    PushPrBranch,
    PushUpstreamRecord,
    ValidateInput,
    ResolveRepository,
    CreatePullRequest,
}

impl fmt::Display for RunStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OpenWorkingCopy => "open working copy",
            Self::AddRemote => "add remote",
            Self::Fetch => "fetch",
            Self::CheckoutSource => "checkout source branch",
            Self::CheckoutUpstream => "checkout upstream branch",
            Self::Merge => "merge",
            Self::PushPrBranch => "push PR branch",
            Self::PushUpstreamRecord => "push upstream record branch",
            Self::ValidateInput => "validate input",
            Self::ResolveRepository => "resolve repository",
            Self::CreatePullRequest => "create pull request",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in mirror-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A git step of the run failed
    #[error("Step '{step}' failed: {source}")]
    Step {
        step: RunStep,
        #[source]
        source: mirror_git::Error,
    },

    /// A review-platform call failed
    #[error("Step '{step}' failed: {source}")]
    Review {
        step: RunStep,
        #[source]
        source: mirror_review::Error,
    },

    /// Download or extraction of a repository archive failed
    #[error("Archive error for {location}: {message}")]
    Archive { location: String, message: String },

    /// Another run holds the working-copy lock
    #[error("Working copy is locked by another run: {path}")]
    Locked { path: PathBuf },

    /// Configuration file could not be read or parsed
    #[error("Invalid configuration in {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The run step that failed, if this error came from one.
    pub fn step(&self) -> Option<RunStep> {
        match self {
            Self::Step { step, .. } | Self::Review { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Classification of the underlying git error, if any.
    pub fn git_kind(&self) -> Option<mirror_git::ErrorKind> {
        match self {
            Self::Step { source, .. } => Some(source.kind()),
            _ => None,
        }
    }

    pub(crate) fn archive(location: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::Archive {
            location: location.to_string(),
            message: message.to_string(),
        }
    }
}
