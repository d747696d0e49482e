//! Git working-copy handle for git-mirror
//!
//! Wraps a single checkout and exposes the operations a mirror run needs:
//! remote management, fetch, branch materialization from remote-tracking refs,
//! conflict-tolerant merging and force-pushing.

pub mod auth;
pub mod error;
pub mod merge;
pub mod naming;
pub mod repository;

pub use auth::{Credentials, Identity};
pub use error::{Error, ErrorKind, Result};
pub use merge::MergeOutcome;
pub use naming::{PrBranchName, SHORT_SHA_LEN, ShortSha};
pub use repository::{Remote, RepositoryHandle};

/// Re-exported so callers can name commit ids without depending on git2.
pub use git2::Oid;
