//! Review-platform client for git-mirror
//!
//! The orchestrator only needs two things from the platform hosting the
//! downstream repository: turn a repository name into its id, and open a pull
//! request between two refs. [`ReviewPlatform`] is that seam;
//! [`AzureDevOpsClient`] is the production implementation.

pub mod azure;
pub mod error;

use serde::{Deserialize, Serialize};

pub use azure::{AzureDevOpsClient, AzureDevOpsConfig};
pub use error::{Error, Result};

/// Everything needed to open a mirror pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRequest {
    /// `false` when the merge committed conflict markers.
    pub merge_was_clean: bool,
    /// Short id of the upstream branch head before merging.
    pub upstream_commit: String,
    /// Short id of the source branch head before merging.
    pub base_commit: String,
    /// Fully qualified ref the PR is raised from.
    pub source_ref: String,
    /// Fully qualified ref the PR merges into.
    pub target_ref: String,
    pub repository_id: String,
}

/// A pull request on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrHandle {
    pub id: u64,
    pub url: Option<String>,
    /// `false` if an active PR for the same refs already existed and was reused.
    pub created: bool,
}

/// Review platform operations used by a mirror run.
pub trait ReviewPlatform {
    /// Short provider name for logs.
    fn provider_name(&self) -> &'static str;

    /// Resolve a repository name to the platform's repository id.
    ///
    /// # Errors
    ///
    /// Returns an error when the repository does not exist or the request fails.
    fn resolve_repository_id(&self, repository_name: &str) -> Result<String>;

    /// Create a pull request, or return the active one for the same refs.
    ///
    /// # Errors
    ///
    /// Returns an error when creation fails or is unauthorized.
    fn create_pull_request(&self, request: &PullRequestRequest) -> Result<PrHandle>;
}
