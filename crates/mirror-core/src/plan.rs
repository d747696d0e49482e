//! Run plans: everything a mirror run needs to know up front

use std::path::{Path, PathBuf};

use mirror_git::Remote;

pub const DEFAULT_LOCAL_SOURCE_BRANCH: &str = "local_source_branch";
pub const DEFAULT_LOCAL_UPSTREAM_BRANCH: &str = "local_upstream_branch";
pub const DEFAULT_UPSTREAM_RECORD_BRANCH: &str = "upstream";

/// Remote name the source repository is cloned or added as.
pub const SOURCE_REMOTE: &str = "origin";
/// Remote name the upstream repository is added as in clone mode.
pub const UPSTREAM_REMOTE: &str = "upstream";

/// Upstream remote already present in an extracted archive.
pub const DEFAULT_ARCHIVE_UPSTREAM_REMOTE: &str = "hg";
/// Branch used on both sides in archive mode.
pub const DEFAULT_ARCHIVE_BRANCH: &str = "master";
/// PR target branch when none is given.
pub const DEFAULT_TARGET_BRANCH: &str = "master";

/// Where the working copy comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkingCopy {
    /// Clone `uri` into `path`, or reuse `path` if it already holds a clone.
    Clone { uri: String, path: PathBuf },
    /// Open an existing working copy, e.g. an extracted archive.
    Open { path: PathBuf },
}

impl WorkingCopy {
    pub fn path(&self) -> &Path {
        match self {
            Self::Clone { path, .. } | Self::Open { path } => path,
        }
    }
}

/// A branch on a named remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    pub remote: String,
    pub branch: String,
}

impl BranchRef {
    pub fn new(remote: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            branch: branch.into(),
        }
    }
}

/// Local branch names used during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchNames {
    pub local_source: String,
    pub local_upstream: String,
    /// Branch on the source remote that records the last-seen upstream state.
    pub upstream_record: String,
}

impl Default for BranchNames {
    fn default() -> Self {
        Self {
            local_source: DEFAULT_LOCAL_SOURCE_BRANCH.to_string(),
            local_upstream: DEFAULT_LOCAL_UPSTREAM_BRANCH.to_string(),
            upstream_record: DEFAULT_UPSTREAM_RECORD_BRANCH.to_string(),
        }
    }
}

/// A complete description of one mirror run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorPlan {
    pub workdir: WorkingCopy,
    /// Remote added to the working copy before fetching.
    pub added_remote: Remote,
    /// Downstream branch the upstream is merged into.
    pub source: BranchRef,
    pub upstream: BranchRef,
    pub local_source_branch: String,
    pub local_upstream_branch: String,
    pub upstream_record_branch: String,
    pub merge_message: String,
    /// Fully qualified PR target ref.
    pub target_ref: String,
    /// Repository name on the review platform.
    pub repository_name: String,
}

impl MirrorPlan {
    /// Clone the source repository as `origin` and add the upstream as `upstream`.
    pub fn clone_mode(
        source_uri: &str,
        source_branch: &str,
        upstream_uri: &str,
        upstream_branch: &str,
        workdir: impl Into<PathBuf>,
        repository: &str,
    ) -> Self {
        Self {
            workdir: WorkingCopy::Clone {
                uri: source_uri.to_string(),
                path: workdir.into(),
            },
            added_remote: Remote::new(UPSTREAM_REMOTE, upstream_uri),
            source: BranchRef::new(SOURCE_REMOTE, source_branch),
            upstream: BranchRef::new(UPSTREAM_REMOTE, upstream_branch),
            local_source_branch: DEFAULT_LOCAL_SOURCE_BRANCH.to_string(),
            local_upstream_branch: DEFAULT_LOCAL_UPSTREAM_BRANCH.to_string(),
            upstream_record_branch: DEFAULT_UPSTREAM_RECORD_BRANCH.to_string(),
            merge_message: merge_message(upstream_branch, source_branch),
            target_ref: format!("refs/heads/{source_branch}"),
            repository_name: repository.to_string(),
        }
    }

    /// Open an extracted working copy that already tracks `upstream_remote`
    /// and add the source repository as `origin`.
    ///
    /// `branch` is used on both sides and as the PR target.
    pub fn archive_mode(
        extracted_dir: impl Into<PathBuf>,
        source_uri: &str,
        upstream_remote: &str,
        branch: &str,
        repository: &str,
    ) -> Self {
        Self {
            workdir: WorkingCopy::Open {
                path: extracted_dir.into(),
            },
            added_remote: Remote::new(SOURCE_REMOTE, source_uri),
            source: BranchRef::new(SOURCE_REMOTE, branch),
            upstream: BranchRef::new(upstream_remote, branch),
            local_source_branch: DEFAULT_LOCAL_SOURCE_BRANCH.to_string(),
            local_upstream_branch: DEFAULT_LOCAL_UPSTREAM_BRANCH.to_string(),
            upstream_record_branch: DEFAULT_UPSTREAM_RECORD_BRANCH.to_string(),
            merge_message: merge_message(branch, branch),
            target_ref: format!("refs/heads/{branch}"),
            repository_name: repository.to_string(),
        }
    }

    /// Override the local and record branch names.
    pub fn with_branch_names(mut self, names: &BranchNames) -> Self {
        self.local_source_branch = names.local_source.clone();
        self.local_upstream_branch = names.local_upstream.clone();
        self.upstream_record_branch = names.upstream_record.clone();
        self
    }

    pub fn with_target_ref(mut self, target_ref: impl Into<String>) -> Self {
        self.target_ref = target_ref.into();
        self
    }

    pub fn with_merge_message(mut self, message: impl Into<String>) -> Self {
        self.merge_message = message.into();
        self
    }

    /// Remotes fetched in step 3, source first.
    pub fn fetch_order(&self) -> [&str; 2] {
        [self.source.remote.as_str(), self.upstream.remote.as_str()]
    }
}

/// Inputs of a PR-only run, where merging and pushing happened elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrOnlyPlan {
    pub pr_branch: String,
    pub upstream_sha: String,
    pub base_sha: String,
    pub target_ref: String,
    pub repository_name: String,
}

impl PrOnlyPlan {
    pub fn new(pr_branch: &str, upstream_sha: &str, base_sha: &str, repository: &str) -> Self {
        Self {
            pr_branch: pr_branch.to_string(),
            upstream_sha: upstream_sha.to_string(),
            base_sha: base_sha.to_string(),
            target_ref: target_ref(DEFAULT_TARGET_BRANCH),
            repository_name: repository.to_string(),
        }
    }

    pub fn with_target_branch(mut self, branch: &str) -> Self {
        self.target_ref = target_ref(branch);
        self
    }
}

/// Default merge commit message.
pub fn merge_message(upstream_branch: &str, source_branch: &str) -> String {
    format!("Merge upstream branch {upstream_branch} into branch {source_branch}")
}

/// Qualify a branch name as a ref, leaving qualified refs alone.
pub fn target_ref(branch: &str) -> String {
    if branch.starts_with("refs/") {
        branch.to_string()
    } else {
        format!("refs/heads/{branch}")
    }
}
