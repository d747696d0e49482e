//! The mirror run state machine
//!
//! ```text
//! Init -> RemotesConfigured -> Fetched -> BranchesCheckedOut -> Merged
//!                                                                 |
//!                                          NoOpStop <-------------+
//!                                                                 |
//!                                     PrRequested <- Pushed <-----+
//! ```
//!
//! Any failing step moves the run to `Failed`. Nothing is retried.

use std::fmt;

use mirror_git::{Credentials, Identity, MergeOutcome, PrBranchName, RepositoryHandle, ShortSha};
use mirror_review::{PrHandle, PullRequestRequest, ReviewPlatform};

use crate::lock::RunLock;
use crate::plan::{MirrorPlan, PrOnlyPlan, WorkingCopy};
use crate::{Error, Result, RunStep};

/// Where a run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    RemotesConfigured,
    Fetched,
    BranchesCheckedOut,
    Merged,
    /// The merge left the source branch where it was; nothing to propose.
    NoOpStop,
    Pushed,
    PrRequested,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::RemotesConfigured => "remotes_configured",
            Self::Fetched => "fetched",
            Self::BranchesCheckedOut => "branches_checked_out",
            Self::Merged => "merged",
            Self::NoOpStop => "no_op_stop",
            Self::Pushed => "pushed",
            Self::PrRequested => "pr_requested",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Upstream brought nothing new; no push, no PR.
    NoOp { base_sha: ShortSha },
    PullRequest {
        pr_branch: PrBranchName,
        base_sha: ShortSha,
        upstream_sha: ShortSha,
        merge: MergeOutcome,
        pr: PrHandle,
    },
}

/// Drives one mirror run at a time through [`RunState`].
#[derive(Debug)]
pub struct MirrorOrchestrator {
    credentials: Credentials,
    identity: Option<Identity>,
    state: RunState,
    history: Vec<RunState>,
}

impl Default for MirrorOrchestrator {
    fn default() -> Self {
        Self::new(Credentials::none())
    }
}

impl MirrorOrchestrator {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            identity: None,
            state: RunState::Init,
            history: vec![RunState::Init],
        }
    }

    /// Author merge commits as `identity` in working copies this orchestrator opens.
    pub fn with_identity(mut self, identity: Option<Identity>) -> Self {
        self.identity = identity;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state the last run passed through, starting with `Init`.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Lock the working copy, obtain it, and run the plan against it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Locked`] if another run holds the working copy, or the
    /// failing step's error. The state is `Failed` afterwards in the latter case.
    pub fn run(&mut self, plan: &MirrorPlan, platform: &dyn ReviewPlatform) -> Result<RunOutcome> {
        self.reset();
        let _lock = RunLock::acquire(plan.workdir.path())?;

        let opened = match &plan.workdir {
            WorkingCopy::Clone { uri, path } => {
                RepositoryHandle::open_or_clone(uri, path, self.credentials.clone())
            }
            WorkingCopy::Open { path } => RepositoryHandle::open(path, self.credentials.clone()),
        };
        let mut handle = self.git_step(RunStep::OpenWorkingCopy, opened)?;
        if let Some(identity) = self.identity.clone() {
            handle = handle.with_identity(identity);
        }

        self.run_with_handle(&mut handle, plan, platform)
    }

    /// Run the plan against a working copy the caller already holds.
    ///
    /// `plan.workdir` is not consulted and no lock is taken.
    ///
    /// # Errors
    ///
    /// Returns the failing step's error; the state is `Failed` afterwards.
    pub fn run_with_handle(
        &mut self,
        handle: &mut RepositoryHandle,
        plan: &MirrorPlan,
        platform: &dyn ReviewPlatform,
    ) -> Result<RunOutcome> {
        self.reset();

        let remote = &plan.added_remote;
        self.git_step(RunStep::AddRemote, handle.add_remote(&remote.name, &remote.url))?;
        self.transition(RunState::RemotesConfigured);

        self.git_step(RunStep::Fetch, handle.fetch(&plan.fetch_order()))?;
        self.transition(RunState::Fetched);

        let base_sha = self.git_step(
            RunStep::CheckoutSource,
            handle.checkout_remote_branch(&plan.local_source_branch, &plan.source.remote, &plan.source.branch),
        )?;
        let upstream_sha = self.git_step(
            RunStep::CheckoutUpstream,
            handle.checkout_remote_branch(
                &plan.local_upstream_branch,
                &plan.upstream.remote,
                &plan.upstream.branch,
            ),
        )?;
        self.transition(RunState::BranchesCheckedOut);

        let pr_branch = PrBranchName::new(&base_sha, &upstream_sha);
        tracing::debug!(base = %base_sha, upstream = %upstream_sha, pr_branch = %pr_branch, "Captured branch heads");

        let merge = self.git_step(
            RunStep::Merge,
            handle.merge(
                &plan.local_source_branch,
                &plan.local_upstream_branch,
                &plan.merge_message,
                true,
            ),
        )?;
        self.transition(RunState::Merged);

        if merge.short_sha() == base_sha {
            tracing::info!(base = %base_sha, "No upstream changes, skipping push and pull request");
            self.transition(RunState::NoOpStop);
            return Ok(RunOutcome::NoOp { base_sha });
        }

        self.git_step(
            RunStep::PushPrBranch,
            handle.push(&plan.source.remote, &plan.local_source_branch, pr_branch.as_str()),
        )?;
        self.git_step(
            RunStep::PushUpstreamRecord,
            handle.push(
                &plan.source.remote,
                &plan.local_upstream_branch,
                &plan.upstream_record_branch,
            ),
        )?;
        self.transition(RunState::Pushed);

        let pr = self.open_pull_request(
            platform,
            &plan.repository_name,
            PullRequestRequest {
                merge_was_clean: merge.is_clean(),
                upstream_commit: upstream_sha.to_string(),
                base_commit: base_sha.to_string(),
                source_ref: pr_branch.ref_name(),
                target_ref: plan.target_ref.clone(),
                repository_id: String::new(),
            },
        )?;

        Ok(RunOutcome::PullRequest {
            pr_branch,
            base_sha,
            upstream_sha,
            merge,
            pr,
        })
    }

    /// Raise the PR for a branch that was merged and pushed by an earlier run.
    ///
    /// The merge is reported as clean: its real outcome is not known here.
    ///
    /// # Errors
    ///
    /// Fails at [`RunStep::ValidateInput`] if the branch name or commit ids
    /// are malformed, otherwise with the platform's error.
    pub fn request_pull_request(&mut self, plan: &PrOnlyPlan, platform: &dyn ReviewPlatform) -> Result<PrHandle> {
        self.reset();

        let pr_branch = self.git_step(RunStep::ValidateInput, PrBranchName::parse(&plan.pr_branch))?;
        let base_sha = self.git_step(RunStep::ValidateInput, ShortSha::parse(&plan.base_sha))?;
        let upstream_sha = self.git_step(RunStep::ValidateInput, ShortSha::parse(&plan.upstream_sha))?;
        if pr_branch.base() != &base_sha || pr_branch.upstream() != &upstream_sha {
            tracing::warn!(
                pr_branch = %pr_branch,
                base = %base_sha,
                upstream = %upstream_sha,
                "PR branch name does not match the given commit ids"
            );
        }

        self.open_pull_request(
            platform,
            &plan.repository_name,
            PullRequestRequest {
                merge_was_clean: true,
                upstream_commit: upstream_sha.to_string(),
                base_commit: base_sha.to_string(),
                source_ref: pr_branch.ref_name(),
                target_ref: plan.target_ref.clone(),
                repository_id: String::new(),
            },
        )
    }

    /// Resolve the repository id into `request` and create the PR.
    fn open_pull_request(
        &mut self,
        platform: &dyn ReviewPlatform,
        repository_name: &str,
        mut request: PullRequestRequest,
    ) -> Result<PrHandle> {
        request.repository_id = self.review_step(
            RunStep::ResolveRepository,
            platform.resolve_repository_id(repository_name),
        )?;
        let pr = self.review_step(RunStep::CreatePullRequest, platform.create_pull_request(&request))?;

        tracing::info!(
            provider = platform.provider_name(),
            pr_id = pr.id,
            created = pr.created,
            source = %request.source_ref,
            target = %request.target_ref,
            "Pull request requested"
        );
        self.transition(RunState::PrRequested);
        Ok(pr)
    }

    fn reset(&mut self) {
        self.state = RunState::Init;
        self.history.clear();
        self.history.push(RunState::Init);
    }

    fn transition(&mut self, state: RunState) {
        tracing::info!(from = %self.state, to = %state, "Mirror run state changed");
        self.state = state;
        self.history.push(state);
    }

    fn git_step<T>(&mut self, step: RunStep, result: mirror_git::Result<T>) -> Result<T> {
        result.map_err(|source| {
            tracing::error!(step = %step, error = %source, "Mirror step failed");
            self.transition(RunState::Failed);
            Error::Step { step, source }
        })
    }

    fn review_step<T>(&mut self, step: RunStep, result: mirror_review::Result<T>) -> Result<T> {
        result.map_err(|source| {
            tracing::error!(step = %step, error = %source, "Review platform step failed");
            self.transition(RunState::Failed);
            Error::Review { step, source }
        })
    }
}
