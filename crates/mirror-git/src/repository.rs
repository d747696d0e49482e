//! Working-copy handle: clone/open, remotes, fetch, checkout and push

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{AutotagOption, BranchType, ErrorCode, FetchOptions, Oid, PushOptions, Repository, StatusOptions};

use crate::{Credentials, Error, Identity, Result, ShortSha};

/// A named remote and the URL it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub url: String,
}

impl Remote {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// A single checked-out working copy.
///
/// Every git operation of a mirror run goes through one handle, which owns
/// the underlying repository exclusively for the lifetime of the run.
pub struct RepositoryHandle {
    pub(crate) repo: Repository,
    path: PathBuf,
    pub(crate) credentials: Credentials,
    pub(crate) identity: Option<Identity>,
}

impl std::fmt::Debug for RepositoryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryHandle")
            .field("path", &self.path)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl RepositoryHandle {
    /// Open `local_path` if it already holds a working copy, otherwise clone
    /// `uri` into it.
    pub fn open_or_clone(uri: &str, local_path: impl AsRef<Path>, credentials: Credentials) -> Result<Self> {
        let local_path = local_path.as_ref();
        match Repository::open(local_path) {
            Ok(repo) => {
                tracing::debug!(path = %local_path.display(), "Opening existing working copy");
                Self::from_repository(repo, local_path, credentials)
            }
            Err(e) if e.code() == ErrorCode::NotFound => Self::clone(uri, local_path, credentials),
            Err(e) => Err(e.into()),
        }
    }

    /// Clone `uri` into `local_path`.
    ///
    /// The fresh working copy must be non-bare and clean.
    pub fn clone(uri: &str, local_path: impl AsRef<Path>, credentials: Credentials) -> Result<Self> {
        let local_path = local_path.as_ref();
        tracing::debug!(uri, path = %local_path.display(), "Cloning repository");

        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(credentials.callbacks());
        let repo = RepoBuilder::new()
            .fetch_options(fetch_opts)
            .clone(uri, local_path)
            .map_err(|e| Error::Clone {
                uri: uri.to_string(),
                message: e.message().to_string(),
            })?;

        let handle = Self::from_repository(repo, local_path, credentials)?;
        if handle.is_dirty()? {
            return Err(Error::RepositoryState {
                path: local_path.to_path_buf(),
                reason: "working copy has uncommitted changes right after clone".into(),
            });
        }
        Ok(handle)
    }

    /// Open an existing working copy, e.g. one produced by archive extraction.
    pub fn open(local_path: impl AsRef<Path>, credentials: Credentials) -> Result<Self> {
        let local_path = local_path.as_ref();
        let repo = Repository::open(local_path)?;
        Self::from_repository(repo, local_path, credentials)
    }

    fn from_repository(repo: Repository, path: &Path, credentials: Credentials) -> Result<Self> {
        if repo.is_bare() {
            return Err(Error::RepositoryState {
                path: path.to_path_buf(),
                reason: "repository is bare".into(),
            });
        }
        Ok(Self {
            repo,
            path: path.to_path_buf(),
            credentials,
            identity: None,
        })
    }

    /// Use `identity` for merge commits instead of the git config signature.
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Path of the working copy.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the working copy has uncommitted changes (untracked files included).
    pub fn is_dirty(&self) -> Result<bool> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        Ok(!statuses.is_empty())
    }

    // ------------------------------------------------------------------
    // Remotes
    // ------------------------------------------------------------------

    /// Configured remotes by name.
    pub fn remotes(&self) -> Result<BTreeMap<String, String>> {
        let names = self.repo.remotes()?;
        let mut result = BTreeMap::new();
        for name in names.iter().flatten() {
            let remote = self.repo.find_remote(name)?;
            result.insert(name.to_string(), remote.url().unwrap_or_default().to_string());
        }
        Ok(result)
    }

    /// URL of remote `name`.
    pub fn remote_url(&self, name: &str) -> Result<String> {
        let remote = self.find_remote(name)?;
        Ok(remote.url().unwrap_or_default().to_string())
    }

    /// Add a new remote. Fails if the name is taken, whatever its URL.
    pub fn add_remote(&mut self, name: &str, uri: &str) -> Result<Remote> {
        if self.repo.find_remote(name).is_ok() {
            return Err(Error::RemoteExists {
                name: name.to_string(),
            });
        }
        tracing::debug!(remote = name, uri, "Adding remote");
        self.repo.remote(name, uri)?;
        let url = self.remote_url(name)?;
        Ok(Remote::new(name, url))
    }

    /// Remove an existing remote and its remote-tracking refs.
    pub fn remove_remote(&mut self, name: &str) -> Result<()> {
        self.find_remote(name)?;
        tracing::debug!(remote = name, "Removing remote");
        self.repo.remote_delete(name)?;
        Ok(())
    }

    pub(crate) fn find_remote(&self, name: &str) -> Result<git2::Remote<'_>> {
        self.repo.find_remote(name).map_err(|_| Error::RemoteNotFound {
            name: name.to_string(),
        })
    }

    /// Fetch all refs of each named remote, one after another.
    ///
    /// Not transactional: refs of remotes fetched before a failure stay updated.
    pub fn fetch<S: AsRef<str>>(&mut self, remote_names: &[S]) -> Result<()> {
        for name in remote_names {
            let name = name.as_ref();
            let mut remote = self.find_remote(name)?;
            tracing::debug!(remote = name, "Fetching");

            let mut fetch_opts = FetchOptions::new();
            fetch_opts
                .remote_callbacks(self.credentials.callbacks())
                .download_tags(AutotagOption::Auto);
            remote
                .fetch(&[] as &[&str], Some(&mut fetch_opts), None)
                .map_err(|e| Error::Fetch {
                    remote: name.to_string(),
                    message: e.message().to_string(),
                })?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Branches
    // ------------------------------------------------------------------

    /// Whether a local branch named `name` exists.
    pub fn branch_exists(&self, name: &str) -> bool {
        self.repo.find_branch(name, BranchType::Local).is_ok()
    }

    /// Current branch, or `None` when HEAD is detached or unborn.
    pub fn current_branch(&self) -> Result<Option<String>> {
        let head = match self.repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if head.is_branch() {
            Ok(head.shorthand().map(String::from))
        } else {
            Ok(None)
        }
    }

    /// Short id of the commit HEAD points at.
    pub fn head_short_sha(&self) -> Result<ShortSha> {
        let commit = self.repo.head()?.peel_to_commit()?;
        Ok(ShortSha::from_oid(commit.id()))
    }

    /// Full id of the tip of local branch `name`.
    pub fn branch_commit(&self, name: &str) -> Result<Oid> {
        let branch = self
            .repo
            .find_branch(name, BranchType::Local)
            .map_err(|_| Error::BranchNotFound {
                name: name.to_string(),
            })?;
        Ok(branch.get().peel_to_commit()?.id())
    }

    /// Check out `local_branch`, creating it from `remote_name/remote_branch`
    /// first if it does not exist yet.
    ///
    /// An existing local branch is checked out as-is, never moved to the
    /// newer remote state. Returns the short id of the checked-out head.
    pub fn checkout_remote_branch(
        &mut self,
        local_branch: &str,
        remote_name: &str,
        remote_branch: &str,
    ) -> Result<ShortSha> {
        self.find_remote(remote_name)?;

        if !self.branch_exists(local_branch) {
            let tracking = format!("{remote_name}/{remote_branch}");
            let commit = self
                .repo
                .find_branch(&tracking, BranchType::Remote)
                .map_err(|_| Error::RemoteBranchNotFound {
                    remote: remote_name.to_string(),
                    branch: remote_branch.to_string(),
                })?
                .get()
                .peel_to_commit()?;

            tracing::debug!(branch = local_branch, tracking = %tracking, "Creating local branch");
            let mut branch = self.repo.branch(local_branch, &commit, false)?;
            branch.set_upstream(Some(&tracking))?;
        }

        self.checkout_local(local_branch)?;
        self.head_short_sha()
    }

    /// Point HEAD and the working directory at local branch `name`.
    pub(crate) fn checkout_local(&self, name: &str) -> Result<()> {
        let refname = format!("refs/heads/{name}");
        let target = self
            .repo
            .find_reference(&refname)
            .map_err(|_| Error::BranchNotFound {
                name: name.to_string(),
            })?
            .peel(git2::ObjectType::Commit)?;

        let mut opts = CheckoutBuilder::new();
        opts.safe();
        self.repo.checkout_tree(&target, Some(&mut opts))?;
        self.repo.set_head(&refname)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Push
    // ------------------------------------------------------------------

    /// Force-push `local_branch` to `remote_branch` on `remote_name`, then
    /// push all local tags.
    ///
    /// The tag push is best-effort: its failure is logged, not returned.
    pub fn push(&mut self, remote_name: &str, local_branch: &str, remote_branch: &str) -> Result<()> {
        let mut remote = self.find_remote(remote_name)?;
        self.branch_commit(local_branch)?;

        let refspec = format!("+refs/heads/{local_branch}:refs/heads/{remote_branch}");
        tracing::debug!(remote = remote_name, refspec = %refspec, "Pushing branch");
        self.push_refspecs(&mut remote, remote_name, &[refspec])?;

        let tag_specs: Vec<String> = self
            .repo
            .tag_names(None)?
            .iter()
            .flatten()
            .map(|tag| format!("refs/tags/{tag}:refs/tags/{tag}"))
            .collect();
        if !tag_specs.is_empty() {
            tracing::debug!(remote = remote_name, count = tag_specs.len(), "Pushing tags");
            if let Err(e) = self.push_refspecs(&mut remote, remote_name, &tag_specs) {
                tracing::warn!(remote = remote_name, error = %e, "Tag push failed");
            }
        }
        Ok(())
    }

    fn push_refspecs(&self, remote: &mut git2::Remote<'_>, remote_name: &str, refspecs: &[String]) -> Result<()> {
        let rejected: RefCell<Option<(String, String)>> = RefCell::new(None);
        {
            let mut callbacks = self.credentials.callbacks();
            callbacks.push_update_reference(|reference, status| {
                if let Some(message) = status {
                    *rejected.borrow_mut() = Some((reference.to_string(), message.to_string()));
                }
                Ok(())
            });

            let mut push_opts = PushOptions::new();
            push_opts.remote_callbacks(callbacks);
            remote.push(refspecs, Some(&mut push_opts)).map_err(|e| Error::Push {
                remote: remote_name.to_string(),
                message: e.message().to_string(),
            })?;
        }

        if let Some((reference, message)) = rejected.into_inner() {
            return Err(Error::PushRejected {
                remote: remote_name.to_string(),
                reference,
                message,
            });
        }
        Ok(())
    }
}
