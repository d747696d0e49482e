//! Conflict-tolerant merging of two local branches

use std::path::Path;

use git2::build::CheckoutBuilder;
use git2::{ErrorCode, Index, IndexAddOption, MergeOptions, Oid, Signature};

use crate::{Error, RepositoryHandle, Result, ShortSha};

/// How a merge concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The feature branch merged without conflicts (or there was nothing to merge).
    CleanMerge { commit: Oid },

    /// The merge conflicted and the conflicted tree was committed as-is,
    /// conflict markers included. Needs human review.
    ForcedMerge {
        commit: Oid,
        conflicted_paths: Vec<String>,
    },
}

impl MergeOutcome {
    /// Commit the base branch points at after the merge.
    pub fn commit(&self) -> Oid {
        match self {
            Self::CleanMerge { commit } | Self::ForcedMerge { commit, .. } => *commit,
        }
    }

    pub fn short_sha(&self) -> ShortSha {
        ShortSha::from_oid(self.commit())
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, Self::CleanMerge { .. })
    }
}

impl RepositoryHandle {
    /// Merge local branch `feature` into local branch `base`.
    ///
    /// `base` is checked out first. Up-to-date and fast-forward cases create
    /// no merge commit. On conflict, `force_commit` decides between returning
    /// [`Error::MergeConflict`] (the half-merged state is left on disk) and
    /// committing the conflicted files as they are.
    pub fn merge(&mut self, base: &str, feature: &str, message: &str, force_commit: bool) -> Result<MergeOutcome> {
        let base_id = self.branch_commit(base)?;
        let feature_id = self.branch_commit(feature)?;
        self.checkout_local(base)?;

        let annotated = self.repo.find_annotated_commit(feature_id)?;
        let (analysis, _) = self.repo.merge_analysis(&[&annotated])?;

        if analysis.is_up_to_date() {
            tracing::debug!(base, feature, "Already up to date");
            return Ok(MergeOutcome::CleanMerge { commit: base_id });
        }

        if analysis.is_fast_forward() {
            tracing::debug!(base, feature, "Fast-forwarding");
            let refname = format!("refs/heads/{base}");
            let mut reference = self.repo.find_reference(&refname)?;
            reference.set_target(feature_id, &format!("merge {feature}: fast-forward"))?;
            self.repo
                .checkout_head(Some(CheckoutBuilder::default().force()))?;
            return Ok(MergeOutcome::CleanMerge { commit: feature_id });
        }

        let mut merge_opts = MergeOptions::new();
        let mut checkout = CheckoutBuilder::new();
        checkout.allow_conflicts(true).conflict_style_merge(true);
        self.repo
            .merge(&[&annotated], Some(&mut merge_opts), Some(&mut checkout))?;

        let mut index = self.repo.index()?;
        let conflicted_paths = conflicted_paths(&index)?;

        if !conflicted_paths.is_empty() {
            if !force_commit {
                return Err(Error::MergeConflict {
                    base: base.to_string(),
                    feature: feature.to_string(),
                    paths: conflicted_paths,
                });
            }
            tracing::warn!(
                base,
                feature,
                paths = ?conflicted_paths,
                "Automatic merge failed, committing conflicted files as-is"
            );
            stage_as_is(&mut index)?;
        }

        let commit = self.commit_merge(&mut index, message, base_id, feature_id)?;
        self.repo.cleanup_state()?;

        if conflicted_paths.is_empty() {
            Ok(MergeOutcome::CleanMerge { commit })
        } else {
            Ok(MergeOutcome::ForcedMerge {
                commit,
                conflicted_paths,
            })
        }
    }

    fn commit_merge(&self, index: &mut Index, message: &str, base_id: Oid, feature_id: Oid) -> Result<Oid> {
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let signature = self.signature()?;
        let head_commit = self.repo.find_commit(base_id)?;
        let feature_commit = self.repo.find_commit(feature_id)?;

        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &[&head_commit, &feature_commit],
        )?;
        tracing::debug!(commit = %oid, "Created merge commit");
        Ok(oid)
    }

    /// Configured identity, else the git config signature, else the fallback identity.
    fn signature(&self) -> Result<Signature<'static>> {
        if let Some(identity) = &self.identity {
            return Ok(identity.signature()?);
        }
        match self.repo.signature() {
            Ok(sig) => Ok(sig),
            Err(_) => Ok(crate::Identity::default().signature()?),
        }
    }
}

/// Stage the working directory as it is, like `git add --all`.
///
/// Conflict entries are dropped first. Every file on disk is then added,
/// conflict markers and libgit2's `<path>~<side>` copies included, and paths
/// missing from the working directory are removed.
fn stage_as_is(index: &mut Index) -> Result<()> {
    let mut paths = Vec::new();
    for conflict in index.conflicts()? {
        let conflict = conflict?;
        for entry in [conflict.ancestor, conflict.our, conflict.their].into_iter().flatten() {
            paths.push(String::from_utf8_lossy(&entry.path).into_owned());
        }
    }
    paths.sort();
    paths.dedup();

    for path in &paths {
        match index.conflict_remove(Path::new(path)) {
            Ok(()) => {}
            Err(e) if e.code() == ErrorCode::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
    index.update_all(["*"], None)?;
    index.write()?;
    Ok(())
}

fn conflicted_paths(index: &Index) -> Result<Vec<String>> {
    let mut paths = Vec::new();
    for conflict in index.conflicts()? {
        let conflict = conflict?;
        let entry = conflict
            .our
            .as_ref()
            .or(conflict.their.as_ref())
            .or(conflict.ancestor.as_ref());
        if let Some(entry) = entry {
            paths.push(String::from_utf8_lossy(&entry.path).into_owned());
        }
    }
    paths.sort();
    paths.dedup();
    Ok(paths)
}
