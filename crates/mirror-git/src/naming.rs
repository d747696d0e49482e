//! Short commit identifiers and PR branch naming

use std::fmt;
use std::str::FromStr;

use git2::Oid;

use crate::{Error, Result};

/// Number of hex characters kept from a full commit id.
pub const SHORT_SHA_LEN: usize = 8;

const PR_PREFIX: &str = "pr_base_";
const PR_INFIX: &str = "_upstream_";

/// The first [`SHORT_SHA_LEN`] lowercase hex characters of a commit id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortSha(String);

impl ShortSha {
    /// Truncate a full object id.
    pub fn from_oid(oid: Oid) -> Self {
        let mut hex = oid.to_string();
        hex.truncate(SHORT_SHA_LEN);
        Self(hex)
    }

    /// Parse a short id supplied by a caller (e.g. from a previous run).
    pub fn parse(value: &str) -> Result<Self> {
        let valid = value.len() == SHORT_SHA_LEN && value.chars().all(|c| c.is_ascii_hexdigit());
        if !valid {
            return Err(Error::InvalidShortSha {
                value: value.to_string(),
            });
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `oid` starts with this short id.
    pub fn matches(&self, oid: Oid) -> bool {
        oid.to_string().starts_with(&self.0)
    }
}

impl fmt::Display for ShortSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ShortSha {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Name of the branch a mirror PR is raised from.
///
/// `pr_base_<base>_upstream_<upstream>`: identical base and upstream states
/// always produce the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrBranchName {
    name: String,
    base: ShortSha,
    upstream: ShortSha,
}

impl PrBranchName {
    pub fn new(base: &ShortSha, upstream: &ShortSha) -> Self {
        Self {
            name: format!("{PR_PREFIX}{base}{PR_INFIX}{upstream}"),
            base: base.clone(),
            upstream: upstream.clone(),
        }
    }

    /// Recover a branch name produced by [`PrBranchName::new`].
    ///
    /// Accepts the bare branch name or its `refs/heads/` form.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || Error::InvalidPrBranch {
            name: value.to_string(),
        };
        let name = value.strip_prefix("refs/heads/").unwrap_or(value);
        let rest = name.strip_prefix(PR_PREFIX).ok_or_else(invalid)?;
        let (base, upstream) = rest.split_once(PR_INFIX).ok_or_else(invalid)?;
        let base = ShortSha::parse(base).map_err(|_| invalid())?;
        let upstream = ShortSha::parse(upstream).map_err(|_| invalid())?;
        Ok(Self::new(&base, &upstream))
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> &ShortSha {
        &self.base
    }

    pub fn upstream(&self) -> &ShortSha {
        &self.upstream
    }

    /// Fully qualified ref, as used for the PR source.
    pub fn ref_name(&self) -> String {
        format!("refs/heads/{}", self.name)
    }
}

impl fmt::Display for PrBranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
