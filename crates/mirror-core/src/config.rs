//! Optional TOML configuration
//!
//! Values are layered: the config file first, then whatever the caller merges
//! on top (CLI flags, environment), then built-in defaults for anything still
//! unset.
//!
//! ```toml
//! [identity]
//! name = "Mirror Bot"
//! email = "mirror@example.com"
//!
//! [git]
//! username = "mirror-bot"
//!
//! [branches]
//! upstream_record = "upstream"
//!
//! [review]
//! organization_url = "https://dev.azure.com/contoso"
//! project_id = "platform"
//! timeout_secs = 120
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mirror_git::{Credentials, Identity, auth};
use serde::{Deserialize, Serialize};

use crate::plan::BranchNames;
use crate::{Error, Result};

/// File looked up in the working directory when no explicit path is given.
pub const CONFIG_FILE_NAME: &str = "git-mirror.toml";

const DEFAULT_REVIEW_TIMEOUT_SECS: u64 = 60;

/// Commit identity for merge commits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentitySection {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Git transport credentials
///
/// Like the review PAT, the token is never read from or written to the file;
/// it is merged in from a flag or the environment.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitSection {
    #[serde(skip)]
    pub token: Option<String>,
    pub username: Option<String>,
}

impl std::fmt::Debug for GitSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitSection")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BranchesSection {
    pub local_source: Option<String>,
    pub local_upstream: Option<String>,
    pub upstream_record: Option<String>,
}

/// Review platform connection settings (the PAT is never read from file)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReviewSection {
    pub organization_url: Option<String>,
    pub project_id: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Parsed `git-mirror.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MirrorConfig {
    pub identity: IdentitySection,
    pub git: GitSection,
    pub branches: BranchesSection,
    pub review: ReviewSection,
}

impl MirrorConfig {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on malformed TOML or unknown keys.
    pub fn parse(content: &str) -> Result<Self> {
        Self::parse_at(content, Path::new("<string>"))
    }

    fn parse_at(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file is missing, unreadable or invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "Loading config");
        Self::parse_at(&content, path)
    }

    /// Load `explicit` if given, else `<dir>/git-mirror.toml` if present,
    /// else an empty configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the chosen file cannot be loaded.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let default_path: PathBuf = dir.join(CONFIG_FILE_NAME);
        if default_path.is_file() {
            Self::load(&default_path)
        } else {
            tracing::debug!(path = %default_path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Overlay `other` onto this configuration; values set in `other` win.
    pub fn merge(&mut self, other: &MirrorConfig) {
        fn overlay<T: Clone>(base: &mut Option<T>, other: &Option<T>) {
            if other.is_some() {
                base.clone_from(other);
            }
        }

        overlay(&mut self.identity.name, &other.identity.name);
        overlay(&mut self.identity.email, &other.identity.email);
        overlay(&mut self.git.token, &other.git.token);
        overlay(&mut self.git.username, &other.git.username);
        overlay(&mut self.branches.local_source, &other.branches.local_source);
        overlay(&mut self.branches.local_upstream, &other.branches.local_upstream);
        overlay(&mut self.branches.upstream_record, &other.branches.upstream_record);
        overlay(&mut self.review.organization_url, &other.review.organization_url);
        overlay(&mut self.review.project_id, &other.review.project_id);
        overlay(&mut self.review.timeout_secs, &other.review.timeout_secs);
    }

    /// Merge-commit identity, if any part of it is configured.
    pub fn identity(&self) -> Option<Identity> {
        let IdentitySection { name, email } = &self.identity;
        if name.is_none() && email.is_none() {
            return None;
        }
        Some(Identity::new(
            name.as_deref().unwrap_or(auth::DEFAULT_IDENTITY_NAME),
            email.as_deref().unwrap_or(auth::DEFAULT_IDENTITY_EMAIL),
        ))
    }

    pub fn credentials(&self) -> Credentials {
        let credentials = match &self.git.token {
            Some(token) => Credentials::token(token.clone()),
            None => Credentials::none(),
        };
        match &self.git.username {
            Some(username) => credentials.with_username(username.clone()),
            None => credentials,
        }
    }

    pub fn branch_names(&self) -> BranchNames {
        let defaults = BranchNames::default();
        BranchNames {
            local_source: self.branches.local_source.clone().unwrap_or(defaults.local_source),
            local_upstream: self
                .branches
                .local_upstream
                .clone()
                .unwrap_or(defaults.local_upstream),
            upstream_record: self
                .branches
                .upstream_record
                .clone()
                .unwrap_or(defaults.upstream_record),
        }
    }

    pub fn review_timeout(&self) -> Duration {
        Duration::from_secs(self.review.timeout_secs.unwrap_or(DEFAULT_REVIEW_TIMEOUT_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = MirrorConfig::parse("").unwrap();
        assert_eq!(config, MirrorConfig::default());
        assert_eq!(config.identity(), None);
        assert_eq!(config.branch_names(), BranchNames::default());
        assert_eq!(config.review_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_identity_fills_defaults() {
        let config = MirrorConfig::parse("[identity]\nname = \"Bot\"\n").unwrap();
        assert_eq!(
            config.identity(),
            Some(Identity::new("Bot", auth::DEFAULT_IDENTITY_EMAIL))
        );
    }

    #[test]
    fn test_git_section_debug_redacts_token() {
        let mut config = MirrorConfig::parse("[git]\nusername = \"bot\"\n").unwrap();
        config.git.token = Some("s3cret".into());
        let debug = format!("{:?}", config);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("<redacted>"));
    }
}
