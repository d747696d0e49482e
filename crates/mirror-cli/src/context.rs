//! Settings shared by every command
//!
//! Flags and environment variables are layered over the config file; the
//! PAT and the git token only ever come from a flag or the environment.

use std::path::Path;

use mirror_core::{MirrorConfig, MirrorOrchestrator};
use mirror_review::{AzureDevOpsClient, AzureDevOpsConfig};

use crate::cli::ReviewArgs;
use crate::error::{CliError, Result};

#[derive(Debug)]
pub struct RunContext {
    pub config: MirrorConfig,
    pat: String,
}

impl RunContext {
    /// Load the config file and overlay the review flags onto it.
    pub fn load(config_path: Option<&Path>, review: &ReviewArgs) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let mut config = MirrorConfig::discover(config_path, &cwd)?;

        let mut overrides = MirrorConfig::default();
        overrides.review.organization_url = review.organization_url.clone();
        overrides.review.project_id = review.project_id.clone();
        config.merge(&overrides);

        Ok(Self {
            config,
            pat: review.pat.clone(),
        })
    }

    /// Overlay a git token given as a flag or environment variable.
    pub fn with_git_token(mut self, git_token: Option<&str>) -> Self {
        if let Some(token) = git_token {
            self.config.git.token = Some(token.to_string());
        }
        self
    }

    /// Azure DevOps client for the configured organization and project.
    pub fn review_client(&self) -> Result<AzureDevOpsClient> {
        let organization_url = self.config.review.organization_url.clone().ok_or_else(|| {
            CliError::user(
                "No organization URL: pass --organization-url, set GIT_MIRROR_ORGANIZATION_URL \
                 or add [review] organization_url to the config file",
            )
        })?;
        let project_id = self.config.review.project_id.clone().ok_or_else(|| {
            CliError::user(
                "No project: pass --project-id, set GIT_MIRROR_PROJECT_ID \
                 or add [review] project_id to the config file",
            )
        })?;

        let config = AzureDevOpsConfig::new(organization_url, project_id, self.pat.clone())
            .with_timeout(self.config.review_timeout());
        Ok(AzureDevOpsClient::new(config)?)
    }

    pub fn orchestrator(&self) -> MirrorOrchestrator {
        MirrorOrchestrator::new(self.config.credentials()).with_identity(self.config.identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review_args(organization_url: Option<&str>, project_id: Option<&str>) -> ReviewArgs {
        ReviewArgs {
            pat: "pat".into(),
            organization_url: organization_url.map(String::from),
            project_id: project_id.map(String::from),
            repository: "repo".into(),
        }
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror.toml");
        std::fs::write(
            &path,
            "[review]\norganization_url = \"https://dev.azure.com/file\"\nproject_id = \"file\"\n",
        )
        .unwrap();

        let ctx = RunContext::load(Some(&path), &review_args(None, Some("flag"))).unwrap();
        assert_eq!(
            ctx.config.review.organization_url.as_deref(),
            Some("https://dev.azure.com/file")
        );
        assert_eq!(ctx.config.review.project_id.as_deref(), Some("flag"));
        let client = ctx.review_client().unwrap();
        assert_eq!(
            client.repositories_url(),
            "https://dev.azure.com/file/flag/_apis/git/repositories"
        );
    }

    #[test]
    fn test_missing_organization_is_user_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "").unwrap();

        let ctx = RunContext::load(Some(&path), &review_args(None, Some("p"))).unwrap();
        let err = ctx.review_client().unwrap_err();
        assert!(matches!(err, CliError::User { .. }));
        assert!(err.to_string().contains("--organization-url"));
    }

    #[test]
    fn test_git_token_reaches_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "[git]\nusername = \"bot\"\n").unwrap();

        let ctx = RunContext::load(Some(&path), &review_args(None, None))
            .unwrap()
            .with_git_token(Some("git-secret"));
        assert_eq!(ctx.config.git.token.as_deref(), Some("git-secret"));
        assert_eq!(ctx.config.git.username.as_deref(), Some("bot"));

        let ctx = RunContext::load(Some(&path), &review_args(None, None))
            .unwrap()
            .with_git_token(None);
        assert_eq!(ctx.config.git.token, None);
    }
}
