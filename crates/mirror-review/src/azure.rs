//! Azure DevOps Git REST client

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use crate::{Error, PrHandle, PullRequestRequest, Result, ReviewPlatform};

/// REST API version sent with every request.
pub const API_VERSION: &str = "7.1";

/// Default whole-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const CONFLICT_TITLE_PREFIX: &str = "[conflicts] ";

/// Connection settings for one Azure DevOps project.
#[derive(Clone)]
pub struct AzureDevOpsConfig {
    /// e.g. `https://dev.azure.com/contoso`
    pub organization_url: String,
    /// Project name or id.
    pub project_id: String,
    /// Personal access token.
    pub pat: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for AzureDevOpsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureDevOpsConfig")
            .field("organization_url", &self.organization_url)
            .field("project_id", &self.project_id)
            .field("pat", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AzureDevOpsConfig {
    pub fn new(organization_url: impl Into<String>, project_id: impl Into<String>, pat: impl Into<String>) -> Self {
        Self {
            organization_url: organization_url.into(),
            project_id: project_id.into(),
            pat: pat.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn validate(&self) -> Result<()> {
        let url = self.organization_url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(Error::Configuration(format!(
                "organization URL must be an http(s) URL, got '{}'",
                self.organization_url
            )));
        }
        if self.project_id.trim().is_empty() {
            return Err(Error::Configuration("project id is empty".into()));
        }
        if self.pat.is_empty() {
            return Err(Error::Configuration("personal access token is empty".into()));
        }
        Ok(())
    }
}

/// Blocking Azure DevOps client for repository lookup and PR creation.
#[derive(Debug)]
pub struct AzureDevOpsClient {
    config: AzureDevOpsConfig,
    http: Client,
    repositories_url: String,
}

impl AzureDevOpsClient {
    /// Build a client.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is incomplete or the HTTP
    /// client cannot be initialized.
    pub fn new(config: AzureDevOpsConfig) -> Result<Self> {
        config.validate()?;

        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Configuration(e.to_string()))?;

        let repositories_url = format!(
            "{}/{}/_apis/git/repositories",
            config.organization_url.trim().trim_end_matches('/'),
            urlencoding::encode(config.project_id.trim())
        );

        Ok(Self {
            config,
            http,
            repositories_url,
        })
    }

    /// Collection URL all requests are made against.
    pub fn repositories_url(&self) -> &str {
        &self.repositories_url
    }

    fn repository_url(&self, name_or_id: &str) -> String {
        format!("{}/{}", self.repositories_url, urlencoding::encode(name_or_id))
    }

    fn pull_requests_url(&self, repository_id: &str) -> String {
        format!("{}/pullrequests", self.repository_url(repository_id))
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .basic_auth("", Some(&self.config.pat))
            .query(&[("api-version", API_VERSION)])
            .send()?;
        Ok(response)
    }

    /// Active PR between the request's source and target refs, if any.
    fn find_active_pull_request(&self, request: &PullRequestRequest) -> Result<Option<PrHandle>> {
        let query = [
            ("searchCriteria.sourceRefName", request.source_ref.as_str()),
            ("searchCriteria.targetRefName", request.target_ref.as_str()),
            ("searchCriteria.status", "active"),
        ];
        let response = self.send(
            self.http
                .get(self.pull_requests_url(&request.repository_id))
                .query(&query),
        )?;
        if !response.status().is_success() {
            return Err(api_error(response));
        }

        let list: PullRequestList = response.json()?;
        Ok(list.value.into_iter().next().map(|pr| PrHandle {
            id: pr.pull_request_id,
            url: pr.url,
            created: false,
        }))
    }
}

impl ReviewPlatform for AzureDevOpsClient {
    fn provider_name(&self) -> &'static str {
        "azure-devops"
    }

    fn resolve_repository_id(&self, repository_name: &str) -> Result<String> {
        tracing::debug!(repository = repository_name, "Resolving repository id");
        let response = self.send(self.http.get(self.repository_url(repository_name)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::RepositoryNotFound {
                name: repository_name.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(api_error(response));
        }

        let body: RepositoryBody = response.json()?;
        Ok(body.id)
    }

    fn create_pull_request(&self, request: &PullRequestRequest) -> Result<PrHandle> {
        let body = pull_request_body(request);
        tracing::debug!(
            source = %request.source_ref,
            target = %request.target_ref,
            draft = body.is_draft,
            "Creating pull request"
        );
        let response = self.send(
            self.http
                .post(self.pull_requests_url(&request.repository_id))
                .json(&body),
        )?;

        if response.status() == StatusCode::CONFLICT {
            let conflict = api_error(response);
            tracing::info!(source = %request.source_ref, "Pull request already exists, reusing it");
            return self.find_active_pull_request(request)?.ok_or(conflict);
        }
        if !response.status().is_success() {
            return Err(api_error(response));
        }

        let created: PullRequestBody = response.json()?;
        Ok(PrHandle {
            id: created.pull_request_id,
            url: created.url,
            created: true,
        })
    }
}

fn api_error(response: Response) -> Error {
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    Error::Api {
        status,
        message: error_message(&body),
    }
}

/// Pull the `message` field out of an Azure error body, or fall back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

fn branch_name(reference: &str) -> &str {
    reference.strip_prefix("refs/heads/").unwrap_or(reference)
}

fn pr_title(request: &PullRequestRequest) -> String {
    let title = format!(
        "Mirror upstream {} into {} (base {})",
        request.upstream_commit,
        branch_name(&request.target_ref),
        request.base_commit
    );
    if request.merge_was_clean {
        title
    } else {
        format!("{CONFLICT_TITLE_PREFIX}{title}")
    }
}

fn pr_description(request: &PullRequestRequest) -> String {
    let mut description = format!(
        "Automated mirror of upstream commit `{}` onto `{}` at `{}`.\n\nSource branch: `{}`",
        request.upstream_commit,
        branch_name(&request.target_ref),
        request.base_commit,
        branch_name(&request.source_ref),
    );
    if !request.merge_was_clean {
        description.push_str(
            "\n\n**The automatic merge conflicted.** Conflicted files were committed with \
             their conflict markers and must be resolved manually before completing this PR.",
        );
    }
    description
}

fn pull_request_body(request: &PullRequestRequest) -> CreatePullRequestBody {
    CreatePullRequestBody {
        source_ref_name: request.source_ref.clone(),
        target_ref_name: request.target_ref.clone(),
        title: pr_title(request),
        description: pr_description(request),
        is_draft: !request.merge_was_clean,
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryBody {
    id: String,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePullRequestBody {
    source_ref_name: String,
    target_ref_name: String,
    title: String,
    description: String,
    is_draft: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestBody {
    pull_request_id: u64,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PullRequestList {
    value: Vec<PullRequestBody>,
}
