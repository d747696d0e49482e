//! Credentials and commit identity handed to libgit2

use git2::{Cred, RemoteCallbacks, Signature};

/// Name used for merge commits when nothing else is configured.
pub const DEFAULT_IDENTITY_NAME: &str = "git-mirror";
/// Email used for merge commits when nothing else is configured.
pub const DEFAULT_IDENTITY_EMAIL: &str = "git-mirror@localhost";

/// libgit2 calls the credential callback again after each rejected attempt.
const MAX_CREDENTIAL_ATTEMPTS: u32 = 4;

/// Credentials used for clone, fetch and push.
///
/// Nothing here is persisted; a token lives only as long as the handle.
#[derive(Clone, Default)]
pub struct Credentials {
    token: Option<String>,
    username: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .finish()
    }
}

impl Credentials {
    /// Only SSH agent, credential helpers and default credentials.
    pub fn none() -> Self {
        Self::default()
    }

    /// HTTPS token (PAT). The username defaults to the one in the URL, then `git`.
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            username: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Build remote callbacks that answer credential requests.
    pub(crate) fn callbacks<'a>(&self) -> RemoteCallbacks<'a> {
        let token = self.token.clone();
        let username = self.username.clone();
        let config = git2::Config::open_default().ok();
        let mut attempts = 0;

        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |url, username_from_url, allowed| {
            attempts += 1;
            if attempts > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str(&format!(
                    "authentication to {url} failed after {MAX_CREDENTIAL_ATTEMPTS} attempts"
                )));
            }

            if allowed.is_user_pass_plaintext()
                && let Some(token) = token.as_deref()
            {
                let user = username.as_deref().or(username_from_url).unwrap_or("git");
                return Cred::userpass_plaintext(user, token);
            }
            if allowed.is_ssh_key()
                && let Some(user) = username_from_url
            {
                return Cred::ssh_key_from_agent(user);
            }
            if allowed.is_user_pass_plaintext()
                && let Some(cfg) = config.as_ref()
                && let Ok(cred) = Cred::credential_helper(cfg, url, username_from_url)
            {
                return Ok(cred);
            }
            Cred::default()
        });
        callbacks
    }
}

/// Author and committer of merge commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    pub(crate) fn signature(&self) -> Result<Signature<'static>, git2::Error> {
        Signature::now(&self.name, &self.email)
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTITY_NAME, DEFAULT_IDENTITY_EMAIL)
    }
}
