//! In-memory [`ReviewPlatform`] that records every call.

use std::sync::Mutex;

use mirror_review::{Error, PrHandle, PullRequestRequest, Result, ReviewPlatform};

/// Records resolve and create calls instead of talking to a server.
///
/// Repository ids are `id-<name>`; PR ids count up from 1.
#[derive(Default)]
pub struct RecordingReviewPlatform {
    resolved: Mutex<Vec<String>>,
    requests: Mutex<Vec<PullRequestRequest>>,
    fail_create: bool,
}

impl RecordingReviewPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// A platform whose `create_pull_request` always answers HTTP 500.
    pub fn failing() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    /// Repository names passed to `resolve_repository_id`, in call order.
    pub fn resolved(&self) -> Vec<String> {
        self.resolved.lock().unwrap().clone()
    }

    /// Pull requests requested so far, in call order.
    pub fn requests(&self) -> Vec<PullRequestRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ReviewPlatform for RecordingReviewPlatform {
    fn provider_name(&self) -> &'static str {
        "recording"
    }

    fn resolve_repository_id(&self, repository_name: &str) -> Result<String> {
        self.resolved
            .lock()
            .unwrap()
            .push(repository_name.to_string());
        Ok(format!("id-{repository_name}"))
    }

    fn create_pull_request(&self, request: &PullRequestRequest) -> Result<PrHandle> {
        if self.fail_create {
            return Err(Error::Api {
                status: 500,
                message: "simulated failure".into(),
            });
        }
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        Ok(PrHandle {
            id: requests.len() as u64,
            url: None,
            created: true,
        })
    }
}
