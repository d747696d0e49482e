//! Several mirror runs against the same pair of remotes
//!
//! Each run uses a fresh working copy, the way a scheduled job would.

use std::path::Path;

use mirror_core::{MirrorOrchestrator, MirrorPlan, RunOutcome, RunState};
use mirror_git::{Credentials, Identity, MergeOutcome};
use mirror_review::{AzureDevOpsClient, AzureDevOpsConfig};
use mirror_test_utils::git::{Sandbox, git, short};
use mirror_test_utils::http::FakeHttpServer;
use mirror_test_utils::review::RecordingReviewPlatform;
use pretty_assertions::assert_eq;
use regex::Regex;
use serde_json::{Value, json};

fn plan(sandbox: &Sandbox, workdir: &str) -> MirrorPlan {
    MirrorPlan::clone_mode(
        &sandbox.source.url(),
        "main",
        &sandbox.upstream.url(),
        "main",
        sandbox.root().join(workdir),
        "mirror",
    )
}

fn orchestrator() -> MirrorOrchestrator {
    MirrorOrchestrator::new(Credentials::none()).with_identity(Some(Identity::new("Mirror Bot", "bot@example.com")))
}

fn pr_branch_of(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::PullRequest { pr_branch, .. } => pr_branch.to_string(),
        other => panic!("expected a pull request, got {other:?}"),
    }
}

/// Complete the PR on the platform: move `main` to the PR branch head.
fn complete_pull_request(bare: &Path, pr_branch: &str) {
    git(bare, &["update-ref", "refs/heads/main", &format!("refs/heads/{pr_branch}")]);
}

#[test]
fn test_rerun_without_new_commits_reuses_branch_name() {
    let sandbox = Sandbox::new();
    sandbox
        .upstream
        .commit_file("main", "feature.txt", "feature\n", "Upstream feature");
    let platform = RecordingReviewPlatform::new();

    let first = orchestrator().run(&plan(&sandbox, "run-1"), &platform).unwrap();
    let second = orchestrator().run(&plan(&sandbox, "run-2"), &platform).unwrap();

    assert_eq!(pr_branch_of(&first), pr_branch_of(&second));
    let requests = platform.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].source_ref, requests[1].source_ref);
}

#[test]
fn test_completed_pull_request_makes_next_run_a_no_op() {
    let sandbox = Sandbox::new();
    sandbox
        .upstream
        .commit_file("main", "feature.txt", "feature\n", "Upstream feature");
    let platform = RecordingReviewPlatform::new();

    let first = orchestrator().run(&plan(&sandbox, "run-1"), &platform).unwrap();
    let pr_branch = pr_branch_of(&first);
    complete_pull_request(sandbox.source.path(), &pr_branch);

    let mut orchestrator = orchestrator();
    let second = orchestrator.run(&plan(&sandbox, "run-2"), &platform).unwrap();

    let RunOutcome::NoOp { base_sha } = second else {
        panic!("expected a no-op, got {second:?}");
    };
    assert_eq!(base_sha.as_str(), short(&sandbox.source.head("main")));
    assert_eq!(orchestrator.state(), RunState::NoOpStop);
    assert_eq!(platform.requests().len(), 1);
}

#[test]
fn test_new_upstream_work_after_merge_opens_new_branch() {
    let sandbox = Sandbox::new();
    sandbox.upstream.commit_file("main", "one.txt", "1\n", "First upstream change");
    let platform = RecordingReviewPlatform::new();

    let first = orchestrator().run(&plan(&sandbox, "run-1"), &platform).unwrap();
    let first_branch = pr_branch_of(&first);
    complete_pull_request(sandbox.source.path(), &first_branch);

    let upstream_head = sandbox.upstream.commit_file("main", "two.txt", "2\n", "Second upstream change");
    let second = orchestrator().run(&plan(&sandbox, "run-2"), &platform).unwrap();
    let second_branch = pr_branch_of(&second);

    assert_ne!(first_branch, second_branch);
    assert_eq!(
        second_branch,
        format!(
            "pr_base_{}_upstream_{}",
            short(&sandbox.source.head("main")),
            short(&upstream_head)
        )
    );
    assert!(sandbox.source.has_branch(&first_branch));
    assert!(sandbox.source.has_branch(&second_branch));
    assert_eq!(sandbox.source.head("upstream"), upstream_head);
}

#[test]
fn test_full_run_against_azure_devops_api() {
    let sandbox = Sandbox::new();
    sandbox
        .upstream
        .commit_file("main", "feature.txt", "feature\n", "Upstream feature");
    let server = FakeHttpServer::start(vec![
        (200, json!({"id": "repo-guid", "name": "mirror"}).to_string()),
        (
            201,
            json!({"pullRequestId": 99, "url": "https://dev.azure.com/contoso/_apis/git/pullRequests/99"})
                .to_string(),
        ),
    ]);
    let client = AzureDevOpsClient::new(AzureDevOpsConfig::new(server.url(), "proj", "pat")).unwrap();

    let outcome = orchestrator().run(&plan(&sandbox, "run-1"), &client).unwrap();

    let RunOutcome::PullRequest { pr_branch, merge, pr, .. } = outcome else {
        panic!("expected a pull request, got {outcome:?}");
    };
    assert!(matches!(merge, MergeOutcome::CleanMerge { .. }));
    assert_eq!(pr.id, 99);
    assert!(pr.created);

    let branch_pattern = Regex::new(r"^pr_base_[0-9a-f]{8}_upstream_[0-9a-f]{8}$").unwrap();
    assert!(branch_pattern.is_match(pr_branch.as_str()));

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].path(), "/proj/_apis/git/repositories/mirror");
    assert_eq!(requests[1].path(), "/proj/_apis/git/repositories/repo-guid/pullrequests");
    let body: Value = serde_json::from_str(&requests[1].body).unwrap();
    assert_eq!(body["sourceRefName"], format!("refs/heads/{pr_branch}"));
    assert_eq!(body["targetRefName"], "refs/heads/main");
    assert_eq!(body["isDraft"], false);
}
