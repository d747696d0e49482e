//! Tests for remote management and fetch

use mirror_git::{Credentials, Error, ErrorKind, RepositoryHandle};
use mirror_test_utils::git::Sandbox;
use rstest::rstest;

fn clone_source(sandbox: &Sandbox) -> RepositoryHandle {
    RepositoryHandle::clone(&sandbox.source.url(), sandbox.workdir(), Credentials::none()).unwrap()
}

#[test]
fn test_clone_configures_origin() {
    let sandbox = Sandbox::new();
    let handle = clone_source(&sandbox);

    let remotes = handle.remotes().unwrap();
    assert_eq!(remotes.len(), 1);
    assert_eq!(remotes["origin"], sandbox.source.url());
    assert!(!handle.is_dirty().unwrap());
}

#[test]
fn test_add_remote_is_queryable() {
    let sandbox = Sandbox::new();
    let mut handle = clone_source(&sandbox);

    let remote = handle.add_remote("upstream", &sandbox.upstream.url()).unwrap();
    assert_eq!(remote.name, "upstream");
    assert_eq!(handle.remote_url("upstream").unwrap(), sandbox.upstream.url());
}

#[rstest]
#[case::same_uri(true)]
#[case::different_uri(false)]
fn test_add_remote_twice_fails_regardless_of_uri(#[case] same_uri: bool) {
    let sandbox = Sandbox::new();
    let mut handle = clone_source(&sandbox);

    handle.add_remote("upstream", &sandbox.upstream.url()).unwrap();
    let second_uri = if same_uri {
        sandbox.upstream.url()
    } else {
        "https://example.invalid/other.git".to_string()
    };
    let err = handle.add_remote("upstream", &second_uri).unwrap_err();

    assert!(matches!(err, Error::RemoteExists { ref name } if name == "upstream"), "got: {err}");
    assert_eq!(err.kind(), ErrorKind::Remote);
}

#[test]
fn test_add_remote_reserved_origin_taken_after_clone() {
    let sandbox = Sandbox::new();
    let mut handle = clone_source(&sandbox);

    let err = handle.add_remote("origin", &sandbox.upstream.url()).unwrap_err();
    assert!(matches!(err, Error::RemoteExists { .. }));
}

#[test]
fn test_remove_remote_then_add_again() {
    let sandbox = Sandbox::new();
    let mut handle = clone_source(&sandbox);

    handle.add_remote("upstream", &sandbox.upstream.url()).unwrap();
    handle.remove_remote("upstream").unwrap();
    assert!(!handle.remotes().unwrap().contains_key("upstream"));

    handle.add_remote("upstream", &sandbox.upstream.url()).unwrap();
}

#[test]
fn test_remove_missing_remote_fails() {
    let sandbox = Sandbox::new();
    let mut handle = clone_source(&sandbox);

    let err = handle.remove_remote("upstream").unwrap_err();
    assert!(matches!(err, Error::RemoteNotFound { ref name } if name == "upstream"));
}

#[test]
fn test_fetch_unknown_remote_fails() {
    let sandbox = Sandbox::new();
    let mut handle = clone_source(&sandbox);

    let err = handle.fetch(&["origin", "upstream"]).unwrap_err();
    assert!(matches!(err, Error::RemoteNotFound { ref name } if name == "upstream"));
}

#[test]
fn test_fetch_brings_remote_tracking_refs() {
    let sandbox = Sandbox::new();
    let mut handle = clone_source(&sandbox);
    let upstream_head = sandbox
        .upstream
        .commit_file("main", "upstream.txt", "new\n", "Upstream work");

    handle.add_remote("upstream", &sandbox.upstream.url()).unwrap();
    handle.fetch(&["origin", "upstream"]).unwrap();

    let sha = handle
        .checkout_remote_branch("local_upstream_branch", "upstream", "main")
        .unwrap();
    assert_eq!(sha.as_str(), &upstream_head[..8]);
}

#[test]
fn test_fetch_unreachable_remote_is_network_error() {
    let sandbox = Sandbox::new();
    let mut handle = clone_source(&sandbox);
    let missing = sandbox.root().join("does-not-exist.git");

    handle
        .add_remote("upstream", missing.to_str().unwrap())
        .unwrap();
    let err = handle.fetch(&["upstream"]).unwrap_err();

    assert!(matches!(err, Error::Fetch { ref remote, .. } if remote == "upstream"), "got: {err}");
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[test]
fn test_fetch_is_not_transactional_across_remotes() {
    let sandbox = Sandbox::new();
    let mut handle = clone_source(&sandbox);
    let new_head = sandbox
        .source
        .commit_file("main", "later.txt", "later\n", "Later source work");
    let missing = sandbox.root().join("does-not-exist.git");
    handle
        .add_remote("ghost", missing.to_str().unwrap())
        .unwrap();

    let result = handle.fetch(&["origin", "ghost"]);
    assert!(result.is_err());

    // origin was fetched before ghost failed; its refs stay updated.
    let sha = handle
        .checkout_remote_branch("local_source_branch", "origin", "main")
        .unwrap();
    assert_eq!(sha.as_str(), &new_head[..8]);
}
