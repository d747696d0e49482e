//! Tests for git-mirror.toml loading and layering

use std::fs;
use std::time::Duration;

use mirror_core::{BranchNames, CONFIG_FILE_NAME, Error, MirrorConfig};
use mirror_git::Identity;
use pretty_assertions::assert_eq;
use rstest::rstest;
use tempfile::tempdir;

const FULL: &str = r#"
[identity]
name = "Mirror Bot"
email = "mirror@example.com"

[git]
username = "bot"

[branches]
local_source = "ls"
local_upstream = "lu"
upstream_record = "last-upstream"

[review]
organization_url = "https://dev.azure.com/contoso"
project_id = "platform"
timeout_secs = 120
"#;

#[test]
fn test_full_config_parses() {
    let config = MirrorConfig::parse(FULL).unwrap();

    assert_eq!(
        config.identity(),
        Some(Identity::new("Mirror Bot", "mirror@example.com"))
    );
    assert_eq!(
        config.branch_names(),
        BranchNames {
            local_source: "ls".into(),
            local_upstream: "lu".into(),
            upstream_record: "last-upstream".into(),
        }
    );
    assert_eq!(
        config.review.organization_url.as_deref(),
        Some("https://dev.azure.com/contoso")
    );
    assert_eq!(config.review_timeout(), Duration::from_secs(120));
}

#[rstest]
#[case::unknown_section("[mystery]\nkey = 1\n")]
#[case::unknown_key("[review]\npat = \"never-from-file\"\n")]
#[case::git_token_in_file("[git]\ntoken = \"never-from-file\"\n")]
#[case::wrong_type("[review]\ntimeout_secs = \"soon\"\n")]
fn test_invalid_config_is_rejected(#[case] content: &str) {
    let err = MirrorConfig::parse(content).unwrap_err();
    assert!(matches!(err, Error::Config { .. }), "got: {err}");
}

#[test]
fn test_discover_prefers_explicit_path() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(CONFIG_FILE_NAME), "[review]\nproject_id = \"default\"\n").unwrap();
    let explicit = dir.path().join("custom.toml");
    fs::write(&explicit, "[review]\nproject_id = \"explicit\"\n").unwrap();

    let config = MirrorConfig::discover(Some(&explicit), dir.path()).unwrap();
    assert_eq!(config.review.project_id.as_deref(), Some("explicit"));

    let config = MirrorConfig::discover(None, dir.path()).unwrap();
    assert_eq!(config.review.project_id.as_deref(), Some("default"));
}

#[test]
fn test_discover_without_file_is_default() {
    let dir = tempdir().unwrap();
    let config = MirrorConfig::discover(None, dir.path()).unwrap();
    assert_eq!(config, MirrorConfig::default());
}

#[test]
fn test_discover_missing_explicit_path_fails() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.toml");

    let err = MirrorConfig::discover(Some(&missing), dir.path()).unwrap_err();
    assert!(matches!(err, Error::Config { ref path, .. } if path == &missing));
}

#[test]
fn test_merge_overlays_only_set_values() {
    let mut config = MirrorConfig::parse(FULL).unwrap();
    let mut overrides = MirrorConfig::default();
    overrides.review.project_id = Some("from-flag".into());
    overrides.git.token = Some("flag-token".into());

    config.merge(&overrides);

    assert_eq!(config.review.project_id.as_deref(), Some("from-flag"));
    assert_eq!(config.git.token.as_deref(), Some("flag-token"));
    assert_eq!(
        config.review.organization_url.as_deref(),
        Some("https://dev.azure.com/contoso")
    );
    assert_eq!(config.git.username.as_deref(), Some("bot"));
}

#[test]
fn test_merged_git_token_builds_credentials_but_is_not_serialized() {
    let mut config = MirrorConfig::parse(FULL).unwrap();
    let mut overrides = MirrorConfig::default();
    overrides.git.token = Some("flag-token".into());
    config.merge(&overrides);

    assert!(format!("{:?}", config.credentials()).contains("<redacted>"));
    let rendered = toml::to_string(&config).unwrap();
    assert!(!rendered.contains("flag-token"), "{rendered}");
}
