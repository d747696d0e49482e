//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// git-mirror - Mirror an upstream repository into Azure DevOps through pull requests
#[derive(Parser, Debug)]
#[command(name = "git-mirror")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to ./git-mirror.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Clone the source repository, merge an upstream branch into it and open a PR
    ///
    /// Examples:
    ///   git-mirror sync --source-git-uri https://dev.azure.com/o/p/_git/lib \
    ///     --source-branch main --upstream-git-uri https://github.com/x/lib \
    ///     --upstream-branch main --repository lib
    Sync(SyncArgs),

    /// Extract a working-copy tarball that tracks the upstream, merge it and open a PR
    SyncArchive(SyncArchiveArgs),

    /// Open the PR for a branch that was already merged and pushed
    CreatePr(CreatePrArgs),
}

/// Review platform connection, shared by every command
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ReviewArgs {
    /// Azure DevOps personal access token
    #[arg(long, env = "GIT_MIRROR_PAT", hide_env_values = true)]
    pub pat: String,

    /// Azure DevOps organization URL, e.g. https://dev.azure.com/contoso
    #[arg(long, env = "GIT_MIRROR_ORGANIZATION_URL")]
    pub organization_url: Option<String>,

    /// Project name or id within the organization
    #[arg(long, env = "GIT_MIRROR_PROJECT_ID")]
    pub project_id: Option<String>,

    /// Name of the repository being mirrored into
    #[arg(long)]
    pub repository: String,
}

/// Git transport settings for commands that clone, fetch and push
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct GitArgs {
    /// HTTPS token for the git remotes (never read from the config file)
    #[arg(long, env = "GIT_MIRROR_GIT_TOKEN", hide_env_values = true)]
    pub git_token: Option<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SyncArgs {
    /// URI of the downstream repository (cloned as origin)
    #[arg(long)]
    pub source_git_uri: String,

    /// Branch of the downstream repository to merge into
    #[arg(long)]
    pub source_branch: String,

    /// URI of the repository to mirror from
    #[arg(long)]
    pub upstream_git_uri: String,

    /// Branch of the upstream repository to mirror
    #[arg(long)]
    pub upstream_branch: String,

    /// Local working copy path
    #[arg(long, default_value = "repo")]
    pub workdir: PathBuf,

    #[command(flatten)]
    pub git: GitArgs,

    #[command(flatten)]
    pub review: ReviewArgs,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SyncArchiveArgs {
    /// URI of the downstream repository (added as origin)
    #[arg(long)]
    pub source_git_uri: String,

    /// URI of the working-copy tarball (http(s), file:// or a local path)
    #[arg(long)]
    pub tar_file_uri: String,

    /// Remote in the extracted working copy that points at the upstream
    #[arg(long, default_value = "hg")]
    pub upstream_remote: String,

    /// Branch merged on both sides and targeted by the PR
    #[arg(long, default_value = "master")]
    pub branch: String,

    /// Where the archive is downloaded and extracted
    #[arg(long, default_value = ".")]
    pub download_dir: PathBuf,

    /// Skip the dated backup copy of the archive
    #[arg(long)]
    pub no_backup: bool,

    #[command(flatten)]
    pub git: GitArgs,

    #[command(flatten)]
    pub review: ReviewArgs,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct CreatePrArgs {
    /// Branch to raise the PR from (pr_base_<sha>_upstream_<sha>)
    #[arg(long)]
    pub pr_branch: String,

    /// Short id of the upstream head that was merged
    #[arg(long)]
    pub upstream_sha1: String,

    /// Short id of the base head that was merged into
    #[arg(long)]
    pub base_sha1: String,

    /// Branch the PR merges into
    #[arg(long, default_value = "master")]
    pub target_branch: String,

    #[command(flatten)]
    pub review: ReviewArgs,
}
