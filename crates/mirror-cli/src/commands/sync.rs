//! `sync` and `sync-archive`: full mirror runs

use colored::Colorize;

use mirror_core::{ArchiveFetcher, HttpArchiveFetcher, MirrorPlan, RunOutcome, backup};
use mirror_git::MergeOutcome;

use crate::cli::{SyncArchiveArgs, SyncArgs};
use crate::context::RunContext;
use crate::error::Result;

/// Run the sync command.
///
/// Clones the source repository, merges the upstream branch into the source
/// branch and opens a pull request for the result.
pub fn run_sync(ctx: &RunContext, args: &SyncArgs) -> Result<()> {
    let client = ctx.review_client()?;
    let plan = MirrorPlan::clone_mode(
        &args.source_git_uri,
        &args.source_branch,
        &args.upstream_git_uri,
        &args.upstream_branch,
        &args.workdir,
        &args.review.repository,
    )
    .with_branch_names(&ctx.config.branch_names());

    println!(
        "{} Mirroring {} into {}...",
        "=>".blue().bold(),
        format!("upstream/{}", args.upstream_branch).cyan(),
        format!("origin/{}", args.source_branch).cyan()
    );

    let outcome = ctx.orchestrator().run(&plan, &client)?;
    report(&outcome);
    Ok(())
}

/// Run the sync-archive command.
///
/// Fetches and extracts a working-copy tarball that already tracks the
/// upstream, then mirrors it like `sync` does.
pub fn run_sync_archive(ctx: &RunContext, args: &SyncArchiveArgs) -> Result<()> {
    let client = ctx.review_client()?;
    let fetcher = HttpArchiveFetcher::new(&args.download_dir)?;
    let _download_lock = fetcher.lock()?;

    println!("{} Fetching archive...", "=>".blue().bold());
    let archive = fetcher.fetch(&args.tar_file_uri)?;
    let extracted = fetcher.extract(&archive)?;
    if !args.no_backup {
        backup(&archive, &args.review.repository, &args.download_dir)?;
    }

    let plan = MirrorPlan::archive_mode(
        &extracted,
        &args.source_git_uri,
        &args.upstream_remote,
        &args.branch,
        &args.review.repository,
    )
    .with_branch_names(&ctx.config.branch_names());

    println!(
        "{} Mirroring {} into {}...",
        "=>".blue().bold(),
        format!("{}/{}", args.upstream_remote, args.branch).cyan(),
        format!("origin/{}", args.branch).cyan()
    );

    let outcome = ctx.orchestrator().run(&plan, &client)?;
    report(&outcome);
    Ok(())
}

fn report(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::NoOp { base_sha } => {
            println!(
                "{} No upstream changes since {}, nothing to push",
                "OK".green().bold(),
                base_sha.to_string().yellow()
            );
        }
        RunOutcome::PullRequest {
            pr_branch, merge, pr, ..
        } => {
            if let MergeOutcome::ForcedMerge {
                conflicted_paths, ..
            } = merge
            {
                println!(
                    "{} Merge conflicts committed as-is in: {}",
                    "!!".yellow().bold(),
                    conflicted_paths.join(", ")
                );
            }
            let verb = if pr.created { "Opened" } else { "Found existing" };
            println!(
                "{} {} pull request #{} from {}",
                "OK".green().bold(),
                verb,
                pr.id,
                pr_branch.as_str().cyan()
            );
            if let Some(url) = &pr.url {
                println!("   {}", url);
            }
        }
    }
}
