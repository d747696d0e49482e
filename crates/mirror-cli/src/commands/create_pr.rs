//! `create-pr`: raise the PR for an already pushed mirror branch

use colored::Colorize;

use mirror_core::PrOnlyPlan;

use crate::cli::CreatePrArgs;
use crate::context::RunContext;
use crate::error::Result;

/// Run the create-pr command.
pub fn run_create_pr(ctx: &RunContext, args: &CreatePrArgs) -> Result<()> {
    let client = ctx.review_client()?;
    let plan = PrOnlyPlan::new(
        &args.pr_branch,
        &args.upstream_sha1,
        &args.base_sha1,
        &args.review.repository,
    )
    .with_target_branch(&args.target_branch);

    println!(
        "{} Requesting pull request {} -> {}...",
        "=>".blue().bold(),
        args.pr_branch.cyan(),
        args.target_branch.cyan()
    );

    let pr = ctx.orchestrator().request_pull_request(&plan, &client)?;

    let verb = if pr.created { "Opened" } else { "Found existing" };
    println!("{} {} pull request #{}", "OK".green().bold(), verb, pr.id);
    if let Some(url) = &pr.url {
        println!("   {}", url);
    }
    Ok(())
}
