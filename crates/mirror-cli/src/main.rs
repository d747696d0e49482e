//! git-mirror CLI
//!
//! One-way mirroring of an upstream repository into Azure DevOps, one pull
//! request per divergence.

mod cli;
mod commands;
mod context;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use context::RunContext;
use error::Result;

const DEFAULT_LOG_FILTER: &str = "warn,git_mirror=info,mirror_core=info";
const VERBOSE_LOG_FILTER: &str = "warn,git_mirror=debug,mirror_core=debug,mirror_git=debug,mirror_review=debug";

fn main() {
    let cli = parse_args();
    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "error".red().bold(), error_chain(&e));
        std::process::exit(1);
    }
}

/// Parse arguments; usage errors exit with 1 like every other failure.
fn parse_args() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.verbose);
    tracing::debug!("Verbose mode enabled");

    let config = cli.config.as_deref();
    match &cli.command {
        Commands::Sync(args) => {
            let ctx = RunContext::load(config, &args.review)?.with_git_token(args.git.git_token.as_deref());
            commands::run_sync(&ctx, args)
        }
        Commands::SyncArchive(args) => {
            let ctx = RunContext::load(config, &args.review)?.with_git_token(args.git.git_token.as_deref());
            commands::run_sync_archive(&ctx, args)
        }
        Commands::CreatePr(args) => {
            let ctx = RunContext::load(config, &args.review)?;
            commands::run_create_pr(&ctx, args)
        }
    }
}

/// Logs go to stderr so stdout only carries the status lines.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();
}

/// `error` followed by each of its sources, separated by `: `.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}
