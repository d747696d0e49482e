//! Mirror orchestration for git-mirror
//!
//! Sits between the CLI and the two I/O crates:
//!
//! ```text
//!            mirror-cli
//!                |
//!           mirror-core
//!            /       \
//!   mirror-git     mirror-review
//! ```
//!
//! - **Plans**: [`MirrorPlan`] (clone or archive mode) and [`PrOnlyPlan`]
//! - **Orchestrator**: [`MirrorOrchestrator`] walks a plan through [`RunState`]
//!   and returns a [`RunOutcome`]
//! - **Archives**: [`ArchiveFetcher`] turns a tarball URI into a working copy
//! - **Locking**: [`RunLock`] keeps two runs off the same working copy
//! - **Config**: [`MirrorConfig`] loaded from `git-mirror.toml`

pub mod archive;
pub mod config;
pub mod error;
pub mod lock;
pub mod orchestrator;
pub mod plan;

pub use archive::{ArchiveFetcher, HttpArchiveFetcher, backup};
pub use config::{CONFIG_FILE_NAME, MirrorConfig};
pub use error::{Error, Result, RunStep};
pub use lock::RunLock;
pub use orchestrator::{MirrorOrchestrator, RunOutcome, RunState};
pub use plan::{BranchNames, BranchRef, MirrorPlan, PrOnlyPlan, WorkingCopy};
