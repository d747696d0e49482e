//! Command implementations for mirror-cli

pub mod create_pr;
pub mod sync;

pub use create_pr::run_create_pr;
pub use sync::{run_sync, run_sync_archive};
