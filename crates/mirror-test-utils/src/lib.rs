//! Shared test utilities for the git-mirror workspace
//!
//! - [`git`]: bare "remote" repositories with scripted histories
//! - [`review`]: an in-memory review platform that records calls
//! - [`http`]: a loopback HTTP server with canned responses

pub mod git;
pub mod http;
pub mod review;
