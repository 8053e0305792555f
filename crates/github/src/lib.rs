//! GitHub integration for the cigate CI gate.
//!
//! - [`GitHubCheckSource`] polls check runs for a commit
//! - [`GitHubReporter`] publishes the gate as a check run
//! - [`GitHubRateLimit`] reads the token's remaining API quota
//! - [`context`] detects the trigger from the Actions environment

#![warn(missing_docs)]

mod client;
pub mod context;
mod poller;
mod rate_limit;
mod reporter;

pub use client::GitHubRepo;
pub use context::{detect_trigger, repo_from_env};
pub use poller::{GitHubCheckSource, MAX_PAGES, PER_PAGE};
pub use rate_limit::GitHubRateLimit;
pub use reporter::GitHubReporter;
