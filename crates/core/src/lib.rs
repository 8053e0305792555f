//! Core of the cigate CI gate.
//!
//! The gate watches a fixed set of named CI checks on a commit and publishes a
//! single `pending`/`success`/`failure` result, so branch protection only has
//! to require one check. This crate holds everything that does not talk to a
//! particular CI host:
//!
//! - [`registry`]: the required-check registry and gate settings
//! - [`check`]: check-run observations and the conclusion table
//! - [`aggregate`]: the pure fan-in from a snapshot to a gate state
//! - [`controller`]: the poll/sleep/finalize state machine
//! - [`report`]: the published gate report and the [`Reporter`] seam
//! - [`source`]: the [`CheckSource`] and [`RateLimitBudget`] seams
//!
//! Host integrations (GitHub) live in their own crates.

pub mod aggregate;
pub mod check;
pub mod context;
pub mod controller;
pub mod error;
pub mod registry;
pub mod report;
pub mod source;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use aggregate::{Aggregation, CheckClass, CheckVerdict, GateState, aggregate};
pub use check::{CheckConclusion, CheckRun, CheckStatus, Snapshot};
pub use context::TriggerEvent;
pub use controller::{Controller, Evaluation, Outcome, Sleeper, TokioSleeper};
pub use error::{Error, PollError, Result};
pub use registry::{GateConfig, RequiredCheckSet};
pub use report::{GateReason, GateReport, LogReporter, Reporter, render_summary};
pub use source::{CheckSource, Quota, RateLimitBudget, SharedBudget, Unlimited};
