//! Check-run observations as reported by the CI host.
//!
//! Status and conclusion strings are parsed into closed enums here so the rest
//! of the crate never compares raw strings. Values the host may add later land
//! in an `Unknown` variant instead of failing deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a single check run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Waiting for a runner.
    Queued,
    /// Currently executing.
    InProgress,
    /// Finished; a conclusion should be present.
    Completed,
    /// Waiting on a deployment protection rule.
    Waiting,
    /// Requested but not yet queued.
    Requested,
    /// Pending behind a concurrency group.
    Pending,
    /// A status this version does not know about.
    #[serde(other)]
    Unknown,
}

impl CheckStatus {
    /// Whether the run has reached a terminal status
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Terminal classification of a completed check run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckConclusion {
    /// The check passed.
    Success,
    /// The check failed.
    Failure,
    /// Completed without a pass/fail verdict.
    Neutral,
    /// Cancelled before completion.
    Cancelled,
    /// Skipped by a workflow condition.
    Skipped,
    /// Hit the job time limit.
    TimedOut,
    /// Needs a manual action before it can pass.
    ActionRequired,
    /// Marked stale by the host after being left incomplete.
    Stale,
    /// The workflow failed to start.
    StartupFailure,
    /// A conclusion this version does not know about.
    #[serde(other)]
    Unknown,
}

/// Whether a conclusion lets the gate pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConclusionOutcome {
    /// Counts as a pass.
    Pass,
    /// Counts as a failure.
    Fail,
}

impl CheckConclusion {
    /// The single mapping from conclusions to pass/fail.
    ///
    /// Unknown conclusions fail so a new host vocabulary can never open the gate.
    #[must_use]
    pub const fn outcome(self) -> ConclusionOutcome {
        match self {
            Self::Success | Self::Neutral | Self::Skipped => ConclusionOutcome::Pass,
            Self::Failure
            | Self::Cancelled
            | Self::TimedOut
            | Self::ActionRequired
            | Self::Stale
            | Self::StartupFailure
            | Self::Unknown => ConclusionOutcome::Fail,
        }
    }

    /// Wire name of the conclusion
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Neutral => "neutral",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
            Self::TimedOut => "timed_out",
            Self::ActionRequired => "action_required",
            Self::Stale => "stale",
            Self::StartupFailure => "startup_failure",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CheckConclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported unit of CI feedback against a commit.
///
/// Reruns produce a new `CheckRun` with a new `id` and a later `started_at`;
/// the aggregator picks between them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckRun {
    /// Host-assigned identifier, unique per run.
    pub id: u64,
    /// Human-readable job name that required checks are matched against.
    pub name: String,
    /// Current lifecycle status.
    pub status: CheckStatus,
    /// Conclusion once completed.
    #[serde(default)]
    pub conclusion: Option<CheckConclusion>,
    /// When the run started.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the run completed.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl CheckRun {
    /// Create a queued run with no timestamps
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: CheckStatus::Queued,
            conclusion: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Mark the run as started at `at`
    #[must_use]
    pub fn started(mut self, at: DateTime<Utc>) -> Self {
        self.status = CheckStatus::InProgress;
        self.started_at = Some(at);
        self
    }

    /// Mark the run as completed with `conclusion`
    #[must_use]
    pub fn completed(mut self, conclusion: CheckConclusion) -> Self {
        self.status = CheckStatus::Completed;
        self.conclusion = Some(conclusion);
        self.completed_at = self.started_at;
        self
    }

    /// Ordering key for rerun selection: later start wins, then higher id.
    ///
    /// `None < Some(_)`, so runs without a start time lose to any that have one.
    pub(crate) fn recency(&self) -> (Option<DateTime<Utc>>, u64) {
        (self.started_at, self.id)
    }
}

/// All check runs visible for a commit at one poll instant.
///
/// Transient: each poll produces a fresh snapshot and the previous one is
/// dropped, never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Every run returned by the source, possibly with duplicates across pages.
    pub runs: Vec<CheckRun>,
}

impl Snapshot {
    /// Wrap a list of runs
    #[must_use]
    pub fn new(runs: Vec<CheckRun>) -> Self {
        Self { runs }
    }

    /// Snapshot with no runs
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of runs, duplicates included
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether the snapshot has no runs
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

impl FromIterator<CheckRun> for Snapshot {
    fn from_iter<I: IntoIterator<Item = CheckRun>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
