//! Shared test doubles for gate evaluation.
//!
//! Scripted sources replay a fixed sequence of poll results, recording
//! reporters keep every distinct report the way a host keeps one check run,
//! and [`InstantSleeper`] counts sleeps instead of waiting.

use crate::check::{CheckConclusion, CheckRun, Snapshot};
use crate::controller::Sleeper;
use crate::error::{PollError, Result};
use crate::report::{GateReport, Reporter};
use crate::source::CheckSource;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fixed timestamp `minute` minutes after a reference instant
#[must_use]
pub fn minute(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
        + chrono::Duration::minutes(minute)
}

/// Completed run started at `at_minute`
#[must_use]
pub fn completed(id: u64, name: &str, conclusion: CheckConclusion, at_minute: i64) -> CheckRun {
    CheckRun::new(id, name)
        .started(minute(at_minute))
        .completed(conclusion)
}

/// In-progress run started at `at_minute`
#[must_use]
pub fn in_progress(id: u64, name: &str, at_minute: i64) -> CheckRun {
    CheckRun::new(id, name).started(minute(at_minute))
}

/// Source that replays scripted poll results in order.
///
/// Once the script runs out the last entry repeats, so "never appears"
/// scenarios need only one entry.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<std::result::Result<Snapshot, PollError>>>,
    last: Mutex<Option<std::result::Result<Snapshot, PollError>>>,
    polls: AtomicUsize,
}

impl ScriptedSource {
    /// Create a source from a list of poll results
    #[must_use]
    pub fn new(script: Vec<std::result::Result<Snapshot, PollError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            polls: AtomicUsize::new(0),
        }
    }

    /// Create a source whose polls all succeed with the given snapshots
    #[must_use]
    pub fn snapshots(snapshots: Vec<Vec<CheckRun>>) -> Self {
        Self::new(snapshots.into_iter().map(|r| Ok(Snapshot::new(r))).collect())
    }

    /// Number of polls issued
    #[must_use]
    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckSource for ScriptedSource {
    async fn poll(&self, _sha: &str) -> std::result::Result<Snapshot, PollError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(next) = next {
            *last = Some(next);
        }
        last.clone().unwrap_or_else(|| Ok(Snapshot::empty()))
    }
}

/// Reporter that records publishes like a host keyed by `(sha, gate name)`.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    /// Every publish call, in order.
    calls: Mutex<Vec<GateReport>>,
    /// Distinct externally visible reports, one per `(sha, gate name)`.
    entities: Mutex<Vec<GateReport>>,
    /// Content updates applied to existing entities.
    updates: AtomicUsize,
}

impl RecordingReporter {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every report passed to `publish`
    #[must_use]
    pub fn calls(&self) -> Vec<GateReport> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Externally visible reports
    #[must_use]
    pub fn entities(&self) -> Vec<GateReport> {
        self.entities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of in-place content changes
    #[must_use]
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Most recent report passed to `publish`
    #[must_use]
    pub fn last(&self) -> Option<GateReport> {
        self.calls().pop()
    }
}

#[async_trait]
impl Reporter for RecordingReporter {
    async fn publish(&self, report: &GateReport) -> Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report.clone());

        let mut entities = self.entities.lock().unwrap_or_else(PoisonError::into_inner);
        match entities
            .iter_mut()
            .find(|e| e.sha == report.sha && e.gate_name == report.gate_name)
        {
            Some(existing) if existing == report => {}
            Some(existing) => {
                *existing = report.clone();
                self.updates.fetch_add(1, Ordering::SeqCst);
            }
            None => entities.push(report.clone()),
        }
        Ok(())
    }
}

/// Sleeper that returns immediately and counts calls.
#[derive(Debug, Default)]
pub struct InstantSleeper {
    sleeps: AtomicUsize,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl InstantSleeper {
    /// Create a sleeper that never cancels
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel `token` during sleep number `n` (1-based), emulating a newer
    /// commit arriving while the loop is suspended
    #[must_use]
    pub fn cancelling(n: usize, token: CancellationToken) -> Self {
        Self {
            sleeps: AtomicUsize::new(0),
            cancel_after: Some((n, token)),
        }
    }

    /// Number of sleeps performed
    #[must_use]
    pub fn sleeps(&self) -> usize {
        self.sleeps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, _duration: Duration) {
        let n = self.sleeps.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((at, token)) = &self.cancel_after
            && *at == n
        {
            token.cancel();
            // Stay suspended so the controller observes the cancellation
            // instead of the sleep completing.
            std::future::pending::<()>().await;
        }
    }
}
