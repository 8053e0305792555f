//! Poll/sleep/finalize loop for one gate evaluation.
//!
//! The loop is an explicit state machine:
//!
//! ```text
//! Polling ──terminal state observed──────────────▶ Resolved
//!    │  ╰──quota/auth error────────────────────────▶ Resolved(failure)
//!    ╰──attempt ceiling reached──▶ TimedOut ───────▶ Resolved(failure)
//! ```
//!
//! [`transition`] decides the next step from one poll outcome and is pure, so
//! the policy is tested without timers. [`Controller`] drives it with injected
//! source, reporter, rate-limit budget and [`Sleeper`].

use crate::aggregate::{Aggregation, CheckClass, GateState, aggregate};
use crate::check::Snapshot;
use crate::error::{PollError, Result};
use crate::registry::GateConfig;
use crate::report::{GateReason, GateReport, Reporter};
use crate::source::{CheckSource, RateLimitBudget, Unlimited};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Suspends the loop between polls.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`
    async fn sleep(&self, duration: Duration);
}

#[async_trait]
impl<T: Sleeper + ?Sized> Sleeper for Arc<T> {
    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// What the loop does after one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Still pending with attempts left: sleep, then poll again.
    Wait,
    /// The aggregate reached a terminal state.
    Resolve(GateState),
    /// Ceiling reached while still pending.
    TimeOut,
    /// Polling cannot continue.
    Abort(GateReason),
}

/// Decide the next step after poll number `attempt` (1-based).
///
/// Transient errors consume an attempt like a pending observation does.
#[must_use]
pub fn transition(
    attempt: u32,
    max_attempts: u32,
    outcome: &std::result::Result<GateState, PollError>,
) -> Transition {
    match outcome {
        Ok(state) if state.is_terminal() => Transition::Resolve(*state),
        Err(PollError::QuotaExhausted { .. }) => Transition::Abort(GateReason::QuotaExhausted),
        Err(PollError::Auth(_)) => Transition::Abort(GateReason::AuthFailed),
        Ok(_) | Err(PollError::Transient(_)) => {
            if attempt >= max_attempts {
                Transition::TimeOut
            } else {
                Transition::Wait
            }
        }
    }
}

/// Controller states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Issuing polls.
    Polling,
    /// The ceiling was hit while checks were still unresolved.
    TimedOut,
    /// Final report decided; published next.
    Resolved(GateReport),
}

/// A finished evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// The final published report.
    pub report: GateReport,
    /// Number of polls issued.
    pub attempts: u32,
}

/// How an evaluation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A final report was published.
    Finished(Evaluation),
    /// A newer evaluation took over; nothing further was published.
    Superseded {
        /// Number of polls issued before cancellation
        attempts: u32,
    },
}

impl Outcome {
    /// Final gate state, if the evaluation finished
    #[must_use]
    pub fn state(&self) -> Option<GateState> {
        match self {
            Self::Finished(evaluation) => Some(evaluation.report.state),
            Self::Superseded { .. } => None,
        }
    }

    /// Polls issued before the evaluation ended
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Finished(evaluation) => evaluation.attempts,
            Self::Superseded { attempts } => *attempts,
        }
    }
}

/// Drives one evaluation from first poll to final report.
pub struct Controller<S, R, B = Unlimited, Z = TokioSleeper> {
    config: GateConfig,
    source: S,
    reporter: R,
    budget: B,
    sleeper: Z,
}

impl<S, R> Controller<S, R>
where
    S: CheckSource,
    R: Reporter,
{
    /// Create a controller with no rate-limit budget and the tokio timer
    pub fn new(config: GateConfig, source: S, reporter: R) -> Self {
        Self {
            config,
            source,
            reporter,
            budget: Unlimited,
            sleeper: TokioSleeper,
        }
    }
}

impl<S, R, B, Z> Controller<S, R, B, Z>
where
    S: CheckSource,
    R: Reporter,
    B: RateLimitBudget,
    Z: Sleeper,
{
    /// Consult `budget` before every poll
    pub fn with_budget<B2: RateLimitBudget>(self, budget: B2) -> Controller<S, R, B2, Z> {
        Controller {
            config: self.config,
            source: self.source,
            reporter: self.reporter,
            budget,
            sleeper: self.sleeper,
        }
    }

    /// Use `sleeper` between polls
    pub fn with_sleeper<Z2: Sleeper>(self, sleeper: Z2) -> Controller<S, R, B, Z2> {
        Controller {
            config: self.config,
            source: self.source,
            reporter: self.reporter,
            budget: self.budget,
            sleeper,
        }
    }

    /// Gate configuration this controller evaluates
    pub const fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Evaluate the gate for `sha` until it resolves, times out or is cancelled.
    ///
    /// Publishes a `pending` report before the first poll and after every
    /// non-terminal poll. Failures to publish those interim reports are logged
    /// and ignored; a failure to publish the final report is returned.
    ///
    /// Once `cancel` fires nothing more is published, even if the poll in
    /// flight returned a terminal result.
    #[instrument(skip(self, cancel), fields(gate = %self.config.gate_name))]
    pub async fn run(&self, sha: &str, cancel: &CancellationToken) -> Result<Outcome> {
        let mut last = aggregate(&self.config.required, &Snapshot::empty());
        let mut last_error: Option<PollError> = None;
        let mut attempts: u32 = 0;

        if cancel.is_cancelled() {
            return Ok(superseded(attempts));
        }
        self.publish_interim(sha, &last).await;

        let mut phase = Phase::Polling;
        loop {
            phase = match phase {
                Phase::Polling => {
                    if cancel.is_cancelled() {
                        return Ok(superseded(attempts));
                    }

                    attempts += 1;
                    let outcome = self.poll_once(sha, &mut last).await;
                    debug!(attempt = attempts, outcome = ?outcome, "Poll complete");

                    // A result observed after cancellation belongs to a superseded run.
                    if cancel.is_cancelled() {
                        return Ok(superseded(attempts));
                    }

                    match transition(attempts, self.config.max_attempts, &outcome) {
                        Transition::Wait => {
                            match outcome {
                                Ok(_) => {
                                    last_error = None;
                                    self.publish_interim(sha, &last).await;
                                }
                                Err(err) => {
                                    warn!(attempt = attempts, error = %err, "Transient poll failure, will retry");
                                    last_error = Some(err);
                                }
                            }

                            tokio::select! {
                                biased;
                                () = cancel.cancelled() => return Ok(superseded(attempts)),
                                () = self.sleeper.sleep(self.config.poll_interval) => {}
                            }
                            Phase::Polling
                        }
                        Transition::Resolve(state) => {
                            Phase::Resolved(self.resolved_report(sha, state, &last))
                        }
                        Transition::TimeOut => {
                            if let Err(err) = outcome {
                                last_error = Some(err);
                            }
                            info!(attempts, "Attempt ceiling reached");
                            Phase::TimedOut
                        }
                        Transition::Abort(reason) => {
                            let detail = outcome.err().map(|e| e.to_string()).unwrap_or_default();
                            warn!(%reason, %detail, "Aborting gate evaluation");
                            Phase::Resolved(self.aborted_report(sha, reason, &detail, &last))
                        }
                    }
                }
                Phase::TimedOut => Phase::Resolved(self.timed_out_report(
                    sha,
                    attempts,
                    &last,
                    last_error.as_ref(),
                )),
                Phase::Resolved(report) => {
                    self.reporter.publish(&report).await?;
                    info!(
                        state = %report.state,
                        reason = report.reason.map(GateReason::as_str),
                        attempts,
                        "Gate finalized"
                    );
                    return Ok(Outcome::Finished(Evaluation { report, attempts }));
                }
            };
        }
    }

    /// Read the budget, poll, and aggregate. Replaces `last` on success.
    async fn poll_once(
        &self,
        sha: &str,
        last: &mut Aggregation,
    ) -> std::result::Result<GateState, PollError> {
        if let Some(quota) = self.budget.quota().await?
            && quota.is_exhausted()
        {
            return Err(PollError::QuotaExhausted {
                reset_at: quota.reset_at,
            });
        }

        let snapshot = self.source.poll(sha).await?;
        *last = aggregate(&self.config.required, &snapshot);
        debug!(
            runs = snapshot.len(),
            state = %last.state,
            diagnostics = %last.diagnostics,
            "Aggregated snapshot"
        );
        Ok(last.state)
    }

    async fn publish_interim(&self, sha: &str, last: &Aggregation) {
        let report = self.report(sha, GateState::Pending, None, last.diagnostics.clone(), last);
        if let Err(err) = self.reporter.publish(&report).await {
            warn!(error = %err, "Failed to publish pending gate report");
        }
    }

    fn resolved_report(&self, sha: &str, state: GateState, last: &Aggregation) -> GateReport {
        if state == GateState::Success {
            return self.report(sha, state, None, last.diagnostics.clone(), last);
        }

        let failed: Vec<&str> = last
            .with_class(CheckClass::Failed)
            .map(|v| v.name.as_str())
            .collect();
        let diagnostics = format!(
            "required checks failed: {}; {}",
            failed.join(", "),
            last.diagnostics
        );
        self.report(sha, state, Some(GateReason::ChecksFailed), diagnostics, last)
    }

    fn timed_out_report(
        &self,
        sha: &str,
        attempts: u32,
        last: &Aggregation,
        last_error: Option<&PollError>,
    ) -> GateReport {
        let mut diagnostics = format!(
            "timed out waiting for: {} after {attempts} attempts; {}",
            last.unresolved_names().join(", "),
            last.diagnostics
        );
        if let Some(err) = last_error {
            diagnostics.push_str(&format!("; last poll error: {err}"));
        }
        self.report(sha, GateState::Failure, Some(GateReason::TimedOut), diagnostics, last)
    }

    fn aborted_report(
        &self,
        sha: &str,
        reason: GateReason,
        detail: &str,
        last: &Aggregation,
    ) -> GateReport {
        let diagnostics = format!("polling aborted: {detail}; last observed: {}", last.diagnostics);
        self.report(sha, GateState::Failure, Some(reason), diagnostics, last)
    }

    fn report(
        &self,
        sha: &str,
        state: GateState,
        reason: Option<GateReason>,
        diagnostics: String,
        last: &Aggregation,
    ) -> GateReport {
        GateReport {
            gate_name: self.config.gate_name.clone(),
            sha: sha.to_string(),
            state,
            reason,
            checks: last.verdicts.clone(),
            diagnostics,
        }
    }
}

fn superseded(attempts: u32) -> Outcome {
    info!(attempts, "Evaluation superseded, no further polls");
    Outcome::Superseded { attempts }
}
