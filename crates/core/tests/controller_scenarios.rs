//! End-to-end gate evaluations against scripted check sources.
//!
//! These tests drive the full controller loop with an instant sleeper, so
//! every scenario runs without timers.

use async_trait::async_trait;
use cigate_core::test_utils::{
    InstantSleeper, RecordingReporter, ScriptedSource, completed, in_progress,
};
use cigate_core::{
    CheckConclusion, CheckRun, CheckSource, Controller, Error, GateConfig, GateReason, GateReport,
    GateState, Outcome, PollError, Reporter, RequiredCheckSet, SharedBudget, Snapshot,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

const SHA: &str = "ce587453ced02b1526dfb4cb910479d431683101";

fn config(max_attempts: u32) -> GateConfig {
    GateConfig::new(RequiredCheckSet::new(["lint", "test"]).unwrap())
        .with_max_attempts(max_attempts)
}

struct Harness {
    source: Arc<ScriptedSource>,
    reporter: Arc<RecordingReporter>,
    sleeper: Arc<InstantSleeper>,
}

impl Harness {
    fn new(source: ScriptedSource) -> Self {
        Self {
            source: Arc::new(source),
            reporter: Arc::new(RecordingReporter::new()),
            sleeper: Arc::new(InstantSleeper::new()),
        }
    }

    async fn run(&self, config: GateConfig) -> Outcome {
        Controller::new(config, self.source.clone(), self.reporter.clone())
            .with_sleeper(self.sleeper.clone())
            .run(SHA, &CancellationToken::new())
            .await
            .unwrap()
    }
}

fn final_report(outcome: &Outcome) -> &GateReport {
    match outcome {
        Outcome::Finished(evaluation) => &evaluation.report,
        Outcome::Superseded { .. } => panic!("evaluation was superseded"),
    }
}

/// Lint running, then both green: success after the second poll and no third.
#[tokio::test]
async fn success_after_second_poll() {
    let harness = Harness::new(ScriptedSource::snapshots(vec![
        vec![in_progress(1, "lint", 0)],
        vec![
            completed(1, "lint", CheckConclusion::Success, 0),
            completed(2, "test", CheckConclusion::Success, 1),
        ],
    ]));

    let outcome = harness.run(config(120)).await;

    assert_eq!(outcome.state(), Some(GateState::Success));
    assert_eq!(outcome.attempts(), 2);
    assert_eq!(harness.source.polls(), 2);
    assert_eq!(harness.sleeper.sleeps(), 1);

    let last = harness.reporter.last().unwrap();
    assert_eq!(last.state, GateState::Success);
    assert_eq!(last.reason, None);
}

/// One failing conclusion fails the gate on the first poll.
#[tokio::test]
async fn failure_reported_immediately() {
    let harness = Harness::new(ScriptedSource::snapshots(vec![vec![
        completed(1, "lint", CheckConclusion::Success, 0),
        completed(2, "test", CheckConclusion::Failure, 0),
    ]]));

    let outcome = harness.run(config(120)).await;
    let report = final_report(&outcome);

    assert_eq!(report.state, GateState::Failure);
    assert_eq!(report.reason, Some(GateReason::ChecksFailed));
    assert!(report.diagnostics.starts_with("required checks failed: test"));
    assert_eq!(harness.source.polls(), 1);
    assert_eq!(harness.sleeper.sleeps(), 0);
}

/// A required check that never shows up times out at the attempt ceiling.
#[tokio::test]
async fn missing_check_times_out() {
    let harness = Harness::new(ScriptedSource::snapshots(vec![vec![completed(
        1,
        "lint",
        CheckConclusion::Success,
        0,
    )]]));

    let outcome = harness.run(config(5)).await;
    let report = final_report(&outcome);

    assert_eq!(report.state, GateState::Failure);
    assert_eq!(report.reason, Some(GateReason::TimedOut));
    assert!(
        report.diagnostics.contains("timed out waiting for: test"),
        "{}",
        report.diagnostics
    );
    assert!(report.diagnostics.contains("test: absent"));
    assert!(!report.diagnostics.contains("lint:"));
    assert_eq!(harness.source.polls(), 5);
    assert_eq!(harness.sleeper.sleeps(), 4);
}

#[tokio::test]
async fn timeout_names_pending_and_absent_checks() {
    let harness = Harness::new(ScriptedSource::snapshots(vec![vec![in_progress(
        1, "lint", 0,
    )]]));

    let outcome = harness.run(config(2)).await;
    let report = final_report(&outcome);

    assert!(
        report
            .diagnostics
            .contains("timed out waiting for: lint, test after 2 attempts")
    );
    assert!(report.diagnostics.contains("lint: pending; test: absent"));
}

#[tokio::test]
async fn failure_dominates_while_others_pending() {
    let harness = Harness::new(ScriptedSource::snapshots(vec![vec![
        in_progress(1, "lint", 0),
        completed(2, "test", CheckConclusion::Cancelled, 0),
    ]]));

    let outcome = harness.run(config(120)).await;
    assert_eq!(outcome.state(), Some(GateState::Failure));
    assert_eq!(harness.source.polls(), 1);
}

#[tokio::test]
async fn rerun_replaces_earlier_failure() {
    let harness = Harness::new(ScriptedSource::snapshots(vec![
        vec![
            completed(1, "lint", CheckConclusion::Success, 0),
            in_progress(3, "test", 10),
            completed(2, "test", CheckConclusion::Failure, 0),
        ],
        vec![
            completed(2, "test", CheckConclusion::Failure, 0),
            completed(1, "lint", CheckConclusion::Success, 0),
            completed(3, "test", CheckConclusion::Success, 10),
        ],
    ]));

    let outcome = harness.run(config(120)).await;
    assert_eq!(outcome.state(), Some(GateState::Success));
}

#[tokio::test]
async fn transient_errors_are_retried_within_budget() {
    let harness = Harness::new(ScriptedSource::new(vec![
        Err(PollError::transient("502 Bad Gateway")),
        Err(PollError::transient("connection reset")),
        Ok(Snapshot::new(vec![
            completed(1, "lint", CheckConclusion::Success, 0),
            completed(2, "test", CheckConclusion::Success, 0),
        ])),
    ]));

    let outcome = harness.run(config(5)).await;
    assert_eq!(outcome.state(), Some(GateState::Success));
    assert_eq!(harness.source.polls(), 3);
}

#[tokio::test]
async fn transient_errors_exhausting_budget_time_out() {
    let harness = Harness::new(ScriptedSource::new(vec![Err(PollError::transient(
        "503 Service Unavailable",
    ))]));

    let outcome = harness.run(config(3)).await;
    let report = final_report(&outcome);

    assert_eq!(report.reason, Some(GateReason::TimedOut));
    assert!(
        report
            .diagnostics
            .contains("last poll error: transient API error: 503 Service Unavailable")
    );
}

#[tokio::test]
async fn auth_error_aborts_without_retry() {
    let harness = Harness::new(ScriptedSource::new(vec![Err(PollError::auth(
        "401 Bad credentials",
    ))]));

    let outcome = harness.run(config(120)).await;
    let report = final_report(&outcome);

    assert_eq!(report.state, GateState::Failure);
    assert_eq!(report.reason, Some(GateReason::AuthFailed));
    assert_eq!(harness.source.polls(), 1);
    assert_eq!(harness.sleeper.sleeps(), 0);
}

#[tokio::test]
async fn exhausted_budget_aborts_before_polling() {
    let harness = Harness::new(ScriptedSource::snapshots(vec![vec![]]));
    let budget = SharedBudget::new(0);

    let outcome = Controller::new(config(120), harness.source.clone(), harness.reporter.clone())
        .with_budget(budget)
        .with_sleeper(harness.sleeper.clone())
        .run(SHA, &CancellationToken::new())
        .await
        .unwrap();
    let report = final_report(&outcome);

    assert_eq!(report.reason, Some(GateReason::QuotaExhausted));
    assert!(report.diagnostics.contains("rate limit exhausted"));
    assert_eq!(harness.source.polls(), 0);
    assert_eq!(harness.sleeper.sleeps(), 0);
}

#[tokio::test]
async fn budget_running_out_mid_evaluation_aborts() {
    let harness = Harness::new(ScriptedSource::snapshots(vec![vec![in_progress(
        1, "lint", 0,
    )]]));
    let budget = SharedBudget::new(100);

    struct DrainingSleeper(SharedBudget);

    #[async_trait]
    impl cigate_core::Sleeper for DrainingSleeper {
        async fn sleep(&self, _duration: std::time::Duration) {
            self.0.record(0);
        }
    }

    let outcome = Controller::new(config(120), harness.source.clone(), harness.reporter.clone())
        .with_budget(budget.clone())
        .with_sleeper(DrainingSleeper(budget))
        .run(SHA, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        final_report(&outcome).reason,
        Some(GateReason::QuotaExhausted)
    );
    assert_eq!(harness.source.polls(), 1);
}

#[tokio::test]
async fn cancellation_during_sleep_stops_polling() {
    let token = CancellationToken::new();
    let source = Arc::new(ScriptedSource::snapshots(vec![vec![in_progress(
        1, "lint", 0,
    )]]));
    let reporter = Arc::new(RecordingReporter::new());

    let outcome = Controller::new(config(120), source.clone(), reporter.clone())
        .with_sleeper(InstantSleeper::cancelling(2, token.clone()))
        .run(SHA, &token)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Superseded { attempts: 2 });
    assert_eq!(source.polls(), 2);
    assert!(
        reporter
            .calls()
            .iter()
            .all(|r| r.state == GateState::Pending)
    );
}

#[tokio::test]
async fn already_cancelled_evaluation_never_polls() {
    let token = CancellationToken::new();
    token.cancel();
    let source = Arc::new(ScriptedSource::snapshots(vec![vec![]]));
    let reporter = Arc::new(RecordingReporter::new());

    let outcome = Controller::new(config(120), source.clone(), reporter.clone())
        .with_sleeper(InstantSleeper::new())
        .run(SHA, &token)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Superseded { attempts: 0 });
    assert_eq!(source.polls(), 0);
    assert!(reporter.calls().is_empty());
}

/// Source whose poll is overtaken by a newer push before it returns.
struct OvertakenSource {
    token: CancellationToken,
    runs: Vec<CheckRun>,
}

#[async_trait]
impl CheckSource for OvertakenSource {
    async fn poll(&self, _sha: &str) -> Result<Snapshot, PollError> {
        self.token.cancel();
        Ok(Snapshot::new(self.runs.clone()))
    }
}

#[tokio::test]
async fn cancellation_during_poll_publishes_nothing_more() {
    let token = CancellationToken::new();
    let source = OvertakenSource {
        token: token.clone(),
        runs: vec![in_progress(1, "lint", 0)],
    };
    let reporter = Arc::new(RecordingReporter::new());

    let outcome = Controller::new(config(120), source, reporter.clone())
        .with_sleeper(InstantSleeper::new())
        .run(SHA, &token)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Superseded { attempts: 1 });
    // Only the report issued before the first poll.
    assert_eq!(reporter.calls().len(), 1);
}

#[tokio::test]
async fn terminal_result_after_cancellation_is_not_published() {
    let token = CancellationToken::new();
    let source = OvertakenSource {
        token: token.clone(),
        runs: vec![
            completed(1, "lint", CheckConclusion::Success, 0),
            completed(2, "test", CheckConclusion::Success, 0),
        ],
    };
    let reporter = Arc::new(RecordingReporter::new());

    let outcome = Controller::new(config(120), source, reporter.clone())
        .with_sleeper(InstantSleeper::new())
        .run(SHA, &token)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Superseded { attempts: 1 });
    assert!(
        reporter
            .calls()
            .iter()
            .all(|r| r.state == GateState::Pending)
    );
}

#[tokio::test]
async fn one_report_entity_per_commit() {
    let harness = Harness::new(ScriptedSource::snapshots(vec![
        vec![in_progress(1, "lint", 0)],
        vec![in_progress(1, "lint", 0)],
        vec![in_progress(1, "lint", 0)],
        vec![
            completed(1, "lint", CheckConclusion::Success, 0),
            completed(2, "test", CheckConclusion::Success, 0),
        ],
    ]));

    harness.run(config(120)).await;

    let entities = harness.reporter.entities();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].state, GateState::Success);
    // initial all-absent, lint pending, final success
    assert_eq!(harness.reporter.updates(), 2);
}

#[tokio::test]
async fn initial_report_is_pending_with_every_check_absent() {
    let harness = Harness::new(ScriptedSource::snapshots(vec![vec![
        completed(1, "lint", CheckConclusion::Success, 0),
        completed(2, "test", CheckConclusion::Success, 0),
    ]]));

    harness.run(config(120)).await;

    let first = &harness.reporter.calls()[0];
    assert_eq!(first.state, GateState::Pending);
    assert_eq!(first.diagnostics, "lint: absent; test: absent");
}

#[test]
fn empty_registry_fails_before_polling() {
    let err = GateConfig::from_yaml("version: 1\nrequired_checks: []\n").unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
}

struct FlakyReporter {
    calls: AtomicUsize,
    fail_final: bool,
}

#[async_trait]
impl Reporter for FlakyReporter {
    async fn publish(&self, report: &GateReport) -> cigate_core::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if report.state == GateState::Pending || self.fail_final {
            Err(Error::report("502 from checks API"))
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn interim_publish_failures_do_not_stop_polling() {
    let source = ScriptedSource::snapshots(vec![
        vec![in_progress(1, "lint", 0)],
        vec![
            completed(1, "lint", CheckConclusion::Success, 0),
            completed(2, "test", CheckConclusion::Success, 0),
        ],
    ]);
    let reporter = FlakyReporter {
        calls: AtomicUsize::new(0),
        fail_final: false,
    };

    let outcome = Controller::new(config(120), source, reporter)
        .with_sleeper(InstantSleeper::new())
        .run(SHA, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.state(), Some(GateState::Success));
}

#[tokio::test]
async fn final_publish_failure_is_returned() {
    let source = ScriptedSource::snapshots(vec![vec![
        completed(1, "lint", CheckConclusion::Success, 0),
        completed(2, "test", CheckConclusion::Success, 0),
    ]]);
    let reporter = FlakyReporter {
        calls: AtomicUsize::new(0),
        fail_final: true,
    };

    let result = Controller::new(config(120), source, reporter)
        .with_sleeper(InstantSleeper::new())
        .run(SHA, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::Report(_))));
}
