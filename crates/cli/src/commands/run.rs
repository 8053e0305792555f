use super::emit;
use crate::cli::RunArgs;
use cigate_core::{Controller, GateConfig, GateState, LogReporter, Outcome, Reporter, TriggerEvent};
use cigate_github::{GitHubCheckSource, GitHubRateLimit, GitHubReporter, detect_trigger, repo_from_env};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Apply `--interval` and `--max-attempts` on top of the registry
fn apply_overrides(config: GateConfig, args: &RunArgs) -> cigate_core::Result<GateConfig> {
    let mut config = config;
    if let Some(secs) = args.interval {
        config = config.with_poll_interval(Duration::from_secs(secs));
    }
    if let Some(max_attempts) = args.max_attempts {
        config = config.with_max_attempts(max_attempts);
    }
    config.validated()
}

/// Trigger from flags, falling back to the Actions environment.
///
/// With `--sha` nothing is read from the event payload.
fn resolve_trigger(args: &RunArgs) -> cigate_core::Result<TriggerEvent> {
    let mut trigger = match &args.sha {
        Some(sha) => TriggerEvent::new(
            sha.clone(),
            std::env::var("GITHUB_REF").unwrap_or_default(),
            std::env::var("GITHUB_EVENT_NAME").unwrap_or_else(|_| "push".to_string()),
        ),
        None => detect_trigger()?,
    };
    if let Some(ref_name) = &args.ref_name {
        trigger.ref_name.clone_from(ref_name);
    }
    if let Some(event) = &args.event {
        trigger.event.clone_from(event);
    }
    Ok(trigger)
}

/// One line summarizing how the evaluation ended
fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Finished(evaluation) => {
            let report = &evaluation.report;
            let reason = report
                .reason
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            format!(
                "{}: {}{reason} after {} polls: {}",
                report.gate_name, report.state, evaluation.attempts, report.diagnostics
            )
        }
        Outcome::Superseded { attempts } => {
            format!("superseded after {attempts} polls; no result published")
        }
    }
}

/// Process exit status for an outcome: 0 only when the gate passed
fn exit_status(outcome: &Outcome) -> u8 {
    match outcome.state() {
        Some(GateState::Success) => 0,
        _ => 1,
    }
}

/// Evaluate the gate once and publish the result.
///
/// `shutdown` fires when the concurrency group cancels this run in favour of
/// a newer commit; the evaluation then stops without publishing anything
/// further. Returns the process exit status.
#[instrument(skip_all, fields(config = %args.config.display(), dry_run = args.dry_run))]
pub async fn execute(
    args: RunArgs,
    shutdown: CancellationToken,
    out: &mut impl Write,
) -> miette::Result<u8> {
    let config = apply_overrides(GateConfig::load(&args.config)?, &args)?;
    let trigger = resolve_trigger(&args)?;
    let repo = repo_from_env(args.repo.as_deref())?;
    info!(trigger = %trigger, gate = %config.gate_name, required = config.required.len(), "Starting gate evaluation");

    let source = GitHubCheckSource::new(repo.clone())?.excluding(config.gate_name.clone());
    let reporter: Arc<dyn Reporter> = if args.dry_run {
        Arc::new(LogReporter)
    } else {
        Arc::new(GitHubReporter::new(repo.clone())?)
    };
    let budget = GitHubRateLimit::new(&repo)?;

    let controller = Controller::new(config, source, reporter).with_budget(budget);
    let outcome = controller.run(&trigger.sha, &shutdown.child_token()).await?;

    emit(out, &[describe(&outcome)])?;
    Ok(exit_status(&outcome))
}
