//! Publishes the gate report as a GitHub check run.
//!
//! The report for a commit is a single check run named after the gate. The
//! first publish looks for an existing run of that name on the commit (left by
//! an earlier evaluation or a rerun) and only creates one when none exists;
//! every later publish updates it by id.

use crate::client::GitHubRepo;
use crate::poller::{CheckRunPage, ListCheckRunsParams};
use async_trait::async_trait;
use cigate_core::{Error, GateReport, GateState, Reporter, Result, render_summary};
use octocrab::Octocrab;
use octocrab::params::checks::{CheckRunConclusion, CheckRunOutput, CheckRunStatus};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Content last written to the check run, used to skip no-op updates.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Rendered {
    state: GateState,
    title: String,
    summary: String,
}

impl Rendered {
    fn of(report: &GateReport) -> Self {
        Self {
            state: report.state,
            title: report.title(),
            summary: render_summary(report),
        }
    }
}

#[derive(Debug)]
struct Published {
    sha: String,
    check_run_id: u64,
    last: Option<Rendered>,
}

/// Check-run status and conclusion for a gate state.
///
/// `pending` stays `in_progress` so the run keeps its spinner; terminal states
/// complete it.
pub(crate) const fn check_run_fields(
    state: GateState,
) -> (CheckRunStatus, Option<CheckRunConclusion>) {
    match state {
        GateState::Pending => (CheckRunStatus::InProgress, None),
        GateState::Success => (CheckRunStatus::Completed, Some(CheckRunConclusion::Success)),
        GateState::Failure => (CheckRunStatus::Completed, Some(CheckRunConclusion::Failure)),
    }
}

/// [`Reporter`] that writes to the GitHub Checks API.
pub struct GitHubReporter {
    client: Octocrab,
    repo: GitHubRepo,
    published: Mutex<Option<Published>>,
}

impl GitHubReporter {
    /// Create a reporter for `repo`
    pub fn new(repo: GitHubRepo) -> Result<Self> {
        Ok(Self {
            client: repo.octocrab()?,
            repo,
            published: Mutex::new(None),
        })
    }

    /// Id of the newest check run named `name` on `sha`, if any.
    async fn find_existing(&self, name: &str, sha: &str) -> Result<Option<u64>> {
        let params = ListCheckRunsParams {
            check_name: Some(name),
            filter: "latest",
            per_page: crate::poller::PER_PAGE,
            page: 1,
        };
        let page: CheckRunPage = self
            .client
            .get(
                self.repo.route(&format!("commits/{sha}/check-runs")),
                Some(&params),
            )
            .await
            .map_err(|e| Error::report(format!("Failed to look up check run '{name}': {e}")))?;

        Ok(page
            .check_runs
            .iter()
            .filter(|run| run.name == name)
            .map(|run| run.id)
            .max())
    }

    async fn create(&self, name: &str, sha: &str) -> Result<u64> {
        let run = self
            .client
            .checks(&self.repo.owner, &self.repo.repo)
            .create_check_run(name, sha)
            .status(CheckRunStatus::InProgress)
            .send()
            .await
            .map_err(|e| Error::report(format!("Failed to create check run '{name}': {e}")))?;

        info!(check_run_id = run.id.0, name, "Created gate check run");
        Ok(run.id.0)
    }

    async fn update(&self, check_run_id: u64, rendered: &Rendered) -> Result<()> {
        let (status, conclusion) = check_run_fields(rendered.state);
        let checks = self.client.checks(&self.repo.owner, &self.repo.repo);
        let mut builder = checks
            .update_check_run(check_run_id.into())
            .status(status)
            .output(CheckRunOutput {
                title: rendered.title.clone(),
                summary: rendered.summary.clone(),
                text: None,
                annotations: vec![],
                images: vec![],
            });
        if let Some(conclusion) = conclusion {
            builder = builder.conclusion(conclusion);
        }
        builder
            .send()
            .await
            .map_err(|e| Error::report(format!("Failed to update check run {check_run_id}: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl Reporter for GitHubReporter {
    async fn publish(&self, report: &GateReport) -> Result<()> {
        let rendered = Rendered::of(report);
        let mut published = self.published.lock().await;

        let check_run_id = match published.as_ref() {
            Some(p) if p.sha == report.sha => {
                if p.last.as_ref() == Some(&rendered) {
                    debug!(state = %report.state, "Gate report unchanged, skipping update");
                    return Ok(());
                }
                p.check_run_id
            }
            _ => match self.find_existing(&report.gate_name, &report.sha).await? {
                Some(id) => {
                    debug!(check_run_id = id, "Reusing existing gate check run");
                    id
                }
                None => self.create(&report.gate_name, &report.sha).await?,
            },
        };

        // Record the id before updating so a failed update is retried against
        // the same run rather than creating another.
        *published = Some(Published {
            sha: report.sha.clone(),
            check_run_id,
            last: None,
        });

        self.update(check_run_id, &rendered).await?;
        info!(
            check_run_id,
            state = %report.state,
            reason = ?report.reason,
            "Published gate report"
        );

        if let Some(p) = published.as_mut() {
            p.last = Some(rendered);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cigate_core::{CheckClass, CheckVerdict, GateReason};

    fn report(state: GateState, reason: Option<GateReason>) -> GateReport {
        GateReport {
            gate_name: "ci-gate".to_string(),
            sha: "abc1234def".to_string(),
            state,
            reason,
            checks: vec![CheckVerdict {
                name: "lint".to_string(),
                class: CheckClass::Pending,
                run_id: Some(7),
                conclusion: None,
            }],
            diagnostics: "lint: pending".to_string(),
        }
    }

    #[test]
    fn test_pending_stays_in_progress() {
        let (status, conclusion) = check_run_fields(GateState::Pending);
        assert!(matches!(status, CheckRunStatus::InProgress));
        assert!(conclusion.is_none());
    }

    #[test]
    fn test_terminal_states_complete() {
        let (status, conclusion) = check_run_fields(GateState::Success);
        assert!(matches!(status, CheckRunStatus::Completed));
        assert!(matches!(conclusion, Some(CheckRunConclusion::Success)));

        let (status, conclusion) = check_run_fields(GateState::Failure);
        assert!(matches!(status, CheckRunStatus::Completed));
        assert!(matches!(conclusion, Some(CheckRunConclusion::Failure)));
    }

    #[test]
    fn test_rendered_equality_tracks_content() {
        let a = Rendered::of(&report(GateState::Pending, None));
        let b = Rendered::of(&report(GateState::Pending, None));
        assert_eq!(a, b);

        let c = Rendered::of(&report(GateState::Failure, Some(GateReason::TimedOut)));
        assert_ne!(a, c);
        assert_eq!(c.title, "Timed out waiting for required checks");
    }
}
