//! The single externally visible gate result.
//!
//! One [`GateReport`] exists per `(commit, gate name)`. Reporters update it in
//! place; publishing an unchanged report must not create a second entity.

use crate::aggregate::{CheckClass, CheckVerdict, GateState};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::info;

/// Why a gate finalized as failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    /// A required check concluded with a failing conclusion.
    ChecksFailed,
    /// The attempt ceiling was reached while checks were still pending or absent.
    TimedOut,
    /// The API rate limit ran out.
    QuotaExhausted,
    /// The API rejected the credentials.
    AuthFailed,
}

impl GateReason {
    /// Stable reason code
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ChecksFailed => "checks_failed",
            Self::TimedOut => "timed_out",
            Self::QuotaExhausted => "quota_exhausted",
            Self::AuthFailed => "auth_failed",
        }
    }
}

impl fmt::Display for GateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gate state plus everything an operator needs to debug it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateReport {
    /// Published check name.
    pub gate_name: String,
    /// Commit the report is attached to.
    pub sha: String,
    /// Current gate state.
    pub state: GateState,
    /// Failure reason; `None` unless `state` is `Failure`.
    pub reason: Option<GateReason>,
    /// Classification of every required check, in registry order.
    pub checks: Vec<CheckVerdict>,
    /// One-line diagnostic naming every non-successful check.
    pub diagnostics: String,
}

impl GateReport {
    /// Title line used by hosts that show one
    #[must_use]
    pub fn title(&self) -> String {
        match (self.state, self.reason) {
            (GateState::Pending, _) => {
                let waiting = self
                    .checks
                    .iter()
                    .filter(|c| c.class != CheckClass::Success)
                    .count();
                format!("Waiting on {waiting} of {} required checks", self.checks.len())
            }
            (GateState::Success, _) => {
                format!("All {} required checks passed", self.checks.len())
            }
            (GateState::Failure, Some(GateReason::TimedOut)) => {
                "Timed out waiting for required checks".to_string()
            }
            (GateState::Failure, Some(GateReason::QuotaExhausted)) => {
                "API rate limit exhausted".to_string()
            }
            (GateState::Failure, Some(GateReason::AuthFailed)) => {
                "Could not read check runs".to_string()
            }
            (GateState::Failure, _) => "Required checks failed".to_string(),
        }
    }
}

/// Render a report as the Markdown body of the gate check.
#[must_use]
pub fn render_summary(report: &GateReport) -> String {
    let mut md = String::new();

    let _ = writeln!(md, "## {}: {}\n", report.gate_name, report.state);

    if let Some(reason) = report.reason {
        let _ = writeln!(md, "**Reason:** `{reason}`\n");
    }
    let _ = writeln!(md, "{}\n", report.diagnostics);

    md.push_str("| Check | Status | Conclusion |\n");
    md.push_str("|-------|--------|------------|\n");
    for check in &report.checks {
        let conclusion = check
            .conclusion
            .map_or_else(|| "-".to_string(), |c| c.to_string());
        let _ = writeln!(md, "| `{}` | {} | {} |", check.name, check.class, conclusion);
    }

    let _ = write!(
        md,
        "\n---\n*Commit `{}`*\n",
        report.sha.get(..7).unwrap_or(&report.sha)
    );
    md
}

/// Publishes the gate report to the host.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Create or update the gate report; unchanged content must not duplicate it.
    async fn publish(&self, report: &GateReport) -> Result<()>;
}

#[async_trait]
impl<T: Reporter + ?Sized> Reporter for Arc<T> {
    async fn publish(&self, report: &GateReport) -> Result<()> {
        (**self).publish(report).await
    }
}

/// Reporter that only logs; used for `--dry-run`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

#[async_trait]
impl Reporter for LogReporter {
    async fn publish(&self, report: &GateReport) -> Result<()> {
        info!(
            gate = %report.gate_name,
            sha = %report.sha,
            state = %report.state,
            reason = report.reason.map(GateReason::as_str),
            diagnostics = %report.diagnostics,
            "Gate report (dry run)"
        );
        Ok(())
    }
}
