//! Fan-in of check-run observations into a single gate state.
//!
//! [`aggregate`] is total: it never fails and never looks at anything beyond
//! the registry and the snapshot it is given. Turning a prolonged `absent`
//! into a failure is the controller's job, not this module's.

use crate::check::{CheckConclusion, CheckRun, ConclusionOutcome, Snapshot};
use crate::registry::RequiredCheckSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Published gate vocabulary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GateState {
    /// At least one required check has not resolved yet.
    Pending,
    /// Every required check succeeded.
    Success,
    /// A required check failed, or the gate gave up.
    Failure,
}

impl GateState {
    /// Whether this state ends an evaluation
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Wire name of the state
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-check classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CheckClass {
    /// No run with this name has been observed.
    Absent,
    /// The selected run has not completed.
    Pending,
    /// The selected run completed with a passing conclusion.
    Success,
    /// The selected run completed with a failing conclusion.
    Failed,
}

impl CheckClass {
    /// Wire name of the class
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CheckClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one required check against a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckVerdict {
    /// Required check name.
    pub name: String,
    /// How the check classifies.
    pub class: CheckClass,
    /// Id of the run that was selected, if any.
    pub run_id: Option<u64>,
    /// Conclusion of the selected run, if completed.
    pub conclusion: Option<CheckConclusion>,
}

impl fmt::Display for CheckVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.class)?;
        if self.class == CheckClass::Failed
            && let Some(conclusion) = self.conclusion
        {
            write!(f, " ({conclusion})")?;
        }
        Ok(())
    }
}

/// Result of aggregating one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    /// Overall gate state.
    pub state: GateState,
    /// One verdict per required check, in registry order.
    pub verdicts: Vec<CheckVerdict>,
    /// Human-readable summary naming every non-successful check.
    pub diagnostics: String,
}

impl Aggregation {
    /// Verdicts with the given class, in registry order
    pub fn with_class(&self, class: CheckClass) -> impl Iterator<Item = &CheckVerdict> {
        self.verdicts.iter().filter(move |v| v.class == class)
    }

    /// Names of every required check that has not succeeded
    #[must_use]
    pub fn unresolved_names(&self) -> Vec<&str> {
        self.verdicts
            .iter()
            .filter(|v| v.class != CheckClass::Success)
            .map(|v| v.name.as_str())
            .collect()
    }
}

/// Classify `snapshot` against `required`.
///
/// Runs are de-duplicated by id before reruns are resolved, so a page repeated
/// by inconsistent pagination never counts twice. Among same-named runs the one
/// with the latest `started_at` wins, ties going to the higher id; the result
/// is the same whatever order the snapshot lists runs in.
#[must_use]
pub fn aggregate(required: &RequiredCheckSet, snapshot: &Snapshot) -> Aggregation {
    let latest = latest_by_name(required, snapshot);

    let verdicts: Vec<CheckVerdict> = required
        .iter()
        .map(|name| classify(name, latest.get(name).copied()))
        .collect();

    let state = if verdicts.iter().any(|v| v.class == CheckClass::Failed) {
        GateState::Failure
    } else if verdicts.iter().all(|v| v.class == CheckClass::Success) {
        GateState::Success
    } else {
        GateState::Pending
    };

    let diagnostics = describe(&verdicts);

    Aggregation {
        state,
        verdicts,
        diagnostics,
    }
}

/// Pick the most recent run for each required name
fn latest_by_name<'a>(
    required: &RequiredCheckSet,
    snapshot: &'a Snapshot,
) -> HashMap<&'a str, &'a CheckRun> {
    let mut by_id: HashMap<u64, &CheckRun> = HashMap::with_capacity(snapshot.len());
    for run in &snapshot.runs {
        if required.contains(&run.name) {
            // Same id twice means the page was served twice; keep the later
            // observation in list order.
            by_id.insert(run.id, run);
        }
    }

    let mut latest: HashMap<&str, &CheckRun> = HashMap::new();
    for run in by_id.into_values() {
        latest
            .entry(run.name.as_str())
            .and_modify(|current| {
                if run.recency() > current.recency() {
                    *current = run;
                }
            })
            .or_insert(run);
    }
    latest
}

fn classify(name: &str, run: Option<&CheckRun>) -> CheckVerdict {
    let Some(run) = run else {
        return CheckVerdict {
            name: name.to_string(),
            class: CheckClass::Absent,
            run_id: None,
            conclusion: None,
        };
    };

    let class = if !run.status.is_completed() {
        CheckClass::Pending
    } else {
        match run.conclusion.map(CheckConclusion::outcome) {
            Some(ConclusionOutcome::Pass) => CheckClass::Success,
            Some(ConclusionOutcome::Fail) => CheckClass::Failed,
            // Completed without a conclusion yet; the host fills it in shortly.
            None => CheckClass::Pending,
        }
    };

    CheckVerdict {
        name: name.to_string(),
        class,
        run_id: Some(run.id),
        conclusion: run.conclusion,
    }
}

fn describe(verdicts: &[CheckVerdict]) -> String {
    let unresolved: Vec<String> = verdicts
        .iter()
        .filter(|v| v.class != CheckClass::Success)
        .map(ToString::to_string)
        .collect();

    if unresolved.is_empty() {
        format!("all {} required checks succeeded", verdicts.len())
    } else {
        unresolved.join("; ")
    }
}
