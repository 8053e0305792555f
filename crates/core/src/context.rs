//! Trigger event context for one gate evaluation.

use std::fmt;

/// The event that started an evaluation.
///
/// Contains the commit the gate is published against, the ref used to detect
/// supersession, and the event type for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    /// The git commit SHA the gate report is attached to.
    pub sha: String,
    /// The git ref (e.g., "refs/heads/main", "refs/pull/42/merge").
    pub ref_name: String,
    /// The event type (e.g., "push", "pull_request").
    pub event: String,
}

impl TriggerEvent {
    /// Create a trigger event
    pub fn new(
        sha: impl Into<String>,
        ref_name: impl Into<String>,
        event: impl Into<String>,
    ) -> Self {
        Self {
            sha: sha.into(),
            ref_name: ref_name.into(),
            event: event.into(),
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} ({})",
            self.event,
            self.ref_name,
            self.sha.get(..7).unwrap_or(&self.sha)
        )
    }
}
