//! Seams to the external CI-status API.

use crate::check::Snapshot;
use crate::error::PollError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of check-run observations for a commit.
#[async_trait]
pub trait CheckSource: Send + Sync {
    /// Fetch every check run visible for `sha`, merging all pages.
    async fn poll(&self, sha: &str) -> Result<Snapshot, PollError>;
}

#[async_trait]
impl<T: CheckSource + ?Sized> CheckSource for Arc<T> {
    async fn poll(&self, sha: &str) -> Result<Snapshot, PollError> {
        (**self).poll(sha).await
    }
}

/// Remaining API request quota as last reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    /// Requests left in the current window.
    pub remaining: u64,
    /// When the window resets.
    pub reset_at: Option<DateTime<Utc>>,
}

impl Quota {
    /// Whether no requests are left
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// Read-only view of the process-wide API rate-limit budget.
///
/// Evaluations read it before polling; none of them mutates it. The host
/// resets it on its own schedule.
#[async_trait]
pub trait RateLimitBudget: Send + Sync {
    /// Current quota, or `None` when the host does not report one.
    async fn quota(&self) -> Result<Option<Quota>, PollError>;
}

#[async_trait]
impl<T: RateLimitBudget + ?Sized> RateLimitBudget for Arc<T> {
    async fn quota(&self) -> Result<Option<Quota>, PollError> {
        (**self).quota().await
    }
}

/// Budget that never limits; used for dry runs and hosts without quotas.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

#[async_trait]
impl RateLimitBudget for Unlimited {
    async fn quota(&self) -> Result<Option<Quota>, PollError> {
        Ok(None)
    }
}

/// Budget backed by a shared counter.
///
/// The owner of the counter (a response-header hook, or a test) updates it;
/// evaluations only read it.
#[derive(Debug, Clone, Default)]
pub struct SharedBudget {
    remaining: Arc<AtomicU64>,
}

impl SharedBudget {
    /// Create a budget with `remaining` requests
    #[must_use]
    pub fn new(remaining: u64) -> Self {
        Self {
            remaining: Arc::new(AtomicU64::new(remaining)),
        }
    }

    /// Record the latest value reported by the host
    pub fn record(&self, remaining: u64) {
        self.remaining.store(remaining, Ordering::Relaxed);
    }
}

#[async_trait]
impl RateLimitBudget for SharedBudget {
    async fn quota(&self) -> Result<Option<Quota>, PollError> {
        Ok(Some(Quota {
            remaining: self.remaining.load(Ordering::Relaxed),
            reset_at: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unlimited_reports_nothing() {
        assert_eq!(Unlimited.quota().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_shared_budget_clones_observe_updates() {
        let budget = SharedBudget::new(10);
        let reader = budget.clone();
        budget.record(0);
        let quota = reader.quota().await.unwrap().unwrap();
        assert!(quota.is_exhausted());
    }
}
