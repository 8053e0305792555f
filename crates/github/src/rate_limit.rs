//! Read-only view of the token's core API quota.

use crate::client::{GitHubRepo, classify};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cigate_core::{PollError, Quota, RateLimitBudget, Result};
use octocrab::Octocrab;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    rate: RateWindow,
}

#[derive(Debug, Deserialize)]
struct RateWindow {
    remaining: u64,
    /// Epoch seconds
    reset: i64,
}

impl From<RateWindow> for Quota {
    fn from(window: RateWindow) -> Self {
        Self {
            remaining: window.remaining,
            reset_at: DateTime::<Utc>::from_timestamp(window.reset, 0),
        }
    }
}

/// Quota reported by `GET /rate_limit`.
///
/// The endpoint itself does not count against the quota. GitHub Enterprise
/// instances with rate limiting disabled answer 404, which reads as "no quota".
pub struct GitHubRateLimit {
    client: Octocrab,
}

impl GitHubRateLimit {
    /// Create a budget reader authenticated as `repo`'s token
    pub fn new(repo: &GitHubRepo) -> Result<Self> {
        Ok(Self {
            client: repo.octocrab()?,
        })
    }
}

#[async_trait]
impl RateLimitBudget for GitHubRateLimit {
    async fn quota(&self) -> std::result::Result<Option<Quota>, PollError> {
        match self
            .client
            .get::<RateLimitResponse, _, ()>("/rate_limit", None)
            .await
        {
            Ok(body) => {
                let quota = Quota::from(body.rate);
                debug!(remaining = quota.remaining, reset_at = ?quota.reset_at, "Rate limit");
                Ok(Some(quota))
            }
            Err(octocrab::Error::GitHub { source, .. }) if source.status_code.as_u16() == 404 => {
                Ok(None)
            }
            Err(e) => Err(classify(&e)),
        }
    }
}
