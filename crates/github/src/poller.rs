//! Check-run source backed by the GitHub Checks API.
//!
//! One poll walks `GET /repos/{owner}/{repo}/commits/{sha}/check-runs` page by
//! page and merges everything into one snapshot. `filter=all` is required:
//! the default `latest` filter hides older attempts, and rerun selection is
//! the aggregator's job, not the API's.

use crate::client::{GitHubRepo, classify};
use async_trait::async_trait;
use cigate_core::{CheckRun, CheckSource, PollError, Result, Snapshot};
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Largest page size the API accepts
pub const PER_PAGE: u8 = 100;

/// Hard cap on pages fetched per poll
pub const MAX_PAGES: u32 = 10;

#[derive(Debug, Serialize)]
pub(crate) struct ListCheckRunsParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_name: Option<&'a str>,
    pub filter: &'static str,
    pub per_page: u8,
    pub page: u32,
}

/// One page of the list-check-runs response.
#[derive(Debug, Deserialize)]
pub(crate) struct CheckRunPage {
    pub total_count: u64,
    pub check_runs: Vec<CheckRun>,
}

/// Whether another page should be requested after one of `page_len` entries.
///
/// A short page ends the walk, as does reaching `total_count`. `total_count`
/// can change while paging, so both conditions are checked.
pub(crate) const fn has_more_pages(page_len: usize, fetched: u64, total_count: u64) -> bool {
    page_len >= PER_PAGE as usize && fetched < total_count
}

/// Polls check runs for a commit from GitHub.
pub struct GitHubCheckSource {
    client: Octocrab,
    repo: GitHubRepo,
    exclude: Option<String>,
}

impl GitHubCheckSource {
    /// Create a source for `repo`
    pub fn new(repo: GitHubRepo) -> Result<Self> {
        Ok(Self {
            client: repo.octocrab()?,
            repo,
            exclude: None,
        })
    }

    /// Drop runs named `name` from every snapshot.
    ///
    /// Set to the gate's own name so the gate never observes itself.
    #[must_use]
    pub fn excluding(mut self, name: impl Into<String>) -> Self {
        self.exclude = Some(name.into());
        self
    }

    async fn fetch_page(&self, route: &str, page: u32) -> std::result::Result<CheckRunPage, PollError> {
        let params = ListCheckRunsParams {
            check_name: None,
            filter: "all",
            per_page: PER_PAGE,
            page,
        };
        self.client
            .get(route, Some(&params))
            .await
            .map_err(|e| classify(&e))
    }
}

#[async_trait]
impl CheckSource for GitHubCheckSource {
    #[instrument(skip(self), fields(repo = %format!("{}/{}", self.repo.owner, self.repo.repo)))]
    async fn poll(&self, sha: &str) -> std::result::Result<Snapshot, PollError> {
        let route = self.repo.route(&format!("commits/{sha}/check-runs"));
        let mut runs: Vec<CheckRun> = Vec::new();
        let mut fetched: u64 = 0;

        for page in 1..=MAX_PAGES {
            let body = self.fetch_page(&route, page).await?;
            let page_len = body.check_runs.len();
            fetched += page_len as u64;
            debug!(page, page_len, total_count = body.total_count, "Fetched check-run page");

            runs.extend(
                body.check_runs
                    .into_iter()
                    .filter(|run| self.exclude.as_deref() != Some(run.name.as_str())),
            );

            if !has_more_pages(page_len, fetched, body.total_count) {
                return Ok(Snapshot::new(runs));
            }
        }

        warn!(
            max_pages = MAX_PAGES,
            fetched, "Check-run listing truncated at page cap"
        );
        Ok(Snapshot::new(runs))
    }
}
