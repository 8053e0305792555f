//! Trigger detection from the GitHub Actions environment.

use crate::client::GitHubRepo;
use cigate_core::{Error, Result, TriggerEvent};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct EventPayload {
    pull_request: Option<PullRequest>,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    head: Head,
}

#[derive(Debug, Deserialize)]
struct Head {
    sha: String,
}

/// Events whose `GITHUB_SHA` is a synthetic merge commit rather than the
/// commit the checks report against.
fn is_pull_request_event(event: &str) -> bool {
    matches!(event, "pull_request" | "pull_request_target")
}

/// Read `pull_request.head.sha` from a webhook payload file.
pub fn head_sha_from_event(path: &Path) -> Result<Option<String>> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let payload: EventPayload = serde_json::from_str(&raw).map_err(|e| {
        Error::configuration(format!(
            "Failed to parse event payload {}: {e}",
            path.display()
        ))
    })?;
    Ok(payload.pull_request.map(|pr| pr.head.sha))
}

/// Build the trigger from `GITHUB_SHA`, `GITHUB_REF` and `GITHUB_EVENT_NAME`.
///
/// For pull request events the PR head commit is used instead of
/// `GITHUB_SHA`, since that is where the required checks report.
pub fn detect_trigger() -> Result<TriggerEvent> {
    let sha = std::env::var("GITHUB_SHA")
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::configuration("GITHUB_SHA is not set; pass --sha"))?;
    let ref_name = std::env::var("GITHUB_REF").unwrap_or_default();
    let event = std::env::var("GITHUB_EVENT_NAME").unwrap_or_else(|_| "push".to_string());

    let sha = if is_pull_request_event(&event) {
        match std::env::var("GITHUB_EVENT_PATH") {
            Ok(path) => match head_sha_from_event(Path::new(&path))? {
                Some(head) => {
                    debug!(merge_sha = %sha, head_sha = %head, "Using pull request head commit");
                    head
                }
                None => sha,
            },
            Err(_) => {
                warn!("GITHUB_EVENT_PATH not set for {event} event, using GITHUB_SHA");
                sha
            }
        }
    } else {
        sha
    };

    Ok(TriggerEvent::new(sha, ref_name, event))
}

/// Repository and token from `GITHUB_REPOSITORY` and `GITHUB_TOKEN`.
///
/// `slug` overrides `GITHUB_REPOSITORY` when given. The token is only ever
/// read from the environment. `GITHUB_API_URL`, when set, replaces the
/// default API root.
pub fn repo_from_env(slug: Option<&str>) -> Result<GitHubRepo> {
    let slug = match slug {
        Some(s) => s.to_string(),
        None => std::env::var("GITHUB_REPOSITORY")
            .map_err(|_| Error::configuration("GITHUB_REPOSITORY is not set; pass --repo"))?,
    };
    let token = std::env::var("GITHUB_TOKEN").unwrap_or_default();
    let repo = GitHubRepo::new(&slug, token)?;
    Ok(match std::env::var("GITHUB_API_URL") {
        Ok(uri) if !uri.is_empty() => repo.with_base_uri(uri),
        _ => repo,
    })
}
