//! Authenticated GitHub client and API error classification.

use cigate_core::{Error, PollError, Result};
use octocrab::Octocrab;

/// Repository coordinates plus the token used to reach it.
#[derive(Clone)]
pub struct GitHubRepo {
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    token: String,
    base_uri: Option<String>,
}

impl std::fmt::Debug for GitHubRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubRepo")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &"<redacted>")
            .field("base_uri", &self.base_uri)
            .finish()
    }
}

impl GitHubRepo {
    /// Build from an `owner/repo` slug and a token
    pub fn new(slug: &str, token: impl Into<String>) -> Result<Self> {
        let (owner, repo) = parse_repo(slug).ok_or_else(|| {
            Error::configuration(format!("invalid repository '{slug}', expected OWNER/REPO"))
        })?;
        Ok(Self {
            owner,
            repo,
            token: token.into(),
            base_uri: None,
        })
    }

    /// Talk to the API at `uri` instead of `https://api.github.com`.
    ///
    /// Used for GitHub Enterprise Server, where Actions exports the API root
    /// as `GITHUB_API_URL`.
    #[must_use]
    pub fn with_base_uri(mut self, uri: impl Into<String>) -> Self {
        self.base_uri = Some(uri.into());
        self
    }

    /// Create an octocrab instance authenticated with the token.
    pub fn octocrab(&self) -> Result<Octocrab> {
        if self.token.is_empty() {
            return Err(Error::configuration("GITHUB_TOKEN is not set or empty"));
        }
        let mut builder = Octocrab::builder().personal_token(self.token.clone());
        if let Some(uri) = &self.base_uri {
            builder = builder.base_uri(uri.as_str()).map_err(|e| {
                Error::configuration(format!("invalid GitHub API URL '{uri}': {e}"))
            })?;
        }
        builder
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create GitHub client: {e}")))
    }

    /// Route prefix for repository-scoped endpoints
    pub(crate) fn route(&self, path: &str) -> String {
        format!("/repos/{}/{}/{path}", self.owner, self.repo)
    }
}

/// Split `owner/repo`; anything else is rejected.
pub(crate) fn parse_repo(slug: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = slug.split('/').collect();
    match parts.as_slice() {
        [owner, repo] if !owner.is_empty() && !repo.is_empty() => {
            Some(((*owner).to_string(), (*repo).to_string()))
        }
        _ => None,
    }
}

/// Map an octocrab failure onto the poll taxonomy.
pub(crate) fn classify(err: &octocrab::Error) -> PollError {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            classify_status(source.status_code.as_u16(), &source.message)
        }
        // Transport, TLS and decode failures: try again next tick.
        other => PollError::transient(other.to_string()),
    }
}

/// Classify a GitHub API error response.
///
/// GitHub reports primary rate limiting as 403 and secondary rate limiting as
/// 403 or 429, always with "rate limit" in the message.
///
/// octocrab hands over only the status and the error body, not the
/// `x-ratelimit-reset` header, so `reset_at` is always `None` here. The reset
/// time is reported by [`GitHubRateLimit`](crate::GitHubRateLimit), which
/// reads it from `/rate_limit` before every poll.
pub(crate) fn classify_status(status: u16, message: &str) -> PollError {
    let detail = format!("{status} {message}");
    match status {
        401 => PollError::auth(detail),
        403 | 429 if message.to_ascii_lowercase().contains("rate limit") => {
            PollError::QuotaExhausted { reset_at: None }
        }
        403 | 404 => PollError::auth(detail),
        _ => PollError::transient(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repo() {
        assert_eq!(
            parse_repo("cigate/cigate"),
            Some(("cigate".to_string(), "cigate".to_string()))
        );
        assert_eq!(
            parse_repo("organization/project-name"),
            Some(("organization".to_string(), "project-name".to_string()))
        );
    }

    #[test]
    fn test_parse_repo_invalid() {
        assert_eq!(parse_repo("invalid"), None);
        assert_eq!(parse_repo(""), None);
        assert_eq!(parse_repo("a/b/c/d"), None);
        assert_eq!(parse_repo("/repo"), None);
        assert_eq!(parse_repo("owner/"), None);
    }

    #[test]
    fn test_new_rejects_bad_slug() {
        let err = GitHubRepo::new("nope", "token").unwrap_err();
        assert!(err.to_string().contains("expected OWNER/REPO"));
    }

    #[test]
    fn test_empty_token_rejected() {
        let repo = GitHubRepo::new("owner/repo", "").unwrap();
        assert!(repo.octocrab().is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let repo = GitHubRepo::new("owner/repo", "ghp_secret").unwrap();
        let debug = format!("{repo:?}");
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_invalid_base_uri_rejected() {
        let repo = GitHubRepo::new("owner/repo", "t")
            .unwrap()
            .with_base_uri("not a uri");
        let err = repo.octocrab().unwrap_err();
        assert!(err.to_string().contains("invalid GitHub API URL"));
    }

    #[test]
    fn test_route() {
        let repo = GitHubRepo::new("owner/repo", "t").unwrap();
        assert_eq!(
            repo.route("commits/abc/check-runs"),
            "/repos/owner/repo/commits/abc/check-runs"
        );
    }

    #[test]
    fn test_classify_auth() {
        assert!(matches!(
            classify_status(401, "Bad credentials"),
            PollError::Auth(_)
        ));
        assert!(matches!(
            classify_status(403, "Resource not accessible by integration"),
            PollError::Auth(_)
        ));
        assert!(matches!(classify_status(404, "Not Found"), PollError::Auth(_)));
    }

    #[test]
    fn test_classify_rate_limit() {
        assert_eq!(
            classify_status(403, "API rate limit exceeded for installation ID 1."),
            PollError::QuotaExhausted { reset_at: None }
        );
        assert_eq!(
            classify_status(429, "You have exceeded a secondary rate limit."),
            PollError::QuotaExhausted { reset_at: None }
        );
        // Without a reset time the error is still terminal for the evaluation.
        assert!(!classify_status(403, "API rate limit exceeded").is_retryable());
    }

    #[test]
    fn test_classify_transient() {
        for status in [500, 502, 503, 504, 422] {
            assert!(
                classify_status(status, "oops").is_retryable(),
                "status {status} should be retryable"
            );
        }
        assert!(classify_status(429, "Too Many Requests").is_retryable());
    }
}
