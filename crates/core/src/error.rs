//! Error types for gate evaluation.
//!
//! Two families are kept apart: [`Error`] covers everything that stops an
//! evaluation outright (bad registry, unreadable config, failed publish), while
//! [`PollError`] is what a [`crate::CheckSource`] hands back to the controller,
//! which alone decides whether to retry or abort.

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Main error type for cigate operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The required-check registry or gate settings are invalid.
    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(cigate::config::invalid),
        help("Fix the required-check registry; an invalid registry never passes the gate")
    )]
    Configuration {
        /// What is wrong with the configuration
        message: String,
    },

    /// The config file is not valid YAML for the expected shape.
    #[error("Failed to parse config file {}: {source}", .path.display())]
    #[diagnostic(code(cigate::config::parse))]
    ConfigParse {
        /// Config file that failed to parse
        path: Box<Path>,
        /// Underlying YAML error
        #[source]
        source: serde_yaml::Error,
    },

    /// The config file could not be read.
    #[error("IO error reading {}: {source}", .path.display())]
    #[diagnostic(code(cigate::io))]
    Io {
        /// File being read
        path: Box<Path>,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The reporter could not create or update the gate report.
    #[error("Failed to publish gate report: {0}")]
    #[diagnostic(code(cigate::report::publish))]
    Report(String),
}

impl Error {
    /// Build a [`Error::Configuration`]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Build a [`Error::Io`] for the given path
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a [`Error::Report`]
    pub fn report(msg: impl Into<String>) -> Self {
        Self::Report(msg.into())
    }
}

/// Errors surfaced by a check source while fetching a snapshot.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum PollError {
    /// Network failure or 5xx; retried within the attempt budget.
    #[error("transient API error: {0}")]
    #[diagnostic(code(cigate::poll::transient))]
    Transient(String),

    /// The API request quota is used up.
    #[error("API rate limit exhausted{}", reset_suffix(.reset_at))]
    #[diagnostic(
        code(cigate::poll::quota_exhausted),
        help("Wait for the hourly rate-limit window to reset, or use a token with a larger quota")
    )]
    QuotaExhausted {
        /// When the quota window resets, if the API reported it
        reset_at: Option<DateTime<Utc>>,
    },

    /// Credentials were rejected or lack permission.
    #[error("authentication failed: {0}")]
    #[diagnostic(
        code(cigate::poll::auth),
        help("Check that GITHUB_TOKEN is set and has `checks: read` permission")
    )]
    Auth(String),
}

impl PollError {
    /// Build a [`PollError::Transient`]
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Build a [`PollError::Auth`]
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Whether the controller may poll again after this error
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

fn reset_suffix(reset_at: &Option<DateTime<Utc>>) -> String {
    reset_at
        .map(|t| format!(" (resets at {})", t.to_rfc3339()))
        .unwrap_or_default()
}

/// Result type alias for cigate operations
pub type Result<T> = std::result::Result<T, Error>;
