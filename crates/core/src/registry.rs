//! Required-check registry.
//!
//! The registry is a small YAML file checked into the repository:
//!
//! ```yaml
//! version: 1
//! gate_name: ci-gate
//! required_checks:
//!   - lint
//!   - test
//! poll_interval_secs: 15
//! max_attempts: 120
//! ```
//!
//! It is read once per evaluation. Adding or removing a required check is a
//! pure configuration change.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Registry file location relative to the repository root
pub const DEFAULT_CONFIG_PATH: &str = ".github/ci-gate.yml";

/// Name of the published gate check when none is configured
pub const DEFAULT_GATE_NAME: &str = "ci-gate";

/// Seconds between polls when none is configured
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

/// Poll ceiling when none is configured (about 30 minutes at 15 s)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 120;

/// Registry schema versions this build understands
const SUPPORTED_VERSION: u32 = 1;

/// Ordered, duplicate-free, non-empty list of check names.
///
/// Only constructible through [`RequiredCheckSet::new`], so holding one means
/// the invariants already hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RequiredCheckSet {
    names: Vec<String>,
}

impl RequiredCheckSet {
    /// Validate `names` and build a set, keeping the given order
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        validate(&names)?;
        Ok(Self { names })
    }

    /// Names in registry order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Number of required checks
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false; kept for API symmetry with `len`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Exact, case-sensitive membership test
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// Check that a list of names can serve as a required-check set.
///
/// Rejects an empty list, blank names and duplicates. Comparison is exact, so
/// `Lint` and `lint` are distinct checks.
pub fn validate(names: &[String]) -> Result<()> {
    if names.is_empty() {
        return Err(Error::configuration(
            "required_checks is empty; at least one required check must be listed",
        ));
    }

    let mut seen = HashSet::with_capacity(names.len());
    let mut duplicates = Vec::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(Error::configuration(
                "required_checks contains a blank check name",
            ));
        }
        if !seen.insert(name.as_str()) && !duplicates.contains(name) {
            duplicates.push(name.clone());
        }
    }

    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(Error::configuration(format!(
            "required_checks contains duplicates: {}",
            duplicates.join(", ")
        )))
    }
}

/// On-disk shape of the registry file
#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    version: u32,
    #[serde(default = "default_gate_name")]
    gate_name: String,
    #[serde(default)]
    required_checks: Vec<String>,
    #[serde(default = "default_poll_interval_secs")]
    poll_interval_secs: u64,
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
}

fn default_gate_name() -> String {
    DEFAULT_GATE_NAME.to_string()
}

const fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Validated gate configuration for one evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// Registry schema version
    pub version: u32,
    /// Name under which the gate check is published
    pub gate_name: String,
    /// Checks that must all succeed
    pub required: RequiredCheckSet,
    /// Sleep between polls
    pub poll_interval: Duration,
    /// Maximum number of polls before timing out
    pub max_attempts: u32,
}

impl GateConfig {
    /// Build a config with default gate name and cadence
    #[must_use]
    pub fn new(required: RequiredCheckSet) -> Self {
        Self {
            version: SUPPORTED_VERSION,
            gate_name: DEFAULT_GATE_NAME.to_string(),
            required,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Load and validate the registry file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config = Self::from_yaml(&content).map_err(|e| match e {
            Error::ConfigParse { source, .. } => Error::ConfigParse {
                path: path.into(),
                source,
            },
            other => other,
        })?;
        debug!(
            path = %path.display(),
            gate = %config.gate_name,
            required = config.required.len(),
            "Loaded required-check registry"
        );
        Ok(config)
    }

    /// Parse and validate registry YAML
    pub fn from_yaml(content: &str) -> Result<Self> {
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|source| Error::ConfigParse {
                path: Path::new("<inline>").into(),
                source,
            })?;

        if raw.version != SUPPORTED_VERSION {
            return Err(Error::configuration(format!(
                "unsupported registry version {} (expected {SUPPORTED_VERSION})",
                raw.version
            )));
        }

        let required = RequiredCheckSet::new(raw.required_checks)?;

        Self::new(required)
            .with_gate_name(raw.gate_name)
            .with_poll_interval(Duration::from_secs(raw.poll_interval_secs))
            .with_max_attempts(raw.max_attempts)
            .validated()
    }

    /// Set the published gate name
    #[must_use]
    pub fn with_gate_name(mut self, gate_name: impl Into<String>) -> Self {
        self.gate_name = gate_name.into();
        self
    }

    /// Set the sleep between polls
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the poll ceiling
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Re-check cross-field invariants after overrides have been applied
    pub fn validated(self) -> Result<Self> {
        if self.gate_name.trim().is_empty() {
            return Err(Error::configuration("gate_name must not be blank"));
        }
        if self.required.contains(&self.gate_name) {
            return Err(Error::configuration(format!(
                "required_checks lists the gate itself ('{}'); the gate would wait on its own result",
                self.gate_name
            )));
        }
        if self.max_attempts == 0 {
            return Err(Error::configuration("max_attempts must be at least 1"));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::configuration("poll_interval_secs must be at least 1"));
        }
        Ok(self)
    }
}
