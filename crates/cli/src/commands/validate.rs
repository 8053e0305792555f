use super::emit;
use cigate_core::GateConfig;
use std::io::Write;
use std::path::Path;
use tracing::instrument;

/// Lines printed for a valid registry
fn describe(config: &GateConfig) -> Vec<String> {
    let mut lines = vec![format!(
        "{}: {} required checks, every {}s, at most {} polls",
        config.gate_name,
        config.required.len(),
        config.poll_interval.as_secs(),
        config.max_attempts
    )];
    lines.extend(config.required.iter().map(|name| format!("  - {name}")));
    lines
}

/// Load and validate the registry, listing the required checks
#[instrument(skip(out))]
pub fn execute(config: &Path, out: &mut impl Write) -> miette::Result<()> {
    let config = GateConfig::load(config)?;
    emit(out, &describe(&config))?;
    Ok(())
}
