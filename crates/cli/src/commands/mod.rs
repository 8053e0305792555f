//! Subcommand implementations

pub mod run;
pub mod validate;

use crate::errors::CliError;
use std::io::Write;

/// Write command output lines to stdout
pub(crate) fn emit(out: &mut impl Write, lines: &[String]) -> Result<(), CliError> {
    for line in lines {
        writeln!(out, "{line}").map_err(CliError::output)?;
    }
    out.flush().map_err(CliError::output)
}
