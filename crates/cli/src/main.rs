//! `cigate`: publish one gate check for a set of required CI checks.

mod cli;
mod commands;
mod errors;
mod shutdown;
mod tracing;

use crate::cli::{Cli, Commands};
use crate::tracing::{TracingConfig, TracingFormat};
use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> miette::Result<ExitCode> {
    let cli = Cli::parse();

    crate::tracing::init_tracing(TracingConfig {
        format: if cli.json {
            TracingFormat::Json
        } else {
            TracingFormat::Compact
        },
        level: cli.level.into(),
        ..Default::default()
    })?;

    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Commands::Run(args) => {
            let shutdown = CancellationToken::new();
            shutdown::install_signal_handlers(shutdown.clone())?;
            commands::run::execute(args, shutdown, &mut stdout)
                .await
                .map(ExitCode::from)
        }
        Commands::Validate { config } => {
            commands::validate::execute(&config, &mut stdout)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
