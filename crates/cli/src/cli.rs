use crate::tracing::LogLevel;
use cigate_core::registry::DEFAULT_CONFIG_PATH;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cigate")]
#[command(about = "Fan-in gate that publishes one check for a set of required CI checks")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "info",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(long, global = true, help = "Output logs in JSON format")]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Evaluate the gate for a commit and publish the result")]
    Run(RunArgs),
    #[command(about = "Validate the required-check registry")]
    Validate {
        #[arg(long, short = 'c', help = "Path to the registry file", default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long, short = 'c', help = "Path to the registry file", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[arg(long, help = "Commit to gate (default: detected from GITHUB_SHA)")]
    pub sha: Option<String>,

    #[arg(long = "ref", help = "Ref the commit belongs to (default: GITHUB_REF)")]
    pub ref_name: Option<String>,

    #[arg(long, help = "Triggering event name (default: GITHUB_EVENT_NAME)")]
    pub event: Option<String>,

    #[arg(long, help = "Repository as OWNER/REPO (default: GITHUB_REPOSITORY)")]
    pub repo: Option<String>,

    #[arg(
        long,
        help = "Seconds between polls, overriding the registry",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub interval: Option<u64>,

    #[arg(
        long,
        help = "Maximum number of polls, overriding the registry",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_attempts: Option<u32>,

    #[arg(long, help = "Log the gate report instead of publishing it")]
    pub dry_run: bool,
}
