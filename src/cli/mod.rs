//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Sowtrack using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Sowtrack - livestock stage tracking
#[derive(Parser, Debug)]
#[command(name = "sowtrack")]
#[command(version, about, long_about = None)]
#[command(author = "Sowtrack Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "sowtrack.toml", env = "SOWTRACK_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "SOWTRACK_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the records currently active in a stage
    ListActive(commands::list::ListActiveArgs),

    /// List the records of a stage closed in a given month
    ListHistory(commands::list::ListHistoryArgs),

    /// Move an animal to its next stage
    Transition(commands::transition::TransitionArgs),

    /// Update fields of an active stage record
    UpdateRecord(commands::update::UpdateRecordArgs),

    /// Look up an animal's profile, medical history or stage history
    Lookup(commands::lookup::LookupArgs),

    /// Finish interrupted transitions of an animal
    Repair(commands::repair::RepairArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

impl Commands {
    /// Execute the selected command and return its exit code
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        match self {
            Commands::ListActive(args) => args.execute(config_path).await,
            Commands::ListHistory(args) => args.execute(config_path).await,
            Commands::Transition(args) => args.execute(config_path).await,
            Commands::UpdateRecord(args) => args.execute(config_path).await,
            Commands::Lookup(args) => args.execute(config_path).await,
            Commands::Repair(args) => args.execute(config_path).await,
            Commands::ValidateConfig(args) => args.execute(config_path).await,
            Commands::Init(args) => args.execute().await,
        }
    }
}
