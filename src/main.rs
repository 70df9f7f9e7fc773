// Sowtrack - Livestock stage tracking
// Copyright (c) 2025 Sowtrack Contributors
// Licensed under the MIT License

use clap::Parser;
use sowtrack::cli::commands::EXIT_FATAL;
use sowtrack::cli::Cli;
use sowtrack::config::LoggingConfig;
use sowtrack::logging::init_logging;
use std::process;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Console-only logging for the CLI; stdout is reserved for envelopes
    let log_level = cli.log_level.as_deref().unwrap_or("warn");
    let logging_config = LoggingConfig {
        local_enabled: false,
        ..LoggingConfig::default()
    };
    let guard = match init_logging(log_level, &logging_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(EXIT_FATAL);
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Sowtrack - Livestock stage tracking"
    );

    let exit_code = match cli.command.execute(&cli.config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command execution failed");
            eprintln!("Error: {e}");
            EXIT_FATAL
        }
    };

    drop(guard);
    process::exit(exit_code);
}
