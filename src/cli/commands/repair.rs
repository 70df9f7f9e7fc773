//! `repair` command
//!
//! Finishes transitions that closed their source record but never created the
//! destination. Exits with 1 when orphans remain that need an operator.

use super::{emit, load, open_api, EXIT_FAILED};
use clap::Args;

/// Arguments for the repair command
#[derive(Args, Debug)]
pub struct RepairArgs {
    /// Animal whose stage records are checked
    pub animal_id: String,
}

impl RepairArgs {
    /// Execute the repair command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(animal_id = %self.animal_id, "Repairing interrupted transitions");

        let config = match load(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };
        let api = match open_api(&config).await {
            Ok(a) => a,
            Err(code) => return Ok(code),
        };

        let response = api.repair(&self.animal_id).await;
        let code = emit(&response, response.success)?;

        if let Ok(ref report) = response.into_result() {
            if !report.anomalies.is_empty() {
                eprintln!(
                    "⚠️  {} record(s) need manual attention",
                    report.anomalies.len()
                );
                return Ok(EXIT_FAILED);
            }
        }
        Ok(code)
    }
}
