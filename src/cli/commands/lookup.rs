//! `lookup` command

use super::{emit, load, open_backend};
use crate::core::api::LookupResponse;
use clap::{Args, ValueEnum};

/// What to look up
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LookupKind {
    /// Animal profile
    Profile,
    /// Medical history, oldest first
    Medical,
    /// Stage history, oldest first
    Stages,
}

/// Arguments for the lookup command
#[derive(Args, Debug)]
pub struct LookupArgs {
    /// What to look up
    #[arg(value_enum)]
    pub kind: LookupKind,

    /// Animal identifier
    pub animal_id: String,

    /// Query the configured remote API instead of the store
    #[arg(long)]
    pub remote: bool,
}

impl LookupArgs {
    /// Execute the lookup command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(kind = ?self.kind, animal_id = %self.animal_id, "Looking up animal");

        let config = match load(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };
        let backend = match open_backend(&config, self.remote).await {
            Ok(b) => b,
            Err(code) => return Ok(code),
        };

        let animal_id = self.animal_id.as_str();
        match self.kind {
            LookupKind::Profile => {
                let response = LookupResponse::from_result(backend.fetch_profile(animal_id).await);
                emit(&response, response.success)
            }
            LookupKind::Medical => {
                let response =
                    LookupResponse::from_result(backend.fetch_medical_history(animal_id).await);
                emit(&response, response.success)
            }
            LookupKind::Stages => {
                let response =
                    LookupResponse::from_result(backend.fetch_stage_history(animal_id).await);
                emit(&response, response.success)
            }
        }
    }
}
