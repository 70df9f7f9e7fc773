//! `transition` command

use super::{emit, load, open_backend};
use crate::core::api::{ApiResponse, TransitionRequest};
use crate::domain::Stage;
use clap::Args;

/// Arguments for the transition command
#[derive(Args, Debug)]
pub struct TransitionArgs {
    /// Active record the animal leaves
    #[arg(long)]
    pub source_record_id: String,

    /// Animal identifier
    #[arg(long)]
    pub animal_id: String,

    /// Farm the source record belongs to
    #[arg(long)]
    pub farm_id: String,

    /// Stage the animal moves to
    #[arg(long)]
    pub target_stage: Stage,

    /// Submit through the configured remote API instead of the store
    #[arg(long)]
    pub remote: bool,
}

impl TransitionArgs {
    /// Execute the transition command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(
            source_record_id = %self.source_record_id,
            animal_id = %self.animal_id,
            target_stage = %self.target_stage,
            "Submitting stage transition"
        );

        let config = match load(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };
        let backend = match open_backend(&config, self.remote).await {
            Ok(b) => b,
            Err(code) => return Ok(code),
        };

        let request = TransitionRequest {
            source_record_id: self.source_record_id.clone(),
            animal_id: self.animal_id.clone(),
            farm_id: self.farm_id.clone(),
            target_stage: self.target_stage,
        };
        let response = ApiResponse::from_result(backend.submit_transition(&request).await);
        emit(&response, response.success)
    }
}
