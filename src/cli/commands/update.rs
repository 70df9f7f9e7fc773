//! `update-record` command

use super::{emit, load, open_api, EXIT_CONFIG};
use crate::core::api::UpdateRecordRequest;
use crate::domain::StageRecordPatch;
use clap::Args;

/// Arguments for the update-record command
#[derive(Args, Debug)]
pub struct UpdateRecordArgs {
    /// Animal identifier
    #[arg(long)]
    pub animal_id: String,

    /// Active stage record to update
    #[arg(long)]
    pub record_id: String,

    /// New weight
    #[arg(long)]
    pub weight: Option<f64>,

    /// New notes
    #[arg(long)]
    pub notes: Option<String>,

    /// New breed
    #[arg(long)]
    pub breed: Option<String>,

    /// Stage-specific attributes as a JSON object; `null` removes an attribute
    #[arg(long)]
    pub attributes: Option<String>,
}

impl UpdateRecordArgs {
    /// Builds the patch from the flags
    pub fn patch(&self) -> anyhow::Result<StageRecordPatch> {
        let attributes = match self.attributes {
            Some(ref raw) => serde_json::from_str(raw)
                .map_err(|e| anyhow::anyhow!("--attributes must be a JSON object: {e}"))?,
            None => Default::default(),
        };
        Ok(StageRecordPatch {
            breed: self.breed.clone(),
            weight: self.weight,
            notes: self.notes.clone(),
            attributes,
        })
    }

    /// Execute the update-record command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(
            animal_id = %self.animal_id,
            record_id = %self.record_id,
            "Updating stage record"
        );

        let patch = match self.patch() {
            Ok(p) => p,
            Err(e) => {
                eprintln!("❌ {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let config = match load(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };
        let api = match open_api(&config).await {
            Ok(a) => a,
            Err(code) => return Ok(code),
        };

        let response = api
            .update_record(&UpdateRecordRequest {
                animal_id: self.animal_id.clone(),
                record_id: self.record_id.clone(),
                patch,
            })
            .await;
        emit(&response, response.success)
    }
}
