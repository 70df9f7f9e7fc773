//! `list-active` and `list-history` commands

use super::{emit, load, open_backend};
use crate::core::api::{ListActiveRequest, ListHistoryRequest, ListResponse};
use crate::domain::Stage;
use clap::Args;

/// Arguments for the list-active command
#[derive(Args, Debug)]
pub struct ListActiveArgs {
    /// Farm identifier
    #[arg(long)]
    pub farm_id: String,

    /// Stage to list (breeding, gestation, farrowing, nursery, fattening, dried, inHouse)
    #[arg(long)]
    pub stage: Stage,

    /// Cursor returned as `lastEvaluatedKey` by the previous page
    #[arg(long)]
    pub cursor: Option<String>,

    /// Page size
    #[arg(long)]
    pub limit: Option<usize>,

    /// Query the configured remote API instead of the store
    #[arg(long)]
    pub remote: bool,
}

impl ListActiveArgs {
    pub fn request(&self) -> ListActiveRequest {
        ListActiveRequest {
            farm_id: self.farm_id.clone(),
            stage: self.stage,
            cursor: self.cursor.clone(),
            limit: self.limit,
        }
    }

    /// Execute the list-active command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(farm_id = %self.farm_id, stage = %self.stage, "Listing active records");

        let config = match load(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };
        let backend = match open_backend(&config, self.remote).await {
            Ok(b) => b,
            Err(code) => return Ok(code),
        };

        let response = ListResponse::from_result(backend.fetch_active(&self.request()).await);
        emit(&response, response.success)
    }
}

/// Arguments for the list-history command
#[derive(Args, Debug)]
pub struct ListHistoryArgs {
    /// Farm identifier
    #[arg(long)]
    pub farm_id: String,

    /// Stage to list
    #[arg(long)]
    pub stage: Stage,

    /// Year the records were closed in
    #[arg(long)]
    pub year: i32,

    /// Month the records were closed in (1-12)
    #[arg(long)]
    pub month: u32,

    /// Cursor returned as `lastEvaluatedKey` by the previous page
    #[arg(long)]
    pub cursor: Option<String>,

    /// Page size
    #[arg(long)]
    pub limit: Option<usize>,

    /// Query the configured remote API instead of the store
    #[arg(long)]
    pub remote: bool,
}

impl ListHistoryArgs {
    pub fn request(&self) -> ListHistoryRequest {
        ListHistoryRequest {
            farm_id: self.farm_id.clone(),
            stage: self.stage,
            year: self.year,
            month: self.month,
            cursor: self.cursor.clone(),
            limit: self.limit,
        }
    }

    /// Execute the list-history command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(
            farm_id = %self.farm_id,
            stage = %self.stage,
            year = self.year,
            month = self.month,
            "Listing stage history"
        );

        let config = match load(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };
        let backend = match open_backend(&config, self.remote).await {
            Ok(b) => b,
            Err(code) => return Ok(code),
        };

        let response = ListResponse::from_result(backend.fetch_history(&self.request()).await);
        emit(&response, response.success)
    }
}
