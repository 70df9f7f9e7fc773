//! Transport-neutral view of the stage API
//!
//! The reconciliation store and the CLI talk to a [`StageBackend`]. [`StageApi`]
//! implements it in-process; [`HttpStageClient`](super::HttpStageClient) implements it
//! over HTTP.

use crate::core::api::{ListActiveRequest, ListHistoryRequest, StageApi, TransitionRequest};
use crate::core::repository::Page;
use crate::domain::{AnimalProfile, MedicalEvent, Result, StageHistoryEntry, StageRecord};
use async_trait::async_trait;

#[async_trait]
pub trait StageBackend: Send + Sync {
    async fn fetch_active(&self, request: &ListActiveRequest) -> Result<Page>;

    async fn fetch_history(&self, request: &ListHistoryRequest) -> Result<Page>;

    /// Submits a transition and returns the destination record
    async fn submit_transition(&self, request: &TransitionRequest) -> Result<StageRecord>;

    async fn fetch_profile(&self, animal_id: &str) -> Result<AnimalProfile>;

    async fn fetch_medical_history(&self, animal_id: &str) -> Result<Vec<MedicalEvent>>;

    async fn fetch_stage_history(&self, animal_id: &str) -> Result<Vec<StageHistoryEntry>>;
}

#[async_trait]
impl StageBackend for StageApi {
    async fn fetch_active(&self, request: &ListActiveRequest) -> Result<Page> {
        self.active_page(request).await
    }

    async fn fetch_history(&self, request: &ListHistoryRequest) -> Result<Page> {
        self.history_page(request).await
    }

    async fn submit_transition(&self, request: &TransitionRequest) -> Result<StageRecord> {
        self.run_transition(request).await
    }

    async fn fetch_profile(&self, animal_id: &str) -> Result<AnimalProfile> {
        self.lookup().get_profile(animal_id).await
    }

    async fn fetch_medical_history(&self, animal_id: &str) -> Result<Vec<MedicalEvent>> {
        self.lookup().get_medical_history(animal_id).await
    }

    async fn fetch_stage_history(&self, animal_id: &str) -> Result<Vec<StageHistoryEntry>> {
        self.lookup().get_stage_history(animal_id).await
    }
}
