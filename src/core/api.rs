//! Uniform request/response facade
//!
//! Every operation returns an envelope instead of a `Result`: failures are values
//! with `success = false`, a human-readable message and the [`ErrorKind`]. The wire
//! shapes are camelCase JSON and are shared by the HTTP client.

use crate::adapters::database::ItemStore;
use crate::config::PaginationConfig;
use crate::core::lookup::LookupGateway;
use crate::core::repository::{Page, StageRepository};
use crate::core::transition::{RepairReport, TransitionEngine};
use crate::domain::{
    AnimalId, AnimalProfile, ErrorKind, FarmId, MedicalEvent, RecordId, Result, SowtrackError,
    Stage, StageHistoryEntry, StageRecord, StageRecordPatch,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Successful payload or error message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload<T> {
    Ok(T),
    Err(String),
}

/// `{success, data, error?}` envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Payload<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Payload::Ok(data),
            error: None,
        }
    }

    pub fn failure(error: &SowtrackError) -> Self {
        Self {
            success: false,
            data: Payload::Err(error.to_string()),
            error: Some(error.kind()),
        }
    }

    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failure(&e),
        }
    }

    /// Converts a received envelope back into a `Result`
    pub fn into_result(self) -> Result<T> {
        let kind = self.error.unwrap_or(ErrorKind::Internal);
        match (self.success, self.data) {
            (true, Payload::Ok(data)) => Ok(data),
            (_, Payload::Err(message)) => Err(SowtrackError::Remote { kind, message }),
            (false, Payload::Ok(_)) => Err(SowtrackError::Remote {
                kind,
                message: "request failed without a message".to_string(),
            }),
        }
    }
}

/// Listing envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub success: bool,
    pub data: Vec<StageRecord>,
    /// Cursor for the next page; present if and only if `has_more`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_evaluated_key: Option<String>,
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl ListResponse {
    pub fn from_result(result: Result<Page>) -> Self {
        match result {
            Ok(page) => Self {
                success: true,
                data: page.items,
                last_evaluated_key: page.next_cursor,
                has_more: page.has_more,
                month: page.month,
                message: None,
                error: None,
            },
            Err(e) => Self {
                success: false,
                data: Vec::new(),
                last_evaluated_key: None,
                has_more: false,
                month: None,
                message: Some(e.to_string()),
                error: Some(e.kind()),
            },
        }
    }

    pub fn into_page(self) -> Result<Page> {
        if self.success {
            Ok(Page {
                items: self.data,
                next_cursor: self.last_evaluated_key,
                has_more: self.has_more,
                month: self.month,
            })
        } else {
            Err(SowtrackError::Remote {
                kind: self.error.unwrap_or(ErrorKind::Internal),
                message: self
                    .message
                    .unwrap_or_else(|| "listing failed without a message".to_string()),
            })
        }
    }
}

/// Lookup envelope carrying an HTTP-style status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResponse<T> {
    pub status: u16,
    pub success: bool,
    pub data: Payload<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl<T> LookupResponse<T> {
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self {
                status: 200,
                success: true,
                data: Payload::Ok(data),
                error: None,
            },
            Err(e) => Self {
                status: e.kind().http_status(),
                success: false,
                data: Payload::Err(e.to_string()),
                error: Some(e.kind()),
            },
        }
    }

    pub fn into_result(self) -> Result<T> {
        ApiResponse {
            success: self.success,
            data: self.data,
            error: self.error,
        }
        .into_result()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListActiveRequest {
    pub farm_id: String,
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListHistoryRequest {
    pub farm_id: String,
    pub stage: Stage,
    pub year: i32,
    pub month: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub source_record_id: String,
    pub animal_id: String,
    pub farm_id: String,
    pub target_stage: Stage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecordRequest {
    pub animal_id: String,
    pub record_id: String,
    pub patch: StageRecordPatch,
}

/// The public operation surface over one item store
#[derive(Clone)]
pub struct StageApi {
    repository: StageRepository,
    engine: TransitionEngine,
    lookup: LookupGateway,
}

impl StageApi {
    pub fn new(store: Arc<dyn ItemStore + Send + Sync>, pagination: PaginationConfig) -> Self {
        Self {
            repository: StageRepository::new(store.clone(), pagination),
            engine: TransitionEngine::new(store.clone()),
            lookup: LookupGateway::new(store),
        }
    }

    pub fn repository(&self) -> &StageRepository {
        &self.repository
    }

    pub fn engine(&self) -> &TransitionEngine {
        &self.engine
    }

    pub fn lookup(&self) -> &LookupGateway {
        &self.lookup
    }

    pub async fn list_active(&self, request: &ListActiveRequest) -> ListResponse {
        ListResponse::from_result(report(self.active_page(request).await, "list active"))
    }

    pub async fn list_history(&self, request: &ListHistoryRequest) -> ListResponse {
        ListResponse::from_result(report(self.history_page(request).await, "list history"))
    }

    pub async fn transition(&self, request: &TransitionRequest) -> ApiResponse<StageRecord> {
        ApiResponse::from_result(report(self.run_transition(request).await, "transition"))
    }

    pub async fn update_record(&self, request: &UpdateRecordRequest) -> ApiResponse<StageRecord> {
        let result = async {
            let animal_id = require::<AnimalId>(&request.animal_id, "animalId")?;
            let record_id = require::<RecordId>(&request.record_id, "recordId")?;
            self.engine
                .update_stage_record(&animal_id, &record_id, &request.patch)
                .await
        }
        .await;
        ApiResponse::from_result(report(result, "update stage record"))
    }

    pub async fn repair(&self, animal_id: &str) -> ApiResponse<RepairReport> {
        let result = async {
            let animal_id = require::<AnimalId>(animal_id, "animalId")?;
            self.engine.repair(&animal_id).await
        }
        .await;
        ApiResponse::from_result(report(result, "repair"))
    }

    pub async fn get_profile(&self, animal_id: &str) -> LookupResponse<AnimalProfile> {
        LookupResponse::from_result(report(
            self.lookup.get_profile(animal_id).await,
            "get profile",
        ))
    }

    pub async fn get_medical_history(&self, animal_id: &str) -> LookupResponse<Vec<MedicalEvent>> {
        LookupResponse::from_result(report(
            self.lookup.get_medical_history(animal_id).await,
            "get medical history",
        ))
    }

    pub async fn get_stage_history(
        &self,
        animal_id: &str,
    ) -> LookupResponse<Vec<StageHistoryEntry>> {
        LookupResponse::from_result(report(
            self.lookup.get_stage_history(animal_id).await,
            "get stage history",
        ))
    }

    pub(crate) async fn active_page(&self, request: &ListActiveRequest) -> Result<Page> {
        let farm_id = require::<FarmId>(&request.farm_id, "farmId")?;
        self.repository
            .list_active(
                &farm_id,
                request.stage,
                request.cursor.as_deref(),
                request.limit,
            )
            .await
    }

    pub(crate) async fn history_page(&self, request: &ListHistoryRequest) -> Result<Page> {
        let farm_id = require::<FarmId>(&request.farm_id, "farmId")?;
        self.repository
            .list_history(
                &farm_id,
                request.stage,
                request.year,
                request.month,
                request.cursor.as_deref(),
                request.limit,
            )
            .await
    }

    pub(crate) async fn run_transition(&self, request: &TransitionRequest) -> Result<StageRecord> {
        let source = require::<RecordId>(&request.source_record_id, "sourceRecordId")?;
        let animal_id = require::<AnimalId>(&request.animal_id, "animalId")?;
        let farm_id = require::<FarmId>(&request.farm_id, "farmId")?;
        self.engine
            .transition(&source, &animal_id, &farm_id, request.target_stage)
            .await
    }
}

/// Parses a request identifier; blank means the caller left it out
fn require<T: std::str::FromStr>(raw: &str, field: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| SowtrackError::MissingIdentifier(format!("{field} is required")))
}

/// Logs a failed operation before it becomes an envelope
fn report<T>(result: Result<T>, operation: &str) -> Result<T> {
    if let Err(ref e) = result {
        match e.kind() {
            ErrorKind::StorageUnavailable | ErrorKind::Internal | ErrorKind::Serialization => {
                crate::log_error_with_context!(e, operation);
            }
            kind => {
                tracing::warn!(operation, error_kind = %kind, error = %e, "Request rejected");
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::domain::StageFields;
    use serde_json::json;

    async fn api_with_breeding() -> (StageApi, StageRecord) {
        let api = StageApi::new(Arc::new(MemoryStore::new()), PaginationConfig::default());
        let record = api
            .engine()
            .open_initial_record(
                &AnimalId::new("P1").unwrap(),
                &FarmId::new("F1").unwrap(),
                Stage::Breeding,
                StageFields::default(),
            )
            .await
            .unwrap();
        (api, record)
    }

    #[tokio::test]
    async fn test_transition_failure_is_a_value() {
        let (api, breeding) = api_with_breeding().await;
        let response = api
            .transition(&TransitionRequest {
                source_record_id: breeding.record_id.to_string(),
                animal_id: "P1".to_string(),
                farm_id: "F1".to_string(),
                target_stage: Stage::Fattening,
            })
            .await;
        assert!(!response.success);
        assert_eq!(response.error, Some(ErrorKind::IllegalTransition));

        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["success"], json!(false));
        assert!(wire["data"].as_str().unwrap().contains("breeding"));
        assert_eq!(wire["error"], json!("IllegalTransition"));
    }

    #[tokio::test]
    async fn test_blank_request_field_is_missing_identifier() {
        let (api, _) = api_with_breeding().await;
        let response = api
            .transition(&TransitionRequest {
                source_record_id: " ".to_string(),
                animal_id: "P1".to_string(),
                farm_id: "F1".to_string(),
                target_stage: Stage::Gestation,
            })
            .await;
        assert_eq!(response.error, Some(ErrorKind::MissingIdentifier));
    }

    #[tokio::test]
    async fn test_list_response_wire_shape() {
        let (api, breeding) = api_with_breeding().await;
        let response = api
            .list_active(&ListActiveRequest {
                farm_id: "F1".to_string(),
                stage: Stage::Breeding,
                cursor: None,
                limit: None,
            })
            .await;
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["success"], json!(true));
        assert_eq!(wire["hasMore"], json!(false));
        assert!(wire.get("lastEvaluatedKey").is_none());
        assert_eq!(wire["data"][0]["recordId"], json!(breeding.record_id.as_str()));
    }

    #[tokio::test]
    async fn test_list_failure_carries_message() {
        let (api, _) = api_with_breeding().await;
        let response = api
            .list_active(&ListActiveRequest {
                farm_id: "F1".to_string(),
                stage: Stage::Breeding,
                cursor: Some("garbage".to_string()),
                limit: None,
            })
            .await;
        assert!(!response.success);
        assert!(response.data.is_empty());
        assert_eq!(response.error, Some(ErrorKind::InvalidCursor));
        assert!(response.message.is_some());
    }

    #[tokio::test]
    async fn test_lookup_statuses() {
        let (api, _) = api_with_breeding().await;
        assert_eq!(api.get_profile("").await.status, 400);
        assert_eq!(api.get_profile("P404").await.status, 404);
        assert_eq!(api.get_profile("P#1").await.status, 400);
        assert_eq!(api.get_stage_history("P1").await.status, 200);
    }

    #[test]
    fn test_envelope_round_trip_into_result() {
        let wire = json!({
            "success": false,
            "data": "Stale transition: record B1 is no longer active",
            "error": "StaleTransition"
        });
        let envelope: ApiResponse<StageRecord> = serde_json::from_value(wire).unwrap();
        let err = envelope.into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StaleTransition);
    }
}
