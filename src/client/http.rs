//! HTTP implementation of [`StageBackend`]
//!
//! Paths are resolved against `api.base_url`:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | active listing | `GET /farms/{farmId}/stages/{stage}/active` |
//! | history listing | `GET /farms/{farmId}/stages/{stage}/history` |
//! | transition | `POST /transitions` |
//! | lookups | `GET /animals/{animalId}/profile`, `.../medical-history`, `.../stage-history` |
//!
//! Every request carries the session's bearer token. Responses are the same envelopes
//! [`StageApi`](crate::core::api::StageApi) produces, so a failure on the server comes
//! back with its original [`ErrorKind`](crate::domain::ErrorKind).

use super::backend::StageBackend;
use super::session::SessionProvider;
use crate::config::ApiConfig;
use crate::core::api::{
    ApiResponse, ListActiveRequest, ListHistoryRequest, ListResponse, LookupResponse,
    TransitionRequest,
};
use crate::core::repository::Page;
use crate::domain::{
    AnimalProfile, MedicalEvent, Result, SowtrackError, StageHistoryEntry, StageRecord,
    StoreError,
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, ClientBuilder, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Query string of the listing endpoints
#[derive(Debug, Default, Serialize)]
struct ListQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    month: Option<u32>,
}

/// Remote stage API client
///
/// # Example
///
/// ```no_run
/// use sowtrack::client::{HttpStageClient, StageBackend, StaticSession, BearerToken};
/// use sowtrack::config::ApiConfig;
/// use sowtrack::core::api::ListActiveRequest;
/// use sowtrack::domain::Stage;
/// use std::sync::Arc;
///
/// # async fn example() -> sowtrack::domain::Result<()> {
/// let config = ApiConfig {
///     base_url: "https://api.example.com/v1".to_string(),
///     timeout_seconds: 30,
///     token: None,
/// };
/// let session = Arc::new(StaticSession::new(BearerToken::new("token")));
/// let client = HttpStageClient::new(&config, session)?;
///
/// let page = client
///     .fetch_active(&ListActiveRequest {
///         farm_id: "F1".to_string(),
///         stage: Stage::Nursery,
///         cursor: None,
///         limit: None,
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct HttpStageClient {
    base_url: Url,
    client: Client,
    session: Arc<dyn SessionProvider>,
}

impl HttpStageClient {
    /// # Errors
    ///
    /// `Configuration` for an unusable base URL or if the HTTP client cannot be built
    pub fn new(config: &ApiConfig, session: Arc<dyn SessionProvider>) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            SowtrackError::Configuration(format!("invalid api.base_url '{}': {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SowtrackError::Configuration(format!(
                "api.base_url '{}' cannot carry a path",
                config.base_url
            )));
        }

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.timeout_seconds.min(30)))
            .build()
            .map_err(|e| {
                SowtrackError::Configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            base_url,
            client,
            session,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL with `segments` appended, each percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                SowtrackError::Configuration(format!(
                    "api.base_url '{}' cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn authorization(&self) -> Result<String> {
        self.session
            .bearer_token()
            .await?
            .ok_or_else(|| SowtrackError::Unauthenticated("no active session".to_string()))?
            .authorization(Utc::now())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        // Checked before anything goes over the wire
        let authorization = self.authorization().await?;

        let response = request
            .header(reqwest::header::AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        tracing::debug!(status = status.as_u16(), bytes = body.len(), "Stage API response");

        match serde_json::from_str::<T>(&body) {
            Ok(envelope) => Ok(envelope),
            Err(_) if status == StatusCode::UNAUTHORIZED => Err(SowtrackError::Unauthenticated(
                "the stage API rejected the bearer token".to_string(),
            )),
            Err(e) => Err(SowtrackError::StorageUnavailable(StoreError::QueryFailed(
                format!("unexpected response from stage API (status {status}): {e}"),
            ))),
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: Url, query: &ListQuery<'_>) -> Result<T> {
        tracing::debug!(url = %url, "GET");
        self.send(self.client.get(url).query(query)).await
    }

    async fn lookup<T: DeserializeOwned>(&self, animal_id: &str, resource: &str) -> Result<T> {
        let animal_id = animal_id.trim();
        if animal_id.is_empty() {
            return Err(SowtrackError::MissingIdentifier(
                "animalId is required".to_string(),
            ));
        }
        let url = self.endpoint(&["animals", animal_id, resource])?;
        let response: LookupResponse<T> = self.get(url, &ListQuery::default()).await?;
        response.into_result()
    }
}

fn transport_error(e: reqwest::Error) -> SowtrackError {
    let store_error = if e.is_timeout() {
        StoreError::Timeout(e.to_string())
    } else {
        StoreError::ConnectionFailed(e.to_string())
    };
    SowtrackError::StorageUnavailable(store_error)
}

#[async_trait]
impl StageBackend for HttpStageClient {
    async fn fetch_active(&self, request: &ListActiveRequest) -> Result<Page> {
        let url = self.endpoint(&[
            "farms",
            request.farm_id.as_str(),
            "stages",
            request.stage.as_str(),
            "active",
        ])?;
        let query = ListQuery {
            cursor: request.cursor.as_deref(),
            limit: request.limit,
            ..ListQuery::default()
        };
        let response: ListResponse = self.get(url, &query).await?;
        response.into_page()
    }

    async fn fetch_history(&self, request: &ListHistoryRequest) -> Result<Page> {
        let url = self.endpoint(&[
            "farms",
            request.farm_id.as_str(),
            "stages",
            request.stage.as_str(),
            "history",
        ])?;
        let query = ListQuery {
            cursor: request.cursor.as_deref(),
            limit: request.limit,
            year: Some(request.year),
            month: Some(request.month),
        };
        let response: ListResponse = self.get(url, &query).await?;
        response.into_page()
    }

    async fn submit_transition(&self, request: &TransitionRequest) -> Result<StageRecord> {
        let url = self.endpoint(&["transitions"])?;
        tracing::debug!(url = %url, source_record_id = %request.source_record_id, "POST");
        let response: ApiResponse<StageRecord> =
            self.send(self.client.post(url).json(request)).await?;
        response.into_result()
    }

    async fn fetch_profile(&self, animal_id: &str) -> Result<AnimalProfile> {
        self.lookup(animal_id, "profile").await
    }

    async fn fetch_medical_history(&self, animal_id: &str) -> Result<Vec<MedicalEvent>> {
        self.lookup(animal_id, "medical-history").await
    }

    async fn fetch_stage_history(&self, animal_id: &str) -> Result<Vec<StageHistoryEntry>> {
        self.lookup(animal_id, "stage-history").await
    }
}
