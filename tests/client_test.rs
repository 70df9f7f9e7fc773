//! Integration tests for the HTTP client and the reconciliation store
//!
//! These tests verify that:
//! - Requests go to the documented paths with the session's bearer token
//! - Failure envelopes come back with their original error kind
//! - Missing or expired tokens fail before anything is sent

use chrono::{Duration, TimeZone, Utc};
use mockito::Matcher;
use serde_json::json;
use sowtrack::client::{
    BearerToken, HttpStageClient, ReconciliationStore, SessionProvider, StageBackend,
    StaticSession,
};
use sowtrack::config::ApiConfig;
use sowtrack::core::api::{ApiResponse, ListActiveRequest, ListResponse, TransitionRequest};
use sowtrack::domain::{AnimalId, ErrorKind, FarmId, RecordId, Stage, StageRecord};
use std::sync::Arc;

fn config(base_url: &str) -> ApiConfig {
    ApiConfig {
        base_url: base_url.to_string(),
        timeout_seconds: 5,
        token: None,
    }
}

fn client_with(base_url: &str, session: impl SessionProvider + 'static) -> HttpStageClient {
    HttpStageClient::new(&config(base_url), Arc::new(session)).unwrap()
}

fn signed_in(base_url: &str) -> HttpStageClient {
    client_with(base_url, StaticSession::new(BearerToken::new("tok")))
}

fn record(id: &str, stage: Stage, source: Option<&str>) -> StageRecord {
    let mut record = StageRecord::builder()
        .record_id(RecordId::new(id).unwrap())
        .animal_id(AnimalId::new("P1").unwrap())
        .farm_id(FarmId::new("F1").unwrap())
        .stage(stage)
        .entry_date(Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap())
        .build()
        .unwrap();
    record.source_record_id = source.map(|s| RecordId::new(s).unwrap());
    record
}

#[tokio::test]
async fn test_list_active_sends_token_and_query() {
    let mut server = mockito::Server::new_async().await;
    let page = ListResponse {
        success: true,
        data: vec![record("G1", Stage::Gestation, Some("B1"))],
        last_evaluated_key: Some("next".to_string()),
        has_more: true,
        month: None,
        message: None,
        error: None,
    };
    let mock = server
        .mock("GET", "/v1/farms/F1/stages/gestation/active")
        .match_header("authorization", "Bearer tok")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("limit".to_string(), "2".to_string()),
            Matcher::UrlEncoded("cursor".to_string(), "abc".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(serde_json::to_string(&page).unwrap())
        .create_async()
        .await;

    let client = signed_in(&format!("{}/v1", server.url()));
    let result = client
        .fetch_active(&ListActiveRequest {
            farm_id: "F1".to_string(),
            stage: Stage::Gestation,
            cursor: Some("abc".to_string()),
            limit: Some(2),
        })
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(result.items.len(), 1);
    assert!(result.has_more);
    assert_eq!(result.next_cursor.as_deref(), Some("next"));
}

#[tokio::test]
async fn test_failure_envelope_keeps_error_kind() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/transitions")
        .match_body(Matcher::PartialJson(json!({
            "sourceRecordId": "B1",
            "targetStage": "gestation"
        })))
        .with_status(409)
        .with_body(
            json!({
                "success": false,
                "data": "Stale transition: record B1 is no longer active",
                "error": "StaleTransition"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let err = signed_in(&server.url())
        .submit_transition(&TransitionRequest {
            source_record_id: "B1".to_string(),
            animal_id: "P1".to_string(),
            farm_id: "F1".to_string(),
            target_stage: Stage::Gestation,
        })
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert_eq!(err.kind(), ErrorKind::StaleTransition);
    assert!(err.to_string().contains("no longer active"));
}

#[tokio::test]
async fn test_no_session_sends_nothing() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let err = client_with(&server.url(), StaticSession::anonymous())
        .fetch_profile("P1")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_expired_token_sends_nothing() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let expired = BearerToken::new("tok").with_expiry(Utc::now() - Duration::minutes(5));
    let err = client_with(&server.url(), StaticSession::new(expired))
        .fetch_stage_history("P1")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rejected_token_is_unauthenticated() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/animals/P1/profile")
        .with_status(401)
        .with_body("Unauthorized")
        .create_async()
        .await;

    let err = signed_in(&server.url())
        .fetch_profile("P1")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
}

#[tokio::test]
async fn test_lookup_not_found() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/animals/P404/medical-history")
        .with_status(404)
        .with_body(
            json!({
                "status": 404,
                "success": false,
                "data": "Not found: medical history for animal P404",
                "error": "NotFound"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let err = signed_in(&server.url())
        .fetch_medical_history("P404")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_blank_animal_id_never_sent() {
    let err = signed_in("http://127.0.0.1:9")
        .fetch_profile("  ")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingIdentifier);
}

#[tokio::test]
async fn test_unreachable_api_is_storage_unavailable() {
    let err = signed_in("http://127.0.0.1:9")
        .fetch_profile("P1")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
}

#[tokio::test]
async fn test_advance_through_http_updates_cache() {
    let mut server = mockito::Server::new_async().await;
    let breeding = record("B1", Stage::Breeding, None);
    let gestation = record("G1", Stage::Gestation, Some("B1"));
    server
        .mock("POST", "/transitions")
        .with_status(200)
        .with_body(serde_json::to_string(&ApiResponse::ok(gestation.clone())).unwrap())
        .create_async()
        .await;

    let client = signed_in(&server.url());
    let mut cache = ReconciliationStore::new();
    cache.reconcile_active(Stage::Breeding, vec![breeding.clone()]);

    let result = cache
        .advance(
            &client,
            &TransitionRequest {
                source_record_id: "B1".to_string(),
                animal_id: "P1".to_string(),
                farm_id: "F1".to_string(),
                target_stage: Stage::Gestation,
            },
        )
        .await
        .unwrap();

    assert_eq!(result, gestation);
    assert!(cache.active(Stage::Breeding).is_empty());
    assert_eq!(cache.active(Stage::Gestation), &[gestation]);
    assert_eq!(cache.history(Stage::Breeding)[0].record_id, breeding.record_id);
    assert!(cache.in_flight().is_none());
}
