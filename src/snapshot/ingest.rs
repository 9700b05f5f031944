use axum::http::StatusCode;
use chrono::Utc;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use tracing::{Span, debug, error, field, info, instrument, warn};

use super::coercion::{Coerced, TimestampSource, coerce_number, resolve_timestamp, round_cents};
use super::error::IngestError;
use crate::db::models::portfolio_snapshots::{NewPortfolioSnapshotModel, PortfolioSnapshotModel};
use crate::db::store::SnapshotStore;

pub const TOTAL_INVESTED: &str = "total_invested";
pub const TOTAL_VALUE: &str = "total_value";
pub const TIMESTAMP: &str = "timestamp";

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Body as handed over by the transport: raw text, or a structure a gateway already parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Raw(String),
    Parsed(Value),
}

#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub body: Option<RequestBody>,
    pub headers: HashMap<String, String>, // lowercase names
}

impl IngestRequest {
    pub fn request_id(&self) -> Option<&str> {
        self.headers.get(REQUEST_ID_HEADER).map(String::as_str)
    }
}

/// Transport-neutral response: HTTP status plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl IngestResponse {
    pub fn success(record: &PortfolioSnapshotModel) -> Self {
        Self {
            status: StatusCode::OK,
            body: json!({ "message": "success", "item": record }),
        }
    }

    pub fn from_error(err: &IngestError) -> Self {
        Self {
            status: err.status_code(),
            body: err.body(),
        }
    }
}

/// Validate the request and upsert the snapshot. Never fails: every outcome is a response.
#[instrument(name = "ingest_snapshot", skip_all, fields(on_close = true, request_id = field::Empty))]
pub async fn ingest_snapshot(store: &dyn SnapshotStore, request: IngestRequest) -> IngestResponse {
    if let Some(request_id) = request.request_id() {
        Span::current().record("request_id", request_id);
    }

    match process(store, request).await {
        Ok(record) => {
            info!(
                timestamp = record.timestamp,
                total_invested = %record.total_invested,
                total_value = %record.total_value,
                "Snapshot persisted"
            );
            IngestResponse::success(&record)
        }
        Err(IngestError::Persistence(source)) => {
            error!(error = %source, "Failed to persist snapshot");
            IngestResponse::from_error(&IngestError::Persistence(source))
        }
        Err(err) => {
            warn!(error = %err, "Rejected snapshot request");
            IngestResponse::from_error(&err)
        }
    }
}

async fn process(store: &dyn SnapshotStore, request: IngestRequest) -> Result<PortfolioSnapshotModel, IngestError> {
    let payload = parse_body(request.body)?;
    let snapshot = validate_payload(&payload, Utc::now().timestamp())?;

    store
        .upsert_snapshot(&snapshot)
        .await
        .map_err(IngestError::Persistence)
}

/// Steps 1-2: the body must be present and decode to a JSON object.
pub fn parse_body(body: Option<RequestBody>) -> Result<Map<String, Value>, IngestError> {
    let value = match body {
        None | Some(RequestBody::Parsed(Value::Null)) => return Err(IngestError::MissingBody),
        Some(RequestBody::Raw(text)) if text.is_empty() => return Err(IngestError::MissingBody),
        Some(RequestBody::Raw(text)) => serde_json::from_str::<Value>(&text).map_err(|e| {
            debug!(error = %e, "Request body is not valid JSON");
            IngestError::MalformedJson
        })?,
        Some(RequestBody::Parsed(value)) => value,
    };

    match value {
        Value::Object(payload) => Ok(payload),
        _ => Err(IngestError::MalformedJson),
    }
}

/// Steps 3-6: presence, coercion, rounding, timestamp resolution. Only the first failure is reported.
pub fn validate_payload(payload: &Map<String, Value>, now: i64) -> Result<NewPortfolioSnapshotModel, IngestError> {
    let invested_raw = required_field(payload, TOTAL_INVESTED)?;
    let value_raw = required_field(payload, TOTAL_VALUE)?;

    let total_invested = cents_field(invested_raw, TOTAL_INVESTED)?;
    let total_value = cents_field(value_raw, TOTAL_VALUE)?;

    let (timestamp, source) = resolve_timestamp(payload.get(TIMESTAMP), now);
    if source == TimestampSource::Fallback {
        let supplied = payload.get(TIMESTAMP).map(ToString::to_string).unwrap_or_default();
        warn!(
            supplied = %supplied,
            fallback = timestamp,
            "Unusable timestamp, using current time"
        );
    }

    Ok(NewPortfolioSnapshotModel {
        timestamp,
        total_invested,
        total_value,
    })
}

fn required_field<'a>(payload: &'a Map<String, Value>, name: &'static str) -> Result<&'a Value, IngestError> {
    payload
        .get(name)
        .filter(|value| !value.is_null())
        .ok_or(IngestError::MissingField(name))
}

fn cents_field(value: &Value, name: &'static str) -> Result<rust_decimal::Decimal, IngestError> {
    match coerce_number(Some(value)) {
        Coerced::Valid(amount) => Ok(round_cents(amount)),
        Coerced::Absent | Coerced::Invalid => Err(IngestError::InvalidNumber(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::MemorySnapshotStore;
    use rust_decimal::{Decimal, dec};

    fn raw(text: &str) -> IngestRequest {
        IngestRequest {
            body: Some(RequestBody::Raw(text.to_string())),
            ..Default::default()
        }
    }

    fn parsed(value: Value) -> IngestRequest {
        IngestRequest {
            body: Some(RequestBody::Parsed(value)),
            ..Default::default()
        }
    }

    async fn assert_rejected(store: &MemorySnapshotStore, request: IngestRequest, message: &str) {
        let response = ingest_snapshot(store, request).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body, json!({ "error": message }));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_body() {
        let store = MemorySnapshotStore::new();

        assert_rejected(&store, IngestRequest::default(), "missing body").await;
        assert_rejected(&store, raw(""), "missing body").await;
        assert_rejected(&store, parsed(Value::Null), "missing body").await;
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let store = MemorySnapshotStore::new();

        assert_rejected(&store, raw("{not json"), "invalid JSON body").await;
        assert_rejected(&store, raw("[1, 2]"), "invalid JSON body").await;
        assert_rejected(&store, parsed(json!("just a string")), "invalid JSON body").await;
    }

    #[tokio::test]
    async fn test_missing_fields_reported_in_order() {
        let store = MemorySnapshotStore::new();

        assert_rejected(&store, raw("{}"), "missing required field: total_invested").await;
        assert_rejected(
            &store,
            parsed(json!({ "total_invested": null, "total_value": 5 })),
            "missing required field: total_invested",
        )
        .await;
        assert_rejected(
            &store,
            parsed(json!({ "total_invested": 5 })),
            "missing required field: total_value",
        )
        .await;
        assert_rejected(
            &store,
            parsed(json!({ "total_invested": 5, "total_value": null })),
            "missing required field: total_value",
        )
        .await;
    }

    #[tokio::test]
    async fn test_presence_checked_before_coercion() {
        let store = MemorySnapshotStore::new();

        // total_invested is invalid but total_value is missing: presence wins
        assert_rejected(
            &store,
            parsed(json!({ "total_invested": "abc" })),
            "missing required field: total_value",
        )
        .await;
    }

    #[tokio::test]
    async fn test_invalid_numbers_reported_in_order() {
        let store = MemorySnapshotStore::new();

        assert_rejected(
            &store,
            parsed(json!({ "total_invested": "abc", "total_value": "xyz" })),
            "total_invested must be a valid number",
        )
        .await;
        assert_rejected(
            &store,
            parsed(json!({ "total_invested": "10", "total_value": "xyz" })),
            "total_value must be a valid number",
        )
        .await;
        assert_rejected(
            &store,
            parsed(json!({ "total_invested": true, "total_value": 1 })),
            "total_invested must be a valid number",
        )
        .await;
        assert_rejected(
            &store,
            parsed(json!({ "total_invested": 1, "total_value": "" })),
            "total_value must be a valid number",
        )
        .await;
    }

    #[tokio::test]
    async fn test_success_rounds_and_persists() {
        let store = MemorySnapshotStore::new();
        let body = json!({ "total_invested": 100.005, "total_value": "1000.5", "timestamp": 1_700_000_000 });

        let response = ingest_snapshot(&store, parsed(body)).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["message"], "success");
        assert_eq!(response.body["item"]["timestamp"], 1_700_000_000);
        assert_eq!(response.body["item"]["total_invested"].as_f64(), Some(100.01));
        assert_eq!(response.body["item"]["total_value"].as_f64(), Some(1000.5));

        let stored = store.get(1_700_000_000).await.unwrap();
        assert_eq!(stored.total_invested, dec!(100.01));
        assert_eq!(stored.total_value, dec!(1000.5));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_raw_and_parsed_bodies_agree() {
        let store = MemorySnapshotStore::new();

        let from_raw = ingest_snapshot(
            &store,
            raw(r#"{"total_invested": "100.005", "total_value": 2.675, "timestamp": 10}"#),
        )
        .await;
        let from_parsed = ingest_snapshot(
            &store,
            parsed(json!({ "total_invested": 100.005, "total_value": "2.675", "timestamp": "10" })),
        )
        .await;

        assert_eq!(from_raw, from_parsed);
        assert_eq!(store.get(10).await.unwrap().total_value, dec!(2.68));
    }

    #[tokio::test]
    async fn test_same_timestamp_overwrites() {
        let store = MemorySnapshotStore::new();

        ingest_snapshot(&store, parsed(json!({ "total_invested": 1, "total_value": 2, "timestamp": 42 }))).await;
        let second =
            ingest_snapshot(&store, parsed(json!({ "total_invested": 3, "total_value": 4, "timestamp": 42 }))).await;

        assert_eq!(second.status, StatusCode::OK);
        assert_eq!(store.len().await, 1);
        let stored = store.get(42).await.unwrap();
        assert_eq!(stored.total_invested, dec!(3));
        assert_eq!(stored.total_value, dec!(4));
    }

    #[tokio::test]
    async fn test_omitted_timestamp_uses_current_time() {
        let store = MemorySnapshotStore::new();
        let before = Utc::now().timestamp();

        let response = ingest_snapshot(&store, parsed(json!({ "total_invested": 1, "total_value": 2 }))).await;

        let timestamp = response.body["item"]["timestamp"].as_i64().unwrap();
        assert!((timestamp - before).abs() <= 5, "timestamp {} too far from {}", timestamp, before);
    }

    #[tokio::test]
    async fn test_invalid_timestamp_falls_back_to_current_time() {
        let store = MemorySnapshotStore::new();
        let before = Utc::now().timestamp();

        let response = ingest_snapshot(
            &store,
            parsed(json!({ "total_invested": 1, "total_value": 2, "timestamp": "not-a-date" })),
        )
        .await;

        assert_eq!(response.status, StatusCode::OK);
        let timestamp = response.body["item"]["timestamp"].as_i64().unwrap();
        assert!((timestamp - before).abs() <= 5);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_tiny_numbers_persist_as_zero() {
        let store = MemorySnapshotStore::new();

        let from_number =
            ingest_snapshot(&store, raw(r#"{"total_invested": 1e-30, "total_value": 1, "timestamp": 1e-30}"#)).await;
        let from_string = ingest_snapshot(
            &store,
            raw(r#"{"total_invested": "1e-30", "total_value": 1, "timestamp": "1e-30"}"#),
        )
        .await;

        assert_eq!(from_number.status, StatusCode::OK);
        assert_eq!(from_number, from_string);
        assert_eq!(from_number.body["item"]["timestamp"], 0);
        let stored = store.get(0).await.unwrap();
        assert_eq!(stored.total_invested, Decimal::ZERO);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_store_failure_then_recovery() {
        let store = MemorySnapshotStore::new();
        store.set_failing(true);
        let body = json!({ "total_invested": 1, "total_value": 2, "timestamp": 7 });

        let failed = ingest_snapshot(&store, parsed(body.clone())).await;
        assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failed.body["error"], "database_error");
        assert!(failed.body["details"].is_string());
        assert!(!failed.body.to_string().contains("simulated"));

        store.set_failing(false);
        let recovered = ingest_snapshot(&store, parsed(body)).await;
        assert_eq!(recovered.status, StatusCode::OK);
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn test_validate_payload_extra_fields_ignored() {
        let payload = json!({ "total_invested": "5", "total_value": 6, "note": "ignored", "timestamp": 99 });
        let snapshot = validate_payload(payload.as_object().unwrap(), 0).unwrap();

        assert_eq!(
            snapshot,
            NewPortfolioSnapshotModel {
                timestamp: 99,
                total_invested: dec!(5),
                total_value: dec!(6),
            }
        );
    }
}
