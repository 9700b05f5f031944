// HTTP handlers for snapshot ingestion

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::post,
};
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::types::parse_envelope;
use crate::db::store::SnapshotStore;
use crate::snapshot::{IngestError, IngestRequest, IngestResponse, RequestBody, ingest_snapshot};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SnapshotStore>,
}

pub fn configure_routes(store: Arc<dyn SnapshotStore>) -> Router {
    Router::new()
        .route("/snapshots", post(create_snapshot))
        .route("/invoke", post(invoke))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { store })
}

impl IntoResponse for IngestResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// POST /snapshots - raw JSON body
pub async fn create_snapshot(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> IngestResponse {
    let body = if body.is_empty() {
        None
    } else {
        match String::from_utf8(body.to_vec()) {
            Ok(text) => Some(RequestBody::Raw(text)),
            Err(_) => {
                warn!("Rejected snapshot request with non UTF-8 body");
                return IngestResponse::from_error(&IngestError::MalformedJson);
            }
        }
    };

    let request = IngestRequest {
        body,
        headers: header_pairs(&headers),
    };

    ingest_snapshot(state.store.as_ref(), request).await
}

/// POST /invoke - gateway envelope carrying a raw or pre-parsed body
pub async fn invoke(State(state): State<AppState>, body: Bytes) -> IngestResponse {
    let request = std::str::from_utf8(&body)
        .map_err(|_| IngestError::MalformedJson)
        .and_then(parse_envelope);

    match request {
        Ok(request) => ingest_snapshot(state.store.as_ref(), request).await,
        Err(err) => {
            warn!(error = %err, "Rejected invocation envelope");
            IngestResponse::from_error(&err)
        }
    }
}

fn header_pairs(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}
