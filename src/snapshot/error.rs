// Error taxonomy for snapshot ingestion

use axum::http::StatusCode;
use serde_json::{Value, json};
use thiserror::Error;

use crate::db::error::StoreError;

/// Returned to callers in place of the underlying store error.
pub const PERSISTENCE_FAILURE_DETAILS: &str = "failed to persist snapshot";

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("missing body")]
    MissingBody,

    #[error("invalid JSON body")]
    MalformedJson,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("{0} must be a valid number")]
    InvalidNumber(&'static str),

    #[error("database_error")]
    Persistence(#[source] StoreError),
}

impl IngestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IngestError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Response body. Client errors echo their message; store errors stay generic.
    pub fn body(&self) -> Value {
        match self {
            IngestError::Persistence(_) => json!({
                "error": "database_error",
                "details": PERSISTENCE_FAILURE_DETAILS,
            }),
            client_error => json!({ "error": client_error.to_string() }),
        }
    }
}
