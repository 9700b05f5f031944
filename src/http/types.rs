// Gateway invocation envelope, shared by `POST /invoke` and the `ingest_event` binary

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::snapshot::{IngestError, IngestRequest, IngestResponse, RequestBody};

/// What a gateway forwards: the body is either raw text or an already-parsed structure.
#[derive(Debug, Deserialize)]
pub struct InvocationEnvelope {
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

impl From<InvocationEnvelope> for IngestRequest {
    fn from(envelope: InvocationEnvelope) -> Self {
        let body = match envelope.body {
            None => None,
            Some(Value::String(text)) => Some(RequestBody::Raw(text)),
            Some(value) => Some(RequestBody::Parsed(value)),
        };

        let headers = envelope
            .headers
            .unwrap_or_default()
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();

        IngestRequest { body, headers }
    }
}

/// An empty envelope is a missing body; one that does not decode is malformed.
pub fn parse_envelope(raw: &str) -> Result<IngestRequest, IngestError> {
    if raw.trim().is_empty() {
        return Err(IngestError::MissingBody);
    }

    serde_json::from_str::<InvocationEnvelope>(raw)
        .map(IngestRequest::from)
        .map_err(|_| IngestError::MalformedJson)
}

/// Gateway-style response: status code plus the JSON body as a string.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl From<IngestResponse> for InvocationResponse {
    fn from(response: IngestResponse) -> Self {
        Self {
            status_code: response.status.as_u16(),
            headers: HashMap::from([("content-type".to_string(), "application/json".to_string())]),
            body: response.body.to_string(),
        }
    }
}
