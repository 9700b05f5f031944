pub mod coercion;
pub mod error;
pub mod ingest;

pub use error::IngestError;
pub use ingest::{IngestRequest, IngestResponse, RequestBody, ingest_snapshot};
