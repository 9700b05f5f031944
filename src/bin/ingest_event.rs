// Runs one invocation: envelope JSON on stdin, response envelope on stdout
use dotenvy::dotenv;
use eyre::WrapErr;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use portfolio_snapshot_ingest::config;
use portfolio_snapshot_ingest::db::store::RedisSnapshotStore;
use portfolio_snapshot_ingest::http::types::{InvocationResponse, parse_envelope};
use portfolio_snapshot_ingest::logging;
use portfolio_snapshot_ingest::snapshot::{IngestError, IngestResponse, ingest_snapshot};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();

    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }

    let cfg = config::Config::load()?;
    info!(mode = %cfg.mode, "Loaded configuration and initialized logging");

    let store = RedisSnapshotStore::new(&cfg).wrap_err("Failed to create Redis snapshot store")?;

    let mut raw = String::new();
    let response = match tokio::io::stdin().read_to_string(&mut raw).await {
        Ok(_) => match parse_envelope(&raw) {
            Ok(request) => ingest_snapshot(&store, request).await,
            Err(err) => {
                warn!(error = %err, "Rejected invocation envelope");
                IngestResponse::from_error(&err)
            }
        },
        Err(e) => {
            warn!(error = %e, "Failed to read invocation from stdin");
            IngestResponse::from_error(&IngestError::MalformedJson)
        }
    };

    let encoded = serde_json::to_string(&InvocationResponse::from(response))?;
    println!("{}", encoded);

    Ok(())
}
