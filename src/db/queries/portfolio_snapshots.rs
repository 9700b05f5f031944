use redis::aio::MultiplexedConnection;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

use crate::db::error::StoreError;
use crate::db::models::portfolio_snapshots::{NewPortfolioSnapshotModel, PortfolioSnapshotModel};

const FIELD_TIMESTAMP: &str = "timestamp";
const FIELD_TOTAL_INVESTED: &str = "total_invested";
const FIELD_TOTAL_VALUE: &str = "total_value";

pub fn snapshot_key(key_prefix: &str, timestamp: i64) -> String {
    format!("{}:{}", key_prefix, timestamp)
}

/// Overwrite the hash for `snapshot.timestamp` and read it back in one MULTI/EXEC.
/// DEL first so a stale record never leaks extra fields into the new one.
pub async fn upsert_portfolio_snapshot(
    conn: &mut MultiplexedConnection,
    key_prefix: &str,
    snapshot: &NewPortfolioSnapshotModel,
) -> Result<PortfolioSnapshotModel, StoreError> {
    let key = snapshot_key(key_prefix, snapshot.timestamp);

    let (fields,): (HashMap<String, String>,) = redis::pipe()
        .atomic()
        .del(&key)
        .ignore()
        .hset_multiple(
            &key,
            &[
                (FIELD_TIMESTAMP, snapshot.timestamp.to_string()),
                (FIELD_TOTAL_INVESTED, snapshot.total_invested.to_string()),
                (FIELD_TOTAL_VALUE, snapshot.total_value.to_string()),
            ],
        )
        .ignore()
        .hgetall(&key)
        .query_async(conn)
        .await?;

    decode_snapshot(&fields)
}

pub fn decode_snapshot(fields: &HashMap<String, String>) -> Result<PortfolioSnapshotModel, StoreError> {
    let field = |name: &str| {
        fields
            .get(name)
            .ok_or_else(|| StoreError::Decode(format!("missing field '{}'", name)))
    };

    let timestamp = field(FIELD_TIMESTAMP)?
        .parse::<i64>()
        .map_err(|e| StoreError::Decode(format!("timestamp: {}", e)))?;
    let total_invested = Decimal::from_str(field(FIELD_TOTAL_INVESTED)?)
        .map_err(|e| StoreError::Decode(format!("total_invested: {}", e)))?;
    let total_value = Decimal::from_str(field(FIELD_TOTAL_VALUE)?)
        .map_err(|e| StoreError::Decode(format!("total_value: {}", e)))?;

    Ok(PortfolioSnapshotModel {
        timestamp,
        total_invested,
        total_value,
    })
}
