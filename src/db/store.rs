use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use super::connection::RedisConnection;
use super::error::StoreError;
use super::models::portfolio_snapshots::{NewPortfolioSnapshotModel, PortfolioSnapshotModel};
use super::queries::portfolio_snapshots as snapshot_queries;
use crate::config::Config;

/// Keyed, last-write-wins persistence for portfolio snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Create or fully overwrite the record at `snapshot.timestamp`, returning the stored record.
    async fn upsert_snapshot(
        &self,
        snapshot: &NewPortfolioSnapshotModel,
    ) -> Result<PortfolioSnapshotModel, StoreError>;
}

/// Redis-backed store: one hash per snapshot at `<key_prefix>:<timestamp>`.
pub struct RedisSnapshotStore {
    connection: RedisConnection,
    key_prefix: String,
    timeout: Option<Duration>,
}

impl RedisSnapshotStore {
    pub fn new(config: &Config) -> Result<Self, StoreError> {
        Ok(Self {
            connection: RedisConnection::open(config)?,
            key_prefix: config.snapshot_key_prefix.clone(),
            timeout: config.store_timeout,
        })
    }
}

#[async_trait]
impl SnapshotStore for RedisSnapshotStore {
    async fn upsert_snapshot(
        &self,
        snapshot: &NewPortfolioSnapshotModel,
    ) -> Result<PortfolioSnapshotModel, StoreError> {
        let write = async {
            let mut conn = self.connection.get().await?;
            snapshot_queries::upsert_portfolio_snapshot(&mut conn, &self.key_prefix, snapshot).await
        };

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, write)
                .await
                .map_err(|_| StoreError::Timeout(limit))?,
            None => write.await,
        }
    }
}

/// In-process store used by tests and the server's `--memory` mode.
#[derive(Default)]
pub struct MemorySnapshotStore {
    records: RwLock<BTreeMap<i64, PortfolioSnapshotModel>>,
    failing: AtomicBool,
    writes: AtomicUsize,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every upsert fails with `StoreError::Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful upserts so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn get(&self, timestamp: i64) -> Option<PortfolioSnapshotModel> {
        self.records.read().await.get(&timestamp).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn upsert_snapshot(
        &self,
        snapshot: &NewPortfolioSnapshotModel,
    ) -> Result<PortfolioSnapshotModel, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated store outage".to_string()));
        }

        let record = PortfolioSnapshotModel::from(snapshot);
        let previous = self
            .records
            .write()
            .await
            .insert(record.timestamp, record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);

        debug!(timestamp = record.timestamp, overwrote = previous.is_some(), "Memory store upsert");
        Ok(record)
    }
}
