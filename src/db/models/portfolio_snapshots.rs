use rust_decimal::Decimal;
use serde::Serialize;

/// A snapshot as it exists in the store after a write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSnapshotModel {
    pub timestamp: i64, // unix seconds, unique key
    #[serde(with = "rust_decimal::serde::float")]
    pub total_invested: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_value: Decimal,
}

/// A validated snapshot ready to be upserted. Amounts are already rounded to cents.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPortfolioSnapshotModel {
    pub timestamp: i64,
    pub total_invested: Decimal,
    pub total_value: Decimal,
}

impl From<&NewPortfolioSnapshotModel> for PortfolioSnapshotModel {
    fn from(snapshot: &NewPortfolioSnapshotModel) -> Self {
        Self {
            timestamp: snapshot.timestamp,
            total_invested: snapshot.total_invested,
            total_value: snapshot.total_value,
        }
    }
}
