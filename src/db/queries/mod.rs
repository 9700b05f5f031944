pub mod portfolio_snapshots;
