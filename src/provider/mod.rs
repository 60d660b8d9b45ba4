use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Feed, Snapshot};

pub mod alpaca;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("authorization rejected: {0}")]
    Auth(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("no data for symbol {0}")]
    MissingSymbol(String),
    #[error("provider error: {0}")]
    Api(String),
}

/// A market-data source able to report the latest state of one symbol.
/// Implementations never retry; the poll loop owns retry cadence.
#[async_trait]
pub trait MarketData: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_latest(&self, symbol: &str, feed: Feed) -> Result<Snapshot, FetchError>;
}

// Convenience re-export
pub use alpaca::AlpacaClient;
