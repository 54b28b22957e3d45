// TickerClient trait, ticker snapshot
use crate::error::Result;
use crate::models::PricePair;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod bitso;

/// Latest traded figures for one book as reported upstream.
///
/// Prices are kept as the decimal text the exchange sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    pub book: String,
    pub last: String,
    #[serde(default)]
    pub high: Option<String>,
    #[serde(default)]
    pub low: Option<String>,
    #[serde(default)]
    pub ask: Option<String>,
    #[serde(default)]
    pub bid: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub vwap: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl TickerSnapshot {
    /// Snapshot carrying only a book name and last price.
    pub fn new(book: impl Into<String>, last: impl Into<String>) -> Self {
        Self {
            book: book.into(),
            last: last.into(),
            high: None,
            low: None,
            ask: None,
            bid: None,
            volume: None,
            vwap: None,
            created_at: None,
        }
    }
}

/// The TickerClient trait defines the interface for upstream price sources.
///
/// One call is one round trip; any transport failure or non-success
/// response from the upstream API is returned as an error. Retrying is
/// the caller's business.
#[async_trait]
pub trait TickerClient: Send + Sync {
    /// Returns the name of the upstream source
    fn name(&self) -> &'static str;

    /// Fetches the latest ticker for `pair`.
    async fn fetch_ticker(&self, pair: PricePair) -> Result<TickerSnapshot>;
}
