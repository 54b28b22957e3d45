//! Crypto Price Index API
//!
//! This library serves BTC, ETH and XRP prices in USD and MXN. Prices come
//! from the Bitso ticker API, are cached for a short window, and are looked
//! up concurrently per (asset, currency) pair before being merged into one
//! table.

pub mod aggregator;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod exchanges;
pub mod fetcher;
pub mod models;
pub mod table;

// Re-export commonly used items
pub use aggregator::{Aggregator, AggregatorOptions};
pub use api::start_server;
pub use cache::{KeyValueStore, MemoryStore, PriceCache, SledStore};
pub use config::{CacheBackend, PartialFailurePolicy, Settings};
pub use error::{PriceIndexError, Result};
pub use fetcher::PriceFetcher;
pub use models::{Asset, Currency, NormalizedPriceRow, PricePair, PriceRow, Prices};

// Re-export ticker types
pub use exchanges::bitso::BitsoClient;
pub use exchanges::{TickerClient, TickerSnapshot};
