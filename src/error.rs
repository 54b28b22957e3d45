// Custom error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PriceIndexError {
    #[error("Exchange error: {0}")]
    ExchangeError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Invalid price data: {0}")]
    InvalidPriceData(String),

    #[error("Cache backend error: {0}")]
    CacheError(String),

    /// Terminal per-pair failure once every attempt has been used up.
    #[error("[{pair}] fetch failed after {attempts} retries: {reason}")]
    FetchFailed {
        pair: String,
        attempts: u32,
        reason: String,
    },

    #[error("crypto id {0} not found")]
    UnknownAssetId(u32),

    #[error("Aggregation error: {0}")]
    AggregationError(String),
}

/// A type alias for Result that uses our custom error type
pub type Result<T> = std::result::Result<T, PriceIndexError>;
