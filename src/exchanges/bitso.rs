// REST client for the Bitso ticker endpoint
use crate::config::BitsoConfig;
use crate::error::{PriceIndexError, Result};
use crate::exchanges::{TickerClient, TickerSnapshot};
use crate::models::PricePair;
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

pub const BITSO_SANDBOX_URL: &str = "https://api-sandbox.bitso.com/api/v3";
pub const BITSO_PRODUCTION_URL: &str = "https://api-stage.bitso.com/api/v3";

#[derive(Debug, Default, Deserialize)]
struct BitsoError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct BitsoResponse {
    success: bool,
    #[serde(default)]
    error: Option<BitsoError>,
    #[serde(default)]
    payload: Option<TickerSnapshot>,
}

pub struct BitsoClient {
    client: reqwest::Client,
    ticker_url: Url,
}

impl BitsoClient {
    pub fn new(config: &BitsoConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                PriceIndexError::ExchangeError(format!("Failed to create HTTP client: {}", e))
            })?;

        let base = config.resolved_base_url();
        let ticker_url = Url::parse(&format!("{}/ticker", base.trim_end_matches('/')))?;

        Ok(Self { client, ticker_url })
    }

    pub fn ticker_url(&self) -> &Url {
        &self.ticker_url
    }
}

#[async_trait]
impl TickerClient for BitsoClient {
    fn name(&self) -> &'static str {
        "Bitso"
    }

    async fn fetch_ticker(&self, pair: PricePair) -> Result<TickerSnapshot> {
        let book = pair.cache_key();
        let response = self
            .client
            .get(self.ticker_url.clone())
            .query(&[("book", book.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PriceIndexError::ExchangeError(format!(
                "Bitso returned HTTP {} for {}",
                status, book
            )));
        }

        let response: BitsoResponse = response.json().await?;
        if !response.success {
            let error = response.error.unwrap_or_default();
            return Err(PriceIndexError::ExchangeError(format!(
                "Bitso API error for {}: ({}) {}",
                book, error.code, error.message
            )));
        }

        let ticker = response.payload.ok_or_else(|| {
            PriceIndexError::ExchangeError(format!("No ticker payload received for {}", book))
        })?;
        debug!("[{}] Bitso last price {}", book, ticker.last);
        Ok(ticker)
    }
}
