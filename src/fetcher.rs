// Bounded retry around a TickerClient
use crate::error::{PriceIndexError, Result};
use crate::exchanges::TickerClient;
use crate::models::PricePair;
use log::{debug, warn};
use std::sync::Arc;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Resolves one pair's last price, retrying failed upstream calls back to
/// back up to `max_attempts` times.
#[derive(Clone)]
pub struct PriceFetcher {
    client: Arc<dyn TickerClient>,
    max_attempts: u32,
}

impl PriceFetcher {
    pub fn new(client: Arc<dyn TickerClient>) -> Self {
        Self::with_max_attempts(client, DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(client: Arc<dyn TickerClient>, max_attempts: u32) -> Self {
        Self {
            client,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn fetch(&self, pair: PricePair) -> Result<String> {
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            let outcome = self
                .client
                .fetch_ticker(pair)
                .await
                .and_then(|ticker| validate_price(pair, ticker.last));

            match outcome {
                Ok(price) => {
                    debug!(
                        "[{}] {} price {} on attempt {}",
                        pair,
                        self.client.name(),
                        price,
                        attempt
                    );
                    return Ok(price);
                }
                Err(e) => {
                    warn!(
                        "[{}] attempt {}/{} failed: {}",
                        pair, attempt, self.max_attempts, e
                    );
                    last_error = e.to_string();
                }
            }
        }

        Err(PriceIndexError::FetchFailed {
            pair: pair.cache_key(),
            attempts: self.max_attempts,
            reason: last_error,
        })
    }
}

fn validate_price(pair: PricePair, last: String) -> Result<String> {
    match last.trim().parse::<f64>() {
        Ok(price) if price.is_finite() && price > 0.0 => Ok(last),
        _ => Err(PriceIndexError::InvalidPriceData(format!(
            "unusable last price {:?} for {}",
            last, pair
        ))),
    }
}
