#![allow(dead_code)]

use async_trait::async_trait;
use crypto_price_index::{
    Aggregator, AggregatorOptions, KeyValueStore, MemoryStore, PriceCache, PriceFetcher,
    PriceIndexError, PricePair, Result, TickerClient, TickerSnapshot,
};
use mockall::mock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

mock! {
    pub Ticker {}

    #[async_trait]
    impl TickerClient for Ticker {
        fn name(&self) -> &'static str;
        async fn fetch_ticker(&self, pair: PricePair) -> Result<TickerSnapshot>;
    }
}

mock! {
    pub Store {}

    #[async_trait]
    impl KeyValueStore for Store {
        async fn get(&self, key: &str) -> Result<Option<String>>;
        async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    }
}

/// A `MockTicker` that tolerates calls to `name()` from log statements.
pub fn mock_ticker() -> MockTicker {
    let mut ticker = MockTicker::new();
    ticker.expect_name().return_const("Mock");
    ticker
}

/// The six prices used across the aggregation scenarios.
pub fn sample_prices() -> HashMap<String, String> {
    [
        ("btc_usd", "50000.00"),
        ("btc_mxn", "48000.00"),
        ("eth_usd", "3000.00"),
        ("eth_mxn", "51000.00"),
        ("xrp_usd", "0.52"),
        ("xrp_mxn", "9.10"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Ticker double driven by per-book scripts. Counts calls per book and the
/// peak number of calls in flight.
#[derive(Default)]
pub struct ScriptedTicker {
    prices: HashMap<String, String>,
    failures_before_success: HashMap<String, usize>,
    delays: HashMap<String, Duration>,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: AtomicUsize,
}

impl ScriptedTicker {
    pub fn new(prices: HashMap<String, String>) -> Self {
        Self {
            prices,
            ..Self::default()
        }
    }

    pub fn failing_first(mut self, book: &str, failures: usize) -> Self {
        self.failures_before_success.insert(book.to_string(), failures);
        self
    }

    pub fn with_delay(mut self, book: &str, delay: Duration) -> Self {
        self.delays.insert(book.to_string(), delay);
        self
    }

    pub fn with_delay_everywhere(mut self, delay: Duration) -> Self {
        for book in self.prices.keys() {
            self.delays.insert(book.clone(), delay);
        }
        self
    }

    pub fn calls(&self, book: &str) -> usize {
        self.calls.lock().unwrap().get(book).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TickerClient for ScriptedTicker {
    fn name(&self) -> &'static str {
        "Scripted"
    }

    async fn fetch_ticker(&self, pair: PricePair) -> Result<TickerSnapshot> {
        let book = pair.cache_key();
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(book.clone()).or_insert(0);
            *count += 1;
            *count
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(self.in_flight.clone());

        if let Some(delay) = self.delays.get(&book) {
            tokio::time::sleep(*delay).await;
        }

        if call <= self.failures_before_success.get(&book).copied().unwrap_or(0) {
            return Err(PriceIndexError::ExchangeError(format!(
                "scripted failure {} for {}",
                call, book
            )));
        }

        match self.prices.get(&book) {
            Some(last) => Ok(TickerSnapshot::new(book, last.clone())),
            None => Err(PriceIndexError::ExchangeError(format!("unknown book {}", book))),
        }
    }
}

/// Store wrapper that counts traffic and can be told to fail.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
    pub fail_gets: bool,
    pub fail_sets: bool,
}

#[async_trait]
impl KeyValueStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_gets {
            return Err(PriceIndexError::CacheError("read refused".to_string()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_sets {
            return Err(PriceIndexError::CacheError("write refused".to_string()));
        }
        self.inner.set(key, value, ttl).await
    }
}

pub fn aggregator_with(
    ticker: Arc<dyn TickerClient>,
    store: Arc<dyn KeyValueStore>,
    options: AggregatorOptions,
) -> Aggregator {
    Aggregator::new(PriceCache::new(store), PriceFetcher::new(ticker), options)
}
