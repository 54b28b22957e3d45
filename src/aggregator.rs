// Fan-out/join over price pairs with cache-then-network lookups
use crate::cache::PriceCache;
use crate::config::{PartialFailurePolicy, Settings};
use crate::error::{PriceIndexError, Result};
use crate::fetcher::PriceFetcher;
use crate::models::{Asset, Currency, PricePair, PriceRow};
use crate::table::{PairOutcome, ResultTable};
use chrono::Utc;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Knobs of an aggregation run.
#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    /// TTL applied to every freshly fetched price.
    pub cache_ttl: Duration,
    /// Upper bound on concurrently running pair lookups. `None` runs every
    /// pair of a request at once.
    pub max_concurrency: Option<usize>,
    /// Stop waiting for stragglers after this long.
    pub deadline: Option<Duration>,
    pub partial_failure: PartialFailurePolicy,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60),
            max_concurrency: None,
            deadline: None,
            partial_failure: PartialFailurePolicy::Mark,
        }
    }
}

impl From<&Settings> for AggregatorOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            cache_ttl: settings.cache_ttl(),
            max_concurrency: settings.aggregator.max_concurrency,
            deadline: settings.aggregator.deadline_ms.map(Duration::from_millis),
            partial_failure: settings.aggregator.partial_failure,
        }
    }
}

/// Resolves price tables for sets of assets and currencies.
///
/// Every run spawns one task per (asset, currency) pair. A task checks the
/// cache, falls back to the fetcher on a miss and writes fresh prices back.
/// Tasks hand their outcome back as a value; the calling task is the only
/// writer of the run's [`ResultTable`].
pub struct Aggregator {
    cache: PriceCache,
    fetcher: PriceFetcher,
    options: AggregatorOptions,
}

impl Aggregator {
    pub fn new(cache: PriceCache, fetcher: PriceFetcher, options: AggregatorOptions) -> Self {
        Self {
            cache,
            fetcher,
            options,
        }
    }

    /// Prices for every known asset in every known currency.
    pub async fn get_all(&self) -> Result<Vec<PriceRow>> {
        self.run(&Asset::ALL, &Currency::ALL).await
    }

    /// Prices for the asset with the given public id.
    ///
    /// Unknown ids fail before any cache or network work is done.
    pub async fn get_by_id(&self, id: u32) -> Result<PriceRow> {
        let asset = Asset::from_id(id).ok_or(PriceIndexError::UnknownAssetId(id))?;
        self.run(&[asset], &Currency::ALL)
            .await?
            .into_iter()
            .next()
            .ok_or(PriceIndexError::UnknownAssetId(id))
    }

    pub async fn run(&self, assets: &[Asset], currencies: &[Currency]) -> Result<Vec<PriceRow>> {
        let pairs = PricePair::cross(assets, currencies);
        let mut table = ResultTable::new(assets, currencies);
        if pairs.is_empty() {
            return Ok(table.assemble(Utc::now()));
        }

        let started = Instant::now();
        let limit = self
            .options
            .max_concurrency
            .unwrap_or(pairs.len())
            .clamp(1, pairs.len());
        let permits = Arc::new(Semaphore::new(limit));
        debug!("spawning {} pair lookups, {} at a time", pairs.len(), limit);

        let mut tasks = JoinSet::new();
        for pair in pairs {
            let cache = self.cache.clone();
            let fetcher = self.fetcher.clone();
            let permits = permits.clone();
            let ttl = self.options.cache_ttl;
            tasks.spawn(async move {
                let outcome = match permits.acquire().await {
                    Ok(_permit) => lookup_pair(&cache, &fetcher, pair, ttl).await,
                    Err(_) => PairOutcome::Failed("lookup slots closed".to_string()),
                };
                (pair, outcome)
            });
        }

        let deadline = self.options.deadline.map(|d| started + d);
        let mut timed_out = false;
        loop {
            let joined = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        timed_out = true;
                        break;
                    }
                },
                None => tasks.join_next().await,
            };

            match joined {
                Some(Ok((pair, outcome))) => table.record(pair, outcome),
                Some(Err(e)) => error!("pair lookup task failed: {}", e),
                None => break,
            }
        }

        if timed_out {
            warn!(
                "deadline reached with {} pair lookups outstanding, aborting them",
                tasks.len()
            );
            abort_and_drain(&mut tasks, &mut table).await;
        }

        let missing = table.missing();
        if !missing.is_empty() {
            let keys: Vec<String> = missing.iter().map(PricePair::cache_key).collect();
            match self.options.partial_failure {
                PartialFailurePolicy::Fail => {
                    return Err(PriceIndexError::AggregationError(format!(
                        "unresolved pairs: {}",
                        keys.join(", ")
                    )));
                }
                PartialFailurePolicy::Mark => {
                    warn!("returning partial table, unresolved pairs: {}", keys.join(", "));
                }
            }
        }

        let rows = table.assemble(Utc::now());
        info!(
            "aggregated {} rows in {:.3}s",
            rows.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(rows)
    }
}

// Lookups that finished before their abort landed still count.
async fn abort_and_drain(tasks: &mut JoinSet<(PricePair, PairOutcome)>, table: &mut ResultTable) {
    tasks.abort_all();
    while let Some(joined) = tasks.join_next().await {
        if let Ok((pair, outcome)) = joined {
            table.record(pair, outcome);
        }
    }
}

async fn lookup_pair(
    cache: &PriceCache,
    fetcher: &PriceFetcher,
    pair: PricePair,
    ttl: Duration,
) -> PairOutcome {
    let key = pair.cache_key();
    if let Some(value) = cache.get(&key).await {
        debug!("[{}] value found in cache", key);
        return PairOutcome::Resolved(value);
    }

    debug!("[{}] cache miss, fetching", key);
    match fetcher.fetch(pair).await {
        Ok(value) => {
            if let Err(e) = cache.set(&key, &value, ttl).await {
                warn!("[{}] could not store fetched price: {}", key, e);
            }
            PairOutcome::Resolved(value)
        }
        Err(e) => {
            warn!("[{}] {}", key, e);
            PairOutcome::Failed(e.to_string())
        }
    }
}
