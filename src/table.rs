// Per-run result table and row assembly
use crate::models::{Asset, Currency, PricePair, PriceRow, Prices};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Outcome of one pair lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome {
    Resolved(String),
    Failed(String),
}

/// Asset -> Currency -> outcome for a single run.
///
/// Owned by the task collecting the run's results, so no locking is needed.
/// Assets are seeded up front: each requested asset yields a row even when
/// none of its pairs resolved.
#[derive(Debug, Default)]
pub struct ResultTable {
    cells: BTreeMap<Asset, BTreeMap<Currency, PairOutcome>>,
    currencies: Vec<Currency>,
}

impl ResultTable {
    pub fn new(assets: &[Asset], currencies: &[Currency]) -> Self {
        let mut table = Self::default();
        for &asset in assets {
            table.cells.entry(asset).or_default();
        }
        for &currency in currencies {
            if !table.currencies.contains(&currency) {
                table.currencies.push(currency);
            }
        }
        table
    }

    /// Stores the outcome for `pair`. The first outcome per pair wins.
    pub fn record(&mut self, pair: PricePair, outcome: PairOutcome) {
        self.cells
            .entry(pair.asset)
            .or_default()
            .entry(pair.currency)
            .or_insert(outcome);
    }

    /// Requested pairs without a resolved price, in enumeration order.
    pub fn missing(&self) -> Vec<PricePair> {
        let mut missing = Vec::new();
        for (&asset, row) in &self.cells {
            for &currency in &self.currencies {
                if !matches!(row.get(&currency), Some(PairOutcome::Resolved(_))) {
                    missing.push(PricePair::new(asset, currency));
                }
            }
        }
        missing
    }

    /// Builds one row per asset, sorted by asset enumeration order, all
    /// stamped with the same `observed_at`.
    pub fn assemble(self, observed_at: DateTime<Utc>) -> Vec<PriceRow> {
        let currencies = self.currencies;
        self.cells
            .into_iter()
            .map(|(asset, mut outcomes)| {
                let mut prices = Prices::default();
                let mut errors = BTreeMap::new();
                for &currency in &currencies {
                    match outcomes.remove(&currency) {
                        Some(PairOutcome::Resolved(value)) => prices.set(currency, value),
                        Some(PairOutcome::Failed(reason)) => {
                            errors.insert(currency, reason);
                        }
                        None => {
                            errors.insert(currency, "lookup did not complete".to_string());
                        }
                    }
                }
                PriceRow {
                    observed_at,
                    name: asset.display_name().to_string(),
                    asset,
                    prices,
                    errors,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_follow_enumeration_order_and_share_timestamp() {
        let mut table = ResultTable::new(&[Asset::Xrp, Asset::Btc], &Currency::ALL);
        for asset in [Asset::Xrp, Asset::Btc] {
            for currency in Currency::ALL {
                let pair = PricePair::new(asset, currency);
                table.record(pair, PairOutcome::Resolved(pair.cache_key()));
            }
        }
        assert!(table.missing().is_empty());

        let now = Utc::now();
        let rows = table.assemble(now);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].asset, Asset::Btc);
        assert_eq!(rows[1].asset, Asset::Xrp);
        assert!(rows.iter().all(|row| row.observed_at == now));
        assert_eq!(rows[0].prices.usd.as_deref(), Some("btc_usd"));
        assert_eq!(rows[1].prices.mxn.as_deref(), Some("xrp_mxn"));
        assert!(rows.iter().all(|row| row.errors.is_empty()));
    }

    #[test]
    fn failed_and_absent_cells_are_marked() {
        let mut table = ResultTable::new(&[Asset::Eth], &Currency::ALL);
        table.record(
            PricePair::new(Asset::Eth, Currency::Usd),
            PairOutcome::Failed("boom".to_string()),
        );
        assert_eq!(table.missing().len(), 2);

        let rows = table.assemble(Utc::now());
        let row = &rows[0];
        assert_eq!(row.prices, Prices::default());
        assert_eq!(row.errors.get(&Currency::Usd).map(String::as_str), Some("boom"));
        assert!(row.errors.contains_key(&Currency::Mxn));
        assert_eq!(row.name, "Ethereum");
    }
}
