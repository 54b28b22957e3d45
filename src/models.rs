// Asset, Currency, PricePair, PriceRow
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use utoipa::ToSchema;

/// Cryptocurrencies served by the index, in enumeration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    Btc,
    Eth,
    Xrp,
}

impl Asset {
    pub const ALL: [Asset; 3] = [Asset::Btc, Asset::Eth, Asset::Xrp];

    /// Maps the public numeric id onto an asset.
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Asset::Btc),
            1 => Some(Asset::Eth),
            2 => Some(Asset::Xrp),
            _ => None,
        }
    }

    pub fn id(self) -> u32 {
        match self {
            Asset::Btc => 0,
            Asset::Eth => 1,
            Asset::Xrp => 2,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Asset::Btc => "BTC",
            Asset::Eth => "ETH",
            Asset::Xrp => "XRP",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Asset::Btc => "Bitcoin",
            Asset::Eth => "Ethereum",
            Asset::Xrp => "Ripple",
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Fiat currencies every asset is quoted in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Mxn,
}

impl Currency {
    pub const ALL: [Currency; 2] = [Currency::Usd, Currency::Mxn];

    pub fn code(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Mxn => "MXN",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One (asset, currency) combination; the unit of lookup, caching and fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PricePair {
    pub asset: Asset,
    pub currency: Currency,
}

impl PricePair {
    pub fn new(asset: Asset, currency: Currency) -> Self {
        Self { asset, currency }
    }

    /// Canonical `"<asset>_<currency>"` form, lower case. Doubles as the
    /// upstream book name.
    pub fn cache_key(&self) -> String {
        format!(
            "{}_{}",
            self.asset.symbol().to_lowercase(),
            self.currency.code().to_lowercase()
        )
    }

    /// Cross product of `assets` x `currencies`, skipping repeated pairs.
    pub fn cross(assets: &[Asset], currencies: &[Currency]) -> Vec<PricePair> {
        let mut pairs = Vec::with_capacity(assets.len() * currencies.len());
        for &asset in assets {
            for &currency in currencies {
                let pair = PricePair::new(asset, currency);
                if !pairs.contains(&pair) {
                    pairs.push(pair);
                }
            }
        }
        pairs
    }
}

impl fmt::Display for PricePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

/// Prices of one asset. A `None` cell could not be resolved during the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Prices {
    pub usd: Option<String>,
    pub mxn: Option<String>,
}

impl Prices {
    pub fn get(&self, currency: Currency) -> Option<&str> {
        match currency {
            Currency::Usd => self.usd.as_deref(),
            Currency::Mxn => self.mxn.as_deref(),
        }
    }

    pub fn set(&mut self, currency: Currency, value: String) {
        match currency {
            Currency::Usd => self.usd = Some(value),
            Currency::Mxn => self.mxn = Some(value),
        }
    }
}

/// One asset's aggregated result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PriceRow {
    #[serde(rename = "date")]
    pub observed_at: DateTime<Utc>,
    pub name: String,
    #[serde(rename = "ticker_symbol")]
    pub asset: Asset,
    #[serde(rename = "price")]
    pub prices: Prices,
    /// Why a currency cell is missing, keyed by that currency.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[schema(value_type = Object)]
    pub errors: BTreeMap<Currency, String>,
}

impl PriceRow {
    pub fn is_complete(&self, currencies: &[Currency]) -> bool {
        currencies.iter().all(|&c| self.prices.get(c).is_some())
    }
}

/// Shape served over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NormalizedPriceRow {
    pub id: u32,
    pub component: String,
    pub model: PriceRow,
}

impl From<PriceRow> for NormalizedPriceRow {
    fn from(row: PriceRow) -> Self {
        Self {
            id: row.asset.id(),
            component: format!("crypto_{}", row.asset.symbol().to_lowercase()),
            model: row,
        }
    }
}
