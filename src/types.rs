use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

fn f64_or_zero<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Option::<f64>::deserialize(d).map(|v| v.unwrap_or(0.0))
}

/// One coin of an all-coins snapshot, as returned by `/coins/markets`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    pub market_cap_rank: Option<u32>,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub current_price: f64,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub circulating_supply: f64,
    pub max_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub price_change_percentage_1h_in_currency: Option<f64>,
    pub price_change_percentage_24h_in_currency: Option<f64>,
    pub price_change_percentage_7d_in_currency: Option<f64>,
    pub price_change_percentage_14d_in_currency: Option<f64>,
    pub price_change_percentage_30d_in_currency: Option<f64>,
    pub price_change_percentage_200d_in_currency: Option<f64>,
    pub price_change_percentage_1y_in_currency: Option<f64>,
}

impl Asset {
    /// Percent change over `period`, 0 when the provider has no figure.
    pub fn percent_change(&self, period: Period) -> f64 {
        let v = match period {
            Period::Hour => self.price_change_percentage_1h_in_currency,
            Period::Day => self.price_change_percentage_24h_in_currency,
            Period::Week => self.price_change_percentage_7d_in_currency,
            Period::Fortnight => self.price_change_percentage_14d_in_currency,
            Period::Month => self.price_change_percentage_30d_in_currency,
            Period::TwoHundredDays => self.price_change_percentage_200d_in_currency,
            Period::Year => self.price_change_percentage_1y_in_currency,
        };
        v.unwrap_or(0.0)
    }

    pub fn ticker(&self) -> String {
        self.symbol.to_uppercase()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssetSnapshot {
    pub assets: Vec<Asset>,
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Lookback window for percent changes and price history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Period {
    Hour,
    Day,
    Week,
    Fortnight,
    Month,
    TwoHundredDays,
    Year,
}

impl Period {
    pub const ALL: [Period; 7] = [
        Period::Hour,
        Period::Day,
        Period::Week,
        Period::Fortnight,
        Period::Month,
        Period::TwoHundredDays,
        Period::Year,
    ];

    /// Periods tracked by the portfolio performer tables.
    pub const PERFORMERS: [Period; 5] = [
        Period::Hour,
        Period::Day,
        Period::Week,
        Period::Month,
        Period::Year,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Period::Hour => "1h",
            Period::Day => "24h",
            Period::Week => "7d",
            Period::Fortnight => "14d",
            Period::Month => "30d",
            Period::TwoHundredDays => "200d",
            Period::Year => "1y",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Period::Hour => "1 Hour",
            Period::Day => "24 Hours",
            Period::Week => "7 Days",
            Period::Fortnight => "14 Days",
            Period::Month => "30 Days",
            Period::TwoHundredDays => "200 Days",
            Period::Year => "1 Year",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.label() == label || p.key() == label)
    }

    /// `days` parameter for `/market_chart`. The hour window is cut from a day.
    pub fn history_days(self) -> u32 {
        match self {
            Period::Hour | Period::Day => 1,
            Period::Week => 7,
            Period::Fortnight => 14,
            Period::Month => 30,
            Period::TwoHundredDays => 200,
            Period::Year => 365,
        }
    }
}

/// Provider identifiers of one ticker symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoinId {
    pub primary: String,
    pub secondary: String,
}

impl CoinId {
    pub fn has_primary(&self) -> bool {
        !self.primary.is_empty()
    }

    pub fn has_secondary(&self) -> bool {
        !self.secondary.is_empty()
    }
}

/// Uppercase symbol to provider ids.
#[derive(Debug, Clone, Default)]
pub struct CoinIdMap {
    ids: HashMap<String, CoinId>,
}

impl CoinIdMap {
    /// Merge the two listings once both are complete. Each listing maps
    /// symbol to that provider's id; the first id seen for a symbol wins.
    pub fn merge(primary: Vec<(String, String)>, secondary: Vec<(String, String)>) -> Self {
        let mut ids: HashMap<String, CoinId> = HashMap::new();
        for (symbol, id) in primary {
            let entry = ids.entry(symbol.to_uppercase()).or_default();
            if entry.primary.is_empty() {
                entry.primary = id;
            }
        }
        for (symbol, id) in secondary {
            let entry = ids.entry(symbol.to_uppercase()).or_default();
            if entry.secondary.is_empty() {
                entry.secondary = id;
            }
        }
        Self { ids }
    }

    pub fn get(&self, symbol: &str) -> Option<&CoinId> {
        self.ids.get(&symbol.to_uppercase())
    }

    /// Symbols containing `query` (case-insensitive) that resolve to a
    /// primary id, sorted alphabetically.
    pub fn search(&self, query: &str) -> Vec<(String, CoinId)> {
        let q = query.to_uppercase();
        let mut found: Vec<(String, CoinId)> = self
            .ids
            .iter()
            .filter(|(sym, id)| id.has_primary() && sym.contains(&q))
            .map(|(sym, id)| (sym.clone(), id.clone()))
            .collect();
        found.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(&b.0)));
        found
    }

    pub fn symbol_count(&self) -> usize {
        self.ids.len()
    }
}

/// A CoinCap `/v2/rates` entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Currency {
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(rename = "currencySymbol", default)]
    pub currency_symbol: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(rename = "rateUsd", alias = "rateUSD", default)]
    pub rate_usd: String,
}

impl Currency {
    pub fn rate(&self) -> f64 {
        self.rate_usd.parse().unwrap_or(0.0)
    }
}

/// Currency every monetary value is displayed in.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrencySelection {
    pub id: String,
    pub symbol: String,
    pub currency_symbol: String,
    pub rate_usd: f64,
}

impl Default for CurrencySelection {
    fn default() -> Self {
        Self {
            id: "united-states-dollar".to_string(),
            symbol: "USD".to_string(),
            currency_symbol: "$".to_string(),
            rate_usd: 1.0,
        }
    }
}

impl CurrencySelection {
    /// Falls back to USD when the rate is unusable.
    pub fn from_currency(c: &Currency) -> Self {
        let rate = c.rate();
        if !rate.is_finite() || rate <= 0.0 {
            return Self::default();
        }
        Self {
            id: c.id.clone(),
            symbol: c.symbol.clone(),
            currency_symbol: c.currency_symbol.clone().unwrap_or_default(),
            rate_usd: rate,
        }
    }

    pub fn convert(&self, usd: f64) -> f64 {
        usd / self.rate_usd
    }

    pub fn label(&self) -> String {
        if self.currency_symbol.is_empty() {
            self.symbol.clone()
        } else {
            format!("{} {}", self.symbol, self.currency_symbol)
        }
    }
}

pub const POPULAR_CURRENCIES: &[&str] = &["USD", "EUR", "JPY", "GBP", "INR", "AUD", "CAD", "CNY"];

#[derive(Debug, Clone, Default)]
pub struct PriceHistory {
    pub period: Option<Period>,
    pub prices: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct TopCoinSeries {
    pub name: String,
    pub prices: Vec<f64>,
    pub min: f64,
    pub max: f64,
}

/// 7 day history of the top coins by market cap.
#[derive(Debug, Clone, Default)]
pub struct TopCoins {
    pub coins: Vec<TopCoinSeries>,
}

#[derive(Debug, Clone, Default)]
pub struct CoinDetails {
    pub name: String,
    pub symbol: String,
    pub rank: Option<u32>,
    pub block_time_minutes: Option<u64>,
    pub market_cap: f64,
    pub ath: f64,
    pub ath_date: String,
    pub atl: f64,
    pub atl_date: String,
    pub high_24h: f64,
    pub low_24h: f64,
    pub total_volume: f64,
    pub circulating_supply: f64,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub changes: BTreeMap<Period, f64>,
    pub explorers: Vec<String>,
    pub last_updated: String,
}

/// Messages of the drill-down data channel.
#[derive(Debug, Clone)]
pub enum CoinData {
    History(PriceHistory),
    Details(Box<CoinDetails>),
    Favourites(BTreeMap<String, f64>),
}

/// Best and worst performing holding over one period.
#[derive(Debug, Clone, PartialEq)]
pub struct Performer {
    pub best_value: f64,
    pub best_coin: String,
    pub worst_value: f64,
    pub worst_coin: String,
}

impl Default for Performer {
    fn default() -> Self {
        Self {
            best_value: f64::NEG_INFINITY,
            best_coin: String::new(),
            worst_value: f64::INFINITY,
            worst_coin: String::new(),
        }
    }
}

impl Performer {
    pub fn observe(&mut self, coin: &str, value: f64) {
        if value > self.best_value {
            self.best_value = value;
            self.best_coin = coin.to_string();
        }
        if value < self.worst_value {
            self.worst_value = value;
            self.worst_coin = coin.to_string();
        }
    }
}

/// A coin with its price, for the mini portfolio overlay.
#[derive(Debug, Clone, Default)]
pub struct CoinPrice {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub price: f64,
}
