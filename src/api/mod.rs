//! Market data providers.
//!
//! Views and fetchers only see [`MarketApi`]; [`HttpApi`] backs it with
//! CoinGecko (markets, history, details) and CoinCap (asset ids, currency
//! rates, live prices).

pub mod coincap;
pub mod coingecko;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Error;
use crate::types::{
    Asset, CoinDetails, CoinIdMap, CoinPrice, Currency, CurrencySelection, Period, PriceHistory,
    TopCoinSeries, TopCoins, POPULAR_CURRENCIES,
};
use crate::utils::ops;
use coincap::CoinCapClient;
use coingecko::CoinGeckoClient;

pub type PriceStream = BoxStream<'static, Result<String>>;

#[async_trait]
pub trait MarketApi: Send + Sync {
    /// Top coins by market cap with every tracked percent change.
    async fn top_assets(&self, limit: u32) -> Result<Vec<Asset>>;
    async fn price_history(&self, id: &str, period: Period) -> Result<PriceHistory>;
    async fn coin_details(&self, id: &str) -> Result<CoinDetails>;
    async fn prices(&self, ids: &[String]) -> Result<Vec<CoinPrice>>;
    /// `(symbol, id)` pairs from the primary provider.
    async fn primary_listing(&self) -> Result<Vec<(String, String)>>;
    /// `(symbol, id)` pairs from the secondary provider.
    async fn secondary_listing(&self) -> Result<Vec<(String, String)>>;
    async fn currencies(&self) -> Result<Vec<Currency>>;
    async fn currency(&self, id: &str) -> Result<Currency>;
    async fn live_prices(&self, secondary_id: &str) -> Result<PriceStream>;
}

pub struct HttpApi {
    gecko: CoinGeckoClient,
    cap: CoinCapClient,
}

impl HttpApi {
    pub fn new(gecko_api_key: &str) -> Result<Self> {
        let client = coingecko::default_client()?;
        Ok(Self {
            gecko: CoinGeckoClient::new(client.clone(), gecko_api_key),
            cap: CoinCapClient::new(client),
        })
    }
}

#[async_trait]
impl MarketApi for HttpApi {
    async fn top_assets(&self, limit: u32) -> Result<Vec<Asset>> {
        self.gecko.fetch_markets(limit, 1).await
    }

    async fn price_history(&self, id: &str, period: Period) -> Result<PriceHistory> {
        self.gecko.fetch_price_history(id, period).await
    }

    async fn coin_details(&self, id: &str) -> Result<CoinDetails> {
        self.gecko.fetch_coin(id).await
    }

    async fn prices(&self, ids: &[String]) -> Result<Vec<CoinPrice>> {
        self.gecko.fetch_prices(ids).await
    }

    async fn primary_listing(&self) -> Result<Vec<(String, String)>> {
        let assets = self.gecko.fetch_markets(250, 1).await?;
        Ok(assets.into_iter().map(|a| (a.symbol, a.id)).collect())
    }

    async fn secondary_listing(&self) -> Result<Vec<(String, String)>> {
        self.cap.fetch_asset_ids().await
    }

    async fn currencies(&self) -> Result<Vec<Currency>> {
        self.cap.fetch_rates().await
    }

    async fn currency(&self, id: &str) -> Result<Currency> {
        self.cap.fetch_rate(id).await
    }

    async fn live_prices(&self, secondary_id: &str) -> Result<PriceStream> {
        self.cap.price_stream(secondary_id).await
    }
}

/// Fetch both listings concurrently and merge them once both are done.
/// Losing one listing is tolerated; losing both is a setup failure.
pub async fn build_coin_ids(api: &dyn MarketApi) -> Result<CoinIdMap, Error> {
    let (primary, secondary) = tokio::join!(api.primary_listing(), api.secondary_listing());
    match (primary, secondary) {
        (Ok(p), Ok(s)) => Ok(CoinIdMap::merge(p, s)),
        (Ok(p), Err(e)) => {
            tracing::warn!(error = %e, "secondary coin listing unavailable");
            Ok(CoinIdMap::merge(p, Vec::new()))
        }
        (Err(e), Ok(s)) => {
            tracing::warn!(error = %e, "primary coin listing unavailable");
            Ok(CoinIdMap::merge(Vec::new(), s))
        }
        (Err(p), Err(s)) => Err(Error::Setup(format!(
            "could not load coin ids: {:#}; {:#}",
            p, s
        ))),
    }
}

/// 7 day history of the top `n` coins, each shifted so its minimum is 0.
pub async fn top_coins(api: &dyn MarketApi, n: u32) -> Result<TopCoins> {
    let leaders = api.top_assets(n).await?;
    let mut coins = Vec::with_capacity(leaders.len());
    for asset in leaders {
        let history = api.price_history(&asset.id, Period::Week).await?;
        let (prices, min, max) = ops::normalise(&history.prices);
        coins.push(TopCoinSeries {
            name: asset.name,
            prices,
            min,
            max,
        });
    }
    Ok(TopCoins { coins })
}

/// Resolve a persisted currency id. Anything unresolvable is USD.
pub async fn resolve_currency(api: &dyn MarketApi, id: &str) -> CurrencySelection {
    let default = CurrencySelection::default();
    if id.is_empty() || id == default.id {
        return default;
    }
    match api.currency(id).await {
        Ok(c) => CurrencySelection::from_currency(&c),
        Err(e) => {
            tracing::warn!(currency = id, error = %e, "falling back to USD");
            default
        }
    }
}

/// Currencies offered by the picker, sorted by symbol. `full` lists every
/// rate; otherwise only the popular fiat set.
pub async fn currency_choices(api: &dyn MarketApi, full: bool) -> Result<Vec<Currency>> {
    let mut all = api.currencies().await?;
    if !full {
        all.retain(|c| POPULAR_CURRENCIES.contains(&c.symbol.as_str()));
    }
    all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    Ok(all)
}


#[cfg(test)]
mod tests {
    use super::stub::{asset, StubApi};
    use super::*;

    fn pairs(p: &[(&str, &str)]) -> Vec<(String, String)> {
        p.iter().map(|(s, i)| (s.to_string(), i.to_string())).collect()
    }

    #[tokio::test]
    async fn coin_ids_merge_both_sources() {
        let api = StubApi {
            primary: Some(pairs(&[("btc", "bitcoin")])),
            secondary: Some(pairs(&[("BTC", "bitcoin"), ("XYZ", "xyz")])),
            ..Default::default()
        };
        let ids = build_coin_ids(&api).await.unwrap();
        assert_eq!(ids.symbol_count(), 2);
        assert!(ids.get("BTC").unwrap().has_secondary());
    }

    #[tokio::test]
    async fn coin_ids_survive_one_source() {
        let api = StubApi {
            primary: Some(pairs(&[("eth", "ethereum")])),
            ..Default::default()
        };
        let ids = build_coin_ids(&api).await.unwrap();
        assert!(!ids.get("ETH").unwrap().has_secondary());
    }

    #[tokio::test]
    async fn coin_ids_fail_without_sources() {
        let api = StubApi::default();
        assert!(matches!(build_coin_ids(&api).await, Err(Error::Setup(_))));
    }

    #[tokio::test]
    async fn top_coins_are_normalised() {
        let api = StubApi {
            assets: vec![asset("bitcoin", "btc", 1, 1.0, 0.0)],
            ..Default::default()
        };
        let top = top_coins(&api, 3).await.unwrap();
        assert_eq!(top.coins.len(), 1);
        assert_eq!(top.coins[0].prices, vec![0.0, 2.0, 1.0]);
        assert_eq!((top.coins[0].min, top.coins[0].max), (1.0, 3.0));
    }

    #[tokio::test]
    async fn currency_resolution() {
        let api = StubApi {
            rates: vec![
                Currency {
                    id: "euro".into(),
                    symbol: "EUR".into(),
                    rate_usd: "1.1".into(),
                    ..Default::default()
                },
                Currency {
                    id: "bitcoin".into(),
                    symbol: "BTC".into(),
                    rate_usd: "60000".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(resolve_currency(&api, "euro").await.symbol, "EUR");
        assert_eq!(resolve_currency(&api, "peso").await, CurrencySelection::default());
        assert_eq!(resolve_currency(&api, "").await, CurrencySelection::default());

        let popular = currency_choices(&api, false).await.unwrap();
        assert_eq!(popular.len(), 1);
        let full = currency_choices(&api, true).await.unwrap();
        assert_eq!(full[0].symbol, "BTC");
    }
}
