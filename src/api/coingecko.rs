use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::types::{Asset, CoinDetails, CoinPrice, Period, PriceHistory};

const BASE_URL: &str = "https://api.coingecko.com/api/v3";
const PRO_BASE_URL: &str = "https://pro-api.coingecko.com/api/v3";
const CHANGE_WINDOWS: &str = "1h,24h,7d,14d,30d,200d,1y";

/// Prices are always requested in USD; conversion happens at display time.
pub struct CoinGeckoClient {
    client: Client,
    api_key: String,
}

impl CoinGeckoClient {
    pub fn new(client: Client, api_key: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
        }
    }

    fn base_url(&self) -> &str {
        if self.api_key.is_empty() {
            BASE_URL
        } else {
            PRO_BASE_URL
        }
    }

    fn url(&self, path: &str) -> String {
        let url = format!("{}{}", self.base_url(), path);
        if self.api_key.is_empty() {
            url
        } else {
            let sep = if url.contains('?') { "&" } else { "?" };
            format!("{}{}x_cg_pro_api_key={}", url, sep, self.api_key)
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .client
            .get(self.url(path))
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to reach CoinGecko API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("CoinGecko API error {}: {}", status, truncate(&body));
        }

        let text = resp.text().await.context("Failed to read response body")?;
        serde_json::from_str(&text).with_context(|| {
            format!("Failed to parse CoinGecko response: {}", truncate(&text))
        })
    }

    pub async fn fetch_markets(&self, limit: u32, page: u32) -> Result<Vec<Asset>> {
        self.get(&format!(
            "/coins/markets?vs_currency=usd&order=market_cap_desc&per_page={}&page={}&sparkline=false&price_change_percentage={}",
            limit, page, CHANGE_WINDOWS
        ))
        .await
    }

    pub async fn fetch_markets_by_id(&self, ids: &[String]) -> Result<Vec<Asset>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.get(&format!(
            "/coins/markets?vs_currency=usd&ids={}&sparkline=false",
            ids.join(",")
        ))
        .await
    }

    pub async fn fetch_price_history(&self, coin_id: &str, period: Period) -> Result<PriceHistory> {
        let data: Value = self
            .get(&format!(
                "/coins/{}/market_chart?vs_currency=usd&days={}",
                coin_id,
                period.history_days()
            ))
            .await?;
        let points = data["prices"].as_array().context("Missing prices array")?;

        let mut prices = Vec::with_capacity(points.len());
        let mut last_ts = 0.0;
        for point in points {
            let arr = point.as_array().context("Invalid price point")?;
            if arr.len() >= 2 {
                last_ts = arr[0].as_f64().unwrap_or(last_ts);
                prices.push((arr[0].as_f64().unwrap_or(0.0), arr[1].as_f64().unwrap_or(0.0)));
            }
        }
        if period == Period::Hour {
            let cutoff = last_ts - 3_600_000.0;
            prices.retain(|(ts, _)| *ts >= cutoff);
        }

        Ok(PriceHistory {
            period: Some(period),
            prices: prices.into_iter().map(|(_, p)| p).collect(),
        })
    }

    pub async fn fetch_coin(&self, coin_id: &str) -> Result<CoinDetails> {
        let data: Value = self
            .get(&format!(
                "/coins/{}?localization=false&tickers=false&market_data=true&community_data=false&developer_data=false&sparkline=false",
                coin_id
            ))
            .await?;
        Ok(parse_details(&data))
    }

    pub async fn fetch_prices(&self, ids: &[String]) -> Result<Vec<CoinPrice>> {
        let assets = self.fetch_markets_by_id(ids).await?;
        Ok(assets
            .into_iter()
            .map(|a| CoinPrice {
                symbol: a.ticker(),
                id: a.id,
                name: a.name,
                price: a.current_price,
            })
            .collect())
    }
}

fn usd(v: &Value) -> f64 {
    v["usd"].as_f64().unwrap_or(0.0)
}

fn text(v: &Value) -> String {
    v.as_str().unwrap_or_default().to_string()
}

fn truncate(s: &str) -> &str {
    match s.char_indices().nth(300) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

pub(crate) fn parse_details(data: &Value) -> CoinDetails {
    let md = &data["market_data"];

    let mut changes = BTreeMap::new();
    for period in Period::ALL {
        let key = format!("price_change_percentage_{}_in_currency", period.key());
        if let Some(v) = md[key.as_str()]["usd"].as_f64() {
            changes.insert(period, v);
        }
    }

    let explorers = data["links"]["blockchain_site"]
        .as_array()
        .map(|sites| {
            sites
                .iter()
                .filter_map(|s| s.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    CoinDetails {
        name: text(&data["name"]),
        symbol: text(&data["symbol"]).to_uppercase(),
        rank: data["market_cap_rank"].as_u64().map(|r| r as u32),
        block_time_minutes: data["block_time_in_minutes"].as_u64(),
        market_cap: usd(&md["market_cap"]),
        ath: usd(&md["ath"]),
        ath_date: text(&md["ath_date"]["usd"]),
        atl: usd(&md["atl"]),
        atl_date: text(&md["atl_date"]["usd"]),
        high_24h: usd(&md["high_24h"]),
        low_24h: usd(&md["low_24h"]),
        total_volume: usd(&md["total_volume"]),
        circulating_supply: md["circulating_supply"].as_f64().unwrap_or(0.0),
        total_supply: md["total_supply"].as_f64(),
        max_supply: md["max_supply"].as_f64(),
        changes,
        explorers,
        last_updated: text(&data["last_updated"]),
    }
}

pub fn default_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(15))
        .user_agent(concat!("coinwatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_from_coin_document() {
        let doc = serde_json::json!({
            "id": "bitcoin",
            "name": "Bitcoin",
            "symbol": "btc",
            "market_cap_rank": 1,
            "block_time_in_minutes": 10,
            "last_updated": "2024-05-01T00:00:00.000Z",
            "links": { "blockchain_site": ["https://mempool.space/", "", null] },
            "market_data": {
                "market_cap": { "usd": 1.2e12 },
                "ath": { "usd": 73000.0 },
                "ath_date": { "usd": "2024-03-14T07:10:36.635Z" },
                "atl": { "usd": 67.81 },
                "atl_date": { "usd": "2013-07-06T00:00:00.000Z" },
                "total_volume": { "usd": 3.1e10 },
                "circulating_supply": 19700000.0,
                "max_supply": 21000000.0,
                "total_supply": null,
                "price_change_percentage_24h_in_currency": { "usd": -1.5 },
                "price_change_percentage_1y_in_currency": { "usd": 120.0 }
            }
        });
        let d = parse_details(&doc);
        assert_eq!(d.symbol, "BTC");
        assert_eq!(d.rank, Some(1));
        assert_eq!(d.block_time_minutes, Some(10));
        assert_eq!(d.ath, 73000.0);
        assert_eq!(d.explorers, vec!["https://mempool.space/".to_string()]);
        assert_eq!(d.changes.get(&Period::Day), Some(&-1.5));
        assert_eq!(d.changes.get(&Period::Year), Some(&120.0));
        assert!(d.changes.get(&Period::Hour).is_none());
        assert_eq!(d.max_supply, Some(21_000_000.0));
        assert!(d.total_supply.is_none());
    }

    #[test]
    fn pro_key_switches_host() {
        let free = CoinGeckoClient::new(Client::new(), "");
        assert_eq!(free.url("/ping"), "https://api.coingecko.com/api/v3/ping");
        let pro = CoinGeckoClient::new(Client::new(), "k");
        assert_eq!(
            pro.url("/coins/markets?vs_currency=usd"),
            "https://pro-api.coingecko.com/api/v3/coins/markets?vs_currency=usd&x_cg_pro_api_key=k"
        );
    }
}
