use std::collections::HashMap;

use anyhow::{Context, Result};
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::types::Currency;

const BASE_URL: &str = "https://api.coincap.io/v2";
const WS_URL: &str = "wss://ws.coincap.io/prices";

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct AssetId {
    id: String,
    symbol: String,
}

/// CoinCap REST endpoints and the live price websocket.
pub struct CoinCapClient {
    client: Client,
}

impl CoinCapClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .client
            .get(format!("{}{}", BASE_URL, path))
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to reach CoinCap API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("CoinCap API error {}", status);
        }

        let envelope: Envelope<T> = resp.json().await.context("Failed to parse CoinCap response")?;
        Ok(envelope.data)
    }

    /// `(symbol, id)` for the first 2000 assets by rank.
    pub async fn fetch_asset_ids(&self) -> Result<Vec<(String, String)>> {
        let assets: Vec<AssetId> = self.get("/assets?limit=2000").await?;
        Ok(assets.into_iter().map(|a| (a.symbol, a.id)).collect())
    }

    pub async fn fetch_rates(&self) -> Result<Vec<Currency>> {
        self.get("/rates").await
    }

    pub async fn fetch_rate(&self, id: &str) -> Result<Currency> {
        self.get(&format!("/rates/{}", id)).await
    }

    /// Open the price websocket for one asset. Each item is the latest price
    /// as sent by the server; the stream ends when the socket closes.
    pub async fn price_stream(&self, id: &str) -> Result<BoxStream<'static, Result<String>>> {
        let url = format!("{}?assets={}", WS_URL, id);
        let (ws, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("Failed to open price stream for {}", id))?;

        let id = id.to_string();
        let prices = ws.filter_map(move |msg| {
            let price = match msg {
                Ok(Message::Text(text)) => price_for(&id, text.as_str()).map(Ok),
                Ok(_) => None,
                Err(e) => Some(Err(anyhow::Error::from(e))),
            };
            futures::future::ready(price)
        });
        Ok(prices.boxed())
    }
}

fn price_for(id: &str, text: &str) -> Option<String> {
    let mut update: HashMap<String, String> = serde_json::from_str(text).ok()?;
    update.remove(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_price_of_requested_asset() {
        assert_eq!(
            price_for("bitcoin", r#"{"bitcoin":"64012.55","ethereum":"3100.1"}"#),
            Some("64012.55".to_string())
        );
        assert_eq!(price_for("bitcoin", r#"{"ethereum":"3100.1"}"#), None);
        assert_eq!(price_for("bitcoin", "not json"), None);
    }

    #[test]
    fn envelope_decodes_asset_ids() {
        let env: Envelope<Vec<AssetId>> = serde_json::from_str(
            r#"{"data":[{"id":"bitcoin","symbol":"BTC","rank":"1"}],"timestamp":1}"#,
        )
        .unwrap();
        assert_eq!(env.data[0].id, "bitcoin");
        assert_eq!(env.data[0].symbol, "BTC");
    }
}
