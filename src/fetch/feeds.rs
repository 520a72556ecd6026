use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{deliver, run_every, SendData};
use crate::api::{self as market, MarketApi};
use crate::error::Result;
use crate::types::{AssetSnapshot, CoinData, CoinPrice, Currency, Period, TopCoins};

/// Shown in the live price box when no stream is available.
pub const PRICE_UNAVAILABLE: &str = "NA";

const TOP_ASSETS: u32 = 100;
const TOP_GRAPHS: u32 = 3;

/// What every periodic fetcher needs: a provider, its scope, the view's
/// pause flag and its own period.
#[derive(Clone)]
pub struct Feed {
    pub api: Arc<dyn MarketApi>,
    pub token: CancellationToken,
    pub send_data: SendData,
    pub period: Duration,
}

impl Feed {
    pub fn with_period(&self, period: Duration) -> Self {
        Self {
            period,
            ..self.clone()
        }
    }
}

/// Outcome of a one-off lookup; the error is kept as display text.
pub type Fetched<T> = std::result::Result<T, String>;

/// Results of one-off lookups a view asks for while an overlay is open.
#[derive(Debug, Clone)]
pub enum Lookup {
    Currencies(Fetched<Vec<Currency>>),
    /// Prices for the mini portfolio.
    Holdings(Fetched<Vec<CoinPrice>>),
    /// Prices of coins matching a lookup query.
    Search(Fetched<Vec<CoinPrice>>),
}

pub async fn assets(feed: Feed, tx: mpsc::Sender<AssetSnapshot>) -> Result<()> {
    let (api, send_data, token, tx) = (&feed.api, &feed.send_data, &feed.token, &tx);
    run_every(token, feed.period, move || async move {
        if !send_data.is_enabled() {
            return Ok(());
        }
        match api.top_assets(TOP_ASSETS).await {
            Ok(assets) => {
                let snapshot = AssetSnapshot {
                    assets,
                    fetched_at: Some(Utc::now()),
                };
                deliver(token, tx, snapshot).await;
            }
            Err(e) => tracing::debug!(target: "fetch", error = %e, "assets fetch failed"),
        }
        Ok(())
    })
    .await
}

pub async fn top_coins(feed: Feed, tx: mpsc::Sender<TopCoins>) -> Result<()> {
    let (api, send_data, token, tx) = (&feed.api, &feed.send_data, &feed.token, &tx);
    run_every(token, feed.period, move || async move {
        if !send_data.is_enabled() {
            return Ok(());
        }
        match market::top_coins(api.as_ref(), TOP_GRAPHS).await {
            Ok(top) => {
                deliver(token, tx, top).await;
            }
            Err(e) => tracing::debug!(target: "fetch", error = %e, "top coin history failed"),
        }
        Ok(())
    })
    .await
}

/// Price history of one coin. Refetches on its period and whenever a new
/// period is written to `interval`.
pub async fn coin_history(
    feed: Feed,
    id: String,
    mut interval: watch::Receiver<Period>,
    tx: mpsc::Sender<CoinData>,
) -> Result<()> {
    let mut ticker = time::interval(feed.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut watching = true;
    loop {
        tokio::select! {
            _ = feed.token.cancelled() => return Ok(()),
            _ = ticker.tick() => {}
            changed = interval.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                    continue;
                }
                ticker.reset();
            }
        }
        if !feed.send_data.is_enabled() {
            continue;
        }
        let period = *interval.borrow_and_update();
        let fetched = tokio::select! {
            _ = feed.token.cancelled() => return Ok(()),
            r = feed.api.price_history(&id, period) => r,
        };
        match fetched {
            Ok(history) => {
                deliver(&feed.token, &tx, CoinData::History(history)).await;
            }
            Err(e) => tracing::debug!(target: "fetch", coin = %id, error = %e, "history fetch failed"),
        }
    }
}

pub async fn coin_details(feed: Feed, id: String, tx: mpsc::Sender<CoinData>) -> Result<()> {
    let (api, send_data, token, tx, id) = (&feed.api, &feed.send_data, &feed.token, &tx, &id);
    run_every(token, feed.period, move || async move {
        if !send_data.is_enabled() {
            return Ok(());
        }
        match api.coin_details(id).await {
            Ok(details) => {
                deliver(token, tx, CoinData::Details(Box::new(details))).await;
            }
            Err(e) => tracing::debug!(target: "fetch", coin = %id, error = %e, "details fetch failed"),
        }
        Ok(())
    })
    .await
}

/// Symbol to price for exactly the given favourite ids.
pub async fn favourite_prices(feed: Feed, ids: Vec<String>, tx: mpsc::Sender<CoinData>) -> Result<()> {
    let (api, send_data, token, tx, ids) = (&feed.api, &feed.send_data, &feed.token, &tx, &ids);
    run_every(token, feed.period, move || async move {
        if !send_data.is_enabled() {
            return Ok(());
        }
        if ids.is_empty() {
            deliver(token, tx, CoinData::Favourites(BTreeMap::new())).await;
            return Ok(());
        }
        match api.prices(ids).await {
            Ok(prices) => {
                let by_symbol = prices.into_iter().map(|p| (p.symbol, p.price)).collect();
                deliver(token, tx, CoinData::Favourites(by_symbol)).await;
            }
            Err(e) => tracing::debug!(target: "fetch", error = %e, "favourite prices failed"),
        }
        Ok(())
    })
    .await
}

/// Forward streamed prices for one coin. When the stream cannot be opened
/// or ends, a single [`PRICE_UNAVAILABLE`] is sent and the task idles until
/// its scope ends.
pub async fn live_price(feed: Feed, secondary_id: String, tx: mpsc::Sender<String>) -> Result<()> {
    let opened = tokio::select! {
        _ = feed.token.cancelled() => return Ok(()),
        s = feed.api.live_prices(&secondary_id) => s,
    };
    match opened {
        Ok(mut stream) => loop {
            let next = tokio::select! {
                _ = feed.token.cancelled() => return Ok(()),
                n = stream.next() => n,
            };
            match next {
                Some(Ok(price)) => {
                    if feed.send_data.is_enabled() && !deliver(&feed.token, &tx, price).await {
                        return Ok(());
                    }
                }
                Some(Err(e)) => {
                    tracing::debug!(target: "fetch", coin = %secondary_id, error = %e, "price stream error");
                    break;
                }
                None => break,
            }
        },
        Err(e) => {
            tracing::debug!(target: "fetch", coin = %secondary_id, error = %e, "price stream unavailable");
        }
    }
    deliver(&feed.token, &tx, PRICE_UNAVAILABLE.to_string()).await;
    feed.token.cancelled().await;
    Ok(())
}

/// One-off: currencies for the picker.
pub async fn currencies(
    api: Arc<dyn MarketApi>,
    token: CancellationToken,
    full: bool,
    tx: mpsc::Sender<Lookup>,
) {
    let fetched = tokio::select! {
        _ = token.cancelled() => return,
        r = market::currency_choices(api.as_ref(), full) => r,
    };
    if let Err(e) = &fetched {
        tracing::warn!(target: "fetch", error = %e, "currency list failed");
    }
    let fetched = fetched.map_err(|e| e.to_string());
    deliver(&token, &tx, Lookup::Currencies(fetched)).await;
}

/// One-off: current prices of `ids`, wrapped by `into` for the caller.
pub async fn coin_prices(
    api: Arc<dyn MarketApi>,
    token: CancellationToken,
    ids: Vec<String>,
    into: fn(Fetched<Vec<CoinPrice>>) -> Lookup,
    tx: mpsc::Sender<Lookup>,
) {
    let fetched = if ids.is_empty() {
        Ok(Vec::new())
    } else {
        tokio::select! {
            _ = token.cancelled() => return,
            r = api.prices(&ids) => r,
        }
    };
    if let Err(e) = &fetched {
        tracing::warn!(target: "fetch", error = %e, "price lookup failed");
    }
    deliver(&token, &tx, into(fetched.map_err(|e| e.to_string()))).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::stub::{asset, StubApi};
    use std::sync::atomic::Ordering;

    fn feed(api: StubApi, token: &CancellationToken) -> (Feed, Arc<StubApi>) {
        let api = Arc::new(api);
        let feed = Feed {
            api: api.clone(),
            token: token.clone(),
            send_data: SendData::default(),
            period: Duration::from_secs(10),
        };
        (feed, api)
    }

    #[tokio::test]
    async fn assets_emit_snapshots() {
        let token = CancellationToken::new();
        let (feed, _) = feed(
            StubApi {
                assets: vec![asset("bitcoin", "btc", 1, 60000.0, 1.0)],
                ..Default::default()
            },
            &token,
        );
        let (tx, mut rx) = mpsc::channel(1);
        let task = tokio::spawn(assets(feed, tx));
        let snap = rx.recv().await.unwrap();
        assert_eq!(snap.assets.len(), 1);
        token.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn paused_feed_sends_nothing() {
        let token = CancellationToken::new();
        let (feed, _) = feed(
            StubApi {
                assets: vec![asset("bitcoin", "btc", 1, 60000.0, 1.0)],
                ..Default::default()
            },
            &token,
        );
        feed.send_data.set(false);
        let (tx, mut rx) = mpsc::channel(1);
        let task = tokio::spawn(assets(feed, tx));
        time::sleep(Duration::from_secs(35)).await;
        assert!(rx.try_recv().is_err());
        token.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn history_refetches_on_interval_change() {
        let token = CancellationToken::new();
        let (feed, api) = feed(StubApi::default(), &token);
        let (interval_tx, interval_rx) = watch::channel(Period::Day);
        let (tx, mut rx) = mpsc::channel(4);
        let task = tokio::spawn(coin_history(feed, "bitcoin".into(), interval_rx, tx));

        match rx.recv().await.unwrap() {
            CoinData::History(h) => assert_eq!(h.period, Some(Period::Day)),
            other => panic!("unexpected {:?}", other),
        }
        interval_tx.send(Period::Year).unwrap();
        match rx.recv().await.unwrap() {
            CoinData::History(h) => assert_eq!(h.period, Some(Period::Year)),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(api.history_calls.load(Ordering::SeqCst), 2);
        token.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn live_price_ends_with_sentinel() {
        let token = CancellationToken::new();
        let (feed, _) = feed(
            StubApi {
                live: vec!["64000.10".into(), "64000.20".into()],
                ..Default::default()
            },
            &token,
        );
        let (tx, mut rx) = mpsc::channel(4);
        let task = tokio::spawn(live_price(feed, "bitcoin".into(), tx));
        assert_eq!(rx.recv().await.unwrap(), "64000.10");
        assert_eq!(rx.recv().await.unwrap(), "64000.20");
        assert_eq!(rx.recv().await.unwrap(), PRICE_UNAVAILABLE);
        assert!(!task.is_finished());
        token.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn favourites_keyed_by_symbol() {
        let token = CancellationToken::new();
        let (feed, _) = feed(
            StubApi {
                assets: vec![
                    asset("bitcoin", "btc", 1, 60000.0, 1.0),
                    asset("ethereum", "eth", 2, 3000.0, 1.0),
                ],
                ..Default::default()
            },
            &token,
        );
        let (tx, mut rx) = mpsc::channel(1);
        let task = tokio::spawn(favourite_prices(feed, vec!["ethereum".into()], tx));
        match rx.recv().await.unwrap() {
            CoinData::Favourites(f) => {
                assert_eq!(f.len(), 1);
                assert_eq!(f.get("ETH"), Some(&3000.0));
            }
            other => panic!("unexpected {:?}", other),
        }
        token.cancel();
        task.await.unwrap().unwrap();
    }
}
