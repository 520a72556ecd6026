//! Opening the coin page on top of a running view.
//!
//! The parent's fetchers are paused for as long as the coin page is up.
//! The page gets its own task group under the parent's scope, so quitting
//! the page stops only its fetchers while quitting the program stops both.

use ratatui::backend::Backend;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::coin::CoinView;
use super::{settle, Session};
use crate::error::{Error, Result};
use crate::fetch::feeds::{self, Feed};
use crate::fetch::{SendData, TaskGroup};
use crate::settings::Profile;
use crate::types::{CoinId, Period};

pub async fn drill_down<B: Backend>(
    session: &mut Session<'_, B>,
    parent: &CancellationToken,
    parent_send_data: &SendData,
    profile: &mut Profile,
    symbol: &str,
    id: CoinId,
) -> Result<()> {
    let _paused = parent_send_data.pause();
    let env = session.env;
    let mut group = TaskGroup::new(parent);
    let send_data = SendData::default();
    let feed = Feed {
        api: env.api.clone(),
        token: group.token(),
        send_data: send_data.clone(),
        period: env.config.coin_period(),
    };

    let (data_tx, mut data_rx) = mpsc::channel(8);
    let (price_tx, mut price_rx) = mpsc::channel(16);
    let (interval_tx, interval_rx) = watch::channel(Period::Day);

    group.spawn(feeds::coin_history(feed.clone(), id.primary.clone(), interval_rx, data_tx.clone()));
    group.spawn(feeds::coin_details(feed.clone(), id.primary.clone(), data_tx.clone()));
    let favourites = profile.favourites.iter().cloned().collect();
    group.spawn(feeds::favourite_prices(feed.clone(), favourites, data_tx));
    if id.has_secondary() {
        group.spawn(feeds::live_price(feed, id.secondary.clone(), price_tx));
    } else {
        drop(price_tx);
    }

    tracing::info!(coin = %id.primary, symbol, "coin page opened");
    let scope = group.token();
    let result = {
        let mut view = CoinView::new(symbol, id, profile, send_data, interval_tx);
        view.run(session, &scope, &mut data_rx, &mut price_rx).await
    };

    group.cancel();
    let fetched = group.wait().await;
    session.clear()?;
    tracing::info!(symbol, "coin page closed");

    match result {
        Err(Error::UserQuit) => fetched,
        other => settle(other, fetched),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    use super::*;
    use crate::api::stub::StubApi;
    use crate::app::keys::Key;
    use crate::app::Env;
    use crate::config::Config;
    use crate::theme::Theme;

    fn env() -> Env {
        Env {
            api: Arc::new(StubApi::default()),
            config: Config::default(),
            theme: Theme::default(),
        }
    }

    fn bitcoin() -> CoinId {
        CoinId {
            primary: "bitcoin".into(),
            secondary: "bitcoin".into(),
        }
    }

    #[tokio::test]
    async fn quitting_the_page_resumes_the_parent() {
        let env = env();
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        let (tx, mut keys) = mpsc::channel(4);
        tx.send(Key::Char('q')).await.unwrap();
        let mut session = Session {
            terminal: &mut terminal,
            keys: &mut keys,
            env: &env,
        };
        let parent = CancellationToken::new();
        let send_data = SendData::default();
        let mut profile = Profile::default();

        let result = drill_down(&mut session, &parent, &send_data, &mut profile, "BTC", bitcoin()).await;
        assert!(result.is_ok());
        assert!(send_data.is_enabled());
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_parent_ends_the_page() {
        let env = env();
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        let (_tx, mut keys) = mpsc::channel(4);
        let mut session = Session {
            terminal: &mut terminal,
            keys: &mut keys,
            env: &env,
        };
        let parent = CancellationToken::new();
        parent.cancel();
        let send_data = SendData::default();
        let mut profile = Profile::default();

        let result = drill_down(&mut session, &parent, &send_data, &mut profile, "BTC", bitcoin()).await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(send_data.is_enabled());
    }

    #[tokio::test]
    async fn paused_parent_stays_paused() {
        let env = env();
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        let (tx, mut keys) = mpsc::channel(4);
        tx.send(Key::Char('q')).await.unwrap();
        let mut session = Session {
            terminal: &mut terminal,
            keys: &mut keys,
            env: &env,
        };
        let parent = CancellationToken::new();
        let send_data = SendData::default();
        send_data.set(false);
        let mut profile = Profile::default();

        let result = drill_down(&mut session, &parent, &send_data, &mut profile, "BTC", bitcoin()).await;
        assert!(result.is_ok());
        assert!(!send_data.is_enabled());
    }

    #[tokio::test]
    async fn coin_without_secondary_id_has_no_live_feed() {
        let api = Arc::new(StubApi::default());
        let env = Env {
            api: api.clone(),
            config: Config::default(),
            theme: Theme::default(),
        };
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        let (tx, mut keys) = mpsc::channel(4);
        let mut session = Session {
            terminal: &mut terminal,
            keys: &mut keys,
            env: &env,
        };
        let parent = CancellationToken::new();
        let send_data = SendData::default();
        let mut profile = Profile::default();
        let id = CoinId {
            primary: "bitcoin".into(),
            secondary: String::new(),
        };

        // quit once the history feed has been served
        let watched = api.clone();
        let quitter = tokio::spawn(async move {
            while watched.history_calls.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send(Key::Char('q')).await.unwrap();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            drill_down(&mut session, &parent, &send_data, &mut profile, "BTC", id),
        )
        .await
        .unwrap();
        quitter.await.unwrap();
        assert!(result.is_ok());
        assert!(api.history_calls.load(Ordering::SeqCst) >= 1);
        assert_eq!(api.live_calls.load(Ordering::SeqCst), 0);
        assert!(send_data.is_enabled());
    }
}
