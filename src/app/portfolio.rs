use ratatui::backend::Backend;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::keys::Key;
use super::modal::{Action, Modal, Overlay, Pane, ViewKind};
use super::table::{TableRow, TableView};
use super::{drilldown, next_key, settle, Flow, Session, ViewState};
use crate::api;
use crate::error::{Error, Result};
use crate::fetch::feeds::{self, Feed, PRICE_UNAVAILABLE};
use crate::fetch::{SendData, TaskGroup};
use crate::settings::{Profile, SettingsStore};
use crate::types::{Asset, AssetSnapshot, CoinIdMap, Performer, Period};
use crate::ui::pages;
use crate::utils::format::{change_cell, format_price};
use crate::utils::sort::TableKind;

/// Everything the portfolio page shows for one snapshot.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub rows: Vec<TableRow>,
    pub total: f64,
    pub performers: Vec<(Period, Performer)>,
    /// Symbol and percent of the total balance, largest first.
    pub shares: Vec<(String, f64)>,
}

/// Held coins present in the snapshot with their balances, share of the
/// total and the best and worst performers per period.
pub fn summarise(assets: &[Asset], profile: &Profile, period: Period) -> Summary {
    let currency = &profile.currency;
    let held: Vec<(&Asset, f64, f64)> = assets
        .iter()
        .filter_map(|a| {
            let amount = profile.holding(&a.id)?;
            Some((a, amount, currency.convert(a.current_price) * amount))
        })
        .collect();
    let total: f64 = held.iter().map(|(_, _, balance)| balance).sum();

    let share = |balance: f64| (total > 0.0).then(|| balance / total * 100.0);

    let rows = held
        .iter()
        .map(|(a, amount, balance)| {
            TableRow::named(
                vec![
                    a.market_cap_rank.map(|r| r.to_string()).unwrap_or_default(),
                    a.ticker(),
                    format_price(currency.convert(a.current_price)),
                    change_cell(a.percent_change(period)),
                    format!("{:.5}", amount),
                    format!("{:.2}", balance),
                    share(*balance)
                        .map(|s| format!("{:.2}", s))
                        .unwrap_or_else(|| PRICE_UNAVAILABLE.to_string()),
                ],
                a.name.clone(),
            )
            .with_id(a.id.clone())
        })
        .collect();

    let performers = Period::PERFORMERS
        .iter()
        .map(|p| {
            let mut performer = Performer::default();
            for (a, _, _) in &held {
                performer.observe(&a.ticker(), a.percent_change(*p));
            }
            (*p, performer)
        })
        .collect();

    let mut shares: Vec<(String, f64)> = held
        .iter()
        .filter_map(|(a, _, balance)| share(*balance).map(|s| (a.ticker(), s)))
        .collect();
    shares.sort_by(|a, b| b.1.total_cmp(&a.1));

    Summary {
        rows,
        total,
        performers,
        shares,
    }
}

fn performer_rows(performers: &[(Period, Performer)], best: bool) -> Vec<TableRow> {
    performers
        .iter()
        .map(|(period, p)| {
            let (coin, value) = if best {
                (&p.best_coin, p.best_value)
            } else {
                (&p.worst_coin, p.worst_value)
            };
            let cells = if coin.is_empty() {
                vec![period.key().to_string(), PRICE_UNAVAILABLE.to_string(), PRICE_UNAVAILABLE.to_string()]
            } else {
                vec![period.key().to_string(), coin.clone(), change_cell(value)]
            };
            TableRow::new(cells)
        })
        .collect()
}

/// The holdings page, opened with the `portfolio` subcommand.
pub struct PortfolioView {
    pub state: ViewState,
    store: SettingsStore,
    pub profile: Profile,
    coin_ids: CoinIdMap,
    pub period: Period,
    pub snapshot: AssetSnapshot,
    pub summary: Summary,
    pub details: TableView,
    pub coins: TableView,
    pub best: TableView,
    pub worst: TableView,
    scope: CancellationToken,
}

impl PortfolioView {
    pub fn new(store: SettingsStore, profile: Profile, coin_ids: CoinIdMap) -> Self {
        let mut view = Self {
            state: ViewState::new(ViewKind::Portfolio, Pane::Main, SendData::default()),
            store,
            profile,
            coin_ids,
            period: Period::Day,
            snapshot: AssetSnapshot::default(),
            summary: Summary::default(),
            details: TableView::new("Details", &["Balance", ""], TableKind::Plain),
            coins: TableView::new(
                "Coins",
                &["Rank", "Symbol", "Price", "Change %", "Holding", "Balance", "Holding %"],
                TableKind::Portfolio,
            ),
            best: TableView::new("Best Performers", &["Time", "Coin", "Change"], TableKind::Plain),
            worst: TableView::new("Worst Performers", &["Time", "Coin", "Change"], TableKind::Plain),
            scope: CancellationToken::new(),
        };
        view.rebuild();
        view
    }

    pub async fn launch<B: Backend>(
        session: &mut Session<'_, B>,
        store: SettingsStore,
        token: &CancellationToken,
    ) -> Result<()> {
        let api = session.env.api.clone();
        let settings = store.load();
        let currency = api::resolve_currency(api.as_ref(), &settings.currency).await;
        let coin_ids = api::build_coin_ids(api.as_ref()).await?;
        tracing::info!(holdings = settings.portfolio.len(), "portfolio view starting");
        let mut view = Self::new(store, Profile::new(settings, currency), coin_ids);
        view.run(session, token).await
    }

    pub async fn run<B: Backend>(&mut self, session: &mut Session<'_, B>, parent: &CancellationToken) -> Result<()> {
        let env = session.env;
        let mut group = TaskGroup::new(parent);
        self.scope = group.token();
        let (assets_tx, mut assets_rx) = mpsc::channel(1);
        group.spawn(feeds::assets(
            Feed {
                api: env.api.clone(),
                token: group.token(),
                send_data: self.state.send_data.clone(),
                period: env.config.assets_period(),
            },
            assets_tx,
        ));

        let result = self.event_loop(session, &mut assets_rx).await;

        group.cancel();
        let fetched = group.wait().await;
        if let Err(e) = self.store.save(&self.profile.to_settings()) {
            tracing::error!(error = %e, "could not save settings");
        }
        settle(result, fetched)
    }

    async fn event_loop<B: Backend>(
        &mut self,
        session: &mut Session<'_, B>,
        assets_rx: &mut mpsc::Receiver<AssetSnapshot>,
    ) -> Result<()> {
        let scope = self.scope.clone();
        let mut tick = time::interval(session.env.config.redraw_period());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.draw(session)?;
        loop {
            let flow = tokio::select! {
                _ = scope.cancelled() => return Err(Error::Cancelled),
                key = next_key(session.keys) => self.handle_key(key?, session).await?,
                Some(snapshot) = assets_rx.recv() => {
                    self.snapshot = snapshot;
                    self.rebuild();
                    Flow::Stay
                }
                Some(lookup) = self.state.lookup_rx.recv() => self.state.on_lookup(lookup, &self.profile),
                _ = tick.tick() => {
                    if self.state.send_data.is_enabled() { Flow::Draw } else { Flow::Stay }
                }
            };
            if flow == Flow::Draw {
                self.draw(session)?;
            }
        }
    }

    pub fn draw<B: Backend>(&mut self, session: &mut Session<'_, B>) -> Result<()> {
        let env = session.env;
        session.draw(|f| pages::portfolio(f, self, &env.theme))
    }

    fn rebuild(&mut self) {
        let currency = self.profile.currency.label();
        self.coins.header[2] = format!("Price ({})", currency);
        self.coins.header[3] = format!("Change %({})", self.period.key());
        self.coins.header[5] = format!("Balance ({})", currency);

        self.summary = summarise(&self.snapshot.assets, &self.profile, self.period);
        self.coins.set_rows(self.summary.rows.clone());
        self.details.header[1] = format!("{:.2}", self.summary.total);
        self.details.set_rows(vec![
            TableRow::new(vec!["Currency".into(), currency]),
            TableRow::new(vec!["Coins".into(), self.profile.portfolio.len().to_string()]),
        ]);
        self.best.set_rows(performer_rows(&self.summary.performers, true));
        self.worst.set_rows(performer_rows(&self.summary.performers, false));
    }

    fn cursor_table(&mut self) -> Option<&mut TableView> {
        let modal = self.state.modal.modal();
        if modal == Modal::None {
            Some(&mut self.coins)
        } else {
            self.state.overlays.table_mut(modal)
        }
    }

    pub async fn handle_key<B: Backend>(&mut self, key: Key, session: &mut Session<'_, B>) -> Result<Flow> {
        if self.state.edit.is_some() {
            let flow = self.state.edit_key(key, &mut self.profile)?;
            if self.state.edit.is_none() {
                self.rebuild();
            }
            return Ok(flow);
        }

        let flow = match self.state.action(key) {
            Action::Quit => return Err(Error::UserQuit),
            Action::TogglePause => self.state.toggle_pause(),
            Action::Redraw => {
                session.clear()?;
                Flow::Draw
            }
            Action::Open(overlay) => {
                if overlay == Overlay::ChangeDuration {
                    self.state.overlays.select_period(self.period);
                }
                self.state.open(overlay, session.env, &self.scope, &self.profile);
                Flow::Draw
            }
            Action::Close => {
                self.state.modal.close();
                Flow::Draw
            }
            Action::Confirm => return self.confirm(session).await,
            Action::Edit => {
                let Some((id, symbol)) = self
                    .coins
                    .selected_row()
                    .map(|row| (row.id.clone(), row.cell(1).to_string()))
                else {
                    return Ok(Flow::Stay);
                };
                self.state.begin_edit(&id, &symbol, &self.profile)
            }
            Action::Sort { column, ascending } => {
                if let Some(table) = self.cursor_table() {
                    table.sort_by(column, ascending);
                }
                Flow::Draw
            }
            Action::Scroll(motion) => {
                if let Some(table) = self.cursor_table() {
                    table.scroll(motion);
                }
                Flow::Draw
            }
            Action::Focus(_)
            | Action::Star
            | Action::Unstar
            | Action::Input(_)
            | Action::Erase
            | Action::Ignore => Flow::Stay,
        };
        Ok(flow)
    }

    async fn confirm<B: Backend>(&mut self, session: &mut Session<'_, B>) -> Result<Flow> {
        match self.state.modal.modal() {
            Modal::None => {
                let Some((symbol, id)) = self
                    .coins
                    .selected_row()
                    .map(|row| (row.cell(1).to_string(), row.id.clone()))
                else {
                    return Ok(Flow::Stay);
                };
                let coin = super::resolve(&self.coin_ids, &symbol, &id);
                if !coin.has_primary() {
                    return Ok(Flow::Stay);
                }
                drilldown::drill_down(
                    session,
                    &self.scope,
                    &self.state.send_data,
                    &mut self.profile,
                    &symbol,
                    coin,
                )
                .await?;
                self.rebuild();
                Ok(Flow::Draw)
            }
            Modal::Currency => {
                if let Some(selection) = self.state.overlays.selected_currency() {
                    tracing::info!(currency = %selection.symbol, "currency changed");
                    self.profile.currency = selection;
                }
                self.state.modal.close();
                self.rebuild();
                Ok(Flow::Draw)
            }
            Modal::ChangeDuration => {
                if let Some(period) = self.state.overlays.selected_period() {
                    self.period = period;
                }
                self.state.modal.close();
                self.rebuild();
                Ok(Flow::Draw)
            }
            _ => Ok(Flow::Stay),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::stub::asset;

    fn assets() -> Vec<Asset> {
        let mut btc = asset("bitcoin", "btc", 1, 100.0, 5.0);
        btc.price_change_percentage_7d_in_currency = Some(-2.0);
        let mut eth = asset("ethereum", "eth", 2, 10.0, -1.0);
        eth.price_change_percentage_7d_in_currency = Some(8.0);
        vec![btc, eth, asset("tether", "usdt", 3, 1.0, 0.0)]
    }

    fn profile() -> Profile {
        let mut profile = Profile::default();
        profile.portfolio.insert("bitcoin".into(), 3.0);
        profile.portfolio.insert("ethereum".into(), 10.0);
        profile
    }

    #[test]
    fn holding_share_adds_up() {
        let summary = summarise(&assets(), &profile(), Period::Day);
        assert_eq!(summary.rows.len(), 2);
        assert!((summary.total - 400.0).abs() < 1e-9);
        let shares: Vec<f64> = summary.rows.iter().map(|r| r.cells[6].parse().unwrap()).collect();
        assert_eq!(shares, [75.0, 25.0]);
        assert_eq!(summary.rows[0].cells[4], "3.00000");
        assert_eq!(summary.shares[0].0, "BTC");
    }

    #[test]
    fn worthless_portfolio_has_no_share() {
        let mut profile = Profile::default();
        profile.portfolio.insert("tether".into(), 5.0);
        let mut assets = assets();
        assets[2].current_price = 0.0;
        let summary = summarise(&assets, &profile, Period::Day);
        assert_eq!(summary.rows[0].cells[6], PRICE_UNAVAILABLE);
        assert!(summary.shares.is_empty());
    }

    #[test]
    fn performers_only_consider_holdings() {
        let summary = summarise(&assets(), &profile(), Period::Day);
        let day = &summary.performers.iter().find(|(p, _)| *p == Period::Day).unwrap().1;
        assert_eq!(day.best_coin, "BTC");
        assert_eq!(day.worst_coin, "ETH");
        let week = &summary.performers.iter().find(|(p, _)| *p == Period::Week).unwrap().1;
        assert_eq!(week.best_coin, "ETH");

        let empty = summarise(&assets(), &Profile::default(), Period::Day);
        let rows = performer_rows(&empty.performers, true);
        assert_eq!(rows.len(), Period::PERFORMERS.len());
        assert_eq!(rows[0].cells[1], PRICE_UNAVAILABLE);
    }

    #[test]
    fn currency_changes_rebuild_balances() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("data.json"));
        let mut view = PortfolioView::new(store, profile(), CoinIdMap::default());
        view.snapshot = AssetSnapshot {
            assets: assets(),
            fetched_at: None,
        };
        view.rebuild();
        assert_eq!(view.details.header[1], "400.00");

        view.profile.currency.rate_usd = 4.0;
        view.rebuild();
        assert_eq!(view.details.header[1], "100.00");
        assert_eq!(view.best.rows().len(), Period::PERFORMERS.len());
    }
}
