use ratatui::backend::Backend;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::keys::Key;
use super::modal::{Action, Modal, Overlay, Pane, SearchMode, ViewKind};
use super::table::{TableRow, TableView};
use super::{drilldown, next_key, settle, Flow, Session, ViewState};
use crate::api;
use crate::error::{Error, Result};
use crate::fetch::feeds::{self, Feed};
use crate::fetch::{SendData, TaskGroup};
use crate::settings::{Profile, SettingsStore};
use crate::types::{Asset, AssetSnapshot, CoinIdMap, Period, TopCoins};
use crate::ui::pages;
use crate::utils::format::{change_cell, format_price, supply_cell};
use crate::utils::sort::TableKind;

const LOOKUP_LIMIT: usize = 25;

/// Coin table rows for one snapshot, prices converted to the display
/// currency and changes taken over `period`.
pub fn coin_rows(assets: &[Asset], profile: &Profile, period: Period) -> Vec<TableRow> {
    let currency = &profile.currency;
    assets
        .iter()
        .map(|a| {
            TableRow::named(
                vec![
                    a.market_cap_rank.map(|r| r.to_string()).unwrap_or_default(),
                    a.ticker(),
                    format_price(currency.convert(a.current_price)),
                    change_cell(a.percent_change(period)),
                    supply_cell(a.circulating_supply, a.max_supply),
                ],
                a.name.clone(),
            )
            .with_id(a.id.clone())
        })
        .collect()
}

/// Favourites present in the snapshot.
pub fn favourite_rows(assets: &[Asset], profile: &Profile) -> Vec<TableRow> {
    let currency = &profile.currency;
    assets
        .iter()
        .filter(|a| profile.favourites.contains(&a.id))
        .map(|a| {
            TableRow::named(
                vec![a.ticker(), format_price(currency.convert(a.current_price))],
                a.name.clone(),
            )
            .with_id(a.id.clone())
        })
        .collect()
}

/// The default dashboard: top coin graphs, favourites and the coin table.
pub struct AllCoinsView {
    pub state: ViewState,
    store: SettingsStore,
    pub profile: Profile,
    coin_ids: CoinIdMap,
    pub period: Period,
    pub snapshot: AssetSnapshot,
    pub top: TopCoins,
    pub favourites: TableView,
    pub coins: TableView,
    scope: CancellationToken,
}

impl AllCoinsView {
    pub fn new(store: SettingsStore, profile: Profile, coin_ids: CoinIdMap) -> Self {
        let mut view = Self {
            state: ViewState::new(ViewKind::AllCoins, Pane::Main, SendData::default()),
            store,
            profile,
            coin_ids,
            period: Period::Day,
            snapshot: AssetSnapshot::default(),
            top: TopCoins::default(),
            favourites: TableView::new("Favourites", &["Symbol", "Price"], TableKind::Favourites),
            coins: TableView::new(
                "Coins",
                &["Rank", "Symbol", "Price", "Change %", "Supply / MaxSupply"],
                TableKind::Coins,
            ),
            scope: CancellationToken::new(),
        };
        view.relabel();
        view
    }

    /// Load saved settings and coin ids, then run until the user quits.
    pub async fn launch<B: Backend>(
        session: &mut Session<'_, B>,
        store: SettingsStore,
        token: &CancellationToken,
    ) -> Result<()> {
        let api = session.env.api.clone();
        let settings = store.load();
        let currency = api::resolve_currency(api.as_ref(), &settings.currency).await;
        let coin_ids = api::build_coin_ids(api.as_ref()).await?;
        tracing::info!(symbols = coin_ids.symbol_count(), currency = %currency.symbol, "all coins view starting");
        let mut view = Self::new(store, Profile::new(settings, currency), coin_ids);
        view.run(session, token).await
    }

    pub async fn run<B: Backend>(&mut self, session: &mut Session<'_, B>, parent: &CancellationToken) -> Result<()> {
        let env = session.env;
        let config = &env.config;
        let mut group = TaskGroup::new(parent);
        self.scope = group.token();

        let feed = Feed {
            api: env.api.clone(),
            token: group.token(),
            send_data: self.state.send_data.clone(),
            period: config.assets_period(),
        };
        let (assets_tx, mut assets_rx) = mpsc::channel(1);
        let (top_tx, mut top_rx) = mpsc::channel(1);
        group.spawn(feeds::top_coins(feed.with_period(config.top_coins_period()), top_tx));
        group.spawn(feeds::assets(feed, assets_tx));

        let result = self.event_loop(session, &mut assets_rx, &mut top_rx).await;

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
        top_rx: &mut mpsc::Receiver<TopCoins>,
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
                    self.apply_snapshot(snapshot);
                    Flow::Stay
                }
                Some(top) = top_rx.recv() => {
                    self.top = top;
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
        session.draw(|f| pages::all_coins(f, self, &env.theme))
    }

    /// Replace the snapshot and rebuild every row from it.
    pub fn apply_snapshot(&mut self, snapshot: AssetSnapshot) {
        self.snapshot = snapshot;
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.relabel();
        self.coins
            .set_rows(coin_rows(&self.snapshot.assets, &self.profile, self.period));
        self.favourites
            .set_rows(favourite_rows(&self.snapshot.assets, &self.profile));
    }

    fn relabel(&mut self) {
        let currency = self.profile.currency.label();
        self.coins.header[2] = format!("Price ({})", currency);
        self.coins.header[3] = format!("Change %({})", self.period.key());
        self.favourites.header[1] = format!("Price ({})", currency);
    }

    fn page_table(&mut self) -> &mut TableView {
        match self.state.modal.pane() {
            Pane::Main => &mut self.coins,
            Pane::Favourites => &mut self.favourites,
        }
    }

    fn cursor_table(&mut self) -> Option<&mut TableView> {
        let modal = self.state.modal.modal();
        if modal == Modal::None {
            Some(self.page_table())
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
                let filtering = self.state.overlays.search.mode == SearchMode::Filter;
                if self.state.modal.close() == Modal::Search && filtering {
                    self.coins.set_filter("");
                }
                Flow::Draw
            }
            Action::Confirm => return self.confirm(session).await,
            Action::Edit => self.edit(),
            Action::Star => self.star(),
            Action::Unstar => self.unstar(),
            Action::Focus(pane) => {
                self.state.modal.focus(pane);
                Flow::Draw
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
            Action::Input(c) => {
                self.state.overlays.search.push(c);
                self.apply_filter();
                Flow::Draw
            }
            Action::Erase => {
                self.state.overlays.search.pop();
                self.apply_filter();
                Flow::Draw
            }
            Action::Ignore => Flow::Stay,
        };
        Ok(flow)
    }

    fn apply_filter(&mut self) {
        let search = &self.state.overlays.search;
        if search.mode == SearchMode::Filter {
            self.coins.set_filter(&search.query);
        }
    }

    async fn confirm<B: Backend>(&mut self, session: &mut Session<'_, B>) -> Result<Flow> {
        match self.state.modal.modal() {
            Modal::None => {
                let symbol_cell = match self.state.modal.pane() {
                    Pane::Main => 1,
                    Pane::Favourites => 0,
                };
                let Some((symbol, id)) = self
                    .page_table()
                    .selected_row()
                    .map(|row| (row.cell(symbol_cell).to_string(), row.id.clone()))
                else {
                    return Ok(Flow::Stay);
                };
                self.open_coin(session, &symbol, &id).await
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
            Modal::Search => self.confirm_search(session).await,
            Modal::Help | Modal::Portfolio => Ok(Flow::Stay),
        }
    }

    async fn confirm_search<B: Backend>(&mut self, session: &mut Session<'_, B>) -> Result<Flow> {
        let search = &mut self.state.overlays.search;
        if search.mode == SearchMode::Filter {
            self.state.modal.close();
            return Ok(Flow::Draw);
        }
        if search.has_fresh_results() {
            let Some(row) = search.results.selected_row() else {
                return Ok(Flow::Stay);
            };
            let (symbol, id) = (row.cell(0).to_string(), row.id.clone());
            self.state.modal.close();
            return self.open_coin(session, &symbol, &id).await;
        }
        let ids = search.lookup_ids(&self.coin_ids, LOOKUP_LIMIT);
        if ids.is_empty() {
            search.missing = true;
            search.searched = Some(search.query.clone());
        } else {
            self.state.search(session.env, &self.scope, ids);
        }
        Ok(Flow::Draw)
    }

    async fn open_coin<B: Backend>(&mut self, session: &mut Session<'_, B>, symbol: &str, id: &str) -> Result<Flow> {
        let coin = super::resolve(&self.coin_ids, symbol, id);
        if !coin.has_primary() {
            tracing::debug!(symbol, "no provider id for coin");
            return Ok(Flow::Stay);
        }
        drilldown::drill_down(
            session,
            &self.scope,
            &self.state.send_data,
            &mut self.profile,
            symbol,
            coin,
        )
        .await?;
        self.rebuild();
        Ok(Flow::Draw)
    }

    fn edit(&mut self) -> Flow {
        let (id, symbol) = match self.state.modal.modal() {
            Modal::Portfolio => match self.state.overlays.portfolio.selected_row() {
                Some(row) => (row.id.clone(), row.cell(1).to_string()),
                None => return Flow::Stay,
            },
            _ => {
                let pane = self.state.modal.pane();
                match self.page_table().selected_row() {
                    Some(row) if pane == Pane::Main => (row.id.clone(), row.cell(1).to_string()),
                    Some(row) => (row.id.clone(), row.cell(0).to_string()),
                    None => return Flow::Stay,
                }
            }
        };
        self.state.begin_edit(&id, &symbol, &self.profile)
    }

    fn star(&mut self) -> Flow {
        if self.state.modal.pane() != Pane::Main {
            return Flow::Stay;
        }
        let Some(id) = self.coins.selected_row().map(|r| r.id.clone()) else {
            return Flow::Stay;
        };
        if self.profile.star(&id) {
            tracing::debug!(coin = %id, "starred");
            self.rebuild();
        }
        Flow::Draw
    }

    /// Unstar the selected coin, from either table.
    fn unstar(&mut self) -> Flow {
        let Some(id) = self.page_table().selected_row().map(|r| r.id.clone()) else {
            return Flow::Stay;
        };
        if self.profile.unstar(&id) {
            tracing::debug!(coin = %id, "unstarred");
            self.rebuild();
        }
        Flow::Draw
    }
}
