use std::collections::BTreeMap;

use ratatui::backend::Backend;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::keys::Key;
use super::modal::{Action, Modal, Overlay, Pane, ViewKind};
use super::table::{TableRow, TableView};
use super::{next_key, Flow, Session, ViewState};
use crate::error::{Error, Result};
use crate::fetch::feeds::PRICE_UNAVAILABLE;
use crate::fetch::SendData;
use crate::settings::Profile;
use crate::types::{CoinData, CoinDetails, CoinId, Period, PriceHistory};
use crate::ui::pages;
use crate::utils::format::{change_cell, format_price};
use crate::utils::sort::TableKind;

/// Detail page of one coin. Borrows the parent's profile so favourites,
/// holdings and currency changes survive the return.
pub struct CoinView<'p> {
    pub state: ViewState,
    pub profile: &'p mut Profile,
    pub symbol: String,
    pub id: CoinId,
    pub period: Period,
    pub history: PriceHistory,
    pub details: Option<CoinDetails>,
    pub live_price: String,
    pub favourites: TableView,
    pub changes: TableView,
    favourite_prices: BTreeMap<String, f64>,
    interval: watch::Sender<Period>,
}

impl<'p> CoinView<'p> {
    pub fn new(
        symbol: &str,
        id: CoinId,
        profile: &'p mut Profile,
        send_data: SendData,
        interval: watch::Sender<Period>,
    ) -> Self {
        let live_price = if id.has_secondary() {
            String::new()
        } else {
            PRICE_UNAVAILABLE.to_string()
        };
        let period = *interval.borrow();
        let mut view = Self {
            state: ViewState::new(ViewKind::Coin, Pane::Favourites, send_data),
            profile,
            symbol: symbol.to_uppercase(),
            id,
            period,
            history: PriceHistory::default(),
            details: None,
            live_price,
            favourites: TableView::new("Favourites", &["Symbol", "Price"], TableKind::Favourites),
            changes: TableView::new("Change %", &["Duration", "Change"], TableKind::Plain),
            favourite_prices: BTreeMap::new(),
            interval,
        };
        view.relabel();
        view
    }

    pub async fn run<B: Backend>(
        &mut self,
        session: &mut Session<'_, B>,
        scope: &CancellationToken,
        data_rx: &mut mpsc::Receiver<CoinData>,
        price_rx: &mut mpsc::Receiver<String>,
    ) -> Result<()> {
        let mut tick = time::interval(session.env.config.redraw_period());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.draw(session)?;
        loop {
            let flow = tokio::select! {
                _ = scope.cancelled() => return Err(Error::Cancelled),
                key = next_key(session.keys) => self.handle_key(key?, session, scope)?,
                Some(data) = data_rx.recv() => {
                    self.apply(data);
                    Flow::Stay
                }
                Some(price) = price_rx.recv() => {
                    self.live_price = price;
                    Flow::Draw
                }
                Some(lookup) = self.state.lookup_rx.recv() => self.state.on_lookup(lookup, self.profile),
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
        session.draw(|f| pages::coin(f, self, &env.theme))
    }

    pub fn apply(&mut self, data: CoinData) {
        match data {
            CoinData::History(history) => self.history = history,
            CoinData::Details(details) => {
                self.details = Some(*details);
                self.rebuild_changes();
            }
            CoinData::Favourites(prices) => {
                self.favourite_prices = prices;
                self.rebuild_favourites();
            }
        }
    }

    fn rebuild_changes(&mut self) {
        let Some(details) = &self.details else { return };
        let rows = details
            .changes
            .iter()
            .map(|(period, pct)| {
                TableRow::new(vec![period.label().to_string(), change_cell(*pct)]).with_id(period.key())
            })
            .collect();
        self.changes.set_rows(rows);
    }

    fn rebuild_favourites(&mut self) {
        let currency = &self.profile.currency;
        let rows = self
            .favourite_prices
            .iter()
            .map(|(symbol, price)| TableRow::new(vec![symbol.clone(), format_price(currency.convert(*price))]))
            .collect();
        self.favourites.set_rows(rows);
    }

    fn relabel(&mut self) {
        self.favourites.header[1] = format!("Price ({})", self.profile.currency.label());
    }

    /// Switch the history window. The history fetcher refetches at once.
    pub fn set_period(&mut self, period: Period) {
        if self.period == period {
            return;
        }
        tracing::debug!(coin = %self.id.primary, period = period.key(), "history window changed");
        self.period = period;
        self.history = PriceHistory::default();
        self.interval.send_replace(period);
    }

    fn page_table(&mut self) -> &mut TableView {
        match self.state.modal.pane() {
            Pane::Main => &mut self.changes,
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

    pub fn handle_key<B: Backend>(
        &mut self,
        key: Key,
        session: &mut Session<'_, B>,
        scope: &CancellationToken,
    ) -> Result<Flow> {
        if self.state.edit.is_some() {
            return self.state.edit_key(key, self.profile);
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
                self.state.open(overlay, session.env, scope, self.profile);
                Flow::Draw
            }
            Action::Close => {
                self.state.modal.close();
                Flow::Draw
            }
            Action::Confirm => self.confirm(),
            Action::Edit => self.edit(),
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
            Action::Star | Action::Unstar | Action::Input(_) | Action::Erase | Action::Ignore => Flow::Stay,
        };
        Ok(flow)
    }

    fn confirm(&mut self) -> Flow {
        match self.state.modal.modal() {
            Modal::None if self.state.modal.pane() == Pane::Main => {
                let picked = self
                    .changes
                    .selected_row()
                    .and_then(|row| Period::from_label(&row.id));
                match picked {
                    Some(period) => {
                        self.set_period(period);
                        Flow::Draw
                    }
                    None => Flow::Stay,
                }
            }
            Modal::Currency => {
                if let Some(selection) = self.state.overlays.selected_currency() {
                    tracing::info!(currency = %selection.symbol, "currency changed");
                    self.profile.currency = selection;
                }
                self.state.modal.close();
                self.relabel();
                self.rebuild_favourites();
                Flow::Draw
            }
            Modal::ChangeDuration => {
                if let Some(period) = self.state.overlays.selected_period() {
                    self.set_period(period);
                }
                self.state.modal.close();
                Flow::Draw
            }
            _ => Flow::Stay,
        }
    }

    fn edit(&mut self) -> Flow {
        if self.state.modal.modal() == Modal::Portfolio {
            let Some((id, symbol)) = self
                .state
                .overlays
                .portfolio
                .selected_row()
                .map(|row| (row.id.clone(), row.cell(1).to_string()))
            else {
                return Flow::Stay;
            };
            return self.state.begin_edit(&id, &symbol, self.profile);
        }
        let id = self.id.primary.clone();
        self.state.begin_edit(&id, &self.symbol, self.profile)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    use super::*;
    use crate::api::stub::StubApi;
    use crate::app::Env;
    use crate::config::Config;
    use crate::theme::Theme;

    fn details() -> CoinDetails {
        CoinDetails {
            name: "Bitcoin".into(),
            symbol: "btc".into(),
            changes: [(Period::Day, 2.0), (Period::Week, -3.5), (Period::Year, 40.0)]
                .into_iter()
                .collect(),
            ..Default::default()
        }
    }

    fn coin_id() -> CoinId {
        CoinId {
            primary: "bitcoin".into(),
            secondary: String::new(),
        }
    }

    #[tokio::test]
    async fn change_table_sets_history_window() {
        let env = Env {
            api: Arc::new(StubApi::default()),
            config: Config::default(),
            theme: Theme::default(),
        };
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        let (_tx, mut keys) = mpsc::channel(1);
        let mut session = Session {
            terminal: &mut terminal,
            keys: &mut keys,
            env: &env,
        };
        let scope = CancellationToken::new();
        let mut profile = Profile::default();
        let (interval, mut watcher) = watch::channel(Period::Day);
        let mut view = CoinView::new("btc", coin_id(), &mut profile, SendData::default(), interval);
        assert_eq!(view.live_price, PRICE_UNAVAILABLE);

        view.apply(CoinData::Details(Box::new(details())));
        assert_eq!(view.changes.rows().len(), 3);

        for key in [Key::Char('F'), Key::Char('j')] {
            view.handle_key(key, &mut session, &scope).unwrap();
        }
        view.handle_key(Key::Enter, &mut session, &scope).unwrap();
        assert_eq!(view.period, Period::Week);
        assert!(watcher.has_changed().unwrap());
        assert_eq!(*watcher.borrow_and_update(), Period::Week);

        let quit = view.handle_key(Key::Esc, &mut session, &scope);
        assert!(matches!(quit, Err(Error::UserQuit)));
    }

    #[tokio::test]
    async fn holding_edits_reach_the_parent_profile() {
        let env = Env {
            api: Arc::new(StubApi::default()),
            config: Config::default(),
            theme: Theme::default(),
        };
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        let (_tx, mut keys) = mpsc::channel(1);
        let mut session = Session {
            terminal: &mut terminal,
            keys: &mut keys,
            env: &env,
        };
        let scope = CancellationToken::new();
        let mut profile = Profile::default();
        let send_data = SendData::default();
        {
            let (interval, _watcher) = watch::channel(Period::Day);
            let mut view = CoinView::new("btc", coin_id(), &mut profile, send_data.clone(), interval);
            for key in [Key::Char('e'), Key::Char('3'), Key::Enter] {
                view.handle_key(key, &mut session, &scope).unwrap();
            }
            assert!(send_data.is_enabled());
        }
        assert_eq!(profile.holding("bitcoin"), Some(3.0));
    }

    #[test]
    fn favourites_follow_the_currency() {
        let mut profile = Profile::default();
        profile.currency.rate_usd = 2.0;
        let (interval, _watcher) = watch::channel(Period::Day);
        let mut view = CoinView::new("btc", coin_id(), &mut profile, SendData::default(), interval);
        view.apply(CoinData::Favourites([("ETH".to_string(), 3000.0)].into_iter().collect()));
        assert_eq!(view.favourites.rows()[0].cells, ["ETH", "1,500.00"]);
    }
}
