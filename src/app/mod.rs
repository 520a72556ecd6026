//! View controllers and the state they share.

pub mod all_coins;
pub mod coin;
pub mod drilldown;
pub mod keys;
pub mod modal;
pub mod overlays;
pub mod portfolio;
pub mod table;

use std::sync::Arc;

use ratatui::backend::Backend;
use ratatui::{Frame, Terminal};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::MarketApi;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::feeds::{self, Lookup};
use crate::fetch::SendData;
use crate::settings::{HoldingChange, Profile};
use crate::theme::Theme;
use crate::types::{CoinId, CoinIdMap};
use keys::Key;
use modal::{dispatch, Action, Modal, ModalState, Overlay, Pane, ViewKind};
use overlays::{EditBox, EditOutcome, Overlays};

pub use all_coins::AllCoinsView;
pub use portfolio::PortfolioView;

/// Read-only collaborators every view needs.
pub struct Env {
    pub api: Arc<dyn MarketApi>,
    pub config: Config,
    pub theme: Theme,
}

/// The terminal and keyboard a view borrows while it runs. A drill-down
/// reuses its parent's session.
pub struct Session<'a, B: Backend> {
    pub terminal: &'a mut Terminal<B>,
    pub keys: &'a mut mpsc::Receiver<Key>,
    pub env: &'a Env,
}

impl<B: Backend> Session<'_, B> {
    pub fn draw<F>(&mut self, render: F) -> Result<()>
    where
        F: FnOnce(&mut Frame),
    {
        self.terminal
            .draw(render)
            .map(|_| ())
            .map_err(|e| Error::Render(e.to_string()))
    }

    pub fn clear(&mut self) -> Result<()> {
        self.terminal.clear().map_err(|e| Error::Render(e.to_string()))
    }
}

/// Whether handling an event needs a redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Stay,
    Draw,
}

/// Input state common to every view: the overlay machine, overlay tables,
/// the open edit box and the pause flag shared with the view's fetchers.
pub struct ViewState {
    pub kind: ViewKind,
    pub modal: ModalState,
    pub overlays: Overlays,
    pub edit: Option<EditBox>,
    pub send_data: SendData,
    last_key: Option<Key>,
    lookup_tx: mpsc::Sender<Lookup>,
    pub lookup_rx: mpsc::Receiver<Lookup>,
}

impl ViewState {
    pub fn new(kind: ViewKind, pane: Pane, send_data: SendData) -> Self {
        let (lookup_tx, lookup_rx) = mpsc::channel(4);
        Self {
            kind,
            modal: ModalState::new(pane),
            overlays: Overlays::new(kind),
            edit: None,
            send_data,
            last_key: None,
            lookup_tx,
            lookup_rx,
        }
    }

    /// Interpret `key` in the current state.
    pub fn action(&mut self, key: Key) -> Action {
        let action = dispatch(self.kind, self.modal.modal(), key, self.last_key);
        self.last_key = Some(key);
        action
    }

    /// Open an overlay, starting any lookup it needs under `scope`.
    pub fn open(&mut self, overlay: Overlay, env: &Env, scope: &CancellationToken, profile: &Profile) -> bool {
        if !self.modal.open(overlay.modal()) {
            return false;
        }
        match overlay {
            Overlay::Currency { full } => {
                self.overlays.reset_currencies();
                tokio::spawn(feeds::currencies(
                    env.api.clone(),
                    scope.clone(),
                    full,
                    self.lookup_tx.clone(),
                ));
            }
            Overlay::Portfolio => {
                self.overlays.reset_holdings(profile);
                let ids = profile.portfolio.keys().cloned().collect();
                tokio::spawn(feeds::coin_prices(
                    env.api.clone(),
                    scope.clone(),
                    ids,
                    Lookup::Holdings,
                    self.lookup_tx.clone(),
                ));
            }
            Overlay::Search(mode) => self.overlays.search.reset(mode),
            Overlay::Help | Overlay::ChangeDuration => {}
        }
        tracing::debug!(view = ?self.kind, overlay = ?overlay, "overlay opened");
        true
    }

    /// Start a price lookup for the search overlay.
    pub fn search(&mut self, env: &Env, scope: &CancellationToken, ids: Vec<String>) {
        self.overlays.search.searched = Some(self.overlays.search.query.clone());
        tokio::spawn(feeds::coin_prices(
            env.api.clone(),
            scope.clone(),
            ids,
            Lookup::Search,
            self.lookup_tx.clone(),
        ));
    }

    /// Fold a finished lookup into its overlay. Late results for an overlay
    /// that has since closed are dropped.
    pub fn on_lookup(&mut self, lookup: Lookup, profile: &Profile) -> Flow {
        let modal = self.modal.modal();
        match lookup {
            Lookup::Currencies(fetched) if modal == Modal::Currency => match fetched {
                Ok(list) => self.overlays.set_currencies(list, &profile.currency),
                Err(e) => self.overlays.fail_currencies(e),
            },
            Lookup::Holdings(fetched) if modal == Modal::Portfolio => match fetched {
                Ok(prices) => self.overlays.set_holdings(prices, profile),
                Err(e) => self.overlays.fail_holdings(e),
            },
            Lookup::Search(fetched) if modal == Modal::Search => match fetched {
                Ok(prices) => self.overlays.search.set_results(&prices, &profile.currency),
                Err(e) => self.overlays.search.set_failed(e),
            },
            _ => return Flow::Stay,
        }
        Flow::Draw
    }

    pub fn begin_edit(&mut self, id: &str, symbol: &str, profile: &Profile) -> Flow {
        if id.is_empty() {
            return Flow::Stay;
        }
        self.edit = Some(EditBox::open(id, symbol, profile.holding(id), &self.send_data));
        Flow::Draw
    }

    /// Route a key to the open edit box. Closing the box resumes the
    /// fetchers.
    pub fn edit_key(&mut self, key: Key, profile: &mut Profile) -> Result<Flow> {
        let Some(edit) = self.edit.as_mut() else {
            return Ok(Flow::Stay);
        };
        match edit.key(key) {
            EditOutcome::Editing => return Ok(Flow::Draw),
            EditOutcome::Quit => return Err(Error::UserQuit),
            EditOutcome::Cancelled => {}
            EditOutcome::Submitted(input) => match profile.apply_amount(&edit.id, &input) {
                HoldingChange::Set(amount) => {
                    tracing::info!(coin = %edit.id, amount, "holding updated");
                }
                HoldingChange::Removed => {
                    tracing::info!(coin = %edit.id, "holding removed");
                }
            },
        }
        self.edit = None;
        self.overlays.refresh_holdings(profile);
        Ok(Flow::Draw)
    }

    pub fn toggle_pause(&self) -> Flow {
        let running = self.send_data.toggle();
        tracing::info!(view = ?self.kind, running, "updates toggled");
        Flow::Draw
    }
}

/// Wait for the next key, treating a closed keyboard source as the end of
/// the session.
pub async fn next_key(keys: &mut mpsc::Receiver<Key>) -> Result<Key> {
    keys.recv().await.ok_or(Error::Cancelled)
}

/// Merge a view's own result with the result of its fetchers. A view
/// cancelled because a fetcher failed reports that failure instead.
pub fn settle(result: Result<()>, fetched: Result<()>) -> Result<()> {
    match result {
        Err(Error::Cancelled) => fetched.and(Err(Error::Cancelled)),
        other => other,
    }
}

/// Provider ids for a row. `row_id` is the primary id the row was built
/// from, when known; the secondary id comes from the symbol listing.
pub fn resolve(coin_ids: &CoinIdMap, symbol: &str, row_id: &str) -> CoinId {
    let mut id = coin_ids.get(symbol).cloned().unwrap_or_default();
    if !row_id.is_empty() {
        id.primary = row_id.to_string();
    }
    id
}
