//! State behind the overlays every view shares.

use super::keys::Key;
use super::modal::{Modal, SearchMode, ViewKind};
use super::table::{TableRow, TableView};
use crate::fetch::{PauseGuard, SendData};
use crate::settings::Profile;
use crate::types::{CoinIdMap, CoinPrice, Currency, CurrencySelection, Period};
use crate::utils::format::{format_amount, format_price};
use crate::utils::sort::{SortState, TableKind};

const NAVIGATION: &[&str] = &[
    "Quit: q or <C-c>",
    "Pause updates: p",
    "",
    "Table navigation",
    "  k or <Up>: up",
    "  j or <Down>: down",
    "  <C-u> / <C-d>: half page up / down",
    "  <C-b> / <C-f>: page up / down",
    "  gg or <Home>: top",
    "  G or <End>: bottom",
];

const SORTING: &[&str] = &[
    "",
    "Sorting",
    "  1-7: sort ascending on that column",
    "  <F1>-<F7>: sort descending on that column",
];

const CLOSE: &[&str] = &["", "Close this overlay: <Esc>"];

fn help_lines(view: ViewKind) -> Vec<&'static str> {
    let specific: &[&str] = match view {
        ViewKind::AllCoins => &[
            "  f: focus favourites table",
            "  F: focus coin table",
            "",
            "Actions",
            "  c / C: currency (popular / full list)",
            "  %: change duration",
            "  e: add or edit holding",
            "  s / S: star / unstar",
            "  P: portfolio",
            "  /: filter coins",
            "  <C-s>: find any coin",
            "  <Enter>: coin details",
        ],
        ViewKind::Portfolio => &[
            "",
            "Actions",
            "  c / C: currency (popular / full list)",
            "  %: change duration",
            "  e: edit holding",
            "  <Enter>: coin details",
        ],
        ViewKind::Coin => &[
            "  f: focus favourites table",
            "  F: focus change table",
            "",
            "Actions",
            "  c / C: currency (popular / full list)",
            "  %: price history duration",
            "  <Enter> on change table: use that duration",
            "  e: add or edit holding",
            "  P: portfolio",
            "  <Esc>: back",
        ],
    };
    NAVIGATION
        .iter()
        .chain(specific)
        .chain(SORTING)
        .chain(CLOSE)
        .copied()
        .collect()
}

/// Query and results of the search overlay.
#[derive(Debug, Clone)]
pub struct SearchBox {
    pub mode: SearchMode,
    pub query: String,
    pub results: TableView,
    /// Query the current results were fetched for.
    pub searched: Option<String>,
    pub missing: bool,
    pub error: Option<String>,
}

impl SearchBox {
    const MAX_QUERY: usize = 16;

    fn new() -> Self {
        Self {
            mode: SearchMode::Filter,
            query: String::new(),
            results: TableView::new("Results", &["Symbol", "Name", "Price"], TableKind::Plain),
            searched: None,
            missing: false,
            error: None,
        }
    }

    pub fn reset(&mut self, mode: SearchMode) {
        self.mode = mode;
        self.query.clear();
        self.results.set_rows(Vec::new());
        self.searched = None;
        self.missing = false;
        self.error = None;
    }

    pub fn push(&mut self, c: char) -> bool {
        if self.query.chars().count() >= Self::MAX_QUERY {
            return false;
        }
        self.query.push(c);
        self.missing = false;
        self.error = None;
        true
    }

    pub fn pop(&mut self) -> bool {
        self.missing = false;
        self.error = None;
        self.query.pop().is_some()
    }

    /// Whether Enter should open the highlighted result rather than search.
    pub fn has_fresh_results(&self) -> bool {
        self.searched.as_deref() == Some(self.query.as_str()) && self.results.visible_len() > 0
    }

    /// Primary ids of listed symbols matching the query.
    pub fn lookup_ids(&self, coin_ids: &CoinIdMap, limit: usize) -> Vec<String> {
        coin_ids
            .search(self.query.trim())
            .into_iter()
            .take(limit)
            .map(|(_, id)| id.primary)
            .collect()
    }

    pub fn set_results(&mut self, prices: &[CoinPrice], currency: &CurrencySelection) {
        let rows = prices
            .iter()
            .map(|p| {
                TableRow::named(
                    vec![
                        p.symbol.clone(),
                        p.name.clone(),
                        format_price(currency.convert(p.price)),
                    ],
                    p.name.clone(),
                )
                .with_id(p.id.clone())
            })
            .collect::<Vec<_>>();
        self.missing = rows.is_empty();
        self.error = None;
        self.results.set_rows(rows);
        self.results.selected = 0;
    }

    pub fn set_failed(&mut self, error: String) {
        self.results.set_rows(Vec::new());
        self.missing = false;
        self.error = Some(error);
    }
}

/// Progress of the lookup that fills a list overlay.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Loading {
    #[default]
    Pending,
    Done,
    Failed(String),
}

/// Tables of the list overlays, one per modal.
#[derive(Debug, Clone)]
pub struct Overlays {
    pub help: TableView,
    pub currency: TableView,
    currencies: Vec<Currency>,
    currencies_loading: Loading,
    pub duration: TableView,
    pub portfolio: TableView,
    holdings: Vec<CoinPrice>,
    holdings_loading: Loading,
    pub search: SearchBox,
}

impl Overlays {
    pub fn new(view: ViewKind) -> Self {
        let mut help = TableView::new("Keybindings", &["Key"], TableKind::Plain);
        help.set_rows(
            help_lines(view)
                .into_iter()
                .map(|l| TableRow::new(vec![l.to_string()]))
                .collect(),
        );

        let mut duration = TableView::new("Change duration", &["Duration"], TableKind::Plain);
        duration.set_rows(
            Period::ALL
                .iter()
                .map(|p| TableRow::new(vec![p.label().to_string()]).with_id(p.key()))
                .collect(),
        );

        Self {
            help,
            currency: TableView::new(
                "Select currency",
                &["Symbol", "Sign", "Type", "USD rate"],
                TableKind::Plain,
            ),
            currencies: Vec::new(),
            currencies_loading: Loading::Pending,
            duration,
            portfolio: TableView::new(
                "Portfolio",
                &["Coin", "Symbol", "Price", "Holding", "Balance"],
                TableKind::MiniPortfolio,
            ),
            holdings: Vec::new(),
            holdings_loading: Loading::Pending,
            search: SearchBox::new(),
        }
    }

    /// The table that owns the cursor while `modal` is open.
    pub fn table_mut(&mut self, modal: Modal) -> Option<&mut TableView> {
        match modal {
            Modal::None => None,
            Modal::Help => Some(&mut self.help),
            Modal::Currency => Some(&mut self.currency),
            Modal::ChangeDuration => Some(&mut self.duration),
            Modal::Portfolio => Some(&mut self.portfolio),
            Modal::Search => Some(&mut self.search.results),
        }
    }

    /// Text drawn in place of an empty overlay table: still loading, the
    /// lookup failed, or it came back with nothing.
    pub fn placeholder(&self, modal: Modal) -> Option<String> {
        let (table, loading, empty) = match modal {
            Modal::Currency => (&self.currency, &self.currencies_loading, "No currencies available"),
            Modal::Portfolio => (&self.portfolio, &self.holdings_loading, "No holdings"),
            _ => return None,
        };
        if !table.rows().is_empty() {
            return None;
        }
        let text = match loading {
            Loading::Pending => "Loading...".to_string(),
            Loading::Failed(e) => format!("Could not load: {}", e),
            Loading::Done => empty.to_string(),
        };
        Some(text)
    }

    pub fn reset_currencies(&mut self) {
        self.currencies.clear();
        self.currencies_loading = Loading::Pending;
        self.currency.set_rows(Vec::new());
    }

    pub fn fail_currencies(&mut self, error: String) {
        self.currencies_loading = Loading::Failed(error);
    }

    /// Fill the picker and put the cursor on the current currency.
    pub fn set_currencies(&mut self, currencies: Vec<Currency>, current: &CurrencySelection) {
        let rows = currencies
            .iter()
            .map(|c| {
                TableRow::new(vec![
                    c.symbol.clone(),
                    c.currency_symbol.clone().unwrap_or_default(),
                    c.kind.clone(),
                    format!("{:.6}", c.rate()),
                ])
                .with_id(c.id.clone())
            })
            .collect::<Vec<_>>();
        self.currency.set_rows(rows);
        self.currency.selected = self
            .currency
            .rows()
            .iter()
            .position(|r| r.id == current.id)
            .unwrap_or(0);
        self.currency.clamp();
        self.currencies = currencies;
        self.currencies_loading = Loading::Done;
    }

    pub fn selected_currency(&self) -> Option<CurrencySelection> {
        let row = self.currency.selected_row()?;
        self.currencies
            .iter()
            .find(|c| c.id == row.id)
            .map(CurrencySelection::from_currency)
    }

    pub fn select_period(&mut self, period: Period) {
        self.duration.selected = Period::ALL.iter().position(|p| *p == period).unwrap_or(0);
        self.duration.clamp();
    }

    pub fn selected_period(&self) -> Option<Period> {
        self.duration
            .selected_row()
            .and_then(|r| Period::from_label(r.cell(0)))
    }

    /// Empty the mini portfolio before its prices are fetched. It opens
    /// sorted by balance, largest first.
    pub fn reset_holdings(&mut self, profile: &Profile) {
        self.holdings.clear();
        self.holdings_loading = Loading::Pending;
        self.portfolio.sort = SortState::by(4, false);
        self.refresh_holdings(profile);
    }

    /// Keep fresh prices of the held coins and rebuild the mini portfolio.
    pub fn set_holdings(&mut self, prices: Vec<CoinPrice>, profile: &Profile) {
        self.holdings = prices;
        self.holdings_loading = Loading::Done;
        self.refresh_holdings(profile);
    }

    pub fn fail_holdings(&mut self, error: String) {
        self.holdings_loading = Loading::Failed(error);
    }

    /// Rebuild the mini portfolio after holdings or currency changed.
    pub fn refresh_holdings(&mut self, profile: &Profile) {
        let currency = &profile.currency;
        let mut total = 0.0;
        let rows = self
            .holdings
            .iter()
            .filter_map(|p| {
                let held = profile.holding(&p.id)?;
                let price = currency.convert(p.price);
                total += price * held;
                Some(
                    TableRow::named(
                        vec![
                            p.name.clone(),
                            p.symbol.clone(),
                            format_price(price),
                            format_amount(held),
                            format_price(price * held),
                        ],
                        p.name.clone(),
                    )
                    .with_id(p.id.clone()),
                )
            })
            .collect();

        let label = currency.label();
        self.portfolio.header[2] = format!("Price ({})", label);
        self.portfolio.header[4] = format!("Balance ({})", label);
        self.portfolio.title = format!("Portfolio: {} {}", format_price(total), currency.symbol);
        self.portfolio.set_rows(rows);
    }
}

/// What a key did to an open edit box.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Editing,
    Cancelled,
    Submitted(String),
    Quit,
}

/// Numeric entry for one holding. Fetchers stay paused while it is open.
pub struct EditBox {
    pub id: String,
    pub symbol: String,
    pub input: String,
    _pause: PauseGuard,
}

impl EditBox {
    const MAX_INPUT: usize = 20;

    pub fn open(id: &str, symbol: &str, current: Option<f64>, send_data: &SendData) -> Self {
        Self {
            id: id.to_string(),
            symbol: symbol.to_string(),
            input: current.map(format_amount).unwrap_or_default(),
            _pause: send_data.pause(),
        }
    }

    pub fn key(&mut self, key: Key) -> EditOutcome {
        match key {
            Key::Ctrl('c') => EditOutcome::Quit,
            Key::Esc => EditOutcome::Cancelled,
            Key::Enter => EditOutcome::Submitted(self.input.trim().to_string()),
            Key::Backspace => {
                self.input.pop();
                EditOutcome::Editing
            }
            Key::Char(c) if !c.is_control() && self.input.chars().count() < Self::MAX_INPUT => {
                self.input.push(c);
                EditOutcome::Editing
            }
            _ => EditOutcome::Editing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_differs_per_view() {
        let all = help_lines(ViewKind::AllCoins);
        let portfolio = help_lines(ViewKind::Portfolio);
        assert!(all.iter().any(|l| l.contains("<C-s>")));
        assert!(!portfolio.iter().any(|l| l.contains("P: portfolio")));
        assert_eq!(all.first(), Some(&"Quit: q or <C-c>"));
    }

    #[test]
    fn edit_box_pauses_until_closed() {
        let send_data = SendData::default();
        let mut edit = EditBox::open("bitcoin", "BTC", Some(1.5), &send_data);
        assert!(!send_data.is_enabled());
        assert_eq!(edit.input, "1.5");
        edit.key(Key::Backspace);
        edit.key(Key::Backspace);
        edit.key(Key::Char('2'));
        assert_eq!(edit.key(Key::Enter), EditOutcome::Submitted("12".into()));
        drop(edit);
        assert!(send_data.is_enabled());
    }

    #[test]
    fn currency_picker_selects_by_id() {
        let mut overlays = Overlays::new(ViewKind::AllCoins);
        let current = CurrencySelection::default();
        let euro = Currency {
            id: "euro".into(),
            symbol: "EUR".into(),
            currency_symbol: Some("\u{20ac}".into()),
            kind: "fiat".into(),
            rate_usd: "1.08".into(),
        };
        let usd = Currency {
            id: current.id.clone(),
            symbol: "USD".into(),
            currency_symbol: Some("$".into()),
            kind: "fiat".into(),
            rate_usd: "1".into(),
        };
        overlays.set_currencies(vec![euro, usd], &current);
        assert_eq!(overlays.currency.selected, 1);
        overlays.currency.selected = 0;
        let picked = overlays.selected_currency().unwrap();
        assert_eq!(picked.symbol, "EUR");
        assert!((picked.rate_usd - 1.08).abs() < 1e-9);
    }

    #[test]
    fn duration_picker_round_trips_periods() {
        let mut overlays = Overlays::new(ViewKind::Coin);
        overlays.select_period(Period::Month);
        assert_eq!(overlays.selected_period(), Some(Period::Month));
    }

    #[test]
    fn mini_portfolio_only_lists_holdings() {
        let mut overlays = Overlays::new(ViewKind::AllCoins);
        let mut profile = Profile::default();
        profile.portfolio.insert("bitcoin".into(), 2.0);
        let prices = vec![
            CoinPrice {
                id: "bitcoin".into(),
                name: "Bitcoin".into(),
                symbol: "BTC".into(),
                price: 100.0,
            },
            CoinPrice {
                id: "ethereum".into(),
                name: "Ethereum".into(),
                symbol: "ETH".into(),
                price: 10.0,
            },
        ];
        overlays.set_holdings(prices, &profile);
        let rows = overlays.portfolio.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cells[4], "200.00");
        assert_eq!(rows[0].id, "bitcoin");

        profile.apply_amount("bitcoin", "0");
        overlays.refresh_holdings(&profile);
        assert!(overlays.portfolio.rows().is_empty());
    }

    fn price(id: &str, price: f64) -> CoinPrice {
        CoinPrice {
            id: id.into(),
            name: id.into(),
            symbol: id.to_uppercase(),
            price,
        }
    }

    #[test]
    fn mini_portfolio_opens_by_balance_with_total() {
        let mut overlays = Overlays::new(ViewKind::AllCoins);
        let mut profile = Profile::default();
        profile.portfolio.insert("aaa".into(), 1.0);
        profile.portfolio.insert("zzz".into(), 1.0);
        overlays.reset_holdings(&profile);
        overlays.set_holdings(vec![price("aaa", 1.0), price("zzz", 1000.0)], &profile);

        let order: Vec<&str> = overlays.portfolio.rows().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, vec!["zzz", "aaa"]);
        assert_eq!(overlays.portfolio.header[2], "Price (USD $)");
        assert_eq!(overlays.portfolio.header[4], "Balance (USD $)");
        assert_eq!(overlays.portfolio.title, "Portfolio: 1,001.00 USD");

        // a user sort sticks until the overlay is opened again
        overlays.portfolio.sort_by(1, true);
        overlays.refresh_holdings(&profile);
        assert_eq!(overlays.portfolio.rows()[0].id, "aaa");
        overlays.reset_holdings(&profile);
        assert_eq!(overlays.portfolio.sort, SortState::by(4, false));
    }

    #[test]
    fn empty_overlays_say_why() {
        let mut overlays = Overlays::new(ViewKind::AllCoins);
        let profile = Profile::default();
        overlays.reset_holdings(&profile);
        assert_eq!(overlays.placeholder(Modal::Portfolio).as_deref(), Some("Loading..."));
        overlays.set_holdings(Vec::new(), &profile);
        assert_eq!(overlays.placeholder(Modal::Portfolio).as_deref(), Some("No holdings"));

        overlays.reset_currencies();
        assert_eq!(overlays.placeholder(Modal::Currency).as_deref(), Some("Loading..."));
        overlays.fail_currencies("timed out".into());
        assert_eq!(
            overlays.placeholder(Modal::Currency).as_deref(),
            Some("Could not load: timed out")
        );
        assert_eq!(overlays.placeholder(Modal::Help), None);
    }
}
