//! Which overlay owns input, which table owns the cursor, and the table of
//! what every key means in each state.

use std::mem;

use super::keys::Key;

/// Overlay currently owning keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Modal {
    #[default]
    None,
    Help,
    Currency,
    ChangeDuration,
    Portfolio,
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    AllCoins,
    Portfolio,
    Coin,
}

/// Focusable tables of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    /// The page's primary table: coins, holdings, or per-period changes.
    Main,
    Favourites,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Narrow the coin table by symbol or name.
    Filter,
    /// Find any listed coin and open it.
    Lookup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    Help,
    Currency { full: bool },
    ChangeDuration,
    Portfolio,
    Search(SearchMode),
}

impl Overlay {
    pub fn modal(self) -> Modal {
        match self {
            Overlay::Help => Modal::Help,
            Overlay::Currency { .. } => Modal::Currency,
            Overlay::ChangeDuration => Modal::ChangeDuration,
            Overlay::Portfolio => Modal::Portfolio,
            Overlay::Search(_) => Modal::Search,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scroll {
    Up,
    Down,
    HalfPageUp,
    HalfPageDown,
    PageUp,
    PageDown,
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    TogglePause,
    Redraw,
    Open(Overlay),
    Close,
    Confirm,
    Edit,
    Star,
    Unstar,
    Focus(Pane),
    Sort { column: usize, ascending: bool },
    Scroll(Scroll),
    Input(char),
    Erase,
    Ignore,
}

/// Map one key to what it means in `view` while `modal` is active.
/// `previous` is the key before this one, for two-key chords like `gg`.
pub fn dispatch(view: ViewKind, modal: Modal, key: Key, previous: Option<Key>) -> Action {
    match key {
        Key::Ctrl('c') => return Action::Quit,
        Key::Resize => return Action::Redraw,
        _ => {}
    }

    if modal == Modal::Search {
        return match key {
            Key::Esc => Action::Close,
            Key::Enter => Action::Confirm,
            Key::Backspace => Action::Erase,
            Key::Up => Action::Scroll(Scroll::Up),
            Key::Down => Action::Scroll(Scroll::Down),
            Key::Char(c) if !c.is_control() => Action::Input(c),
            _ => Action::Ignore,
        };
    }

    match key {
        Key::Char('q') => return Action::Quit,
        Key::Esc if modal != Modal::None => return Action::Close,
        Key::Esc if view == ViewKind::Coin => return Action::Quit,
        Key::Esc => return Action::Ignore,
        _ => {}
    }

    if let Some(motion) = scroll_motion(key, previous) {
        return Action::Scroll(motion);
    }

    match modal {
        Modal::None => page_key(view, key),
        Modal::Help => match key {
            Key::Char('?') => Action::Close,
            _ => Action::Ignore,
        },
        Modal::Currency | Modal::ChangeDuration => match key {
            Key::Enter => Action::Confirm,
            _ => Action::Ignore,
        },
        Modal::Portfolio => match key {
            Key::Char('e') => Action::Edit,
            Key::Char('P') => Action::Close,
            _ => sort_key(key).unwrap_or(Action::Ignore),
        },
        Modal::Search => Action::Ignore,
    }
}

fn scroll_motion(key: Key, previous: Option<Key>) -> Option<Scroll> {
    let motion = match key {
        Key::Char('j') | Key::Down => Scroll::Down,
        Key::Char('k') | Key::Up => Scroll::Up,
        Key::Ctrl('d') => Scroll::HalfPageDown,
        Key::Ctrl('u') => Scroll::HalfPageUp,
        Key::Ctrl('f') | Key::PageDown => Scroll::PageDown,
        Key::Ctrl('b') | Key::PageUp => Scroll::PageUp,
        Key::Char('g') if previous == Some(Key::Char('g')) => Scroll::Top,
        Key::Home => Scroll::Top,
        Key::Char('G') | Key::End => Scroll::Bottom,
        _ => return None,
    };
    Some(motion)
}

/// `1`-`7` sort ascending, `F1`-`F7` descending.
fn sort_key(key: Key) -> Option<Action> {
    let action = match key {
        Key::Char(d @ '1'..='7') => Action::Sort {
            column: (d as u8 - b'1') as usize,
            ascending: true,
        },
        Key::F(n @ 1..=7) => Action::Sort {
            column: (n - 1) as usize,
            ascending: false,
        },
        _ => return None,
    };
    Some(action)
}

fn page_key(view: ViewKind, key: Key) -> Action {
    if let Some(sort) = sort_key(key) {
        return sort;
    }
    let all_coins = view == ViewKind::AllCoins;
    match key {
        Key::Char('?') => Action::Open(Overlay::Help),
        Key::Char('c') => Action::Open(Overlay::Currency { full: false }),
        Key::Char('C') => Action::Open(Overlay::Currency { full: true }),
        Key::Char('%') => Action::Open(Overlay::ChangeDuration),
        Key::Char('P') if view != ViewKind::Portfolio => Action::Open(Overlay::Portfolio),
        Key::Char('/') if all_coins => Action::Open(Overlay::Search(SearchMode::Filter)),
        Key::Ctrl('s') if all_coins => Action::Open(Overlay::Search(SearchMode::Lookup)),
        Key::Char('f') if view != ViewKind::Portfolio => Action::Focus(Pane::Favourites),
        Key::Char('F') if view != ViewKind::Portfolio => Action::Focus(Pane::Main),
        Key::Char('s') if all_coins => Action::Star,
        Key::Char('S') if all_coins => Action::Unstar,
        Key::Char('e') => Action::Edit,
        Key::Char('p') => Action::TogglePause,
        Key::Enter => Action::Confirm,
        _ => Action::Ignore,
    }
}

/// Something that may show a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Page(Pane),
    Overlay,
}

/// The active overlay and the page table that had focus before it opened.
/// Exactly one [`Target`] has the cursor at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModalState {
    modal: Modal,
    pane: Pane,
}

impl ModalState {
    pub fn new(pane: Pane) -> Self {
        Self {
            modal: Modal::None,
            pane,
        }
    }

    pub fn modal(&self) -> Modal {
        self.modal
    }

    pub fn pane(&self) -> Pane {
        self.pane
    }

    pub fn is_open(&self) -> bool {
        self.modal != Modal::None
    }

    /// Overlays only open over the bare page.
    pub fn open(&mut self, modal: Modal) -> bool {
        if self.is_open() || modal == Modal::None {
            return false;
        }
        self.modal = modal;
        true
    }

    /// Close the overlay, handing the cursor back to the page table.
    pub fn close(&mut self) -> Modal {
        mem::take(&mut self.modal)
    }

    pub fn focus(&mut self, pane: Pane) -> bool {
        if self.is_open() {
            return false;
        }
        self.pane = pane;
        true
    }

    pub fn has_cursor(&self, target: Target) -> bool {
        match target {
            Target::Overlay => self.is_open(),
            Target::Page(p) => !self.is_open() && p == self.pane,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGETS: [Target; 3] = [
        Target::Page(Pane::Main),
        Target::Page(Pane::Favourites),
        Target::Overlay,
    ];

    fn cursors(state: &ModalState) -> usize {
        TARGETS.iter().filter(|t| state.has_cursor(**t)).count()
    }

    #[test]
    fn overlays_open_only_from_none() {
        let mut state = ModalState::new(Pane::Main);
        assert!(state.open(Modal::Help));
        assert!(!state.open(Modal::Currency));
        assert_eq!(state.modal(), Modal::Help);
        assert_eq!(state.close(), Modal::Help);
        assert!(state.open(Modal::Currency));
    }

    #[test]
    fn closing_restores_focused_pane() {
        let mut state = ModalState::new(Pane::Main);
        assert!(state.focus(Pane::Favourites));
        state.open(Modal::Portfolio);
        assert!(!state.focus(Pane::Main));
        assert!(!state.has_cursor(Target::Page(Pane::Favourites)));
        state.close();
        assert!(state.has_cursor(Target::Page(Pane::Favourites)));
    }

    #[test]
    fn exactly_one_cursor_through_a_session() {
        let keys = [
            Key::Char('f'),
            Key::Char('?'),
            Key::Char('j'),
            Key::Esc,
            Key::Char('F'),
            Key::Char('c'),
            Key::Resize,
            Key::Enter,
            Key::Char('/'),
            Key::Char('b'),
            Key::Esc,
            Key::Char('P'),
            Key::Char('P'),
        ];
        let mut state = ModalState::new(Pane::Main);
        let mut previous = None;
        for key in keys {
            match dispatch(ViewKind::AllCoins, state.modal(), key, previous) {
                Action::Open(o) => {
                    state.open(o.modal());
                }
                Action::Close | Action::Confirm if state.is_open() => {
                    state.close();
                }
                Action::Focus(p) => {
                    state.focus(p);
                }
                _ => {}
            }
            previous = Some(key);
            assert_eq!(cursors(&state), 1, "after {:?}", key);
        }
        assert_eq!(state.modal(), Modal::None);
    }

    #[test]
    fn search_captures_text() {
        let m = Modal::Search;
        let v = ViewKind::AllCoins;
        assert_eq!(dispatch(v, m, Key::Char('q'), None), Action::Input('q'));
        assert_eq!(dispatch(v, m, Key::Char('j'), None), Action::Input('j'));
        assert_eq!(dispatch(v, m, Key::Ctrl('c'), None), Action::Quit);
        assert_eq!(dispatch(v, m, Key::Backspace, None), Action::Erase);
        assert_eq!(dispatch(v, m, Key::Down, None), Action::Scroll(Scroll::Down));
    }

    #[test]
    fn escape_depends_on_view() {
        let none = Modal::None;
        assert_eq!(dispatch(ViewKind::Coin, none, Key::Esc, None), Action::Quit);
        assert_eq!(dispatch(ViewKind::AllCoins, none, Key::Esc, None), Action::Ignore);
        assert_eq!(dispatch(ViewKind::Coin, Modal::Help, Key::Esc, None), Action::Close);
    }

    #[test]
    fn action_keys_only_on_the_page() {
        let v = ViewKind::AllCoins;
        assert_eq!(dispatch(v, Modal::None, Key::Char('s'), None), Action::Star);
        assert_eq!(dispatch(v, Modal::Help, Key::Char('s'), None), Action::Ignore);
        assert_eq!(dispatch(v, Modal::Currency, Key::Char('3'), None), Action::Ignore);
        assert_eq!(dispatch(v, Modal::Help, Key::Char('c'), None), Action::Ignore);
        assert_eq!(dispatch(v, Modal::Portfolio, Key::Char('e'), None), Action::Edit);
        assert_eq!(dispatch(ViewKind::Portfolio, Modal::None, Key::Char('P'), None), Action::Ignore);
        assert_eq!(dispatch(ViewKind::Coin, Modal::None, Key::Ctrl('s'), None), Action::Ignore);
    }

    #[test]
    fn sort_and_scroll_keys() {
        let v = ViewKind::Portfolio;
        let n = Modal::None;
        assert_eq!(
            dispatch(v, n, Key::Char('3'), None),
            Action::Sort { column: 2, ascending: true }
        );
        assert_eq!(
            dispatch(v, n, Key::F(7), None),
            Action::Sort { column: 6, ascending: false }
        );
        assert_eq!(dispatch(v, n, Key::F(9), None), Action::Ignore);
        assert_eq!(dispatch(v, n, Key::Char('g'), None), Action::Ignore);
        assert_eq!(
            dispatch(v, n, Key::Char('g'), Some(Key::Char('g'))),
            Action::Scroll(Scroll::Top)
        );
        assert_eq!(dispatch(v, n, Key::End, None), Action::Scroll(Scroll::Bottom));
        assert_eq!(dispatch(v, n, Key::Ctrl('u'), None), Action::Scroll(Scroll::HalfPageUp));
        assert_eq!(dispatch(v, Modal::Help, Key::Char('j'), None), Action::Scroll(Scroll::Down));
        assert_eq!(dispatch(v, Modal::Help, Key::Resize, None), Action::Redraw);
    }

    #[test]
    fn mini_portfolio_sorts_like_a_page() {
        let v = ViewKind::AllCoins;
        let p = Modal::Portfolio;
        assert_eq!(
            dispatch(v, p, Key::Char('1'), None),
            Action::Sort { column: 0, ascending: true }
        );
        assert_eq!(
            dispatch(v, p, Key::F(5), None),
            Action::Sort { column: 4, ascending: false }
        );
        assert_eq!(dispatch(v, p, Key::Char('s'), None), Action::Ignore);
    }
}
