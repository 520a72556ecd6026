use super::modal::Scroll;
use crate::utils::sort::{sort_rows, SortState, TableKind};

/// One displayed row. `name` and `id` are not shown: the filter matches a
/// coin's full name as well as its symbol, and `id` resolves the row back
/// to the coin it was built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRow {
    pub cells: Vec<String>,
    pub name: String,
    pub id: String,
}

impl TableRow {
    pub fn new(cells: Vec<String>) -> Self {
        Self {
            cells,
            ..Default::default()
        }
    }

    pub fn named(cells: Vec<String>, name: impl Into<String>) -> Self {
        Self {
            cells,
            name: name.into(),
            id: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn cell(&self, idx: usize) -> &str {
        self.cells.get(idx).map(String::as_str).unwrap_or("")
    }
}

impl AsRef<[String]> for TableRow {
    fn as_ref(&self) -> &[String] {
        &self.cells
    }
}

/// Rows whose symbol cell or hidden name contains `query`, ignoring case.
/// The input is left untouched; an empty query keeps every row in order.
pub fn filter_rows<'a>(rows: &'a [TableRow], query: &str) -> Vec<&'a TableRow> {
    if query.is_empty() {
        return rows.iter().collect();
    }
    let q = query.to_lowercase();
    rows.iter()
        .filter(|r| r.cell(1).to_lowercase().contains(&q) || r.name.to_lowercase().contains(&q))
        .collect()
}

/// A scrollable, sortable table and its cursor.
#[derive(Debug, Clone)]
pub struct TableView {
    pub title: String,
    pub header: Vec<String>,
    rows: Vec<TableRow>,
    pub filter: String,
    pub selected: usize,
    pub offset: usize,
    pub page_height: usize,
    pub sort: SortState,
    kind: TableKind,
}

impl TableView {
    pub fn new(title: impl Into<String>, header: &[&str], kind: TableKind) -> Self {
        Self {
            title: title.into(),
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
            filter: String::new(),
            selected: 0,
            offset: 0,
            page_height: 10,
            sort: SortState::default(),
            kind,
        }
    }

    /// Replace every row, then re-apply the active sort.
    pub fn set_rows(&mut self, mut rows: Vec<TableRow>) {
        sort_rows(&mut rows, self.sort.column, self.sort.ascending, self.kind);
        self.rows = rows;
        self.clamp();
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    /// Rows left after the filter, in display order.
    pub fn visible(&self) -> Vec<&TableRow> {
        filter_rows(&self.rows, &self.filter)
    }

    pub fn visible_len(&self) -> usize {
        if self.filter.is_empty() {
            self.rows.len()
        } else {
            self.visible().len()
        }
    }

    pub fn selected_row(&self) -> Option<&TableRow> {
        self.visible().into_iter().nth(self.selected)
    }

    /// Sort on a header column. Columns the table does not have are
    /// ignored.
    pub fn sort_by(&mut self, column: usize, ascending: bool) -> bool {
        if column >= self.header.len() {
            return false;
        }
        self.sort = SortState::by(column, ascending);
        sort_rows(&mut self.rows, self.sort.column, ascending, self.kind);
        true
    }

    pub fn set_filter(&mut self, query: &str) {
        if self.filter != query {
            self.filter = query.to_string();
            self.selected = 0;
            self.offset = 0;
        }
    }

    pub fn decorated_header(&self) -> Vec<String> {
        self.header
            .iter()
            .enumerate()
            .map(|(i, h)| self.sort.decorate(i, h))
            .collect()
    }

    pub fn scroll(&mut self, motion: Scroll) {
        let len = self.visible_len();
        if len == 0 {
            self.selected = 0;
            self.offset = 0;
            return;
        }
        let last = len - 1;
        let page = self.page_height.max(1);
        let half = (page / 2).max(1);
        self.selected = match motion {
            Scroll::Up => self.selected.saturating_sub(1),
            Scroll::Down => (self.selected + 1).min(last),
            Scroll::HalfPageUp => self.selected.saturating_sub(half),
            Scroll::HalfPageDown => (self.selected + half).min(last),
            Scroll::PageUp => self.selected.saturating_sub(page),
            Scroll::PageDown => (self.selected + page).min(last),
            Scroll::Top => 0,
            Scroll::Bottom => last,
        };
        self.adjust_scroll();
    }

    pub fn clamp(&mut self) {
        let len = self.visible_len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
        self.adjust_scroll();
    }

    pub fn set_page_height(&mut self, height: usize) {
        self.page_height = height.max(1);
        self.adjust_scroll();
    }

    fn adjust_scroll(&mut self) {
        if self.page_height == 0 {
            return;
        }
        if self.selected < self.offset {
            self.offset = self.selected;
        } else if self.selected >= self.offset + self.page_height {
            self.offset = self.selected - self.page_height + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin(rank: &str, symbol: &str, name: &str) -> TableRow {
        TableRow::named(
            vec![rank.into(), symbol.into(), "1.00".into(), "\u{25b2} 1.00".into()],
            name,
        )
    }

    fn sample() -> Vec<TableRow> {
        vec![
            coin("1", "BTC", "Bitcoin"),
            coin("2", "ETH", "Ethereum"),
            coin("3", "USDT", "Tether"),
            coin("4", "BNB", "BNB"),
        ]
    }

    #[test]
    fn empty_filter_keeps_everything_in_order() {
        let rows = sample();
        let kept = filter_rows(&rows, "");
        assert_eq!(kept.len(), rows.len());
        assert!(kept.iter().zip(rows.iter()).all(|(a, b)| *a == b));
    }

    #[test]
    fn filter_matches_symbol_or_name() {
        let rows = sample();
        let symbols = |query: &str| -> Vec<String> {
            filter_rows(&rows, query).iter().map(|r| r.cell(1).to_string()).collect()
        };
        assert_eq!(symbols("ether"), ["ETH", "USDT"]);
        assert_eq!(symbols("bt"), ["BTC"]);
        // a new query starts from the full set again
        assert_eq!(filter_rows(&rows, "b").len(), 2);
        assert_eq!(rows, sample());
    }

    #[test]
    fn filtered_selection_and_scrolling() {
        let mut table = TableView::new("Coins", &["#", "Symbol", "Price", "Change"], TableKind::Coins);
        table.set_rows(sample());
        table.set_page_height(2);
        table.scroll(Scroll::Bottom);
        assert_eq!(table.selected, 3);
        assert_eq!(table.offset, 2);

        table.set_filter("e");
        assert_eq!(table.selected, 0);
        assert_eq!(table.selected_row().map(|r| r.cell(1)), Some("ETH"));
        table.scroll(Scroll::PageDown);
        assert_eq!(table.selected_row().map(|r| r.cell(1)), Some("USDT"));
    }

    #[test]
    fn sort_survives_new_rows() {
        let mut table = TableView::new("Coins", &["#", "Symbol", "Price", "Change"], TableKind::Coins);
        assert!(table.sort_by(0, false));
        assert!(!table.sort_by(9, true));
        table.set_rows(sample());
        assert_eq!(table.rows()[0].cell(1), "BNB");
        assert_eq!(table.decorated_header()[0], "# \u{25bc}");
    }
}
