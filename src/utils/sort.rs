use std::cmp::Ordering;

use super::format::DOWN_ARROW;

/// Which comparator table a table's columns use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Coins,
    Favourites,
    Portfolio,
    MiniPortfolio,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Integer,
    Text,
    Float,
    Change,
}

impl TableKind {
    fn column(self, idx: usize) -> Option<ColumnType> {
        use ColumnType::*;
        let table: &[ColumnType] = match self {
            TableKind::Coins => &[Integer, Text, Float, Change],
            TableKind::Favourites => &[Text, Float],
            TableKind::Portfolio => &[Integer, Text, Float, Change, Float, Float, Float],
            TableKind::MiniPortfolio => &[Text, Text, Float, Float, Float],
            TableKind::Plain => return Some(Text),
        };
        table.get(idx).copied()
    }
}

/// Active sort of a table: column and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    pub column: Option<usize>,
    pub ascending: bool,
}

impl SortState {
    pub fn by(column: usize, ascending: bool) -> Self {
        Self {
            column: Some(column),
            ascending,
        }
    }

    /// Header label with the direction glyph appended to the sorted column.
    pub fn decorate(&self, idx: usize, label: &str) -> String {
        match self.column {
            Some(c) if c == idx && self.ascending => format!("{} \u{25b2}", label),
            Some(c) if c == idx => format!("{} \u{25bc}", label),
            _ => label.to_string(),
        }
    }
}

/// Sort rows in place by one column.
///
/// `None`, an empty set, or a column beyond the row width leave the rows
/// untouched. A column the kind has no comparator for sorts on column 0 as
/// text.
pub fn sort_rows<R: AsRef<[String]>>(
    rows: &mut [R],
    column: Option<usize>,
    ascending: bool,
    kind: TableKind,
) {
    let Some(col) = column else { return };
    let width = match rows.first() {
        Some(r) => r.as_ref().len(),
        None => return,
    };
    if col >= width {
        return;
    }

    let (col, ty) = match kind.column(col) {
        Some(ty) => (col, ty),
        None => (0, ColumnType::Text),
    };

    rows.sort_by(|a, b| {
        let a = cell(a.as_ref(), col);
        let b = cell(b.as_ref(), col);
        let ord = compare(ty, a, b);
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("")
}

fn compare(ty: ColumnType, a: &str, b: &str) -> Ordering {
    match ty {
        ColumnType::Text => a.cmp(b),
        ColumnType::Integer => parse_int(a).cmp(&parse_int(b)),
        ColumnType::Float => parse_float(a).total_cmp(&parse_float(b)),
        ColumnType::Change => parse_change(a).total_cmp(&parse_change(b)),
    }
}

fn parse_int(s: &str) -> i64 {
    s.trim().replace(',', "").parse().unwrap_or(0)
}

fn parse_float(s: &str) -> f64 {
    s.trim().replace(',', "").parse().unwrap_or(0.0)
}

/// Signed value of an arrow-prefixed change cell. Malformed cells are 0.
pub fn parse_change(s: &str) -> f64 {
    let Some((arrow, num)) = s.split_once(' ') else {
        return 0.0;
    };
    let value: f64 = match num.trim().parse() {
        Ok(v) => v,
        Err(_) => return 0.0,
    };
    if arrow == DOWN_ARROW {
        -value
    } else {
        value
    }
}
