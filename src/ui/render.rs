use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Sparkline, Table},
    Frame,
};

use crate::app::modal::{Modal, SearchMode};
use crate::app::overlays::{EditBox, SearchBox};
use crate::app::table::TableView;
use crate::app::ViewState;
use crate::theme::Theme;
use crate::utils::format::downsample;
use crate::utils::ops;
use crate::utils::sort::parse_change;

/// How a table is drawn this frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableLook {
    pub focused: bool,
    pub cursor: bool,
    /// Column holding arrow-prefixed changes, coloured by sign.
    pub change_col: Option<usize>,
}

pub fn draw_table(f: &mut Frame, table: &mut TableView, area: Rect, theme: &Theme, look: TableLook) {
    let block = Block::default()
        .title(format!(" {} ", table.title))
        .title_style(theme.header())
        .borders(Borders::ALL)
        .border_style(theme.border_for(look.focused));
    let inner = block.inner(area);
    // one line for the header
    table.set_page_height(inner.height.saturating_sub(1) as usize);

    let header = Row::new(
        table
            .decorated_header()
            .into_iter()
            .map(|h| Cell::from(h).style(theme.header())),
    );

    let selected = table.selected;
    let rows: Vec<Row> = table
        .visible()
        .into_iter()
        .enumerate()
        .skip(table.offset)
        .take(table.page_height)
        .map(|(i, row)| {
            let cells = row.cells.iter().enumerate().map(|(c, text)| {
                if look.change_col == Some(c) {
                    Cell::from(text.clone()).style(Style::default().fg(theme.trend(parse_change(text))))
                } else {
                    Cell::from(text.clone()).style(theme.text())
                }
            });
            let style = if look.cursor && i == selected {
                theme.cursor()
            } else {
                Style::default().bg(theme.bg)
            };
            Row::new(cells).style(style)
        })
        .collect();

    let columns = table.header.len().max(1) as u32;
    let widths: Vec<Constraint> = (0..columns).map(|_| Constraint::Ratio(1, columns)).collect();
    let widget = Table::new(rows, widths)
        .header(header)
        .block(block)
        .column_spacing(1);
    f.render_widget(widget, area);
}

/// Sparkline bars scaled to the height of `area`, one per column.
pub fn spark_data(prices: &[f64], area: Rect) -> Vec<u64> {
    let sampled = downsample(prices, area.width as usize);
    let resolution = area.height.max(1) as f64 * 8.0;
    let lo = ops::min(&sampled);
    let range = ops::max(&sampled) - lo;
    if range == 0.0 {
        return vec![(resolution / 2.0) as u64; sampled.len()];
    }
    sampled
        .iter()
        .map(|p| ((p - lo) / range * resolution) as u64)
        .collect()
}

pub fn draw_sparkline(f: &mut Frame, title: &str, prices: &[f64], area: Rect, theme: &Theme, color_idx: usize) {
    let block = Block::default()
        .title(title.to_string())
        .title_style(theme.text())
        .borders(Borders::ALL)
        .border_style(theme.border_for(false));
    let inner = block.inner(area);
    f.render_widget(block, area);
    if prices.is_empty() {
        f.render_widget(Paragraph::new("  Loading...").style(theme.muted()), inner);
        return;
    }
    let data = spark_data(prices, inner);
    let sparkline = Sparkline::default()
        .data(&data)
        .style(Style::default().fg(theme.graphs[color_idx % theme.graphs.len()]));
    f.render_widget(sparkline, inner);
}

pub fn draw_status(f: &mut Frame, area: Rect, theme: &Theme, state: &ViewState, hints: &str, right: &str) {
    let mut spans = vec![Span::styled(format!(" {} ", hints), theme.muted())];
    if !state.send_data.is_enabled() {
        spans.push(Span::styled(
            " PAUSED ",
            Style::default().fg(theme.bg).bg(theme.accent).add_modifier(Modifier::BOLD),
        ));
    }
    let used: usize = spans.iter().map(|s| s.content.chars().count()).sum();
    let pad = (area.width as usize).saturating_sub(used + right.chars().count() + 1);
    if pad > 0 {
        spans.push(Span::raw(" ".repeat(pad)));
    }
    spans.push(Span::styled(right.to_string(), theme.muted()));
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Draw whichever overlay is open, then the edit box above it.
pub fn draw_overlays(f: &mut Frame, state: &mut ViewState, theme: &Theme) {
    let modal = state.modal.modal();
    let look = TableLook {
        focused: true,
        cursor: true,
        change_col: None,
    };
    match modal {
        Modal::None => {}
        Modal::Search => draw_search(f, &mut state.overlays.search, theme),
        _ => {
            let (w, h) = match modal {
                Modal::Help => (50, 80),
                Modal::ChangeDuration => (30, 40),
                _ => (60, 60),
            };
            let area = centered_rect(w, h, f.area());
            f.render_widget(Clear, area);
            let placeholder = state.overlays.placeholder(modal);
            if let Some(table) = state.overlays.table_mut(modal) {
                match placeholder {
                    Some(text) => {
                        let block = Block::default()
                            .title(format!(" {} ", table.title))
                            .borders(Borders::ALL)
                            .border_style(theme.border_for(true));
                        let msg = Paragraph::new(format!("  {}", text)).style(theme.muted()).block(block);
                        f.render_widget(msg, area);
                    }
                    None => draw_table(f, table, area, theme, look),
                }
            }
        }
    }
    if let Some(edit) = &state.edit {
        draw_edit_box(f, edit, theme);
    }
}

fn draw_edit_box(f: &mut Frame, edit: &EditBox, theme: &Theme) {
    let area = centered_rect(40, 10, f.area());
    let area = Rect {
        height: area.height.max(4),
        ..area
    };
    f.render_widget(Clear, area);

    let block = Block::default()
        .title(format!(" {} holding ", edit.symbol))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.input));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(inner);
    f.render_widget(
        Paragraph::new(format!(" {}_", edit.input)).style(theme.text()),
        chunks[0],
    );
    f.render_widget(
        Paragraph::new(" Enter save | Esc cancel | 0 removes").style(theme.muted()),
        chunks[1],
    );
}

fn draw_search(f: &mut Frame, search: &mut SearchBox, theme: &Theme) {
    let screen = f.area();
    if search.mode == SearchMode::Filter {
        let area = Rect::new(
            screen.x,
            screen.y + screen.height.saturating_sub(4),
            screen.width.min(40),
            3.min(screen.height),
        );
        f.render_widget(Clear, area);
        let block = Block::default()
            .title(" Filter ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.input));
        f.render_widget(
            Paragraph::new(format!(" / {}_", search.query)).style(theme.text()).block(block),
            area,
        );
        return;
    }

    let area = centered_rect(60, 60, screen);
    f.render_widget(Clear, area);
    let block = Block::default()
        .title(" Find coin ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.input));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(3)])
        .split(inner);
    f.render_widget(
        Paragraph::new(format!("  Symbol: {}_", search.query)).style(theme.text()),
        chunks[0],
    );

    let hint = if let Some(e) = &search.error {
        Span::styled(format!("  Lookup failed: {}", e), Style::default().fg(theme.error))
    } else if search.missing {
        Span::styled("  No coins found", Style::default().fg(theme.error))
    } else if search.searched.is_some() && search.results.rows().is_empty() {
        Span::styled("  Searching...", theme.muted())
    } else if search.has_fresh_results() {
        Span::styled("  j/k select | Enter open | Esc close", theme.muted())
    } else {
        Span::styled("  Enter search | Esc close", theme.muted())
    };
    f.render_widget(Paragraph::new(Line::from(hint)), chunks[1]);

    if !search.results.rows().is_empty() {
        let look = TableLook {
            focused: true,
            cursor: true,
            change_col: None,
        };
        draw_table(f, &mut search.results, chunks[2], theme, look);
    }
}

pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_width = r.width * percent_x / 100;
    let popup_height = r.height * percent_y / 100;
    let x = (r.width.saturating_sub(popup_width)) / 2;
    let y = (r.height.saturating_sub(popup_height)) / 2;
    Rect::new(r.x + x, r.y + y, popup_width, popup_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_rect_stays_inside() {
        let outer = Rect::new(0, 0, 100, 40);
        let inner = centered_rect(50, 50, outer);
        assert_eq!(inner, Rect::new(25, 10, 50, 20));
    }

    #[test]
    fn flat_series_sits_mid_height() {
        let area = Rect::new(0, 0, 4, 2);
        assert_eq!(spark_data(&[3.0, 3.0], area), vec![8, 8]);
        let rising = spark_data(&[1.0, 2.0, 3.0], area);
        assert_eq!(rising.first(), Some(&0));
        assert_eq!(rising.last(), Some(&16));
    }
}
