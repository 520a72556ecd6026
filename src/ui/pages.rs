//! Layouts of the three pages.

use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, BarChart, Block, Borders, Chart, Dataset, Gauge, GraphType, Paragraph, Wrap},
    Frame,
};

use super::render::{draw_overlays, draw_sparkline, draw_status, draw_table, TableLook};
use crate::app::coin::CoinView;
use crate::app::modal::{Pane, Target};
use crate::app::{AllCoinsView, PortfolioView};
use crate::theme::Theme;
use crate::types::CoinDetails;
use crate::utils::format::{format_large, format_price};
use crate::utils::ops;
use crate::utils::round::round_values;

fn background(f: &mut Frame, theme: &Theme) {
    let bg = Block::default().style(Style::default().bg(theme.bg));
    f.render_widget(bg, f.area());
}

fn updated_at(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(t) => format!("Updated {} ", t.with_timezone(&Local).format("%H:%M:%S")),
        None => "Loading... ".to_string(),
    }
}

pub fn all_coins(f: &mut Frame, view: &mut AllCoinsView, theme: &Theme) {
    background(f, theme);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(30), // top coin graphs
            Constraint::Min(5),         // tables
            Constraint::Length(1),      // status
        ])
        .split(f.area());

    let graphs = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3); 3])
        .split(chunks[0]);
    for (i, area) in graphs.iter().enumerate() {
        match view.top.coins.get(i) {
            Some(coin) => {
                let title = format!(
                    " {}  lo {} hi {} ",
                    coin.name,
                    format_price(view.profile.currency.convert(coin.min)),
                    format_price(view.profile.currency.convert(coin.max)),
                );
                draw_sparkline(f, &title, &coin.prices, *area, theme, i);
            }
            None => draw_sparkline(f, " ", &[], *area, theme, i),
        }
    }

    let tables = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(25), Constraint::Percentage(75)])
        .split(chunks[1]);
    let modal = view.state.modal;
    let pane = modal.pane();
    draw_table(
        f,
        &mut view.favourites,
        tables[0],
        theme,
        TableLook {
            focused: pane == Pane::Favourites,
            cursor: modal.has_cursor(Target::Page(Pane::Favourites)),
            change_col: None,
        },
    );
    draw_table(
        f,
        &mut view.coins,
        tables[1],
        theme,
        TableLook {
            focused: pane == Pane::Main,
            cursor: modal.has_cursor(Target::Page(Pane::Main)),
            change_col: Some(3),
        },
    );

    let mut right = updated_at(view.snapshot.fetched_at);
    if !view.coins.filter.is_empty() {
        right = format!("[/{}] {}", view.coins.filter, right);
    }
    draw_status(f, chunks[2], theme, &view.state, "? help | q quit", &right);
    draw_overlays(f, &mut view.state, theme);
}

pub fn portfolio(f: &mut Frame, view: &mut PortfolioView, theme: &Theme) {
    background(f, theme);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Min(6),
            Constraint::Length(8),
            Constraint::Length(1),
        ])
        .split(f.area());

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(chunks[0]);
    draw_table(f, &mut view.details, top[0], theme, TableLook::default());
    draw_shares(f, &view.summary.shares, top[1], theme);

    let cursor = view.state.modal.has_cursor(Target::Page(Pane::Main));
    draw_table(
        f,
        &mut view.coins,
        chunks[1],
        theme,
        TableLook {
            focused: true,
            cursor,
            change_col: Some(3),
        },
    );

    let performers = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[2]);
    let look = TableLook {
        change_col: Some(2),
        ..TableLook::default()
    };
    draw_table(f, &mut view.best, performers[0], theme, look);
    draw_table(f, &mut view.worst, performers[1], theme, look);

    let right = updated_at(view.snapshot.fetched_at);
    draw_status(f, chunks[3], theme, &view.state, "? help | q quit", &right);
    draw_overlays(f, &mut view.state, theme);
}

fn draw_shares(f: &mut Frame, shares: &[(String, f64)], area: Rect, theme: &Theme) {
    let block = Block::default()
        .title(" Holding % ")
        .title_style(theme.header())
        .borders(Borders::ALL)
        .border_style(theme.border_for(false));
    if shares.is_empty() {
        let msg = Paragraph::new("  No holdings. Press e on a coin to add one.")
            .style(theme.muted())
            .block(block);
        f.render_widget(msg, area);
        return;
    }
    let bars: Vec<(&str, u64)> = shares
        .iter()
        .map(|(symbol, share)| (symbol.as_str(), share.round() as u64))
        .collect();
    let chart = BarChart::default()
        .block(block)
        .data(bars.as_slice())
        .bar_width(6)
        .bar_gap(2)
        .max(100)
        .bar_style(Style::default().fg(theme.graphs[0]))
        .value_style(Style::default().fg(theme.bg).bg(theme.graphs[0]))
        .label_style(theme.text());
    f.render_widget(chart, area);
}

pub fn coin(f: &mut Frame, view: &mut CoinView<'_>, theme: &Theme) {
    background(f, theme);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),      // title and live price
            Constraint::Percentage(45), // history and details
            Constraint::Min(6),         // tables
            Constraint::Length(1),      // status
        ])
        .split(f.area());

    let head = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(chunks[0]);
    draw_title(f, view, head[0], theme);
    draw_live_price(f, view, head[1], theme);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(chunks[1]);
    draw_history(f, view, middle[0], theme);
    draw_details(f, view.details.as_ref(), view, middle[1], theme);

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(40),
            Constraint::Percentage(30),
        ])
        .split(chunks[2]);
    let modal = view.state.modal;
    let pane = modal.pane();
    draw_table(
        f,
        &mut view.changes,
        bottom[0],
        theme,
        TableLook {
            focused: pane == Pane::Main,
            cursor: modal.has_cursor(Target::Page(Pane::Main)),
            change_col: Some(1),
        },
    );
    let centre = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(bottom[1]);
    draw_supply(f, view.details.as_ref(), centre[0], theme);
    draw_explorers(f, view.details.as_ref(), centre[1], theme);
    draw_table(
        f,
        &mut view.favourites,
        bottom[2],
        theme,
        TableLook {
            focused: pane == Pane::Favourites,
            cursor: modal.has_cursor(Target::Page(Pane::Favourites)),
            change_col: None,
        },
    );

    let right = view
        .details
        .as_ref()
        .map(|d| format!("Updated {} ", d.last_updated))
        .unwrap_or_else(|| "Loading... ".to_string());
    draw_status(f, chunks[3], theme, &view.state, "? help | Esc back", &right);
    draw_overlays(f, &mut view.state, theme);
}

fn draw_title(f: &mut Frame, view: &CoinView<'_>, area: Rect, theme: &Theme) {
    let mut spans = vec![Span::styled(
        format!(" {} ", view.symbol),
        Style::default().fg(theme.title).add_modifier(Modifier::BOLD),
    )];
    if let Some(d) = &view.details {
        spans.push(Span::styled(format!("{} ", d.name), theme.text()));
        if let Some(rank) = d.rank {
            spans.push(Span::styled(format!("#{} ", rank), theme.muted()));
        }
    }
    if let Some(held) = view.profile.holding(&view.id.primary) {
        spans.push(Span::styled(format!("| holding {} ", held), Style::default().fg(theme.accent)));
    }
    if view.profile.favourites.contains(&view.id.primary) {
        spans.push(Span::styled("\u{2605}", Style::default().fg(theme.accent)));
    }
    let block = Block::default().borders(Borders::ALL).border_style(theme.border_for(false));
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn draw_live_price(f: &mut Frame, view: &CoinView<'_>, area: Rect, theme: &Theme) {
    let currency = &view.profile.currency;
    let text = match view.live_price.parse::<f64>() {
        Ok(usd) => format!("{} {}", format_price(currency.convert(usd)), currency.symbol),
        Err(_) if view.live_price.is_empty() => "...".to_string(),
        Err(_) => view.live_price.clone(),
    };
    let block = Block::default()
        .title(" Live Price ")
        .title_style(theme.header())
        .borders(Borders::ALL)
        .border_style(theme.border_for(false));
    let p = Paragraph::new(format!(" {}", text))
        .style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
        .block(block);
    f.render_widget(p, area);
}

fn draw_history(f: &mut Frame, view: &CoinView<'_>, area: Rect, theme: &Theme) {
    let currency = &view.profile.currency;
    let title = format!(" Price History ({}) ", view.period.label());
    let block = Block::default()
        .title(title)
        .title_style(theme.header())
        .borders(Borders::ALL)
        .border_style(theme.border_for(false));
    let prices: Vec<f64> = view.history.prices.iter().map(|p| currency.convert(*p)).collect();
    if prices.is_empty() {
        f.render_widget(Paragraph::new("  Loading...").style(theme.muted()).block(block), area);
        return;
    }

    let points: Vec<(f64, f64)> = prices.iter().enumerate().map(|(i, p)| (i as f64, *p)).collect();
    let (lo, hi) = (ops::min(&prices), ops::max(&prices));
    let first = prices[0];
    let last = prices[prices.len() - 1];
    let color = theme.trend(last - first);

    let datasets = vec![Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(&points)];
    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(Axis::default().bounds([0.0, (points.len().max(2) - 1) as f64]))
        .y_axis(
            Axis::default()
                .style(theme.muted())
                .bounds([lo, hi])
                .labels([format_price(lo), format_price(hi)]),
        );
    f.render_widget(chart, area);
}

fn draw_details(f: &mut Frame, details: Option<&CoinDetails>, view: &CoinView<'_>, area: Rect, theme: &Theme) {
    let block = Block::default()
        .title(" Details ")
        .title_style(theme.header())
        .borders(Borders::ALL)
        .border_style(theme.border_for(false));
    let Some(d) = details else {
        f.render_widget(Paragraph::new("  Loading...").style(theme.muted()).block(block), area);
        return;
    };
    let currency = &view.profile.currency;
    let money = |v: f64| format_price(currency.convert(v));
    let big = |v: f64| format_large(currency.convert(v));
    let pair = |label: &str, value: String| {
        Line::from(vec![
            Span::styled(format!(" {:<14}", label), theme.muted()),
            Span::styled(value, theme.text()),
        ])
    };

    let mut lines = vec![
        pair("Market Cap", big(d.market_cap)),
        pair("Volume (24h)", big(d.total_volume)),
        pair("High (24h)", money(d.high_24h)),
        pair("Low (24h)", money(d.low_24h)),
        pair("ATH", format!("{} ({})", money(d.ath), d.ath_date)),
        pair("ATL", format!("{} ({})", money(d.atl), d.atl_date)),
    ];
    if let Some(minutes) = d.block_time_minutes {
        lines.push(pair("Block Time", format!("{} min", minutes)));
    }
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }).block(block), area);
}

fn draw_explorers(f: &mut Frame, details: Option<&CoinDetails>, area: Rect, theme: &Theme) {
    let block = Block::default()
        .title(" Explorers ")
        .title_style(theme.header())
        .borders(Borders::ALL)
        .border_style(theme.border_for(false));
    let lines: Vec<Line> = details
        .map(|d| {
            d.explorers
                .iter()
                .map(|url| Line::from(Span::styled(format!(" {}", url), Style::default().fg(theme.accent))))
                .collect()
        })
        .unwrap_or_default();
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_supply(f: &mut Frame, details: Option<&CoinDetails>, area: Rect, theme: &Theme) {
    let block = Block::default()
        .title(" Supply ")
        .title_style(theme.header())
        .borders(Borders::ALL)
        .border_style(theme.border_for(false));
    let Some(d) = details else {
        f.render_widget(Paragraph::new("  Loading...").style(theme.muted()).block(block), area);
        return;
    };
    let cap = d.max_supply.or(d.total_supply).filter(|m| *m > 0.0);
    let (ratio, label) = match cap {
        Some(max) => {
            let ([c, m], unit) = round_values(d.circulating_supply, max);
            let ratio = (d.circulating_supply / max).clamp(0.0, 1.0);
            (ratio, format!("{:.1}{unit} / {:.1}{unit} ({:.1}%)", c, m, ratio * 100.0))
        }
        None => {
            let ([c, _], unit) = round_values(d.circulating_supply, 0.0);
            (0.0, format!("{:.1}{} / NA", c, unit))
        }
    };
    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(theme.graphs[1]).bg(theme.bg))
        .ratio(ratio)
        .label(label);
    f.render_widget(gauge, area);
}

#[cfg(test)]
mod tests {
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    use super::*;
    use crate::api::stub::asset;
    use crate::settings::{Profile, SettingsStore};
    use crate::types::{AssetSnapshot, CoinIdMap};

    fn screen(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn all_coins_page_lists_coins() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("data.json"));
        let mut view = AllCoinsView::new(store, Profile::default(), CoinIdMap::default());
        view.apply_snapshot(AssetSnapshot {
            assets: vec![asset("bitcoin", "btc", 1, 60000.0, 2.0)],
            fetched_at: None,
        });
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        let theme = Theme::default();
        terminal.draw(|f| all_coins(f, &mut view, &theme)).unwrap();
        let text = screen(&terminal);
        assert!(text.contains("BTC"));
        assert!(text.contains("60,000.00"));
        assert!(text.contains("Favourites"));
    }
}
