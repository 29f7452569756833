//! Ratatui rendering of the dashboard: header, watchlist sidebar, chart panels and footer.

use binance_datafeed::{Bar, ConnectionStatus};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
    Frame,
};

use super::{
    chart::{ChartPanel, PanelStatus},
    dashboard::{Dashboard, Focus, PanelSlot},
};

const C_BUY: Color = Color::Rgb(100, 220, 100);
const C_SELL: Color = Color::Rgb(220, 100, 100);
const C_NEUTRAL: Color = Color::Rgb(180, 180, 100);
const C_DIM: Color = Color::Rgb(120, 120, 120);
const C_BRIGHT: Color = Color::Rgb(220, 220, 220);
const C_ACCENT: Color = Color::Rgb(100, 180, 220);

const SIDEBAR_WIDTH: u16 = 30;

/// Render the whole dashboard. `secondary` is only drawn in split view.
pub fn render_dashboard(
    f: &mut Frame,
    dashboard: &Dashboard,
    primary: &ChartPanel,
    secondary: Option<&ChartPanel>,
    status: ConnectionStatus,
) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, rows[0], dashboard, status);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
        .split(rows[1]);

    render_sidebar(f, body[0], dashboard);

    let focus = dashboard.focus();
    match secondary.filter(|_| dashboard.visible_slots().contains(&PanelSlot::Secondary)) {
        Some(secondary) => {
            let charts = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(body[1]);
            render_chart_panel(f, charts[0], primary, focus == Focus::Panel(PanelSlot::Primary));
            render_chart_panel(
                f,
                charts[1],
                secondary,
                focus == Focus::Panel(PanelSlot::Secondary),
            );
        }
        None => {
            render_chart_panel(f, body[1], primary, focus == Focus::Panel(PanelSlot::Primary));
        }
    }

    render_footer(f, rows[2]);
}

fn render_header(f: &mut Frame, area: Rect, dashboard: &Dashboard, status: ConnectionStatus) {
    let (status_text, status_color) = status_label(status);

    let line = Line::from(vec![
        Span::styled(
            " 📈 NEO Crypto Charts ",
            Style::default().fg(C_BRIGHT).add_modifier(Modifier::BOLD),
        ),
        Span::styled(" │ VIEW ", Style::default().fg(C_DIM)),
        Span::styled(
            dashboard.view_mode().label(),
            Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::styled(" │ BINANCE ", Style::default().fg(C_DIM)),
        Span::styled(status_text, Style::default().fg(status_color)),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_DIM));
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn status_label(status: ConnectionStatus) -> (&'static str, Color) {
    match status {
        ConnectionStatus::Connected => ("● LIVE", C_BUY),
        ConnectionStatus::Connecting => ("◌ CONNECTING", C_NEUTRAL),
        ConnectionStatus::Reconnecting => ("◌ RECONNECTING", C_NEUTRAL),
        ConnectionStatus::Disconnected => ("○ DISCONNECTED", C_SELL),
        ConnectionStatus::Idle => ("○ IDLE", C_DIM),
    }
}

fn render_sidebar(f: &mut Frame, area: Rect, dashboard: &Dashboard) {
    let focused = dashboard.focus() == Focus::Sidebar;
    let menu = dashboard.add_menu();

    let block = Block::default()
        .title(if menu.open { " 📊 Watchlist [✕] " } else { " 📊 Watchlist [+] " })
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { C_ACCENT } else { C_DIM }));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut lines = Vec::new();

    if menu.open {
        lines.push(Line::from(vec![
            Span::styled("Search: ", Style::default().fg(C_DIM)),
            Span::styled(format!("{}_", menu.search_term), Style::default().fg(C_BRIGHT)),
        ]));

        for (index, (entry, added)) in dashboard.add_menu_entries().into_iter().enumerate() {
            let style = if index == menu.cursor {
                Style::default().fg(C_BRIGHT).add_modifier(Modifier::REVERSED)
            } else {
                Style::default().fg(C_BRIGHT)
            };
            lines.push(Line::from(vec![
                Span::styled(format!(" {:<10}", entry.name), style),
                Span::styled(format!(" {:<10}", entry.symbol), Style::default().fg(C_DIM)),
                Span::styled(if added { " ✓" } else { "" }, Style::default().fg(C_BUY)),
            ]));
        }
        lines.push(Line::from(""));
    }

    let watchlist = dashboard.watchlist();
    if watchlist.is_empty() {
        lines.push(Line::from(Span::styled(
            "No symbols in watchlist",
            Style::default().fg(C_DIM),
        )));
        lines.push(Line::from(Span::styled(
            "Press a to add symbols",
            Style::default().fg(C_DIM),
        )));
    }

    let primary = dashboard.symbol(PanelSlot::Primary);
    for (index, item) in watchlist.items().iter().enumerate() {
        let active = item.symbol == primary;
        let marker = if active { "▶ " } else { "  " };

        let mut name_style = Style::default().fg(if active { C_ACCENT } else { C_BRIGHT });
        if focused && !menu.open && index == dashboard.selected() {
            name_style = name_style.add_modifier(Modifier::REVERSED);
        }

        lines.push(Line::from(vec![
            Span::styled(marker, Style::default().fg(C_ACCENT)),
            Span::styled(format!("{:<10}", item.name), name_style),
            Span::styled(format!(" {}", item.symbol), Style::default().fg(C_DIM)),
        ]));
    }

    f.render_widget(Paragraph::new(lines), inner);
}

fn render_chart_panel(f: &mut Frame, area: Rect, panel: &ChartPanel, focused: bool) {
    let block = Block::default()
        .title(format!(
            " {} · {} ",
            panel.title(),
            panel.resolution().interval()
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { C_ACCENT } else { C_DIM }));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let message = match panel.status() {
        PanelStatus::Loading => Some(("Loading bars...".to_string(), C_DIM)),
        PanelStatus::NoData => Some(("No data for this period".to_string(), C_DIM)),
        PanelStatus::Failed(error) => Some((format!("Failed to load bars: {error}"), C_SELL)),
        PanelStatus::Ready if panel.bars().is_empty() => Some(("No data".to_string(), C_DIM)),
        PanelStatus::Ready => None,
    };

    if let Some((text, color)) = message {
        f.render_widget(
            Paragraph::new(Line::from(Span::styled(text, Style::default().fg(color)))),
            inner,
        );
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(inner);

    let change = panel.change_pct().unwrap_or(0.0);
    let (arrow, change_color) = if change >= 0.0 { ("▲", C_BUY) } else { ("▼", C_SELL) };
    let price = panel
        .last_price()
        .map(format_price)
        .unwrap_or_else(|| "--".to_string());

    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(price, Style::default().fg(C_BRIGHT).add_modifier(Modifier::BOLD)),
            Span::styled(format!(" {arrow}{change:+.2}%"), Style::default().fg(change_color)),
            Span::styled(
                format!("  {} bars", panel.bars().len()),
                Style::default().fg(C_DIM),
            ),
        ])),
        rows[0],
    );

    let visible = usize::from(rows[1].width);
    let bars: Vec<Bar> = panel.bars().last_n(visible).into_iter().copied().collect();
    f.render_widget(CandleChart::new(&bars), rows[1]);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled("Data provided by ", Style::default().fg(C_DIM)),
        Span::styled("Binance API", Style::default().fg(C_BRIGHT).add_modifier(Modifier::BOLD)),
        Span::styled(
            " • q quit · Tab focus · 1/2 view · a add · d remove · ←/→ symbol · [/] resolution",
            Style::default().fg(C_DIM),
        ),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_DIM));
    f.render_widget(Paragraph::new(line).block(block), area);
}

/// Price with precision suited to its magnitude
fn format_price(price: f64) -> String {
    if price >= 1_000.0 {
        format!("{price:.2}")
    } else if price >= 1.0 {
        format!("{price:.3}")
    } else {
        format!("{price:.6}")
    }
}

/// Candlestick plot, one column per bar, newest bar at the right edge.
#[derive(Debug, Clone, Copy)]
pub struct CandleChart<'a> {
    bars: &'a [Bar],
}

impl<'a> CandleChart<'a> {
    pub fn new(bars: &'a [Bar]) -> Self {
        Self { bars }
    }
}

impl Widget for CandleChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 || self.bars.is_empty() {
            return;
        }

        let (low, high) = self.bars.iter().fold((f64::MAX, f64::MIN), |(low, high), bar| {
            (low.min(bar.low), high.max(bar.high))
        });

        let visible = self.bars.len().min(usize::from(area.width));
        let skip = self.bars.len() - visible;
        let left = area.right() - visible as u16;

        for (offset, bar) in self.bars[skip..].iter().enumerate() {
            let x = left + offset as u16;
            let color = if bar.close >= bar.open { C_BUY } else { C_SELL };

            let wick_top = price_to_row(bar.high, low, high, area.height);
            let wick_bottom = price_to_row(bar.low, low, high, area.height);
            let body_top = price_to_row(bar.open.max(bar.close), low, high, area.height);
            let body_bottom = price_to_row(bar.open.min(bar.close), low, high, area.height);

            for row in wick_top..=wick_bottom {
                let symbol = if (body_top..=body_bottom).contains(&row) { "█" } else { "│" };
                if let Some(cell) = buf.cell_mut((x, area.top() + row)) {
                    cell.set_symbol(symbol).set_fg(color);
                }
            }
        }
    }
}

/// Row offset (0 = top) of `price` in a plot of `height` rows spanning `low..=high`.
fn price_to_row(price: f64, low: f64, high: f64, height: u16) -> u16 {
    let last_row = height.saturating_sub(1);
    if high <= low {
        return last_row / 2;
    }

    let fraction = ((high - price) / (high - low)).clamp(0.0, 1.0);
    (fraction * f64::from(last_row)).round() as u16
}
