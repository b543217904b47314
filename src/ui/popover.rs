use crate::app::App;
use crate::search::{ResultRow, RowKind};
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

use super::utils::truncate;

/// Search popover, drawn over the queue while open. Sized to its
/// content but never past half the frame in either direction.
pub fn render(f: &mut Frame, app: &App) {
    if !app.search_open {
        return;
    }
    let theme = &app.theme;
    let frame_area = f.area();
    let search = &app.search;

    let widest = content_width(&search.query, &search.rows);
    let area = popup_area(frame_area, widest, search.rows.len());
    f.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.blue))
        .title(Span::styled(
            " Search ",
            Style::default().fg(theme.blue).add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut lines = Vec::new();
    lines.push(Line::from(vec![
        Span::styled(
            " / ",
            Style::default().fg(theme.green).add_modifier(Modifier::BOLD),
        ),
        Span::styled(search.query.clone(), Style::default().fg(theme.text)),
        Span::styled(
            "▌",
            Style::default()
                .fg(theme.green)
                .add_modifier(Modifier::SLOW_BLINK),
        ),
    ]));

    if search.rows.is_empty() {
        let hint = if search.query.is_empty() || search.dirty {
            "Type, then press Enter"
        } else {
            "No results"
        };
        lines.push(Line::from(Span::styled(
            format!(" {hint}"),
            Style::default().fg(theme.overlay),
        )));
    } else {
        let visible = usize::from(inner.height).saturating_sub(1);
        let start = search
            .selected
            .saturating_sub(visible / 2)
            .min(search.rows.len().saturating_sub(visible));
        let label_w = usize::from(inner.width).saturating_sub(7);

        for (offset, row) in search.rows.iter().skip(start).take(visible).enumerate() {
            let is_sel = start + offset == search.selected;
            let marker = if is_sel { "●" } else { "○" };
            let icon = match row.kind {
                RowKind::Artist => "👤",
                RowKind::Album => "💿",
                RowKind::Title => "♪ ",
            };
            let label_style = if is_sel {
                Style::default().fg(theme.text).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(theme.text)
            };
            lines.push(Line::from(vec![
                Span::styled(
                    format!(" {marker} "),
                    Style::default().fg(if is_sel { theme.yellow } else { theme.surface }),
                ),
                Span::styled(format!("{icon} "), Style::default().fg(theme.overlay)),
                Span::styled(truncate(&row.label, label_w), label_style),
            ]));
        }
    }

    f.render_widget(Paragraph::new(lines), inner);
}

/// Width the content wants: the widest row label or the query, padded for
/// the marker and icon columns, with a floor so an empty popover still has
/// room to type into.
fn content_width(query: &str, rows: &[ResultRow]) -> usize {
    rows.iter()
        .map(|row| row.label.width() + 8)
        .chain([query.width() + 8, 32])
        .max()
        .unwrap_or(32)
}

/// Where the popover goes: sized to its content but clamped to half the
/// frame in both directions, centered horizontally, a third of the way down.
fn popup_area(frame: Rect, widest: usize, rows: usize) -> Rect {
    let width = (widest as u16)
        .min(frame.width / 2)
        .min(frame.width.saturating_sub(2))
        .max(1);
    let max_h = (frame.height / 2).clamp(3, frame.height.max(3));
    let height = ((rows as u16).saturating_add(3)).min(max_h);
    let x = frame.width.saturating_sub(width) / 2;
    let y = frame.height.saturating_sub(height) / 3;
    Rect::new(x, y, width, height)
}
