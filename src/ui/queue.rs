use crate::app::App;
use mpd::State;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};
use ratatui::Frame;

use super::utils::truncate;

/// Queue panel. One marker cell per row: the current song carries the
/// playback glyph, every other row stays blank.
pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;

    let title = if app.queue.is_empty() {
        " Queue ".to_string()
    } else {
        format!(" Queue · {} ", app.queue.len())
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.surface))
        .title(Span::styled(title, Style::default().fg(theme.text)));
    let inner = block.inner(area);
    f.render_widget(block, area);

    if app.queue.is_empty() {
        let hint = Paragraph::new(Line::from(Span::styled(
            "Queue is empty. Press / to search the library.",
            Style::default().fg(theme.overlay),
        )))
        .alignment(Alignment::Center);
        f.render_widget(hint, inner);
        return;
    }

    let height = usize::from(inner.height);
    let label_w = usize::from(inner.width).saturating_sub(3);
    let start = app
        .cursor
        .saturating_sub(height / 2)
        .min(app.queue.len().saturating_sub(height));

    let playing = app.state == State::Play;
    let mut lines = Vec::with_capacity(height);
    for (offset, row) in app.queue.iter().skip(start).take(height).enumerate() {
        let is_cursor = start + offset == app.cursor;
        let is_current = app.current == Some(row.id);

        let marker = if is_current {
            if playing {
                "▶"
            } else {
                "⏸"
            }
        } else {
            " "
        };

        let base = if is_cursor {
            Style::default().bg(theme.surface)
        } else {
            Style::default()
        };
        let label_style = if is_cursor {
            base.fg(theme.text).add_modifier(Modifier::BOLD)
        } else if is_current {
            base.fg(theme.green)
        } else {
            base.fg(theme.text)
        };

        lines.push(Line::from(vec![
            Span::styled(
                format!(" {marker} "),
                base.fg(theme.green).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("{:label_w$}", truncate(&row.label, label_w)),
                label_style,
            ),
        ]));
    }
    f.render_widget(Paragraph::new(lines), inner);
}
