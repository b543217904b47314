use crate::app::App;
use crate::theme::Theme;
use mpd::State;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};
use ratatui::Frame;

use super::utils::truncate;

/// Top bar: playback glyph, the current song while playing, volume gauge.
pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.surface))
        .title(Span::styled(
            " Minim ",
            Style::default().fg(theme.blue).add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let [now_area, volume_area] =
        Layout::horizontal([Constraint::Min(1), Constraint::Length(18)]).areas(inner);

    let glyph = match app.state {
        State::Play => "▶",
        _ => "⏸",
    };
    let mut spans = vec![Span::styled(
        format!(" {glyph} "),
        Style::default().fg(theme.green).add_modifier(Modifier::BOLD),
    )];
    if let Some(subtitle) = &app.subtitle {
        spans.push(Span::styled(
            truncate(subtitle, usize::from(now_area.width.saturating_sub(4))),
            Style::default().fg(theme.text),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), now_area);

    // status() reports -1 when the daemon has no mixer; show that as silence.
    let volume = app.volume.max(0);
    f.render_widget(Paragraph::new(volume_line(volume, theme)), volume_area);
}

fn volume_line(volume: i8, theme: &Theme) -> Line<'static> {
    let cells = usize::from(volume_cells(volume));
    let bar = format!("{}{}", "█".repeat(cells), "░".repeat(10 - cells));
    Line::from(vec![
        Span::styled(bar, Style::default().fg(theme.blue)),
        Span::styled(
            format!(" {volume:>3}% "),
            Style::default().fg(theme.overlay),
        ),
    ])
}

/// Map 0..=100 onto ten gauge cells, rounding to the nearest cell.
fn volume_cells(volume: i8) -> u8 {
    ((i16::from(volume.clamp(0, 100)) + 5) / 10) as u8
}
