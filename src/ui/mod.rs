pub mod header;
pub mod popover;
pub mod queue;
pub mod utils;

use crate::app::App;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

/// Draw one frame: header, queue, key hints, status line, then overlays.
pub fn ui(f: &mut Frame, app: &mut App) {
    let [header_area, queue_area, footer_area, status_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(f.area());

    header::render(f, header_area, app);
    queue::render(f, queue_area, app);
    render_footer(f, footer_area, app);
    render_status(f, status_area, app);

    // Overlays draw last so they sit on top of the queue.
    popover::render(f, app);
}

fn render_footer(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let key = Style::default().fg(theme.blue).add_modifier(Modifier::BOLD);
    let label = Style::default().fg(theme.overlay);

    let mut spans = Vec::new();
    for (k, what) in [
        ("↑↓", "move"),
        ("⏎", "play"),
        ("d", "remove"),
        ("␣", "toggle"),
        ("+/-", "volume"),
        ("/", "search"),
        ("q", "quit"),
    ] {
        spans.push(Span::styled(format!(" {k} "), key));
        spans.push(Span::styled(what, label));
    }
    let footer = Paragraph::new(Line::from(spans)).alignment(Alignment::Center);
    f.render_widget(footer, area);
}

fn render_status(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    if let Some(toast) = &app.toast {
        let line = Line::from(Span::styled(
            format!(" {}", toast.message),
            Style::default().fg(theme.yellow),
        ));
        f.render_widget(Paragraph::new(line), area);
    }
}
