use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::events::Command;
use crate::app::state::App;

/// Translate a key press into an immediate App mutation (cursor moves,
/// popover editing) or a Command for the dispatcher. Mutations return None so
/// the idle subscription stays up.
pub fn handle_key(app: &mut App, key: KeyEvent) -> Option<Command> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Command::Quit);
    }
    if app.search_open {
        return handle_search_key(app, key);
    }
    match key.code {
        KeyCode::Char('q') => Some(Command::Quit),
        KeyCode::Up | KeyCode::Char('k') => {
            app.move_cursor(-1);
            None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            app.move_cursor(1);
            None
        }
        KeyCode::Enter => app.selected().map(|row| Command::PlayRow(row.id)),
        KeyCode::Delete | KeyCode::Char('d') => {
            app.selected().map(|row| Command::DeleteRow(row.id))
        }
        KeyCode::Char(' ') => Some(Command::Toggle),
        KeyCode::Char('p') => Some(Command::Pause),
        KeyCode::Char('P') => Some(Command::Play),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(volume_step(app, 5)),
        KeyCode::Char('-') => Some(volume_step(app, -5)),
        KeyCode::Char('/') => {
            app.open_search();
            None
        }
        _ => None,
    }
}

fn handle_search_key(app: &mut App, key: KeyEvent) -> Option<Command> {
    match key.code {
        KeyCode::Esc => {
            app.close_search();
            None
        }
        KeyCode::Enter => {
            if app.search.dirty || app.search.rows.is_empty() {
                let query = app.search.query.trim();
                if query.is_empty() {
                    return None;
                }
                Some(Command::Search(query.to_string()))
            } else {
                app.search
                    .rows
                    .get(app.search.selected)
                    .map(|row| Command::Enqueue(row.songs.clone()))
            }
        }
        KeyCode::Up => {
            app.search.move_selection(-1);
            None
        }
        KeyCode::Down => {
            app.search.move_selection(1);
            None
        }
        KeyCode::Backspace => {
            app.search.query.pop();
            app.search.dirty = true;
            None
        }
        KeyCode::Char(c) => {
            app.search.query.push(c);
            app.search.dirty = true;
            None
        }
        _ => None,
    }
}

/// Relative volume keys become the absolute fraction the daemon call wants.
fn volume_step(app: &App, delta: i8) -> Command {
    let next = (i16::from(app.volume.max(0)) + i16::from(delta)).clamp(0, 100);
    Command::SetVolume(f64::from(next) / 100.0)
}
