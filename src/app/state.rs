use std::time::{Duration, Instant};

use mpd::{Id, State};

use crate::search::ResultRow;
use crate::theme::Theme;

/// One row of the queue pane: the server's stable queue id plus the computed
/// display label.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRow {
    pub id: Id,
    pub label: String,
}

/// Search popover state. `dirty` flips when the entry text changes after a
/// search, so Enter knows whether to re-run the search or activate a row.
#[derive(Debug, Default)]
pub struct SearchState {
    pub query: String,
    pub rows: Vec<ResultRow>,
    pub selected: usize,
    pub dirty: bool,
}

impl SearchState {
    pub fn move_selection(&mut self, delta: isize) {
        if self.rows.is_empty() {
            return;
        }
        let last = self.rows.len() - 1;
        self.selected = if delta < 0 {
            self.selected.saturating_sub(delta.unsigned_abs())
        } else {
            (self.selected + delta as usize).min(last)
        };
    }

    pub fn set_rows(&mut self, rows: Vec<ResultRow>) {
        self.rows = rows;
        self.selected = 0;
        self.dirty = false;
    }
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub deadline: Instant,
}

pub struct App {
    pub theme: Theme,
    pub is_running: bool,

    /// Mirror of the daemon's queue, rebuilt wholesale on playlist changes.
    pub queue: Vec<QueueRow>,
    pub state: State,
    /// Raw server volume; −1 means the daemon has no mixer.
    pub volume: i8,
    /// Queue id of the song the daemon reports as current.
    pub current: Option<Id>,
    /// Header subtitle: the current song's label while playing.
    pub subtitle: Option<String>,

    pub cursor: usize,
    pub search_open: bool,
    pub search: SearchState,
    pub toast: Option<Toast>,
}

impl App {
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            is_running: true,
            queue: Vec::new(),
            state: State::Stop,
            volume: 0,
            current: None,
            subtitle: None,
            cursor: 0,
            search_open: false,
            search: SearchState::default(),
            toast: None,
        }
    }

    pub fn selected(&self) -> Option<&QueueRow> {
        self.queue.get(self.cursor)
    }

    pub fn move_cursor(&mut self, delta: isize) {
        if self.queue.is_empty() {
            return;
        }
        let last = self.queue.len() - 1;
        self.cursor = if delta < 0 {
            self.cursor.saturating_sub(delta.unsigned_abs())
        } else {
            (self.cursor + delta as usize).min(last)
        };
    }

    /// Replace the queue snapshot, keeping the cursor at the same row index
    /// (clamped to the new length).
    pub fn set_queue(&mut self, rows: Vec<QueueRow>) {
        self.queue = rows;
        self.cursor = match self.queue.len() {
            0 => 0,
            len => self.cursor.min(len - 1),
        };
    }

    /// Drop a row locally without waiting for the next playlist notification;
    /// the cursor stays at the same visual position.
    pub fn remove_row(&mut self, id: Id) {
        if let Some(index) = self.queue.iter().position(|row| row.id == id) {
            self.queue.remove(index);
            self.cursor = match self.queue.len() {
                0 => 0,
                len => index.min(len - 1),
            };
        }
    }

    pub fn open_search(&mut self) {
        self.search_open = true;
    }

    pub fn close_search(&mut self) {
        self.search_open = false;
    }

    pub fn show_toast(&mut self, message: impl Into<String>) {
        self.toast = Some(Toast {
            message: message.into(),
            deadline: Instant::now() + Duration::from_secs(4),
        });
    }

    /// Called every tick.
    pub fn on_tick(&mut self) {
        if let Some(ref toast) = self.toast {
            if Instant::now() > toast.deadline {
                self.toast = None;
            }
        }
    }
}
