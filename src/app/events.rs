use mpd::{Id, Song};

/// Every user action that talks to the daemon, plus quitting. Key handling
/// and media keys translate into these; a single dispatcher executes them
/// while the idle subscription is released.
#[derive(Debug, Clone)]
pub enum Command {
    Play,
    Pause,
    Toggle,
    /// Volume as a 0.0–1.0 fraction; sent to the daemon as 0–100.
    SetVolume(f64),
    /// Play a queue row by its stable id.
    PlayRow(Id),
    /// Remove a queue row by its stable id; the row disappears locally at
    /// once and the cursor keeps its visual position.
    DeleteRow(Id),
    /// Run the four field searches and fill the popover.
    Search(String),
    /// Append an activated result group to the queue, in group order.
    Enqueue(Vec<Song>),
    Quit,
}
