pub mod cli;
pub mod events;
pub mod input;
pub mod state;

pub use events::Command;
pub use state::*;
