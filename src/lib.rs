pub mod app;
pub mod config;
pub mod logging;
pub mod media_keys;
pub mod player;
pub mod search;
pub mod theme;
pub mod ui;
