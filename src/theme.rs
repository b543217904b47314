use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// UI palette, Catppuccin Mocha out of the box. An optional
/// `~/.config/minim/theme.toml` overrides any subset of it; the file is never
/// written by Minim itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub surface: Color,
    pub overlay: Color,
    pub text: Color,
    pub red: Color,
    pub green: Color,
    pub yellow: Color,
    pub blue: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            surface: Color::Rgb(49, 50, 68),
            overlay: Color::Rgb(108, 112, 134),
            text: Color::Rgb(205, 214, 244),
            red: Color::Rgb(243, 139, 168),
            green: Color::Rgb(166, 227, 161),
            yellow: Color::Rgb(249, 226, 175),
            blue: Color::Rgb(137, 180, 250),
        }
    }
}

fn theme_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("minim");
    path.push("theme.toml");
    path
}

pub fn load() -> Theme {
    let path = theme_path();
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str(&content) {
            Ok(theme) => return theme,
            Err(err) => tracing::warn!("ignoring malformed theme {}: {err}", path.display()),
        }
    }
    Theme::default()
}
