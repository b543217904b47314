use clap::Parser;
use std::path::PathBuf;

/// Minim - a minimal terminal client for the Music Player Daemon 🎧
#[derive(Parser, Debug)]
#[command(name = "minim", version, about)]
pub struct Args {
    /// Config file path (default: ~/.config/minim/config.toml)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
}
