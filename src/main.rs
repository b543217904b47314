use std::io;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use human_panic::setup_panic;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{info, warn};

use minim::app::cli::Args;
use minim::app::{input, App};
use minim::config::Settings;
use minim::media_keys::MediaKeys;
use minim::player::{Player, Watched};
use minim::{logging, theme, ui};

fn main() -> Result<()> {
    setup_panic!();

    let args = Args::parse();
    logging::init()?;

    let config_path = args.config.unwrap_or_else(Settings::default_path);
    let settings = Settings::load(&config_path)?;
    if settings.servers.is_empty() {
        anyhow::bail!(
            "no servers configured; add a [[server]] entry to {}",
            config_path.display()
        );
    }

    // Connect before the terminal goes up so failures print as plain text.
    let mut player = Player::connect(&settings.servers)?;
    let mut app = App::new(theme::load());

    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &mut app, &mut player);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!("shutting down");
    result
}

/// One synchronous loop. The daemon watch blocks between frames; input
/// polling, media keys, ticks and redraws all run inside the interrupt
/// closure, so the watch is only released when a command needs the wire.
fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    player: &mut Player,
) -> Result<()> {
    let mut media = MediaKeys::register();

    player.refresh(app, None)?;
    media.mirror(app);

    while app.is_running {
        terminal.draw(|f| ui::ui(f, app))?;

        let watched = player.watch_idle(|| {
            // Media keys first so a headset press is never shadowed.
            if let Some(command) = media.poll() {
                return Ok(Some(command));
            }
            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if let Some(command) = input::handle_key(app, key) {
                        return Ok(Some(command));
                    }
                }
            }
            app.on_tick();
            terminal.draw(|f| ui::ui(f, app))?;
            Ok(None)
        })?;

        match watched {
            Watched::Changed(subsystems) => match player.refresh(app, Some(&subsystems)) {
                Ok(()) => media.mirror(app),
                Err(err) => {
                    warn!("refresh after daemon change failed: {err:#}");
                    app.show_toast(format!("Lost sync with the daemon: {err}"));
                }
            },
            Watched::Interrupted(command) => match player.dispatch(app, command) {
                Ok(()) => media.mirror(app),
                Err(err) => {
                    warn!("command failed: {err:#}");
                    app.show_toast(format!("Command failed: {err}"));
                }
            },
        }
    }
    Ok(())
}
