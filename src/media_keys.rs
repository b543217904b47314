use std::sync::mpsc::{self, Receiver, Sender};

use mpd::State;
use souvlaki::{MediaControlEvent, MediaControls, MediaMetadata, MediaPlayback, PlatformConfig};
use tracing::warn;

use crate::app::{App, Command};

/// Desktop media-key hookup. Registration is best effort: without a session
/// bus (or on an unsupported desktop) Minim runs fine, just without media
/// keys. Events arrive on souvlaki's own thread and cross into the event
/// loop through the channel only.
pub struct MediaKeys {
    controls: Option<MediaControls>,
    events: Receiver<MediaControlEvent>,
    last_state: Option<State>,
    last_label: Option<String>,
}

impl MediaKeys {
    pub fn register() -> Self {
        let (tx, rx) = mpsc::channel();
        let controls = match attach(tx) {
            Ok(controls) => Some(controls),
            Err(err) => {
                warn!("media keys unavailable: {err:?}");
                None
            }
        };
        Self {
            controls,
            events: rx,
            last_state: None,
            last_label: None,
        }
    }

    /// Next pending key event, translated; unmapped keys are swallowed.
    pub fn poll(&mut self) -> Option<Command> {
        while let Ok(event) = self.events.try_recv() {
            if let Some(command) = translate(event) {
                return Some(command);
            }
        }
        None
    }

    /// Mirror playback state and the current song label so the desktop side
    /// of the keys shows something sensible.
    pub fn mirror(&mut self, app: &App) {
        let Some(controls) = self.controls.as_mut() else {
            return;
        };

        if self.last_state != Some(app.state) {
            let playback = match app.state {
                State::Play => MediaPlayback::Playing { progress: None },
                State::Pause => MediaPlayback::Paused { progress: None },
                State::Stop => MediaPlayback::Stopped,
            };
            if let Err(err) = controls.set_playback(playback) {
                warn!("media keys playback update failed: {err:?}");
            }
            self.last_state = Some(app.state);
        }

        let label = app
            .current
            .and_then(|id| app.queue.iter().find(|row| row.id == id))
            .map(|row| row.label.clone());
        if self.last_label != label {
            let metadata = MediaMetadata {
                title: label.as_deref(),
                ..MediaMetadata::default()
            };
            if let Err(err) = controls.set_metadata(metadata) {
                warn!("media keys metadata update failed: {err:?}");
            }
            self.last_label = label;
        }
    }
}

fn attach(tx: Sender<MediaControlEvent>) -> Result<MediaControls, souvlaki::Error> {
    let config = PlatformConfig {
        dbus_name: "minim",
        display_name: "Minim",
        hwnd: None,
    };
    let mut controls = MediaControls::new(config)?;
    controls.attach(move |event| {
        let _ = tx.send(event);
    })?;
    Ok(controls)
}

/// The play key toggles and the stop key pauses; a dedicated pause key also
/// pauses. Everything else is ignored.
fn translate(event: MediaControlEvent) -> Option<Command> {
    match event {
        MediaControlEvent::Play | MediaControlEvent::Toggle => Some(Command::Toggle),
        MediaControlEvent::Pause | MediaControlEvent::Stop => Some(Command::Pause),
        _ => None,
    }
}
