use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use mpd::idle::{Idle, Subsystem};
use mpd::{Client, Query, Song, State, Term};
use tracing::{debug, info};

use crate::app::{App, Command, QueueRow};
use crate::config::ServerProfile;
use crate::search::{build_groupings, song_label};

/// Timeout ladder for the connection sweep. The whole profile list is tried
/// at each step before the step grows.
fn timeout_steps() -> impl Iterator<Item = Duration> {
    (100u64..5100).step_by(1000).map(Duration::from_millis)
}

/// How a watch ended: the daemon reported changes, or the interrupt source
/// produced a command (with the subscription already released).
pub enum Watched {
    Changed(Vec<Subsystem>),
    Interrupted(Command),
}

/// The live daemon session: the protocol client plus a second handle on the
/// same socket used only to poll for readiness while an idle request is
/// outstanding. Generic over the stream so tests can script the daemon side.
#[derive(Debug)]
pub struct Player<S: Read + Write = TcpStream> {
    client: Client<S>,
    watch: TcpStream,
}

impl Player {
    /// Walk profiles × timeout ladder; the first daemon to accept wins.
    /// Authentication happens only after a successful connect, and the
    /// post-connect socket timeout is the profile's configured value or ten
    /// times the step that succeeded.
    pub fn connect(profiles: &[ServerProfile]) -> Result<Player> {
        if profiles.is_empty() {
            bail!("no servers configured; add a [[server]] entry to the config file");
        }
        for step in timeout_steps() {
            for profile in profiles {
                match Self::try_profile(profile, step) {
                    Ok(player) => {
                        info!("connected to {} within {step:?}", profile.address());
                        return Ok(player);
                    }
                    Err(err) => {
                        debug!("connect {} at {step:?} failed: {err:#}", profile.address());
                    }
                }
            }
        }
        let tried: Vec<String> = profiles.iter().map(|p| p.address()).collect();
        bail!("no server reachable; tried {}", tried.join(", "))
    }

    fn try_profile(profile: &ServerProfile, step: Duration) -> Result<Player> {
        let addr = (profile.host.as_str(), profile.port)
            .to_socket_addrs()?
            .next()
            .context("host resolved to no addresses")?;
        let stream = TcpStream::connect_timeout(&addr, step)?;
        // Banner and authentication run under the ladder step.
        stream.set_read_timeout(Some(step))?;
        stream.set_write_timeout(Some(step))?;
        let watch = stream.try_clone()?;

        let mut player = Player::over(stream, watch)?;
        if let Some(password) = &profile.password {
            player
                .client
                .login(password)
                .with_context(|| format!("authentication to {} failed", profile.address()))?;
        }

        // Socket timeouts are options on the shared socket, so setting them
        // through the watch clone also covers the stream inside the client.
        let settle = profile
            .timeout
            .map(Duration::from_secs)
            .unwrap_or(step * 10);
        player.watch.set_read_timeout(Some(settle))?;
        player.watch.set_write_timeout(Some(settle))?;
        Ok(player)
    }
}

impl<S: Read + Write> Player<S> {
    /// Wrap an established protocol stream; reads the daemon banner. `watch`
    /// is the readiness side: in production a clone of the same socket.
    fn over(stream: S, watch: TcpStream) -> Result<Player<S>> {
        Ok(Player {
            client: Client::new(stream)?,
            watch,
        })
    }

    /// Hold the idle subscription until the daemon reports a change or
    /// `interrupt` yields a command. The subscription is released (noidle)
    /// before a command is returned, so the caller is free to talk to the
    /// daemon and must then re-enter the watch. Releasing on every exit path
    /// is carried by the guard's drop.
    pub fn watch_idle<F>(&mut self, mut interrupt: F) -> Result<Watched>
    where
        F: FnMut() -> Result<Option<Command>>,
    {
        let guard = self.client.idle(&[])?;
        loop {
            if socket_ready(&self.watch)? {
                let changed = guard.get()?;
                return Ok(Watched::Changed(changed));
            }
            if let Some(command) = interrupt()? {
                drop(guard);
                return Ok(Watched::Interrupted(command));
            }
        }
    }

    /// Execute one command against the daemon. Callers guarantee no idle
    /// request is outstanding; `watch_idle` released it before handing the
    /// command over.
    pub fn dispatch(&mut self, app: &mut App, command: Command) -> Result<()> {
        match command {
            Command::Play => self.client.pause(false).context("play failed")?,
            Command::Pause => self.client.pause(true).context("pause failed")?,
            Command::Toggle => {
                let status = self.client.status().context("status query failed")?;
                self.client
                    .pause(status.state == State::Play)
                    .context("toggle failed")?;
            }
            Command::SetVolume(fraction) => {
                let volume = (fraction * 100.0) as i8;
                self.client.volume(volume).context("set volume failed")?;
                // The gauge is the user's control; show the change at once
                // rather than waiting for the mixer notification.
                app.volume = volume;
            }
            Command::PlayRow(id) => self.client.switch(id).context("play song failed")?,
            Command::DeleteRow(id) => {
                self.client.delete(id).context("delete failed")?;
                app.remove_row(id);
            }
            Command::Search(query) => self.run_search(app, &query)?,
            Command::Enqueue(songs) => {
                for song in &songs {
                    self.client
                        .push(song)
                        .with_context(|| format!("enqueue {} failed", song.file))?;
                }
            }
            Command::Quit => app.is_running = false,
        }
        Ok(())
    }

    /// Pull current song and status once, then apply the sections selected
    /// by the changed subsystems. `None` means the full refresh run once
    /// right after connecting.
    pub fn refresh(&mut self, app: &mut App, changed: Option<&[Subsystem]>) -> Result<()> {
        let current = self.client.currentsong().context("current song query failed")?;
        let status = self.client.status().context("status query failed")?;

        let hit = |subsystem: Subsystem| changed.map_or(true, |c| c.contains(&subsystem));

        if hit(Subsystem::Queue) {
            let queue = self.client.queue().context("queue query failed")?;
            let rows = queue
                .iter()
                .filter_map(|song| {
                    let id = song.place.as_ref()?.id;
                    Some(QueueRow {
                        id,
                        label: song_label(song),
                    })
                })
                .collect();
            app.set_queue(rows);
        }

        if hit(Subsystem::Queue) || hit(Subsystem::Player) {
            app.state = status.state;
            app.current = current
                .as_ref()
                .and_then(|song| song.place.as_ref())
                .map(|place| place.id);
            app.subtitle = match status.state {
                State::Play => current.as_ref().map(song_label),
                _ => None,
            };
        }

        if hit(Subsystem::Mixer) {
            app.volume = status.volume;
        }

        Ok(())
    }

    fn run_search(&mut self, app: &mut App, query: &str) -> Result<()> {
        let artist_songs = self.field_search(Term::Tag("artist".into()), query)?;
        let album_songs = self.field_search(Term::Tag("album".into()), query)?;
        let title_songs = self.field_search(Term::Tag("title".into()), query)?;
        let file_songs = self.field_search(Term::File, query)?;

        let groups = build_groupings(&artist_songs, &album_songs, &title_songs, &file_songs);
        app.search.set_rows(groups.into_rows());
        Ok(())
    }

    fn field_search(&mut self, term: Term, needle: &str) -> Result<Vec<Song>> {
        let mut query = Query::new();
        query.and(term, needle);
        self.client
            .search(&query, None)
            .context("search query failed")
    }
}

/// True when the daemon socket has bytes waiting, without consuming them.
fn socket_ready(stream: &TcpStream) -> Result<bool> {
    use nix::errno::Errno;
    use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
    use std::os::fd::AsFd;

    let mut fds = [PollFd::new(stream.as_fd(), PollFlags::POLLIN)];
    match poll(&mut fds, PollTimeout::ZERO) {
        Ok(n) => Ok(n > 0),
        Err(Errno::EINTR) => Ok(false),
        Err(err) => Err(err).context("poll on daemon socket"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::Theme;
    use std::collections::VecDeque;
    use std::io;
    use std::net::{SocketAddr, TcpListener};
    use std::sync::{Arc, Mutex};
    use std::thread;

    /// The daemon side of an in-memory session: canned reply bytes consumed
    /// in order, every byte written by the client captured for inspection.
    struct ScriptStream {
        replies: VecDeque<u8>,
        written: Arc<Mutex<Vec<u8>>>,
    }

    impl ScriptStream {
        fn new(replies: &[u8]) -> (Self, Arc<Mutex<Vec<u8>>>) {
            let written = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    replies: replies.iter().copied().collect(),
                    written: written.clone(),
                },
                written,
            )
        }
    }

    impl Read for ScriptStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut n = 0;
            while n < buf.len() {
                match self.replies.pop_front() {
                    Some(byte) => {
                        buf[n] = byte;
                        n += 1;
                        // Stop at line ends so the script is consumed in the
                        // same request/response rhythm as a socket.
                        if byte == b'\n' {
                            break;
                        }
                    }
                    None => break,
                }
            }
            Ok(n)
        }
    }

    impl Write for ScriptStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// A connected-but-silent loopback socket: never readable, so the idle
    /// watch always falls through to the interrupt source.
    fn silent_watch() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    fn command_words(written: &Arc<Mutex<Vec<u8>>>) -> Vec<String> {
        let bytes = written.lock().unwrap();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter_map(|line| line.split_whitespace().next().map(str::to_string))
            .collect()
    }

    fn test_app() -> App {
        App::new(Theme::default())
    }

    const BANNER: &[u8] = b"OK MPD 0.23.5\n";

    #[test]
    fn dispatch_suspends_before_and_resumes_after_a_command() {
        // Replies: banner, noidle ack, pause ack, trailing noidle ack.
        let (stream, written) = ScriptStream::new(b"OK MPD 0.23.5\nOK\nOK\nOK\n");
        let (watch, _server) = silent_watch();
        let mut player = Player::over(stream, watch).unwrap();
        let mut app = test_app();

        let watched = player.watch_idle(|| Ok(Some(Command::Pause))).unwrap();
        let command = match watched {
            Watched::Interrupted(command) => command,
            Watched::Changed(_) => panic!("nothing was readable"),
        };
        player.dispatch(&mut app, command).unwrap();

        // Resume, then release again so the written tail is deterministic.
        let _ = player.watch_idle(|| Ok(Some(Command::Quit)));

        assert_eq!(
            command_words(&written),
            ["idle", "noidle", "pause", "idle", "noidle"]
        );
    }

    #[test]
    fn failed_command_still_resumes_the_subscription() {
        let (stream, written) =
            ScriptStream::new(b"OK MPD 0.23.5\nOK\nACK [2@0] {pause} Boolean (0/1) expected\nOK\n");
        let (watch, _server) = silent_watch();
        let mut player = Player::over(stream, watch).unwrap();
        let mut app = test_app();

        let watched = player.watch_idle(|| Ok(Some(Command::Pause))).unwrap();
        let command = match watched {
            Watched::Interrupted(command) => command,
            Watched::Changed(_) => panic!("nothing was readable"),
        };
        assert!(player.dispatch(&mut app, command).is_err());

        // The loop re-enters the watch regardless of the dispatch result.
        let _ = player.watch_idle(|| Ok(Some(Command::Quit)));

        assert_eq!(
            command_words(&written),
            ["idle", "noidle", "pause", "idle", "noidle"]
        );
    }

    #[test]
    fn search_runs_four_field_passes_between_suspend_and_resume() {
        // Replies: banner, noidle ack, one hit for the artist pass, empty
        // album/title/file passes, trailing noidle ack.
        let script = b"OK MPD 0.23.5\nOK\n\
            file: beatles/help.mp3\nTitle: Help!\nArtist: The Beatles\nOK\n\
            OK\nOK\nOK\nOK\n";
        let (stream, written) = ScriptStream::new(script);
        let (watch, _server) = silent_watch();
        let mut player = Player::over(stream, watch).unwrap();
        let mut app = test_app();

        let watched = player
            .watch_idle(|| Ok(Some(Command::Search("beatles".to_string()))))
            .unwrap();
        let command = match watched {
            Watched::Interrupted(command) => command,
            Watched::Changed(_) => panic!("nothing was readable"),
        };
        player.dispatch(&mut app, command).unwrap();
        let _ = player.watch_idle(|| Ok(Some(Command::Quit)));

        assert_eq!(
            command_words(&written),
            ["idle", "noidle", "search", "search", "search", "search", "idle", "noidle"]
        );

        // The passes run in the artist, album, title, file order.
        let bytes = written.lock().unwrap();
        let text = String::from_utf8_lossy(&bytes);
        let fields: Vec<_> = text
            .lines()
            .filter(|line| line.starts_with("search"))
            .filter_map(|line| line.split_whitespace().nth(1))
            .collect();
        assert_eq!(fields, ["artist", "album", "title", "file"]);

        let labels: Vec<_> = app.search.rows.iter().map(|row| row.label.as_str()).collect();
        assert_eq!(labels, ["The Beatles", "The Beatles – ?", "The Beatles – Help!"]);
    }

    #[test]
    fn readable_watch_yields_changed_subsystems() {
        let (stream, written) = ScriptStream::new(b"OK MPD 0.23.5\nchanged: playlist\nOK\n");
        let (watch, mut server) = silent_watch();
        // Make the watch readable before the idle request goes out.
        server.write_all(b"x").unwrap();
        let mut player = Player::over(stream, watch).unwrap();

        let watched = player
            .watch_idle(|| panic!("interrupt must not be polled when readable"))
            .unwrap();
        match watched {
            Watched::Changed(changed) => assert_eq!(changed, vec![Subsystem::Queue]),
            Watched::Interrupted(_) => panic!("expected a change notification"),
        }
        assert_eq!(command_words(&written), ["idle"]);
    }

    #[test]
    fn quit_reaches_the_app_without_touching_the_daemon() {
        let (stream, written) = ScriptStream::new(BANNER);
        let (watch, _server) = silent_watch();
        let mut player = Player::over(stream, watch).unwrap();
        let mut app = test_app();

        player.dispatch(&mut app, Command::Quit).unwrap();
        assert!(!app.is_running);
        assert!(command_words(&written).is_empty());
    }

    #[test]
    fn full_refresh_fills_queue_player_and_mixer_state() {
        let script = b"OK MPD 0.23.5\n\
            file: albums/x/one.mp3\nTitle: One\nArtist: X\nPos: 0\nId: 7\nOK\n\
            volume: 40\nrepeat: 0\nrandom: 0\nsingle: 0\nconsume: 0\n\
            playlist: 3\nplaylistlength: 2\nstate: play\nsong: 0\nsongid: 7\n\
            time: 10:120\nelapsed: 10.000\nbitrate: 128\naudio: 44100:24:2\nOK\n\
            file: albums/x/one.mp3\nTitle: One\nArtist: X\nPos: 0\nId: 7\n\
            file: albums/x/two.mp3\nTitle: Two\nArtist: X\nPos: 1\nId: 8\nOK\n";
        let (stream, _written) = ScriptStream::new(script);
        let (watch, _server) = silent_watch();
        let mut player = Player::over(stream, watch).unwrap();
        let mut app = test_app();

        player.refresh(&mut app, None).unwrap();

        let labels: Vec<_> = app.queue.iter().map(|row| row.label.as_str()).collect();
        assert_eq!(labels, ["X – One", "X – Two"]);
        assert_eq!(app.current, Some(mpd::Id(7)));
        assert_eq!(app.state, State::Play);
        assert_eq!(app.subtitle.as_deref(), Some("X – One"));
        assert_eq!(app.volume, 40);
    }

    #[test]
    fn mixer_only_notification_skips_the_queue_query() {
        // currentsong (empty), status, and no playlistinfo reply at all: the
        // script would run dry if refresh asked for the queue.
        let script = b"OK MPD 0.23.5\n\
            OK\n\
            volume: 55\nrepeat: 0\nrandom: 0\nsingle: 0\nconsume: 0\n\
            playlist: 3\nplaylistlength: 0\nstate: stop\nOK\n";
        let (stream, _written) = ScriptStream::new(script);
        let (watch, _server) = silent_watch();
        let mut player = Player::over(stream, watch).unwrap();
        let mut app = test_app();

        player.refresh(&mut app, Some(&[Subsystem::Mixer])).unwrap();

        assert_eq!(app.volume, 55);
        assert!(app.queue.is_empty());
        assert_eq!(app.subtitle, None);
    }

    #[test]
    fn repeated_full_refresh_is_idempotent() {
        let state: &[u8] = b"file: a.mp3\nTitle: One\nArtist: X\nPos: 0\nId: 7\nOK\n\
            volume: 40\nrepeat: 0\nrandom: 0\nsingle: 0\nconsume: 0\n\
            playlist: 3\nplaylistlength: 1\nstate: play\nsong: 0\nsongid: 7\nOK\n\
            file: a.mp3\nTitle: One\nArtist: X\nPos: 0\nId: 7\nOK\n";
        let mut script = BANNER.to_vec();
        script.extend_from_slice(state);
        script.extend_from_slice(state);
        let (stream, _written) = ScriptStream::new(&script);
        let (watch, _server) = silent_watch();
        let mut player = Player::over(stream, watch).unwrap();
        let mut app = test_app();

        player.refresh(&mut app, None).unwrap();
        let before = (
            app.queue.clone(),
            app.current,
            app.state,
            app.subtitle.clone(),
            app.volume,
            app.cursor,
        );
        player.refresh(&mut app, None).unwrap();
        let after = (
            app.queue.clone(),
            app.current,
            app.state,
            app.subtitle.clone(),
            app.volume,
            app.cursor,
        );
        assert_eq!(before, after);
    }

    // ── Connection ladder ────────────────────────────────────────────────

    fn profile(addr: SocketAddr) -> ServerProfile {
        ServerProfile {
            host: addr.ip().to_string(),
            port: addr.port(),
            password: None,
            timeout: None,
        }
    }

    /// Accepts and immediately closes every connection, recording a marker
    /// per accept. The client sees EOF instead of a banner, so the attempt
    /// fails fast and strictly after the marker was written.
    fn spawn_marking_server(marker: char, log: Arc<Mutex<Vec<char>>>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for conn in listener.incoming() {
                let Ok(conn) = conn else { break };
                log.lock().unwrap().push(marker);
                drop(conn);
            }
        });
        addr
    }

    /// A minimal daemon: banner, then "OK" to every command line, recording
    /// each received line.
    fn spawn_ok_server(log: Arc<Mutex<Vec<String>>>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            use std::io::{BufRead, BufReader};
            for conn in listener.incoming() {
                let Ok(mut conn) = conn else { break };
                if conn.write_all(b"OK MPD 0.23.5\n").is_err() {
                    continue;
                }
                let reader = BufReader::new(conn.try_clone().unwrap());
                for line in reader.lines() {
                    let Ok(line) = line else { break };
                    log.lock().unwrap().push(line.clone());
                    if line.starts_with("idle") {
                        // No reply until noidle, like the real daemon.
                        continue;
                    }
                    if conn.write_all(b"OK\n").is_err() {
                        break;
                    }
                }
            }
        });
        addr
    }

    fn refused_addr() -> SocketAddr {
        // Bind to grab a free port, then drop the listener.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    #[test]
    fn no_configured_servers_is_an_error() {
        let err = Player::connect(&[]).unwrap_err();
        assert!(err.to_string().contains("no servers configured"));
    }

    #[test]
    fn ladder_sweeps_whole_profile_list_before_raising_the_timeout() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = spawn_marking_server('a', log.clone());
        let second = spawn_marking_server('b', log.clone());

        let err = Player::connect(&[profile(first), profile(second)]).unwrap_err();

        let sequence: String = log.lock().unwrap().iter().collect();
        assert_eq!(sequence, "ababababab"); // two profiles × five steps
        assert!(err.to_string().contains("no server reachable"));
    }

    #[test]
    fn first_reachable_profile_wins_and_stops_the_sweep() {
        let dead_log = Arc::new(Mutex::new(Vec::new()));
        let dead = spawn_marking_server('a', dead_log.clone());
        let live_log = Arc::new(Mutex::new(Vec::new()));
        let live = spawn_ok_server(live_log.clone());

        let player = Player::connect(&[profile(dead), profile(live)]);
        assert!(player.is_ok());
        assert_eq!(dead_log.lock().unwrap().len(), 1);
    }

    #[test]
    fn no_authentication_without_a_configured_password() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let live = spawn_ok_server(log.clone());

        let unreachable = ServerProfile {
            host: "127.0.0.1".to_string(),
            port: refused_addr().port(),
            password: Some("secret".to_string()),
            timeout: None,
        };

        let player = Player::connect(&[unreachable, profile(live)]);
        assert!(player.is_ok());
        let lines = log.lock().unwrap();
        assert!(lines.iter().all(|line| !line.starts_with("password")));
    }

    #[test]
    fn password_is_sent_after_a_successful_connect() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let live = spawn_ok_server(log.clone());

        let mut with_password = profile(live);
        with_password.password = Some("sesame".to_string());

        let player = Player::connect(&[with_password]);
        assert!(player.is_ok());
        let lines = log.lock().unwrap();
        assert!(lines.iter().any(|line| line.starts_with("password")));
    }
}
