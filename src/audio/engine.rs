//! Playback control loop.
//!
//! A single `ControlLoop` owns the queue, the playback session and the
//! volume. It runs on the player's worker thread and is the only code that
//! mutates playback state: user commands arrive through a bounded command
//! channel, completion notifications from the output device through a
//! separate unbounded channel.

use std::time::Duration;

use {
    async_channel::{Receiver, Sender, unbounded},
    rand::thread_rng,
    tokio::{select, sync::oneshot},
    tracing::{debug, warn},
};

use crate::{
    audio::{
        backend::{CompletionNotifier, OutputDevice, SessionId, TrackDecoder},
        events::{PlaybackUpdate, QueueSnapshot, StatusMessage},
        queue::PlaybackQueue,
        track::Track,
        volume::Volume,
    },
    error::PlaybackError,
};

/// Elapsed fraction below which `Previous` restarts the current track.
pub const PREVIOUS_RESTART_THRESHOLD: f64 = 0.10;

/// Messages accepted by the control loop.
#[derive(Debug)]
pub(crate) enum Command {
    Play,
    TogglePlayback,
    Stop,
    ForcePlay(Track),
    Enqueue(Track),
    EnqueueAll(Vec<Track>),
    Skip,
    Previous,
    ClearQueue,
    VolumeUp,
    VolumeDown,
    Shuffle,
    Seek(Duration),
    Snapshot(oneshot::Sender<QueueSnapshot>),
}

/// The track currently bound to the output device.
#[derive(Debug)]
struct Session {
    id: SessionId,
    track: Track,
    paused: bool,
    /// Position the stream was opened at.
    offset: Duration,
}

/// Single-writer playback state machine.
pub(crate) struct ControlLoop {
    queue: PlaybackQueue,
    session: Option<Session>,
    /// Set when the queue was cleared under a live session. The queue
    /// position then names the next track to play instead of the current one.
    detached: bool,
    volume: Volume,
    next_session: u64,
    decoder: Box<dyn TrackDecoder>,
    output: Box<dyn OutputDevice>,
    completions_tx: Sender<SessionId>,
    completions_rx: Receiver<SessionId>,
    updates_tx: Sender<PlaybackUpdate>,
    status_tx: Sender<StatusMessage>,
}

impl ControlLoop {
    pub(crate) fn new(
        decoder: Box<dyn TrackDecoder>,
        output: Box<dyn OutputDevice>,
        volume: Volume,
        updates_tx: Sender<PlaybackUpdate>,
        status_tx: Sender<StatusMessage>,
    ) -> Self {
        let (completions_tx, completions_rx) = unbounded();
        Self {
            queue: PlaybackQueue::default(),
            session: None,
            detached: false,
            volume,
            next_session: 0,
            decoder,
            output,
            completions_tx,
            completions_rx,
            updates_tx,
            status_tx,
        }
    }

    /// Processes commands and completions until the command channel closes.
    pub(crate) async fn run(mut self, commands: Receiver<Command>) {
        self.output.set_volume(self.volume.gain());
        let completions = self.completions_rx.clone();

        loop {
            select! {
                command = commands.recv() => match command {
                    Ok(command) => self.handle(command),
                    Err(_) => {
                        debug!("Command channel closed, exiting control loop");
                        break;
                    }
                },
                Ok(session) = completions.recv() => self.on_completion(session),
            }
        }

        self.halt_session();
    }

    fn handle(&mut self, command: Command) {
        debug!("Handling command: {command:?}");
        match command {
            Command::Play => self.play(),
            Command::TogglePlayback => self.toggle_playback(),
            Command::Stop => self.stop(),
            Command::ForcePlay(track) => self.force_play(track),
            Command::Enqueue(track) => self.enqueue(track),
            Command::EnqueueAll(tracks) => self.enqueue_all(tracks),
            Command::Skip => self.skip(),
            Command::Previous => self.previous(),
            Command::ClearQueue => self.clear_queue(),
            Command::VolumeUp => self.set_volume(self.volume.raised()),
            Command::VolumeDown => self.set_volume(self.volume.lowered()),
            Command::Shuffle => self.shuffle(),
            Command::Seek(position) => self.seek(position),
            Command::Snapshot(reply) => {
                if reply.send(self.snapshot()).is_err() {
                    debug!("Snapshot requester went away");
                }
            }
        }
    }

    fn play(&mut self) {
        match &self.session {
            Some(session) if session.paused => self.set_paused(false),
            Some(_) => debug!("Already playing"),
            None => self.play_current(),
        }
    }

    fn toggle_playback(&mut self) {
        match self.session.as_ref().map(|session| session.paused) {
            Some(paused) => self.set_paused(!paused),
            None => debug!("No session to toggle"),
        }
    }

    fn stop(&mut self) {
        self.halt_session();
        self.queue.clear();
        self.detached = false;
        self.emit_update(PlaybackUpdate::stopped());
    }

    fn force_play(&mut self, track: Track) {
        self.queue.replace_with(track);
        self.play_current();
    }

    fn enqueue(&mut self, track: Track) {
        let label = track.to_string();
        let index = self.queue.push(track);

        if self.session.is_none() {
            self.queue.set_position(index);
            self.play_current();
        } else {
            self.emit_status(format!("Enqueued: {label}"));
        }
    }

    fn enqueue_all(&mut self, tracks: Vec<Track>) {
        let count = tracks.len();
        let Some(first) = self.queue.extend(tracks) else {
            debug!("Nothing to enqueue");
            return;
        };

        if self.session.is_none() {
            self.queue.set_position(first);
            self.play_current();
        }
        self.emit_status(format!("Enqueued {count} tracks"));
    }

    /// Moves to the next queued track, or stops at the end of the queue.
    fn skip(&mut self) {
        let has_next = if self.detached {
            !self.queue.is_empty()
        } else {
            self.queue.advance()
        };

        if has_next {
            self.play_current();
        } else {
            self.halt_session();
            self.detached = false;
            self.emit_update(PlaybackUpdate::stopped());
        }
    }

    fn previous(&mut self) {
        let Some(session) = &self.session else {
            debug!("No session, ignoring previous");
            return;
        };

        // An unknown length counts as just started.
        let fraction = self
            .output
            .progress()
            .and_then(|progress| progress.fraction(session.offset));
        let restart = fraction.is_none_or(|fraction| fraction < PREVIOUS_RESTART_THRESHOLD)
            || self.detached
            || !self.queue.retreat();

        let track = match self.queue.current() {
            Some(track) if !restart => track.clone(),
            _ => session.track.clone(),
        };
        self.start_session(track, Duration::ZERO, false);
    }

    fn clear_queue(&mut self) {
        self.queue.clear();
        self.detached = self.session.is_some();
        self.emit_status("Queue cleared".to_string());
    }

    fn set_volume(&mut self, volume: Volume) {
        self.volume = volume;
        self.output.set_volume(volume.gain());
        self.emit_status(format!("Volume: {volume}"));
    }

    fn shuffle(&mut self) {
        let count = self
            .queue
            .shuffle(&mut thread_rng(), self.session.is_some() && !self.detached);
        self.emit_status(format!("Shuffled {count} tracks"));
    }

    fn seek(&mut self, position: Duration) {
        let Some(session) = &self.session else {
            debug!("No session, ignoring seek");
            return;
        };

        let (track, paused) = (session.track.clone(), session.paused);
        self.start_session(track, position, paused);
    }

    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            tracks: self.queue.tracks().to_vec(),
            position: self.queue.position(),
            now_playing: self.session.as_ref().map(|session| session.track.clone()),
            paused: self.session.as_ref().is_some_and(|session| session.paused),
            volume: self.volume,
        }
    }

    fn on_completion(&mut self, id: SessionId) {
        match &self.session {
            Some(session) if session.id == id => {
                debug!("Session {} finished", id.0);
                self.skip();
            }
            _ => debug!("Ignoring stale completion for session {}", id.0),
        }
    }

    fn set_paused(&mut self, paused: bool) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.paused = paused;
        let track = session.track.clone();

        self.output.set_paused(paused);
        self.emit_update(Self::session_update(track, paused));
    }

    fn play_current(&mut self) {
        self.detached = false;
        match self.queue.current().cloned() {
            Some(track) => self.start_session(track, Duration::ZERO, false),
            None => debug!("Queue is empty, nothing to play"),
        }
    }

    /// Replaces the live session with `track` opened at `offset`.
    ///
    /// Failures are reported as status messages and leave the loop idle.
    fn start_session(&mut self, track: Track, offset: Duration, paused: bool) {
        let was_active = self.session.is_some();
        self.halt_session();

        match self.open_session(&track, offset) {
            Ok(id) => {
                if paused {
                    self.output.set_paused(true);
                }
                self.session = Some(Session {
                    id,
                    track: track.clone(),
                    paused,
                    offset,
                });
                self.emit_update(Self::session_update(track, paused));
            }
            Err(e) => {
                warn!("Failed to play {}: {e}", track.path().display());
                self.emit_status(format!("Cannot play {track}: {e}"));
                if was_active {
                    self.emit_update(PlaybackUpdate::stopped());
                }
            }
        }
    }

    fn open_session(&mut self, track: &Track, offset: Duration) -> Result<SessionId, PlaybackError> {
        let mut source = self.decoder.open(track)?;
        if !offset.is_zero() {
            source.seek(offset)?;
        }

        self.output.init(source.spec())?;
        self.output.set_volume(self.volume.gain());

        let id = SessionId(self.next_session);
        self.next_session += 1;

        let on_complete = CompletionNotifier::new(id, self.completions_tx.clone());
        self.output.play(source, on_complete)?;
        debug!("Started session {} for {}", id.0, track.path().display());
        Ok(id)
    }

    /// Silences and releases the live session, if any.
    fn halt_session(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("Halting session {}", session.id.0);
            self.output.clear();
        }
    }

    fn session_update(track: Track, paused: bool) -> PlaybackUpdate {
        if paused {
            PlaybackUpdate::paused(track)
        } else {
            PlaybackUpdate::playing(track)
        }
    }

    fn emit_update(&self, update: PlaybackUpdate) {
        if self.updates_tx.try_send(update).is_err() {
            debug!("No listener for playback updates");
        }
    }

    fn emit_status(&self, message: String) {
        if self.status_tx.try_send(StatusMessage(message)).is_err() {
            debug!("No listener for status messages");
        }
    }
}
