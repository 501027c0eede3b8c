//! Player facade.
//!
//! `Player` is the only handle callers hold. Every method turns into one
//! command for the control loop running on the player's worker thread;
//! playback and status changes come back on two event channels.

use std::{
    thread::{Builder as ThreadBuilder, JoinHandle},
    time::Duration,
};

use {
    async_channel::{Receiver, Sender, bounded, unbounded},
    tokio::{runtime::Builder, sync::oneshot},
    tracing::{debug, error},
};

use crate::{
    audio::{
        backend::{Backend, OutputDevice, TrackDecoder},
        decoder::SymphoniaDecoder,
        engine::{Command, ControlLoop},
        events::{PlaybackUpdate, QueueSnapshot, StatusMessage},
        output::{CpalOutput, OutputConfig},
        track::Track,
        volume::Volume,
    },
    config::UserSettings,
    error::PlayerError,
};

/// Handle to a running playback engine.
///
/// Commands sent from one thread are processed in call order. When the
/// command queue is full, callers block until the control loop catches up.
pub struct Player {
    commands: Sender<Command>,
    updates: Receiver<PlaybackUpdate>,
    status: Receiver<StatusMessage>,
    worker: Option<JoinHandle<()>>,
}

impl Player {
    /// Starts a player that decodes with symphonia and plays through cpal.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError` if the worker thread cannot be started.
    pub fn new(settings: &UserSettings) -> Result<Self, PlayerError> {
        let output_config = OutputConfig::from(settings);
        Self::with_backend(settings, move || -> Backend {
            let decoder: Box<dyn TrackDecoder> = Box::new(SymphoniaDecoder);
            let output: Box<dyn OutputDevice> = Box::new(CpalOutput::new(output_config));
            (decoder, output)
        })
    }

    /// Starts a player on a custom decoder and output device.
    ///
    /// `backend` runs on the worker thread, so the output device never has
    /// to cross threads.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError` if the worker runtime or thread cannot be created.
    pub fn with_backend<F>(settings: &UserSettings, backend: F) -> Result<Self, PlayerError>
    where
        F: FnOnce() -> Backend + Send + 'static,
    {
        let (commands_tx, commands_rx) = bounded(settings.command_queue_capacity.max(1));
        let (updates_tx, updates_rx) = unbounded();
        let (status_tx, status_rx) = unbounded();
        let volume = Volume::new(settings.initial_volume);

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(PlayerError::RuntimeError)?;

        let worker = ThreadBuilder::new()
            .name("chime-control".to_string())
            .spawn(move || {
                let (decoder, output) = backend();
                let control = ControlLoop::new(decoder, output, volume, updates_tx, status_tx);
                runtime.block_on(control.run(commands_rx));
                debug!("Control loop stopped");
            })
            .map_err(PlayerError::SpawnError)?;

        Ok(Self {
            commands: commands_tx,
            updates: updates_rx,
            status: status_rx,
            worker: Some(worker),
        })
    }

    fn send(&self, command: Command) -> Result<(), PlayerError> {
        self.commands
            .send_blocking(command)
            .map_err(|_| PlayerError::Closed)
    }

    /// Resumes the paused session, or starts the current queue entry when idle.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::Closed` after `close`.
    pub fn play(&self) -> Result<(), PlayerError> {
        self.send(Command::Play)
    }

    /// Pauses or resumes the live session.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::Closed` after `close`.
    pub fn toggle_playback(&self) -> Result<(), PlayerError> {
        self.send(Command::TogglePlayback)
    }

    /// Halts playback and empties the queue.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::Closed` after `close`.
    pub fn stop(&self) -> Result<(), PlayerError> {
        self.send(Command::Stop)
    }

    /// Replaces the queue with `track` and plays it immediately.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::Closed` after `close`.
    pub fn force_play(&self, track: Track) -> Result<(), PlayerError> {
        self.send(Command::ForcePlay(track))
    }

    /// Appends `track`, starting it if nothing is playing.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::Closed` after `close`.
    pub fn enqueue(&self, track: Track) -> Result<(), PlayerError> {
        self.send(Command::Enqueue(track))
    }

    /// Appends `tracks` in order, starting the first if nothing is playing.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::Closed` after `close`.
    pub fn enqueue_all(&self, tracks: Vec<Track>) -> Result<(), PlayerError> {
        self.send(Command::EnqueueAll(tracks))
    }

    /// Plays the next queued track, or stops at the end of the queue.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::Closed` after `close`.
    pub fn skip(&self) -> Result<(), PlayerError> {
        self.send(Command::Skip)
    }

    /// Same as [`Player::skip`].
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::Closed` after `close`.
    pub fn next(&self) -> Result<(), PlayerError> {
        self.skip()
    }

    /// Restarts the current track, or moves back one track once more than
    /// a tenth of it has played.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::Closed` after `close`.
    pub fn previous(&self) -> Result<(), PlayerError> {
        self.send(Command::Previous)
    }

    /// Empties the queue without interrupting the current track.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::Closed` after `close`.
    pub fn clear_queue(&self) -> Result<(), PlayerError> {
        self.send(Command::ClearQueue)
    }

    /// # Errors
    ///
    /// Returns `PlayerError::Closed` after `close`.
    pub fn volume_up(&self) -> Result<(), PlayerError> {
        self.send(Command::VolumeUp)
    }

    /// # Errors
    ///
    /// Returns `PlayerError::Closed` after `close`.
    pub fn volume_down(&self) -> Result<(), PlayerError> {
        self.send(Command::VolumeDown)
    }

    /// Shuffles the tracks after the current one, or the whole queue when idle.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::Closed` after `close`.
    pub fn shuffle(&self) -> Result<(), PlayerError> {
        self.send(Command::Shuffle)
    }

    /// Reopens the current track at `position`, keeping its paused state.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::Closed` after `close`.
    pub fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        self.send(Command::Seek(position))
    }

    /// Reads the control loop state after all previously sent commands.
    ///
    /// Returns `None` once the player is closed.
    pub async fn snapshot(&self) -> Option<QueueSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands.send(Command::Snapshot(reply_tx)).await.ok()?;
        reply_rx.await.ok()
    }

    /// Receiver of now-playing changes.
    #[must_use]
    pub fn updates(&self) -> Receiver<PlaybackUpdate> {
        self.updates.clone()
    }

    /// Receiver of transient status messages.
    #[must_use]
    pub fn status_messages(&self) -> Receiver<StatusMessage> {
        self.status.clone()
    }

    /// Releases the command channel and waits for the control loop to stop.
    ///
    /// Later commands fail with `PlayerError::Closed` and both event
    /// channels end once drained.
    pub fn close(&mut self) {
        self.commands.close();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            error!("Control loop thread panicked");
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.close();
    }
}
