//! Chime - terminal music player
//!
//! Scans a library directory, then reads playback commands from stdin and
//! prints playback updates and status messages as they arrive.

use std::{
    env::args,
    io::{BufRead, stderr, stdin},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use {
    anyhow::{Error, Result, bail},
    tokio::{runtime::Handle, spawn, task::spawn_blocking},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, registry, util::SubscriberInitExt},
};

use chime::{
    Player, PlayerError, SettingsManager, Track,
    audio::output::CpalOutput,
    error::{ErrorReporter, ResultExt, Severity},
    scan_library,
};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "CHIME_LOG";

const USAGE: &str = "usage: chime [LIBRARY_DIR]";

const HELP: &str = "\
commands:
  <n>        play track n now          a <n>   enqueue track n
  A          enqueue the whole library l       list the library
  p, space   pause or resume           x       stop and clear the queue
  >          next track                <       previous track
  ]          volume up                 [       volume down
  S          shuffle the queue         c       clear the queue
  s <secs>   seek in the current track i       show the queue
  d          list output devices       q       quit";

/// A parsed line of user input.
#[derive(Debug, Clone, PartialEq)]
enum Input {
    Play(usize),
    Enqueue(usize),
    EnqueueAll,
    List,
    Toggle,
    Stop,
    Next,
    Previous,
    VolumeUp,
    VolumeDown,
    Shuffle,
    ClearQueue,
    Seek(Duration),
    Queue,
    Devices,
    Help,
    Quit,
}

impl Input {
    /// Parses one line of input; track numbers are 1-based.
    fn parse(line: &str) -> Option<Self> {
        if line == " " {
            return Some(Self::Toggle);
        }

        let line = line.trim();
        let input = match line {
            "A" => Self::EnqueueAll,
            "l" => Self::List,
            "p" => Self::Toggle,
            "x" => Self::Stop,
            ">" => Self::Next,
            "<" => Self::Previous,
            "]" => Self::VolumeUp,
            "[" => Self::VolumeDown,
            "S" => Self::Shuffle,
            "c" => Self::ClearQueue,
            "i" => Self::Queue,
            "d" => Self::Devices,
            "h" | "?" => Self::Help,
            "q" => Self::Quit,
            _ => {
                if let Some(number) = line.strip_prefix("a ") {
                    Self::Enqueue(number.trim().parse().ok()?)
                } else if let Some(seconds) = line.strip_prefix("s ") {
                    let seconds: f64 = seconds.trim().parse().ok()?;
                    Self::Seek(Duration::try_from_secs_f64(seconds).ok()?)
                } else {
                    Self::Play(line.parse().ok()?)
                }
            }
        };
        Some(input)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    registry()
        .with(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_writer(stderr))
        .init();

    let settings_manager = SettingsManager::new().add_context("Failed to load settings")?;
    let settings = settings_manager.get_settings().clone();

    let Some(library_dir) = args()
        .nth(1)
        .or_else(|| settings.library_directory.clone())
        .map(PathBuf::from)
    else {
        bail!(USAGE);
    };

    let library = scan_library(&library_dir)
        .add_contextf(format!("Failed to scan {}", library_dir.display()))?;
    info!("Loaded {} tracks", library.len());
    print_library(&library);

    let player = Arc::new(Player::new(&settings)?);

    let updates = player.updates();
    spawn(async move {
        while let Ok(update) = updates.recv().await {
            match (update.current_track, update.is_playing) {
                (Some(track), true) => println!("Playing: {track}"),
                (Some(track), false) => println!("Paused: {track}"),
                (None, _) => println!("Stopped"),
            }
        }
    });

    let status = player.status_messages();
    spawn(async move {
        while let Ok(message) = status.recv().await {
            println!("{message}");
        }
    });

    println!("{HELP}");
    let input_player = Arc::clone(&player);
    spawn_blocking(move || read_commands(&input_player, &library)).await??;

    drop(player);
    Ok(())
}

/// Reads commands from stdin until `q` or end of input.
fn read_commands(player: &Player, library: &[Track]) -> Result<()> {
    for line in stdin().lock().lines() {
        let line = line.add_context("Failed to read from stdin")?;
        if line.is_empty() {
            continue;
        }

        match Input::parse(&line) {
            Some(Input::Quit) => break,
            Some(input) => {
                if let Err(e) = dispatch(player, library, input) {
                    ErrorReporter::report(&Error::from(e), "command", Severity::Error);
                    break;
                }
            }
            None => println!("Unknown command: {line} (h for help)"),
        }
    }
    Ok(())
}

fn dispatch(player: &Player, library: &[Track], input: Input) -> Result<(), PlayerError> {
    match input {
        Input::Play(number) => match pick(library, number) {
            Some(track) => player.force_play(track),
            None => Ok(()),
        },
        Input::Enqueue(number) => match pick(library, number) {
            Some(track) => player.enqueue(track),
            None => Ok(()),
        },
        Input::EnqueueAll => player.enqueue_all(library.to_vec()),
        Input::List => {
            print_library(library);
            Ok(())
        }
        Input::Toggle => player.toggle_playback(),
        Input::Stop => player.stop(),
        Input::Next => player.next(),
        Input::Previous => player.previous(),
        Input::VolumeUp => player.volume_up(),
        Input::VolumeDown => player.volume_down(),
        Input::Shuffle => player.shuffle(),
        Input::ClearQueue => player.clear_queue(),
        Input::Seek(position) => player.seek(position),
        Input::Queue => {
            let snapshot = Handle::current()
                .block_on(player.snapshot())
                .ok_or(PlayerError::Closed)?;
            println!("Volume: {}", snapshot.volume);
            for (index, track) in snapshot.tracks.iter().enumerate() {
                let marker = if index == snapshot.position { '>' } else { ' ' };
                println!("{marker} {track}");
            }
            Ok(())
        }
        Input::Devices => {
            for device in CpalOutput::available_devices() {
                println!("{device}");
            }
            Ok(())
        }
        Input::Help => {
            println!("{HELP}");
            Ok(())
        }
        Input::Quit => Ok(()),
    }
}

/// Looks up a 1-based track number.
fn pick(library: &[Track], number: usize) -> Option<Track> {
    let track = number
        .checked_sub(1)
        .and_then(|index| library.get(index))
        .cloned();
    if track.is_none() {
        println!("No track {number}");
    }
    track
}

fn print_library(library: &[Track]) {
    for (index, track) in library.iter().enumerate() {
        println!("{:>4}  {track}", index + 1);
    }
}
