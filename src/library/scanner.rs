//! Library directory scanning.
//!
//! Tracks are found by walking the library tree and inferring metadata from
//! the `artist/album/title.ext` layout below the library root.

use std::{
    fs::{ReadDir, metadata, read_dir},
    path::{Component, Path},
};

use tracing::{debug, info, warn};

use crate::{
    audio::track::{Track, TrackFormat},
    error::LibraryError,
};

/// Artist and album used when the path does not name them.
pub const UNKNOWN: &str = "unknown";

/// Scans `root` recursively for playable files.
///
/// Unreadable subdirectories are skipped with a warning. The result is
/// sorted by path.
///
/// # Errors
///
/// Returns `LibraryError` if `root` cannot be read or is not a directory.
pub fn scan_library(root: &Path) -> Result<Vec<Track>, LibraryError> {
    let unreadable = |source| LibraryError::Unreadable {
        path: root.to_path_buf(),
        source,
    };

    if !metadata(root).map_err(unreadable)?.is_dir() {
        return Err(LibraryError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let mut tracks = Vec::new();
    visit(root, read_dir(root).map_err(unreadable)?, &mut tracks);
    tracks.sort_by(|a, b| a.path().cmp(b.path()));

    info!("Found {} tracks in {}", tracks.len(), root.display());
    Ok(tracks)
}

fn visit(root: &Path, entries: ReadDir, tracks: &mut Vec<Track>) {
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable directory entry: {e}");
                continue;
            }
        };

        let path = entry.path();
        let is_dir = match entry.file_type() {
            Ok(file_type) => file_type.is_dir(),
            Err(e) => {
                warn!("Skipping {}: {e}", path.display());
                continue;
            }
        };

        if is_dir {
            match read_dir(&path) {
                Ok(children) => visit(root, children, tracks),
                Err(e) => warn!("Skipping unreadable directory {}: {e}", path.display()),
            }
        } else if TrackFormat::from_path(&path).is_some() {
            tracks.push(infer_track(root, &path));
        } else {
            debug!("Ignoring {}", path.display());
        }
    }
}

/// Builds a track from its location below `root`.
///
/// The two directories directly above the file name the artist and album.
/// Files fewer than two directories deep get [`UNKNOWN`] for both.
#[must_use]
pub fn infer_track(root: &Path, path: &Path) -> Track {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let title = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let directories: Vec<String> = relative
        .parent()
        .map(|parent| {
            parent
                .components()
                .filter_map(|component| match component {
                    Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    match directories.as_slice() {
        [.., artist, album] => Track::new(artist.as_str(), album.as_str(), title, path),
        _ => Track::new(UNKNOWN, UNKNOWN, title, path),
    }
}
