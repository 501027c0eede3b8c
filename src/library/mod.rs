//! Music library discovery.
//!
//! The library is the set of playable files below a root directory. Track
//! metadata comes from the directory layout, not from file tags.

pub mod scanner;

pub use scanner::{UNKNOWN, infer_track, scan_library};
