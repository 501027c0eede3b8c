//! User preferences and settings persistence.
//!
//! Settings follow the XDG Base Directory layout.

pub mod settings;

pub use settings::{SettingsError, SettingsManager, UserSettings, get_config_path};
