//! User preference management with XDG Base Directory compliance.
//!
//! Settings live in `$XDG_CONFIG_HOME/chime/settings.json`. A missing file
//! yields the defaults; a present file is validated on load.

use std::{
    env::var,
    fs::{create_dir_all, read_to_string, write},
    io::Error as StdError,
    path::{Path, PathBuf},
};

use {
    parking_lot::{RwLock, RwLockReadGuard},
    serde::{Deserialize, Serialize},
    serde_json::{Error as SerdeJsonError, from_str, to_string_pretty},
    thiserror::Error,
    tracing::debug,
};

use crate::audio::volume::{MAX_VOLUME, MIN_VOLUME};

/// Error type for settings operations.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Failed to read or write settings file.
    #[error("IO error: {0}")]
    IoError(#[from] StdError),
    /// Failed to serialize or deserialize settings.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] SerdeJsonError),
    /// Invalid settings value.
    #[error("Invalid settings value: {reason}")]
    InvalidValue { reason: String },
}

/// Serializable user settings structure with default values.
///
/// Fields missing from the settings file take their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    /// Music library directory scanned at startup.
    pub library_directory: Option<String>,
    /// Audio output device name.
    pub audio_device: Option<String>,
    /// Volume level applied when the player starts.
    pub initial_volume: f64,
    /// Buffer duration in milliseconds.
    pub buffer_duration_ms: u32,
    /// Capacity of the decoder-to-device ring buffer, in samples.
    pub ring_buffer_capacity: usize,
    /// Number of commands the player accepts before callers block.
    pub command_queue_capacity: usize,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            library_directory: None,
            audio_device: None,
            initial_volume: 0.0,
            buffer_duration_ms: 50,
            ring_buffer_capacity: 16384,
            command_queue_capacity: 32,
        }
    }
}

impl UserSettings {
    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |reason: String| Err(SettingsError::InvalidValue { reason });

        if !(MIN_VOLUME..=MAX_VOLUME).contains(&self.initial_volume) {
            return invalid(format!(
                "initial_volume must be between {MIN_VOLUME} and {MAX_VOLUME}, got {}",
                self.initial_volume
            ));
        }
        if self.buffer_duration_ms == 0 {
            return invalid("buffer_duration_ms must be greater than zero".to_string());
        }
        if self.ring_buffer_capacity == 0 {
            return invalid("ring_buffer_capacity must be greater than zero".to_string());
        }
        if self.command_queue_capacity == 0 {
            return invalid("command_queue_capacity must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Handles loading, saving, and validation of user preferences.
#[derive(Debug)]
pub struct SettingsManager {
    /// Thread-safe user settings storage.
    settings: RwLock<UserSettings>,
    /// Path to the configuration file on disk.
    config_path: PathBuf,
}

impl SettingsManager {
    /// Creates a new settings manager with default config path.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if settings cannot be loaded from disk or are invalid.
    pub fn new() -> Result<Self, SettingsError> {
        Self::with_config_path(get_config_path())
    }

    /// Creates a new settings manager with a custom config path (for testing).
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if settings cannot be loaded from disk or are invalid.
    pub fn with_config_path(config_path: PathBuf) -> Result<Self, SettingsError> {
        let settings = if config_path.exists() {
            debug!("Loading settings from {}", config_path.display());
            let contents = read_to_string(&config_path)?;
            let settings: UserSettings = from_str(&contents)?;
            settings.validate()?;
            settings
        } else {
            debug!("No settings file at {}, using defaults", config_path.display());
            UserSettings::default()
        };

        Ok(SettingsManager {
            settings: RwLock::new(settings),
            config_path,
        })
    }

    /// Gets the current settings.
    pub fn get_settings(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.settings.read()
    }

    /// Gets the configuration file path.
    #[must_use]
    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    /// Validates the settings, applies them and saves them to disk.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the settings are invalid or cannot be saved.
    /// Invalid settings are not applied.
    pub fn update_settings(&self, new_settings: UserSettings) -> Result<(), SettingsError> {
        new_settings.validate()?;
        *self.settings.write() = new_settings;
        self.save_settings()
    }

    fn save_settings(&self) -> Result<(), SettingsError> {
        debug!("Saving settings to {}", self.config_path.display());
        if let Some(parent) = self.config_path.parent() {
            create_dir_all(parent)?;
        }
        let contents = to_string_pretty(&*self.settings.read())?;
        write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Path of the settings file under the XDG config home.
#[must_use]
pub fn get_config_path() -> PathBuf {
    let mut config_dir = get_xdg_config_home();
    config_dir.push("chime");
    config_dir.push("settings.json");
    config_dir
}

/// Gets the XDG config home directory following XDG Base Directory specification.
///
/// Uses `XDG_CONFIG_HOME` environment variable if set, otherwise defaults to $HOME/.config
fn get_xdg_config_home() -> PathBuf {
    if let Ok(config_home) = var("XDG_CONFIG_HOME")
        && !config_home.is_empty()
    {
        return PathBuf::from(config_home);
    }

    if let Ok(home) = var("HOME") {
        let mut path = PathBuf::from(home);
        path.push(".config");
        return path;
    }

    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use std::{
        fs::write,
        io::{Error, ErrorKind::NotFound},
    };

    use {
        serde_json::{from_str, to_string},
        tempfile::tempdir,
    };

    use crate::config::settings::{SettingsError, SettingsManager, UserSettings};

    #[test]
    fn test_user_settings_default() {
        let settings = UserSettings::default();
        assert_eq!(settings.library_directory, None);
        assert_eq!(settings.initial_volume, 0.0);
        assert_eq!(settings.buffer_duration_ms, 50);
        assert_eq!(settings.command_queue_capacity, 32);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_user_settings_serialization() {
        let settings = UserSettings {
            library_directory: Some("/music".to_string()),
            audio_device: Some("Test Device".to_string()),
            initial_volume: -1.5,
            buffer_duration_ms: 100,
            ring_buffer_capacity: 4096,
            command_queue_capacity: 8,
        };

        let serialized = to_string(&settings).unwrap();
        let deserialized: UserSettings = from_str(&serialized).unwrap();
        assert_eq!(settings, deserialized);
    }

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: UserSettings = from_str(r#"{"initial_volume": 2.0}"#).unwrap();
        assert_eq!(settings.initial_volume, 2.0);
        assert_eq!(settings.ring_buffer_capacity, 16384);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let loud = UserSettings {
            initial_volume: 7.0,
            ..UserSettings::default()
        };
        assert!(matches!(
            loud.validate(),
            Err(SettingsError::InvalidValue { .. })
        ));

        let no_queue = UserSettings {
            command_queue_capacity: 0,
            ..UserSettings::default()
        };
        let error = no_queue.validate().unwrap_err();
        assert!(error.to_string().contains("command_queue_capacity"));
    }

    #[test]
    fn test_settings_error_display() {
        let io_error = Error::new(NotFound, "File not found");
        let settings_error = SettingsError::IoError(io_error);
        assert!(settings_error.to_string().contains("IO error"));

        let invalid_value_error = SettingsError::InvalidValue {
            reason: "test reason".to_string(),
        };
        assert_eq!(
            invalid_value_error.to_string(),
            "Invalid settings value: test reason"
        );
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let manager = SettingsManager::with_config_path(dir.path().join("settings.json")).unwrap();
        assert_eq!(*manager.get_settings(), UserSettings::default());
    }

    #[test]
    fn test_update_settings_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chime").join("settings.json");
        let manager = SettingsManager::with_config_path(path.clone()).unwrap();

        let settings = UserSettings {
            library_directory: Some("/srv/music".to_string()),
            ..UserSettings::default()
        };
        manager.update_settings(settings.clone()).unwrap();

        let reloaded = SettingsManager::with_config_path(path).unwrap();
        assert_eq!(*reloaded.get_settings(), settings);
    }

    #[test]
    fn test_update_settings_rejects_invalid() {
        let dir = tempdir().unwrap();
        let manager = SettingsManager::with_config_path(dir.path().join("settings.json")).unwrap();

        let result = manager.update_settings(UserSettings {
            buffer_duration_ms: 0,
            ..UserSettings::default()
        });
        assert!(result.is_err());
        assert_eq!(manager.get_settings().buffer_duration_ms, 50);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        write(&path, r#"{"initial_volume": 40.0}"#).unwrap();

        assert!(matches!(
            SettingsManager::with_config_path(path),
            Err(SettingsError::InvalidValue { .. })
        ));
    }
}
