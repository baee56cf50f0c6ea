//! Persisted user settings.
//!
//! A small JSON key-value file in `~/.config/image-namer/settings.json`.
//! The server address is stored raw, exactly as typed, and normalized every
//! time it is loaded.

use crate::ai::server::{normalize_server_address, ServerAddress, DEFAULT_SERVER};
use crate::ai::{DEFAULT_LANGUAGE, DEFAULT_MODEL};
use crate::error::{Error, Result};
use crate::store::DEFAULT_BATCH_SIZE;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Settings filename
const SETTINGS_FILENAME: &str = "settings.json";

/// Environment variable overriding the stored server address
pub const SERVER_ENV_VAR: &str = "IMAGE_NAMER_SERVER";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Last-used server address, raw
    pub server_address: String,
    /// Opaque access token for a previously authorized folder
    pub folder_bookmark: Option<String>,
    pub model: String,
    pub language: String,
    pub auto_rename: bool,
    pub batch_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_address: DEFAULT_SERVER.to_string(),
            folder_bookmark: None,
            model: DEFAULT_MODEL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            auto_rename: true,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl Settings {
    /// Normalized form of the stored address
    pub fn server(&self) -> Result<ServerAddress> {
        normalize_server_address(&self.server_address)
    }

    /// Apply `IMAGE_NAMER_SERVER` when set and non-empty
    pub fn apply_env(&mut self) {
        if let Ok(server) = std::env::var(SERVER_ENV_VAR) {
            if !server.trim().is_empty() {
                self.server_address = server;
            }
        }
    }
}

/// Reads and writes [`Settings`] on disk
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store in the platform config directory
    pub fn new() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| Error::Settings("Could not determine config directory".to_string()))?
            .join("image-namer");
        Ok(Self::at(dir.join(SETTINGS_FILENAME)))
    }

    /// Store at an explicit path (used by tests)
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means defaults
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }

        let file = File::open(&self.path)
            .map_err(|e| Error::Settings(format!("Failed to open settings: {}", e)))?;
        let settings: Settings = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Settings(format!("Failed to parse settings: {}", e)))?;

        tracing::debug!(path = %self.path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Atomically write settings (temp file, fsync, rename)
    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Settings(format!("Failed to create config directory: {}", e)))?;
        }

        let temp_path = self.path.with_extension("tmp");
        let file = File::create(&temp_path)
            .map_err(|e| Error::Settings(format!("Failed to create temp file: {}", e)))?;
        let mut writer = BufWriter::new(file);

        serde_json::to_writer_pretty(&mut writer, settings)
            .map_err(|e| Error::Settings(format!("Failed to serialize: {}", e)))?;
        writer
            .flush()
            .map_err(|e| Error::Settings(format!("Failed to flush: {}", e)))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| Error::Settings(format!("Failed to sync: {}", e)))?;

        fs::rename(&temp_path, &self.path)
            .map_err(|e| Error::Settings(format!("Failed to rename: {}", e)))?;

        tracing::debug!(path = %self.path.display(), "Saved settings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::at(dir.path().join("settings.json"));
        let settings = store.load().unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.server().unwrap().as_str(), DEFAULT_SERVER);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::at(dir.path().join("nested").join("settings.json"));
        let settings = Settings {
            server_address: "gpu-box".to_string(),
            folder_bookmark: Some("/home/me/Pictures".to_string()),
            language: "German".to_string(),
            ..Settings::default()
        };

        store.save(&settings).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, settings);
        assert_eq!(loaded.server_address, "gpu-box");
        assert_eq!(loaded.server().unwrap().as_str(), "http://gpu-box:11434");
        assert!(!dir.path().join("nested").join("settings.tmp").exists());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"serverAddress":"10.0.0.5:9000"}"#).unwrap();

        let settings = SettingsStore::at(&path).load().unwrap();
        assert_eq!(settings.server_address, "10.0.0.5:9000");
        assert_eq!(settings.batch_size, DEFAULT_BATCH_SIZE);
        assert!(settings.auto_rename);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(SettingsStore::at(&path).load(), Err(Error::Settings(_))));
    }
}
