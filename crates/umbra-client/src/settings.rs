//! Per-conversation preferences and where they are kept

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use umbra_core::ReasoningEffort;

use crate::error::{RelayClientError, Result};

/// Client preferences applied to every submitted turn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSettings {
    /// Effort requested from reasoning models
    #[serde(default)]
    pub reasoning_effort: ReasoningEffort,
    /// Model override; the relay's default is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Load/save hooks for [`ChatSettings`]
pub trait SettingsStore: Send + Sync {
    /// Current settings, or defaults when nothing was saved yet
    fn load(&self) -> Result<ChatSettings>;

    /// Persist settings
    fn save(&self, settings: &ChatSettings) -> Result<()>;
}

/// In-process store that forgets everything on drop
#[derive(Debug, Default)]
pub struct MemoryStore {
    settings: Mutex<ChatSettings>,
}

impl MemoryStore {
    /// Store seeded with the given settings
    pub const fn new(settings: ChatSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<ChatSettings> {
        self.settings
            .lock()
            .map(|settings| settings.clone())
            .map_err(|_| RelayClientError::Settings("settings lock poisoned".to_owned()))
    }

    fn save(&self, settings: &ChatSettings) -> Result<()> {
        let mut guard = self
            .settings
            .lock()
            .map_err(|_| RelayClientError::Settings("settings lock poisoned".to_owned()))?;
        guard.clone_from(settings);
        Ok(())
    }
}

/// Settings kept as a JSON document on disk
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store backed by the file at `path` (created on first save)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the settings file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Result<ChatSettings> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ChatSettings::default()),
            Err(e) => {
                return Err(RelayClientError::Settings(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        serde_json::from_str(&raw)
            .map_err(|e| RelayClientError::Settings(format!("failed to parse {}: {e}", self.path.display())))
    }

    fn save(&self, settings: &ChatSettings) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                RelayClientError::Settings(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| RelayClientError::Settings(format!("failed to serialize settings: {e}")))?;

        std::fs::write(&self.path, json)
            .map_err(|e| RelayClientError::Settings(format!("failed to write {}: {e}", self.path.display())))
    }
}
