use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pagination::{NavigationPolicy, DEFAULT_PAGE_SIZE};

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EditorSettings {
    pub page_size: usize,
    pub page_size_options: Vec<usize>,
    pub history_capacity: usize,
    pub navigation: NavigationPolicy,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            page_size_options: vec![25, 50, 100],
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            navigation: NavigationPolicy::Discard,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("config directory is unavailable for this platform")]
    ConfigDirUnavailable,
    #[error("failed to read settings file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid settings in {path}: {reason}")]
    Invalid { path: PathBuf, reason: &'static str },
    #[error("failed to create config directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize settings: {source}")]
    Serialize {
        #[source]
        source: toml::ser::Error,
    },
    #[error("failed to write settings file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
    settings: EditorSettings,
}

impl FileSettingsStore {
    pub fn load_default() -> Result<Self, SettingsError> {
        let path = default_config_dir()?.join("settings.toml");
        Self::load_from_path(path)
    }

    pub fn load_from_path(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                settings: EditorSettings::default(),
            });
        }

        let raw = fs::read_to_string(&path).map_err(|source| SettingsError::Read {
            path: path.clone(),
            source,
        })?;

        if raw.trim().is_empty() {
            return Ok(Self {
                path,
                settings: EditorSettings::default(),
            });
        }

        let settings: EditorSettings =
            toml::from_str(&raw).map_err(|source| SettingsError::Parse {
                path: path.clone(),
                source,
            })?;
        validate(&settings).map_err(|reason| SettingsError::Invalid {
            path: path.clone(),
            reason,
        })?;

        Ok(Self { path, settings })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn update(&mut self, settings: EditorSettings) -> Result<(), SettingsError> {
        validate(&settings).map_err(|reason| SettingsError::Invalid {
            path: self.path.clone(),
            reason,
        })?;
        self.settings = settings;
        Ok(())
    }

    pub fn persist(&self) -> Result<(), SettingsError> {
        if let Some(parent_dir) = self.path.parent() {
            fs::create_dir_all(parent_dir).map_err(|source| SettingsError::CreateDir {
                path: parent_dir.to_path_buf(),
                source,
            })?;
        }

        let rendered = toml::to_string_pretty(&self.settings)
            .map_err(|source| SettingsError::Serialize { source })?;

        fs::write(&self.path, rendered).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

fn validate(settings: &EditorSettings) -> Result<(), &'static str> {
    if settings.page_size == 0 {
        return Err("page_size must be greater than 0");
    }
    if settings.page_size_options.contains(&0) {
        return Err("page_size_options must not contain 0");
    }
    if !settings.page_size_options.is_empty()
        && !settings.page_size_options.contains(&settings.page_size)
    {
        return Err("page_size must be one of page_size_options");
    }
    if settings.history_capacity == 0 {
        return Err("history_capacity must be greater than 0");
    }
    Ok(())
}

/// `$GRIDLINE_CONFIG_DIR` as is, else the platform config directory joined
/// with `gridline`.
pub fn default_config_dir() -> Result<PathBuf, SettingsError> {
    if let Some(custom) = env::var_os("GRIDLINE_CONFIG_DIR") {
        return Ok(PathBuf::from(custom));
    }

    let base_dir = if cfg!(target_os = "windows") {
        env::var_os("APPDATA")
            .map(PathBuf::from)
            .ok_or(SettingsError::ConfigDirUnavailable)?
    } else if let Some(xdg_config_home) = env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config_home)
    } else {
        let home = env::var_os("HOME").ok_or(SettingsError::ConfigDirUnavailable)?;
        PathBuf::from(home).join(".config")
    };

    Ok(base_dir.join("gridline"))
}
