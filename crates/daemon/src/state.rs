//! On-disk configuration
//!
//! Settings live in `config.toml` under the platform config directory
//! (`~/.config/rmount` on Linux). A missing file means defaults; command
//! line flags are layered on top by the CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use common::{MountConfig, DEFAULT_UNMOUNT_GRACE};

pub const APP_NAME: &str = "rmount";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Mirror cache sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum cache size in megabytes
    pub max_size_mb: u32,
    /// TTL for attributes and directory listings in seconds
    pub ttl_secs: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_size_mb: 100,
            ttl_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
    /// Also write daily-rotated logs here
    pub log_dir: Option<PathBuf>,
    /// Seconds to wait for the serve loop after unmounting
    pub unmount_grace_secs: u64,
    /// Pending interrupt / cache-clear requests buffered per kind
    pub event_buffer: usize,
    pub mount: MountConfig,
    pub cache: CacheSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
            unmount_grace_secs: DEFAULT_UNMOUNT_GRACE.as_secs(),
            event_buffer: 4,
            mount: MountConfig::default(),
            cache: CacheSettings::default(),
        }
    }
}

impl AppConfig {
    pub fn unmount_grace(&self) -> Duration {
        Duration::from_secs(self.unmount_grace_secs)
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path the config was (or would be) read from
    pub config_path: PathBuf,
    pub config: AppConfig,
}

impl AppState {
    /// Default config file location
    pub fn default_config_path() -> Result<PathBuf, StateError> {
        let dirs = directories::ProjectDirs::from("", "", APP_NAME)
            .ok_or(StateError::NoConfigDir)?;
        Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Load configuration, falling back to defaults if the file is absent
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, StateError> {
        let config_path = match config_path {
            Some(path) => path,
            None => Self::default_config_path()?,
        };

        let config = if config_path.exists() {
            let raw = std::fs::read_to_string(&config_path).map_err(|source| StateError::Io {
                path: config_path.clone(),
                source,
            })?;
            toml::from_str(&raw).map_err(|source| StateError::Parse {
                path: config_path.clone(),
                source,
            })?
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            AppConfig::default()
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Write a default config file, refusing to clobber one unless `force`
    pub fn init(config_path: Option<PathBuf>, force: bool) -> Result<Self, StateError> {
        let config_path = match config_path {
            Some(path) => path,
            None => Self::default_config_path()?,
        };

        if config_path.exists() && !force {
            return Err(StateError::AlreadyExists(config_path));
        }

        let config = AppConfig::default();
        write_config(&config_path, &config)?;

        Ok(Self {
            config_path,
            config,
        })
    }
}

fn write_config(path: &Path, config: &AppConfig) -> Result<(), StateError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| StateError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let raw = toml::to_string_pretty(config)?;
    std::fs::write(path, raw).map_err(|source| StateError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("could not determine a config directory")]
    NoConfigDir,
    #[error("config already exists at {0}")]
    AlreadyExists(PathBuf),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::load(Some(dir.path().join("config.toml"))).unwrap();
        assert_eq!(state.config, AppConfig::default());
        assert_eq!(state.config.unmount_grace(), DEFAULT_UNMOUNT_GRACE);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
log_level = "debug"
unmount_grace_secs = 3

[mount]
read-only = true
allow-other = true

[cache]
ttl_secs = 5
"#,
        )
        .unwrap();

        let config = AppState::load(Some(path)).unwrap().config;
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.unmount_grace(), Duration::from_secs(3));
        assert!(config.mount.read_only);
        assert!(config.mount.allow_other);
        assert!(!config.mount.allow_root);
        assert_eq!(config.mount.max_read_ahead, common::options::DEFAULT_MAX_READ_AHEAD);
        assert_eq!(config.cache.ttl_secs, 5);
        assert_eq!(config.cache.max_size_mb, 100);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "unmount_grace_secs = \"soon\"").unwrap();

        assert!(matches!(
            AppState::load(Some(path)),
            Err(StateError::Parse { .. })
        ));
    }

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let state = AppState::init(Some(path.clone()), false).unwrap();
        assert!(path.exists());
        assert_eq!(AppState::load(Some(path.clone())).unwrap().config, state.config);

        assert!(matches!(
            AppState::init(Some(path.clone()), false),
            Err(StateError::AlreadyExists(_))
        ));
        assert!(AppState::init(Some(path), true).is_ok());
    }
}
