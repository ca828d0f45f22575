//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\music-importer\config.toml
//! - macOS: ~/Library/Application Support/music-importer/config.toml
//! - Linux: ~/.config/music-importer/config.toml
//!
//! `--config` on the command line points somewhere else. CLI flags override
//! what's in the file.
//!
//! ```toml
//! path_format = "/music/{{ release.artists_string | safepath }}/{{ release.title | safepath }}/{{ track_num | pad0 2 }} {{ track.title | safepath }}{{ ext }}"
//!
//! [tag_weights]
//! label = 0.5
//! "catalogue num" = 0
//!
//! [import]
//! condition = "high-score"
//! keep_files = ["notes.txt"]
//!
//! [[addons]]
//! name = "replaygain"
//! conf = "true-peak"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::enrichment::{coverart, musicbrainz};
use crate::importer::{ImportCondition, MIN_SCORE};
use crate::matching::Weights;
use crate::metadata::release_tags::KeepConfig;
use crate::organizer::FileOperation;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Library path template; imports refuse to run without one
    pub path_format: String,

    /// Per-field score weights, see [`Weights`]
    pub tag_weights: Weights,

    pub import: ImportConfig,

    pub musicbrainz: MusicBrainzConfig,

    /// Post-import addons, run in order
    pub addons: Vec<AddonConfig>,
}

/// How imports behave
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub condition: ImportCondition,

    pub min_score: f64,

    /// Extra files carried over from the source dir, e.g. "notes.txt"
    pub keep_files: Vec<String>,

    /// Fetch cover art even when the source has a cover
    pub upgrade_cover: bool,

    pub dry_run: bool,

    /// Copy instead of move, leaving the source alone
    pub copy: bool,

    /// Imports run in parallel
    pub jobs: usize,

    /// Tags preserved from the source files on top of the built-in list
    pub keep_tags: Vec<String>,

    /// Tags always removed
    pub drop_tags: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            condition: ImportCondition::default(),
            min_score: MIN_SCORE,
            keep_files: Vec::new(),
            upgrade_cover: false,
            dry_run: false,
            copy: false,
            jobs: 4,
            keep_tags: Vec::new(),
            drop_tags: Vec::new(),
        }
    }
}

impl ImportConfig {
    pub fn file_operation(&self) -> FileOperation {
        if self.copy {
            FileOperation::Copy {
                dry_run: self.dry_run,
            }
        } else {
            FileOperation::Move {
                dry_run: self.dry_run,
            }
        }
    }

    pub fn keep_config(&self) -> KeepConfig {
        KeepConfig {
            keep: self.keep_tags.clone(),
            drop: self.drop_tags.clone(),
        }
    }
}

/// Metadata service endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MusicBrainzConfig {
    pub base_url: String,

    pub cover_art_base_url: String,

    /// Minimum delay between MusicBrainz requests (mirrors often allow less)
    pub rate_limit_ms: u64,
}

impl Default for MusicBrainzConfig {
    fn default() -> Self {
        Self {
            base_url: musicbrainz::DEFAULT_BASE_URL.to_string(),
            cover_art_base_url: coverart::DEFAULT_BASE_URL.to_string(),
            rate_limit_ms: 1000,
        }
    }
}

/// One `[[addons]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddonConfig {
    /// `subproc` or `replaygain`
    pub name: String,

    #[serde(default)]
    pub conf: String,
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("music-importer"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from the default location
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };
    load_from(&path)
}

/// Load configuration from a specific file, with the same fallbacks as [`load`]
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to the default location
///
/// Creates the config directory if it doesn't exist.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &path)
}

/// Save configuration to a specific file
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    // Serialize to pretty TOML
    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
