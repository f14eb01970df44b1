//! Podium configuration (`podium.toml`).
//!
//! Typed configuration for a ranking project: which driver to run, where
//! state lives, and the tier labels. Missing fields use defaults; a missing
//! file is all defaults, not an error.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::driver::{DriverKind, Intensity};
use crate::session::DEFAULT_AUTOSAVE_MS;
use crate::tier::DEFAULT_TIER_LABELS;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "podium.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level podium configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PodiumConfig {
    /// Ranking run settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// State persistence settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Tier classifier settings.
    #[serde(default)]
    pub tiers: TierConfig,
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Ranking run settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Which driver to run (default: `"merge"`).
    #[serde(default)]
    pub driver: DriverKind,

    /// ELO judgment budget and K-factor profile (default: `"balanced"`).
    #[serde(default)]
    pub intensity: Intensity,

    /// Pinned shuffle seed. Unset draws one from OS entropy.
    pub seed: Option<u64>,
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

/// State persistence settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding session and ranking blobs (default: `".podium"`).
    #[serde(default = "default_state_dir")]
    pub dir: PathBuf,

    /// Autosave debounce in milliseconds (default: 500; 0 saves on every
    /// mutation).
    #[serde(default = "default_autosave_ms")]
    pub autosave_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_state_dir(),
            autosave_ms: default_autosave_ms(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".podium")
}

const fn default_autosave_ms() -> u64 {
    DEFAULT_AUTOSAVE_MS
}

// ---------------------------------------------------------------------------
// TierConfig
// ---------------------------------------------------------------------------

/// Tier classifier settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierConfig {
    /// Ordered tier labels walked top to bottom (default: SS through F).
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            labels: default_labels(),
        }
    }
}

fn default_labels() -> Vec<String> {
    DEFAULT_TIER_LABELS.iter().map(|s| (*s).to_owned()).collect()
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a podium configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path being loaded, when known.
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl PodiumConfig {
    /// Load configuration from a TOML file. A missing file yields all
    /// defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError`] on I/O errors other than not-found, invalid
    /// TOML, or unknown fields.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns [`ConfigError`] on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                // Calculate line number from byte offset.
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
