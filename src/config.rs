//! Transmuter configuration.
//!
//! Handles loading and validating a `transmuter.toml` file. Every key has a
//! default, so an empty file (or no file at all) yields a working setup.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! autorotate = true                  # Rotate by the orientation hint when no angle is given
//! look_for_embedded_preview = false  # Prefer the largest embedded preview over the source
//!
//! [temporary]
//! # root = "/var/tmp/transmuter"     # Defaults to the OS temp directory
//! directory_mode = 0o777             # Permissions of temp directories (unix only)
//! directory_ttl_secs = 500           # Age after which purge_expired() removes a directory
//!
//! [ghostscript]
//! binary = "gs"
//! resolution = 300                   # DPI used to rasterize vector sources
//!
//! [exiftool]
//! binary = "exiftool"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Transmuter configuration.
///
/// Replaces process-wide toggles: each [`ImageTransmuter`](crate::ImageTransmuter)
/// owns one, so two transmuters can run with different settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransmuterConfig {
    /// Rotate by the source orientation hint when the specification gives no angle.
    pub autorotate: bool,
    /// Look for an embedded preview before anything else.
    pub look_for_embedded_preview: bool,
    pub temporary: TemporaryConfig,
    pub ghostscript: GhostscriptConfig,
    pub exiftool: ExiftoolConfig,
}

impl Default for TransmuterConfig {
    fn default() -> Self {
        Self {
            autorotate: true,
            look_for_embedded_preview: false,
            temporary: TemporaryConfig::default(),
            ghostscript: GhostscriptConfig::default(),
            exiftool: ExiftoolConfig::default(),
        }
    }
}

impl TransmuterConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: TransmuterConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temporary.directory_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "temporary.directory_ttl_secs must be non-zero".into(),
            ));
        }
        if self.temporary.directory_mode > 0o7777 {
            return Err(ConfigError::Validation(
                "temporary.directory_mode must be a permission mode (<= 0o7777)".into(),
            ));
        }
        if self.ghostscript.resolution == 0 {
            return Err(ConfigError::Validation(
                "ghostscript.resolution must be non-zero".into(),
            ));
        }
        if self.ghostscript.binary.trim().is_empty() {
            return Err(ConfigError::Validation(
                "ghostscript.binary must not be empty".into(),
            ));
        }
        if self.exiftool.binary.trim().is_empty() {
            return Err(ConfigError::Validation(
                "exiftool.binary must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Temporary file and directory settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemporaryConfig {
    /// Where scoped artifacts are created. `None` means the OS temp directory.
    pub root: Option<PathBuf>,
    /// Permission bits of temp directories.
    pub directory_mode: u32,
    /// Seconds a temp directory lives before `purge_expired` may remove it.
    pub directory_ttl_secs: u64,
}

impl Default for TemporaryConfig {
    fn default() -> Self {
        Self {
            root: None,
            directory_mode: 0o777,
            directory_ttl_secs: 500,
        }
    }
}

impl TemporaryConfig {
    pub fn directory_ttl(&self) -> Duration {
        Duration::from_secs(self.directory_ttl_secs)
    }
}

/// Vector rasterization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GhostscriptConfig {
    pub binary: String,
    /// DPI.
    pub resolution: u32,
}

impl Default for GhostscriptConfig {
    fn default() -> Self {
        Self {
            binary: "gs".into(),
            resolution: 300,
        }
    }
}

/// Embedded preview extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExiftoolConfig {
    pub binary: String,
}

impl Default for ExiftoolConfig {
    fn default() -> Self {
        Self {
            binary: "exiftool".into(),
        }
    }
}
