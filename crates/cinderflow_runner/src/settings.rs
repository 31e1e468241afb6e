// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runner settings.
//!
//! Loaded from a RON file (`runner.ron` by default). Relative paths are
//! resolved against the directory holding the settings file.

use cinderflow_graph::{ArchiveFormat, GraphSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Settings file looked up when none is given
pub const SETTINGS_FILE_NAME: &str = "runner.ron";

/// Log filter used when the settings cannot be read
pub const DEFAULT_LOG_FILTER: &str = "cinderflow_runner=info,cinderflow_graph=info";

/// Errors reading or writing runner settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed RON
    #[error("invalid settings: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// RON encoding failed
    #[error("failed to encode settings: {0}")]
    Encode(#[from] ron::Error),
    /// Written by a newer runner
    #[error("settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },
}

/// Where to dump the final graph state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveOutput {
    /// Output file
    pub path: PathBuf,
    /// Encoding
    #[serde(default)]
    pub format: ArchiveFormat,
}

/// Runner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Settings format version
    pub version: u32,
    /// Graph description to run
    pub graph: PathBuf,
    /// Number of ticks to run
    pub ticks: u32,
    /// Seconds per tick
    pub tick_delta: f32,
    /// `tracing` filter directive
    pub log_filter: String,
    /// Optional dump of the graph state after the last tick
    pub archive: Option<ArchiveOutput>,
    /// Execution settings for the loaded graph
    pub graph_settings: GraphSettings,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            graph: PathBuf::from("graph.ron"),
            ticks: 60,
            tick_delta: 1.0 / 30.0,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            archive: None,
            graph_settings: GraphSettings::default(),
        }
    }
}

impl RunnerSettings {
    /// Parse settings from RON text
    pub fn from_ron(text: &str) -> Result<Self, SettingsError> {
        let settings: RunnerSettings = ron::from_str(text)?;
        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(SettingsError::UnsupportedVersion {
                found: settings.version,
                supported: SETTINGS_FORMAT_VERSION,
            });
        }
        Ok(settings)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Graph description path, resolved against `base`
    pub fn graph_path(&self, base: &Path) -> PathBuf {
        base.join(&self.graph)
    }

    /// Archive output path, resolved against `base`
    pub fn archive_path(&self, base: &Path) -> Option<PathBuf> {
        self.archive.as_ref().map(|output| base.join(&output.path))
    }
}
