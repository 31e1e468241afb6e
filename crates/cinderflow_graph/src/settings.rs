// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime tuning of graph execution.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Graph execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Clear a node's input activation flags after it handled `Activate` or `Initialize`.
    ///
    /// On by default so a flag set in one tick is not seen again in the next.
    /// Turn it off to leave flags set until the node clears them itself.
    /// Flags a node sets on its own inputs during dispatch are kept either way.
    pub clear_activations_after_dispatch: bool,
    /// Warn when more nodes than this are deferred to the next tick
    pub max_deferred_per_tick: usize,
    /// Emit a trace event per activated edge
    pub log_activations: bool,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            clear_activations_after_dispatch: true,
            max_deferred_per_tick: 256,
            log_activations: false,
        }
    }
}

impl GraphSettings {
    /// Load settings from a RON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        ron::from_str(&content).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save settings to a RON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = GraphSettings::default();
        assert!(settings.clear_activations_after_dispatch);
        assert!(!settings.log_activations);
    }

    #[test]
    fn test_serialization() {
        let settings = GraphSettings {
            log_activations: true,
            ..GraphSettings::default()
        };
        let serialized = ron::to_string(&settings).expect("Failed to serialize");
        let deserialized: GraphSettings = ron::from_str(&serialized).expect("Failed to deserialize");
        assert_eq!(deserialized, settings);

        let partial: GraphSettings = ron::from_str("(log_activations: true)").expect("Failed to deserialize");
        assert!(partial.clear_activations_after_dispatch);
        assert!(partial.log_activations);
    }
}
