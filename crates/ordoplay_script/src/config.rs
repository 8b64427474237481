// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine settings.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Current engine settings format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// What a sequence does when one of its steps fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SequenceFailurePolicy {
    /// Log the failure and fire the remaining steps
    #[default]
    Continue,
    /// Stop and hand the failure to the caller
    Halt,
}

/// What happens to a function's graph when the function is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FunctionRemovalPolicy {
    /// Keep the graph and clear its function flag
    #[default]
    ClearFlag,
    /// Delete the graph with all of its nodes
    DeleteGraph,
}

/// Engine settings errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed settings
    #[error("Failed to parse engine settings: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Encoding failure
    #[error("Failed to encode engine settings: {0}")]
    Encode(#[from] ron::Error),

    /// Settings written by a newer engine
    #[error("Engine settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version found in the file
        found: u32,
        /// Newest supported version
        supported: u32,
    },
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Settings format version
    pub version: u32,
    /// Deepest nesting of execution-pin traversals, data pulls and function calls
    pub max_stack_depth: usize,
    /// Sequence behavior when a step fails
    pub sequence_failure: SequenceFailurePolicy,
    /// Fate of a removed function's graph
    pub function_removal: FunctionRemovalPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            max_stack_depth: 1024,
            sequence_failure: SequenceFailurePolicy::default(),
            function_removal: FunctionRemovalPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Parse settings from RON, filling missing fields with defaults
    pub fn from_ron_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = ron::from_str(content)?;
        if config.version > CONFIG_FORMAT_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: config.version,
                supported: CONFIG_FORMAT_VERSION,
            });
        }
        Ok(config)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_ron_str(&content)?;
        tracing::info!("Loaded engine settings from {:?}", path);
        Ok(config)
    }

    /// Encode settings as pretty RON
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        let pretty = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }
}
