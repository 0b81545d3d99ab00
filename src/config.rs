use std::path::PathBuf;

use crate::{error::ConfigError, limits::Limits};

/// Default in-memory spool threshold in bytes before a payload spills to disk.
pub const DEFAULT_SPOOL_THRESHOLD: usize = 102_400;

/// Spooled-payload configuration.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolConfig {
    /// Payload bytes kept in memory before spilling to a spool file.
    pub memory_threshold: usize,
    /// Directory for spool files; the process temp directory when unset.
    pub directory: Option<PathBuf>,
}

impl SpoolConfig {
    /// Creates the default spool configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the effective spool directory.
    pub fn effective_directory(&self) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            memory_threshold: DEFAULT_SPOOL_THRESHOLD,
            directory: None,
        }
    }
}

/// Top-level codec configuration model.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CodecConfig {
    /// Policy limits enforced during decode.
    pub limits: Limits,
    /// Spooled-payload tunables.
    pub spool: SpoolConfig,
}

impl CodecConfig {
    /// Creates a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates limit and spool values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.limits.validate()?;

        if let Some(directory) = &self.spool.directory {
            if directory.as_os_str().is_empty() {
                return Err(ConfigError::EmptySpoolDirectory);
            }
        }

        if let Some(max) = self.limits.max_payload_size {
            let threshold = self.spool.memory_threshold as u64;
            if threshold > max {
                return Err(ConfigError::ThresholdExceedsPayloadCap {
                    threshold,
                    max_payload_size: max,
                });
            }
        }

        Ok(())
    }
}
