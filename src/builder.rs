use std::path::PathBuf;

use crate::{
    config::{CodecConfig, SpoolConfig},
    error::ConfigError,
    limits::Limits,
};

/// Builder for configuring a [`MimeCodec`](crate::MimeCodec) instance.
#[derive(Debug, Clone, Default)]
pub struct CodecBuilder {
    config: CodecConfig,
}

impl CodecBuilder {
    /// Creates a builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current builder configuration snapshot.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Replaces the full builder configuration.
    pub fn with_config(mut self, config: CodecConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets decode policy limits.
    pub fn limits(mut self, limits: Limits) -> Self {
        self.config.limits = limits;
        self
    }

    /// Sets the maximum number of attachment parts per message.
    pub fn max_attachment_count(mut self, max: usize) -> Self {
        self.config.limits.max_attachment_count = max;
        self
    }

    /// Sets the maximum logical header line length in bytes.
    pub fn max_header_line_len(mut self, max: usize) -> Self {
        self.config.limits.max_header_line_len = max;
        self
    }

    /// Sets the maximum cached payload size in bytes.
    pub fn max_payload_size(mut self, max: u64) -> Self {
        self.config.limits.max_payload_size = Some(max);
        self
    }

    /// Sets spooled-payload tunables.
    pub fn spool(mut self, spool: SpoolConfig) -> Self {
        self.config.spool = spool;
        self
    }

    /// Sets the byte count kept in memory before a payload spills to disk.
    pub fn spool_memory_threshold(mut self, threshold: usize) -> Self {
        self.config.spool.memory_threshold = threshold;
        self
    }

    /// Sets the directory used for spool files.
    pub fn spool_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.config.spool.directory = Some(directory.into());
        self
    }

    /// Validates builder configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.config.validate()
    }

    /// Finalizes and returns validated configuration.
    pub fn build_config(self) -> Result<CodecConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
