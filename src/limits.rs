use crate::error::ConfigError;

/// Default maximum number of attachment parts accepted per message.
pub const DEFAULT_MAX_ATTACHMENT_COUNT: usize = 50;
/// Default maximum logical header line length in bytes.
pub const DEFAULT_MAX_HEADER_LINE_LEN: usize = 300;

/// Policy limits enforced while decoding a multipart message.
///
/// The attachment count cap is a resource-exhaustion guard against crafted
/// messages with unbounded part counts, not a tuning knob for well-formed
/// traffic.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of attachment parts materialized from one message.
    pub max_attachment_count: usize,
    /// Maximum length in bytes of one logical (unfolded) header line.
    pub max_header_line_len: usize,
    /// Maximum cached payload size in bytes for a single part, when set.
    pub max_payload_size: Option<u64>,
}

impl Limits {
    /// Creates the default limits configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates limit values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attachment_count == 0 {
            return Err(ConfigError::InvalidLimitValue {
                limit: "max_attachment_count",
            });
        }

        if self.max_header_line_len == 0 {
            return Err(ConfigError::InvalidLimitValue {
                limit: "max_header_line_len",
            });
        }

        if self.max_payload_size == Some(0) {
            return Err(ConfigError::InvalidLimitValue {
                limit: "max_payload_size",
            });
        }

        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_attachment_count: DEFAULT_MAX_ATTACHMENT_COUNT,
            max_header_line_len: DEFAULT_MAX_HEADER_LINE_LEN,
            max_payload_size: None,
        }
    }
}
