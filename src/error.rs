use std::io;

use thiserror::Error;

/// Configuration-time validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A configured numeric limit must be strictly greater than zero.
    #[error("limit `{limit}` must be greater than 0")]
    InvalidLimitValue {
        /// Name of the limit.
        limit: &'static str,
    },
    /// The spool memory threshold exceeds the configured payload cap.
    #[error("spool threshold ({threshold}) cannot exceed `max_payload_size` ({max_payload_size})")]
    ThresholdExceedsPayloadCap {
        /// Configured in-memory spool threshold in bytes.
        threshold: u64,
        /// Configured maximum cached payload size in bytes.
        max_payload_size: u64,
    },
    /// The configured spool directory path is empty.
    #[error("spool directory path cannot be empty")]
    EmptySpoolDirectory,
}

/// Runtime error type used by `mimegear`.
///
/// Every variant is fatal to the current decode or encode operation; the
/// codec never retries internally. Framing and policy failures indicate a
/// malformed message or a violated limit, not a transient condition.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// Configuration error surfaced at runtime.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The multipart framing is unusable: no boundary could be determined,
    /// or the stream ended before a required boundary delimiter.
    #[error("malformed multipart stream: {message}")]
    MalformedFraming {
        /// Framing failure detail.
        message: String,
    },
    /// A logical header line exceeded the configured maximum length.
    #[error("attachment header line exceeded maximum length of {limit} bytes")]
    HeaderTooLarge {
        /// Configured maximum logical header line length in bytes.
        limit: usize,
    },
    /// An unrecognized `Content-Transfer-Encoding` token was encountered.
    #[error("unsupported content transfer encoding `{token}`")]
    UnsupportedEncoding {
        /// The unrecognized encoding token.
        token: String,
    },
    /// The message carried more attachment parts than the configured cap.
    #[error("attachment count exceeded maximum of {max}")]
    AttachmentLimitExceeded {
        /// Configured maximum number of attachment parts.
        max: usize,
    },
    /// A cached attachment payload exceeded the configured size cap.
    #[error("attachment payload exceeded maximum size of {max} bytes")]
    PayloadTooLarge {
        /// Configured maximum cached payload size in bytes.
        max: u64,
    },
    /// A codec operation was invoked out of lifecycle order.
    #[error("invalid codec state: {message}")]
    InvalidState {
        /// Lifecycle misuse detail.
        message: String,
    },
    /// Failure propagated from the underlying byte stream.
    #[error("underlying stream failure: {0}")]
    Io(#[source] io::Error),
}

impl CodecError {
    /// Creates a malformed-framing error from a message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedFraming {
            message: message.into(),
        }
    }

    /// Creates an invalid-state error from a message.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Converts this error into an [`io::Error`] carrying it as the source.
    ///
    /// Stream decorators implementing [`std::io::Read`] or
    /// [`std::io::Write`] must report failures as [`io::Error`]; the crate
    /// error is boxed inside so [`CodecError::from_io`] can recover it.
    pub fn into_io(self) -> io::Error {
        let kind = match &self {
            Self::Io(err) => err.kind(),
            Self::MalformedFraming { .. } | Self::UnsupportedEncoding { .. } => {
                io::ErrorKind::InvalidData
            }
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, self)
    }

    /// Recovers a crate error previously wrapped by [`CodecError::into_io`],
    /// or wraps a plain I/O failure.
    pub fn from_io(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<CodecError>()) {
            return Self::Io(err);
        }

        match err
            .into_inner()
            .and_then(|boxed| boxed.downcast::<CodecError>().ok())
        {
            Some(recovered) => *recovered,
            None => Self::Io(io::ErrorKind::Other.into()),
        }
    }
}

impl From<io::Error> for CodecError {
    fn from(err: io::Error) -> Self {
        Self::from_io(err)
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        err.into_io()
    }
}
