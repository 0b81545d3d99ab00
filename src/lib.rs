#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Streaming codec for MIME multipart attachment bodies.
//!
//! Decodes an inbound byte stream into a primary body plus a
//! lazily-discovered sequence of attachment parts, and encodes a primary
//! body plus attachments back into a framed multipart stream, including
//! the XOP/MTOM convention of referencing binary parts from an inline
//! document. Single-threaded, synchronous, pull-based: everything is a
//! [`std::io::Read`]/[`std::io::Write`] decorator.

/// Parsed attachment and part payload streams.
pub mod attachment;
/// Fluent configuration builder.
pub mod builder;
/// Transfer-codec streams selected by `Content-Transfer-Encoding`.
pub mod codec;
/// Lazy, order-preserving attachment sequence.
pub mod collection;
/// Codec configuration model.
pub mod config;
/// Streaming multipart decoder.
pub mod deserializer;
/// Error types exposed by this crate.
pub mod error;
/// Decode policy limits.
pub mod limits;
/// Low-level parser components.
pub mod parser;
/// Streaming multipart encoder.
pub mod serializer;

mod spool;

pub use attachment::{Attachment, PartStream};
pub use builder::CodecBuilder;
pub use codec::TransferEncoding;
pub use collection::AttachmentCollection;
pub use config::{CodecConfig, SpoolConfig};
pub use deserializer::AttachmentDeserializer;
pub use error::{CodecError, ConfigError};
pub use limits::Limits;
pub use parser::PartHeaders;
pub use serializer::{
    AttachmentSerializer, OutboundAttachment, OutboundBody, OutboundPayload, SerializeOptions,
    encode_content_id,
};

use std::io::{Read, Write};

/// Main `mimegear` entry point: validated configuration plus factories
/// for per-message decoders and encoders.
#[derive(Debug, Clone, Default)]
pub struct MimeCodec {
    config: CodecConfig,
}

/// A decoded message: the primary body and its lazy attachment sequence.
#[derive(Debug)]
pub struct DecodedMessage {
    /// The primary (first) body part.
    pub root: Attachment,
    /// Attachments following the primary body, pulled on demand.
    pub attachments: AttachmentCollection,
}

impl MimeCodec {
    /// Creates a codec with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a codec with explicit validated configuration.
    pub fn with_config(config: CodecConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Creates a fluent configuration builder.
    pub fn builder() -> CodecBuilder {
        CodecBuilder::default()
    }

    /// Returns an immutable reference to the active configuration.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Creates an uninitialized deserializer for one inbound message.
    pub fn deserializer(
        &self,
        content_type: impl Into<String>,
        source: impl Read + 'static,
    ) -> AttachmentDeserializer {
        AttachmentDeserializer::new(content_type, source, self.config.clone())
    }

    /// Initializes a decoder for one inbound message, returning the
    /// primary body and the lazy attachment sequence.
    pub fn decode(
        &self,
        content_type: impl Into<String>,
        source: impl Read + 'static,
    ) -> Result<DecodedMessage, CodecError> {
        let mut deserializer = self.deserializer(content_type, source);
        let root = deserializer.initialize()?;
        Ok(DecodedMessage {
            root,
            attachments: AttachmentCollection::new(deserializer),
        })
    }

    /// Creates a serializer for one outbound message.
    pub fn serializer<W: Write>(&self, out: W, options: SerializeOptions) -> AttachmentSerializer<W> {
        AttachmentSerializer::new(out, options)
    }
}
