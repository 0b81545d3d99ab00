use std::{
    fmt,
    io::{self, Read, Write},
};

use bytes::Bytes;
use uuid::Uuid;

use crate::{
    codec::{Base64Encoder, TransferEncoding},
    error::CodecError,
    parser::{PartHeaders, headers::percent_decode_lossy},
};

/// Headers the serializer composes itself; pass-through custom headers
/// with these names are skipped.
const RESERVED_HEADERS: [&str; 3] = ["Content-Type", "Content-ID", "Content-Transfer-Encoding"];

/// Outbound framing options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SerializeOptions {
    /// Frame the message as XOP/MTOM instead of plain multipart.
    pub xop: bool,
}

impl SerializeOptions {
    /// Creates plain-multipart options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates XOP/MTOM options.
    pub fn xop() -> Self {
        Self { xop: true }
    }
}

/// Primary body metadata for an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundBody {
    /// Declared content type of the primary body, parameters included.
    pub content_type: String,
    /// Raw identifier of the primary body part.
    pub content_id: String,
}

impl OutboundBody {
    /// Creates primary body metadata.
    pub fn new(content_type: impl Into<String>, content_id: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            content_id: content_id.into(),
        }
    }
}

/// Payload source for an outbound attachment.
pub enum OutboundPayload {
    /// In-memory payload bytes.
    Bytes(Bytes),
    /// Streamed payload.
    Reader(Box<dyn Read>),
}

impl fmt::Debug for OutboundPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Reader(_) => f.debug_tuple("Reader").field(&"<dyn Read>").finish(),
        }
    }
}

/// One attachment to serialize.
#[derive(Debug)]
pub struct OutboundAttachment {
    id: String,
    content_type: String,
    transfer_encoding: TransferEncoding,
    headers: PartHeaders,
    payload: OutboundPayload,
}

impl OutboundAttachment {
    /// Creates an attachment with a binary (raw) payload encoding and an
    /// empty payload.
    pub fn new(id: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content_type: content_type.into(),
            transfer_encoding: TransferEncoding::Binary,
            headers: PartHeaders::new(),
            payload: OutboundPayload::Bytes(Bytes::new()),
        }
    }

    /// Sets the payload transfer encoding (`binary`/`7bit`/`8bit` write
    /// raw bytes; `base64` encodes).
    pub fn transfer_encoding(mut self, encoding: TransferEncoding) -> Self {
        self.transfer_encoding = encoding;
        self
    }

    /// Appends a pass-through custom header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets an in-memory payload.
    pub fn payload_bytes(mut self, bytes: impl Into<Bytes>) -> Self {
        self.payload = OutboundPayload::Bytes(bytes.into());
        self
    }

    /// Sets a streamed payload.
    pub fn payload_reader(mut self, reader: impl Read + 'static) -> Self {
        self.payload = OutboundPayload::Reader(Box::new(reader));
        self
    }

    /// Returns the raw attachment identifier.
    pub fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Prolog,
    Body,
    Attachments,
    Finished,
}

/// Streaming encoder for one outbound multipart message.
///
/// Lifecycle: [`AttachmentSerializer::write_prolog`], then the primary
/// body payload, then each attachment in collection order, then
/// [`AttachmentSerializer::finish`]. Calls out of order fail with
/// [`CodecError::InvalidState`].
pub struct AttachmentSerializer<W> {
    out: W,
    boundary: String,
    options: SerializeOptions,
    state: State,
}

impl<W> fmt::Debug for AttachmentSerializer<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentSerializer")
            .field("boundary", &self.boundary)
            .field("options", &self.options)
            .field("state", &self.state)
            .finish()
    }
}

impl<W: Write> AttachmentSerializer<W> {
    /// Creates a serializer with a freshly generated boundary token.
    pub fn new(out: W, options: SerializeOptions) -> Self {
        Self {
            out,
            boundary: format!("uuid:{}", Uuid::new_v4()),
            options,
            state: State::Prolog,
        }
    }

    /// Returns the boundary token used for this message.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Writes the first boundary and the primary body part headers;
    /// returns the composed envelope content type for the transport
    /// layer.
    pub fn write_prolog(&mut self, body: &OutboundBody) -> Result<String, CodecError> {
        if self.state != State::Prolog {
            return Err(CodecError::invalid_state("prolog was already written"));
        }

        let envelope = self.envelope_content_type(body);
        let root_id = encode_content_id(&body.content_id);
        let root_type = if self.options.xop {
            format!(
                "application/xop+xml; charset=UTF-8; type=\"{}\"",
                escape_quotes(&body.content_type)
            )
        } else {
            body.content_type.clone()
        };

        write!(self.out, "--{}\r\n", self.boundary)?;
        write!(self.out, "Content-Type: {root_type}\r\n")?;
        write!(self.out, "Content-Transfer-Encoding: binary\r\n")?;
        write!(self.out, "Content-ID: {root_id}\r\n\r\n")?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            boundary = self.boundary.as_str(),
            xop = self.options.xop,
            "serializer: prolog written"
        );

        self.state = State::Body;
        Ok(envelope)
    }

    /// Writes primary body payload bytes; may be called repeatedly.
    pub fn write_body(&mut self, payload: &[u8]) -> Result<(), CodecError> {
        if self.state != State::Body {
            return Err(CodecError::invalid_state(
                "primary body must directly follow the prolog",
            ));
        }
        self.out.write_all(payload)?;
        Ok(())
    }

    /// Streams the primary body payload from a reader.
    pub fn write_body_from(&mut self, payload: &mut dyn Read) -> Result<u64, CodecError> {
        if self.state != State::Body {
            return Err(CodecError::invalid_state(
                "primary body must directly follow the prolog",
            ));
        }
        Ok(io::copy(payload, &mut self.out)?)
    }

    /// Writes one attachment: boundary line, headers, payload.
    pub fn write_attachment(
        &mut self,
        attachment: &mut OutboundAttachment,
    ) -> Result<(), CodecError> {
        if !matches!(self.state, State::Body | State::Attachments) {
            return Err(CodecError::invalid_state(
                "attachments must follow the primary body",
            ));
        }
        if attachment.transfer_encoding == TransferEncoding::QuotedPrintable {
            return Err(CodecError::UnsupportedEncoding {
                token: attachment.transfer_encoding.token().to_owned(),
            });
        }

        write!(self.out, "\r\n--{}\r\n", self.boundary)?;

        let content_type = if attachment.content_type.is_empty() {
            "application/octet-stream"
        } else {
            attachment.content_type.as_str()
        };
        write!(self.out, "Content-Type: {content_type}\r\n")?;
        write!(
            self.out,
            "Content-Transfer-Encoding: {}\r\n",
            attachment.transfer_encoding.token()
        )?;
        write!(
            self.out,
            "Content-ID: {}\r\n",
            encode_content_id(&attachment.id)
        )?;

        for (name, value) in attachment.headers.iter() {
            if RESERVED_HEADERS
                .iter()
                .any(|reserved| reserved.eq_ignore_ascii_case(name))
            {
                continue;
            }
            write!(self.out, "{name}: {value}\r\n")?;
        }

        self.out.write_all(b"\r\n")?;
        self.write_payload(attachment)?;
        self.state = State::Attachments;
        Ok(())
    }

    /// Writes each attachment in iteration order.
    pub fn write_attachments<'a>(
        &mut self,
        attachments: impl IntoIterator<Item = &'a mut OutboundAttachment>,
    ) -> Result<(), CodecError> {
        for attachment in attachments {
            self.write_attachment(attachment)?;
        }
        Ok(())
    }

    /// Writes the closing boundary, flushes, and returns the sink.
    pub fn finish(mut self) -> Result<W, CodecError> {
        if !matches!(self.state, State::Body | State::Attachments) {
            return Err(CodecError::invalid_state(
                "prolog and body must be written before finishing",
            ));
        }

        write!(self.out, "\r\n--{}--\r\n", self.boundary)?;
        self.out.flush()?;
        self.state = State::Finished;

        #[cfg(feature = "tracing")]
        tracing::debug!(boundary = self.boundary.as_str(), "serializer: finished");

        Ok(self.out)
    }

    fn write_payload(&mut self, attachment: &mut OutboundAttachment) -> Result<(), CodecError> {
        if attachment.transfer_encoding == TransferEncoding::Base64 {
            let mut encoder = Base64Encoder::new(&mut self.out);
            match &mut attachment.payload {
                OutboundPayload::Bytes(bytes) => encoder.write_all(bytes)?,
                OutboundPayload::Reader(reader) => {
                    io::copy(reader, &mut encoder)?;
                }
            }
            encoder.finish()?;
            return Ok(());
        }

        match &mut attachment.payload {
            OutboundPayload::Bytes(bytes) => self.out.write_all(bytes)?,
            OutboundPayload::Reader(reader) => {
                io::copy(reader, &mut self.out)?;
            }
        }
        Ok(())
    }

    fn envelope_content_type(&self, body: &OutboundBody) -> String {
        let start = encode_content_id(&body.content_id);
        if self.options.xop {
            format!(
                "multipart/related; type=\"application/xop+xml\"; boundary=\"{}\"; start=\"{}\"; start-info=\"{}\"",
                self.boundary,
                start,
                escape_quotes(&body.content_type)
            )
        } else {
            format!(
                "multipart/related; type=\"{}\"; boundary=\"{}\"; start=\"{}\"",
                media_type_essence(&body.content_type),
                self.boundary,
                start
            )
        }
    }
}

/// Encodes an attachment identifier as an RFC 2392 `Content-ID` value.
///
/// A `cid:` prefix is stripped and the remainder percent-decoded.
/// Otherwise the identifier splits at the first `@` and only the domain
/// part is percent-decoded, and only when re-encoding the decoded form
/// reproduces the original string; ambiguous or already-decoded
/// identifiers pass through unchanged, so applying this twice is a
/// no-op. The result is wrapped in angle brackets.
pub fn encode_content_id(raw: &str) -> String {
    if let Some(rest) = raw.strip_prefix("cid:") {
        return format!("<{}>", percent_decode_lossy(rest));
    }

    match raw.split_once('@') {
        Some((local, domain)) => {
            let decoded = percent_decode_lossy(domain);
            if percent_encode(&decoded) == domain {
                format!("<{local}@{decoded}>")
            } else {
                format!("<{local}@{domain}>")
            }
        }
        None => format!("<{raw}>"),
    }
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for &byte in value.as_bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn escape_quotes(value: &str) -> String {
    value.replace('"', "\\\"")
}

fn media_type_essence(content_type: &str) -> String {
    content_type
        .parse::<mime::Mime>()
        .map(|parsed| parsed.essence_str().to_owned())
        .unwrap_or_else(|_| {
            content_type
                .split(';')
                .next()
                .unwrap_or(content_type)
                .trim()
                .to_owned()
        })
}
