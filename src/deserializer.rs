use std::{
    cell::RefCell,
    io::Read,
    rc::Rc,
};

use uuid::Uuid;

use crate::{
    attachment::{Attachment, Delegate, PartInner, PartStream},
    codec::{BodyReader, TransferEncoding},
    config::CodecConfig,
    error::CodecError,
    parser::{
        boundary::{declared_boundary, sniff_boundary},
        headers::{PartHeaders, normalize_content_id, read_header_block},
        source::{BoundedReader, Delimiter, PushbackReader, SourceState},
    },
    spool::SpooledPayload,
};

const CONTENT_ID: &str = "Content-ID";
const CONTENT_TYPE: &str = "Content-Type";
const CONTENT_TRANSFER_ENCODING: &str = "Content-Transfer-Encoding";

/// Streaming decoder for one inbound multipart message.
///
/// Created once per message. [`AttachmentDeserializer::initialize`]
/// determines the boundary and produces the primary body;
/// [`AttachmentDeserializer::read_next`] then yields attachments one at a
/// time in wire order.
///
/// The underlying stream is shared by every part stream this
/// deserializer creates, with no locking: before advancing to a new
/// part, any part stream that is still open and unread to completion is
/// fully materialized into a spooled payload, so at most one live reader
/// exists at any time. Consumers may therefore hold several part streams
/// and read them in any order; all but the most recently created one are
/// by then backed by their own spooled copies. The underlying stream is
/// drained and released only once the final boundary has been seen and
/// every created part stream has been closed or dropped.
pub struct AttachmentDeserializer {
    phase: Phase,
    config: CodecConfig,
    current: Option<Rc<RefCell<PartInner>>>,
    pending: Option<Attachment>,
    exhausted: bool,
}

enum Phase {
    Fresh {
        content_type: String,
        source: Box<dyn Read>,
    },
    Active {
        source: Rc<RefCell<SourceState>>,
        boundary: String,
    },
    Failed,
}

impl std::fmt::Debug for AttachmentDeserializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match &self.phase {
            Phase::Fresh { .. } => "fresh",
            Phase::Active { .. } => "active",
            Phase::Failed => "failed",
        };
        f.debug_struct("AttachmentDeserializer")
            .field("phase", &phase)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

impl AttachmentDeserializer {
    /// Creates a deserializer for a message with the given declared
    /// content type and raw input stream.
    pub fn new(
        content_type: impl Into<String>,
        source: impl Read + 'static,
        config: CodecConfig,
    ) -> Self {
        Self {
            phase: Phase::Fresh {
                content_type: content_type.into(),
                source: Box::new(source),
            },
            config,
            current: None,
            pending: None,
            exhausted: false,
        }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Returns the boundary token, once determined.
    pub fn boundary(&self) -> Option<&str> {
        match &self.phase {
            Phase::Active { boundary, .. } => Some(boundary),
            _ => None,
        }
    }

    /// Determines the boundary and returns the primary body part.
    ///
    /// The boundary comes from the declared content type's `boundary=`
    /// parameter when usable, otherwise from sniffing the stream head for
    /// a `--token` line; if neither works the message is undecodable.
    pub fn initialize(&mut self) -> Result<Attachment, CodecError> {
        let (content_type, source) = match std::mem::replace(&mut self.phase, Phase::Failed) {
            Phase::Fresh {
                content_type,
                source,
            } => (content_type, source),
            other => {
                self.phase = other;
                return Err(CodecError::invalid_state(
                    "deserializer is already initialized",
                ));
            }
        };

        let mut reader = PushbackReader::new(source);
        let boundary = match declared_boundary(&content_type) {
            Some(boundary) => boundary,
            None => sniff_boundary(&mut reader)?.ok_or_else(|| {
                CodecError::malformed("multipart boundary could not be determined")
            })?,
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(boundary = boundary.as_str(), "deserializer initialized");

        // lets the first `--boundary` line match the same CRLF-prefixed
        // delimiter as every later one
        reader.unread(b"\r\n");

        let mut state = SourceState::new(reader, &boundary);
        skip_preamble(&mut state)?;
        match state.consume_delimiter()? {
            Delimiter::Final => {
                return Err(CodecError::malformed("message has no primary body part"));
            }
            Delimiter::Part => {}
        }

        let headers =
            read_header_block(state.reader_mut(), self.config.limits.max_header_line_len)?;
        let source = Rc::new(RefCell::new(state));
        self.phase = Phase::Active {
            source: Rc::clone(&source),
            boundary,
        };

        self.make_attachment(&source, headers)
    }

    /// Returns `true` when another attachment can be read.
    ///
    /// Peeks by materializing the next attachment into a pending slot;
    /// like [`AttachmentDeserializer::read_next`] this spools the current
    /// part stream if it is still being read.
    pub fn has_next(&mut self) -> Result<bool, CodecError> {
        if self.pending.is_some() {
            return Ok(true);
        }

        match self.read_next()? {
            Some(attachment) => {
                self.pending = Some(attachment);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reads the next attachment, or `None` once the final boundary has
    /// been consumed.
    pub fn read_next(&mut self) -> Result<Option<Attachment>, CodecError> {
        if let Some(pending) = self.pending.take() {
            return Ok(Some(pending));
        }

        if self.exhausted {
            return Ok(None);
        }

        let source = match &self.phase {
            Phase::Active { source, .. } => Rc::clone(source),
            Phase::Fresh { .. } => {
                return Err(CodecError::invalid_state(
                    "deserializer must be initialized before reading parts",
                ));
            }
            Phase::Failed => {
                return Err(CodecError::invalid_state(
                    "deserializer failed during initialization",
                ));
            }
        };

        self.cache_current()?;

        let delimiter = source.borrow_mut().consume_delimiter()?;
        match delimiter {
            Delimiter::Final => {
                self.exhausted = true;
                let mut state = source.borrow_mut();
                state.set_final_boundary_seen();
                state.try_finalize().map_err(CodecError::from_io)?;
                Ok(None)
            }
            Delimiter::Part => {
                let headers = {
                    let mut state = source.borrow_mut();
                    read_header_block(state.reader_mut(), self.config.limits.max_header_line_len)?
                };
                self.make_attachment(&source, headers).map(Some)
            }
        }
    }

    /// Spools the current part stream so the shared source has no live
    /// reader.
    fn cache_current(&mut self) -> Result<(), CodecError> {
        let Some(part) = self.current.take() else {
            return Ok(());
        };

        let mut body = {
            let mut inner = part.borrow_mut();
            match std::mem::replace(&mut inner.delegate, Delegate::Closed) {
                Delegate::Live(body) => body,
                other => {
                    // already spooled or closed by the consumer
                    inner.delegate = other;
                    return Ok(());
                }
            }
        };

        let mut payload = SpooledPayload::new(
            &self.config.spool,
            self.config.limits.max_payload_size,
        );
        let mut chunk = [0u8; 8192];
        let mut total = 0u64;
        loop {
            let n = body.read(&mut chunk).map_err(CodecError::from_io)?;
            if n == 0 {
                break;
            }
            payload.write_all(&chunk[..n]).map_err(CodecError::from_io)?;
            total += n as u64;
        }

        let payload = payload.seal().map_err(CodecError::from_io)?;
        let reader = payload.reader().map_err(CodecError::from_io)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(spooled = total, "deserializer: part stream cached");

        let mut inner = part.borrow_mut();
        inner.delegate = Delegate::Cached { payload, reader };
        Ok(())
    }

    fn make_attachment(
        &mut self,
        source: &Rc<RefCell<SourceState>>,
        headers: PartHeaders,
    ) -> Result<Attachment, CodecError> {
        let transfer_encoding = match headers.get(CONTENT_TRANSFER_ENCODING) {
            Some(token) => TransferEncoding::from_token(token)?,
            None => TransferEncoding::default(),
        };

        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.trim().parse::<mime::Mime>().ok())
            .unwrap_or(mime::APPLICATION_OCTET_STREAM);

        let id = headers
            .get(CONTENT_ID)
            .map(normalize_content_id)
            .unwrap_or_else(generated_content_id);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            id = id.as_str(),
            content_type = %content_type,
            encoding = transfer_encoding.token(),
            "deserializer: part discovered"
        );

        let bounded = BoundedReader::new(Rc::clone(source));
        let body = BodyReader::new(transfer_encoding, bounded);
        let inner = Rc::new(RefCell::new(PartInner {
            delegate: Delegate::Live(body),
        }));
        source.borrow_mut().mark_created();
        self.current = Some(Rc::clone(&inner));

        Ok(Attachment::new(
            id,
            headers,
            content_type,
            transfer_encoding,
            PartStream::new(inner, Rc::clone(source)),
        ))
    }
}

fn skip_preamble(state: &mut SourceState) -> Result<(), CodecError> {
    let mut sink = [0u8; 8192];
    loop {
        let n = state.read_bounded(&mut sink).map_err(CodecError::from_io)?;
        if n == 0 {
            return Ok(());
        }
    }
}

fn generated_content_id() -> String {
    format!("{}@generated", Uuid::new_v4().simple())
}
