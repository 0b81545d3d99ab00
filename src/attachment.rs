use std::{
    cell::RefCell,
    io::{self, Read},
    rc::Rc,
};

use bytes::Bytes;

use crate::{
    codec::{BodyReader, TransferEncoding},
    error::CodecError,
    parser::{PartHeaders, content_disposition_param, source::SourceState},
    spool::{SealedPayload, SpoolReader},
};

/// One decoded MIME part: identifier, headers, and payload stream.
///
/// Created by the deserializer; the payload stream is single-consumer and
/// forward-only. Dropping the stream (or the whole attachment) counts as
/// closing it for finalization purposes.
#[derive(Debug)]
pub struct Attachment {
    id: String,
    headers: PartHeaders,
    content_type: mime::Mime,
    transfer_encoding: TransferEncoding,
    stream: PartStream,
}

impl Attachment {
    pub(crate) fn new(
        id: String,
        headers: PartHeaders,
        content_type: mime::Mime,
        transfer_encoding: TransferEncoding,
        stream: PartStream,
    ) -> Self {
        Self {
            id,
            headers,
            content_type,
            transfer_encoding,
            stream,
        }
    }

    /// Returns the normalized attachment identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the part's header multimap.
    pub fn headers(&self) -> &PartHeaders {
        &self.headers
    }

    /// Returns the declared content type, `application/octet-stream` when
    /// the part carried none.
    pub fn content_type(&self) -> &mime::Mime {
        &self.content_type
    }

    /// Returns the transfer encoding the payload stream decodes.
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.transfer_encoding
    }

    /// Returns the `Content-Disposition` `filename` parameter, falling
    /// back to `name`.
    pub fn filename(&self) -> Option<String> {
        let disposition = self.headers.get("Content-Disposition")?;
        content_disposition_param(disposition, "filename")
            .or_else(|| content_disposition_param(disposition, "name"))
    }

    /// Returns a mutable reference to the payload stream.
    pub fn body_mut(&mut self) -> &mut PartStream {
        &mut self.stream
    }

    /// Consumes the attachment, returning its payload stream.
    pub fn into_body(self) -> PartStream {
        self.stream
    }

    /// Reads the remaining payload bytes.
    pub fn bytes(&mut self) -> Result<Bytes, CodecError> {
        let mut data = Vec::new();
        self.stream
            .read_to_end(&mut data)
            .map_err(CodecError::from_io)?;
        Ok(Bytes::from(data))
    }

    /// Reads the remaining payload and decodes it as UTF-8 text.
    pub fn text(&mut self) -> Result<String, CodecError> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| CodecError::malformed("part payload is not valid UTF-8"))
    }
}

/// Delegate a part stream reads through.
///
/// A part starts `Live` on the shared source; it becomes `Cached` when
/// the deserializer must advance while the consumer has unread bytes, and
/// `Closed` once the consumer is done with it.
pub(crate) enum Delegate {
    Live(BodyReader),
    Cached {
        // payload owns the spool file backing `reader`
        #[allow(dead_code)]
        payload: SealedPayload,
        reader: SpoolReader,
    },
    Closed,
}

pub(crate) struct PartInner {
    pub(crate) delegate: Delegate,
}

/// Owned, single-consumer payload stream of one attachment.
///
/// Reads live from the shared underlying stream until the next boundary,
/// or from a spooled copy once the deserializer has advanced past this
/// part. Closing (explicitly or by drop) is required for the
/// deserializer to finalize the underlying stream.
pub struct PartStream {
    inner: Rc<RefCell<PartInner>>,
    source: Rc<RefCell<SourceState>>,
}

impl std::fmt::Debug for PartStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.inner.borrow().delegate {
            Delegate::Live(_) => "live",
            Delegate::Cached { .. } => "cached",
            Delegate::Closed => "closed",
        };
        f.debug_struct("PartStream").field("state", &state).finish()
    }
}

impl PartStream {
    pub(crate) fn new(inner: Rc<RefCell<PartInner>>, source: Rc<RefCell<SourceState>>) -> Self {
        Self { inner, source }
    }

    /// Closes the stream, discarding any unread payload bytes.
    ///
    /// Idempotent. Dropping the stream closes it implicitly, ignoring
    /// errors; call this to observe them instead.
    pub fn close(&mut self) -> Result<(), CodecError> {
        let delegate = {
            let mut inner = self.inner.borrow_mut();
            std::mem::replace(&mut inner.delegate, Delegate::Closed)
        };

        match delegate {
            Delegate::Closed => Ok(()),
            Delegate::Live(mut body) => {
                body.bounded_mut()
                    .discard_remaining()
                    .map_err(CodecError::from_io)?;
                self.source
                    .borrow_mut()
                    .mark_closed()
                    .map_err(CodecError::from_io)
            }
            Delegate::Cached { .. } => self
                .source
                .borrow_mut()
                .mark_closed()
                .map_err(CodecError::from_io),
        }
    }

    /// Returns `true` once the stream has been closed.
    pub fn is_closed(&self) -> bool {
        matches!(self.inner.borrow().delegate, Delegate::Closed)
    }
}

impl Read for PartStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.borrow_mut();
        match &mut inner.delegate {
            Delegate::Live(body) => body.read(buf),
            Delegate::Cached { reader, .. } => reader.read(buf),
            Delegate::Closed => {
                Err(CodecError::invalid_state("part stream read after close").into_io())
            }
        }
    }
}

impl Drop for PartStream {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
