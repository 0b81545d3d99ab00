use std::{
    cell::RefCell,
    io::{self, Read},
    rc::Rc,
};

use crate::error::CodecError;

/// A reader that allows previously read bytes to be pushed back.
///
/// Pushed-back bytes are served before the inner reader is touched again,
/// so speculative matching (boundary detection, stream-head sniffing) can
/// fail without losing data. Capacity grows as needed; the sniff window
/// plus one boundary delimiter is the practical high-water mark.
#[derive(Debug)]
pub struct PushbackReader<R> {
    inner: R,
    buffer: Vec<u8>,
    pos: usize,
}

impl<R: Read> PushbackReader<R> {
    /// Wraps a reader with an empty push-back buffer.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            pos: 0,
        }
    }

    /// Pushes bytes back so the next read returns them first.
    ///
    /// Bytes are prepended ahead of anything already pushed back, which
    /// matches the unread-what-you-just-read usage pattern.
    pub fn unread(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }

        if self.pos >= bytes.len() {
            self.pos -= bytes.len();
            self.buffer[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
            return;
        }

        let mut next = Vec::with_capacity(bytes.len() + self.buffered_len());
        next.extend_from_slice(bytes);
        next.extend_from_slice(&self.buffer[self.pos..]);
        self.buffer = next;
        self.pos = 0;
    }

    /// Returns the number of pushed-back bytes not yet re-read.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len() - self.pos
    }
}

impl<R: Read> Read for PushbackReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let pending = self.buffered_len();
        if pending > 0 {
            let take = pending.min(buf.len());
            buf[..take].copy_from_slice(&self.buffer[self.pos..self.pos + take]);
            self.pos += take;
            if self.pos == self.buffer.len() {
                self.buffer.clear();
                self.pos = 0;
            }
            return Ok(take);
        }

        self.inner.read(buf)
    }
}

/// Kind of boundary delimiter consumed from the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delimiter {
    /// An intermediate delimiter; part headers follow.
    Part,
    /// The closing `--boundary--` delimiter; no parts follow.
    Final,
}

/// Single-owner state for the shared underlying stream of one message.
///
/// All part streams created by a deserializer funnel their reads through
/// this object, which also carries the created/closed lifecycle counters
/// gating finalization. The pipeline is single-threaded by design, so the
/// object is shared via `Rc<RefCell<_>>` with no synchronization.
pub(crate) struct SourceState {
    reader: PushbackReader<Box<dyn Read>>,
    delimiter: Vec<u8>,
    scratch: Vec<u8>,
    created: usize,
    closed: usize,
    final_boundary_seen: bool,
    finalized: bool,
}

impl std::fmt::Debug for SourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceState")
            .field("delimiter", &String::from_utf8_lossy(&self.delimiter))
            .field("created", &self.created)
            .field("closed", &self.closed)
            .field("final_boundary_seen", &self.final_boundary_seen)
            .field("finalized", &self.finalized)
            .finish()
    }
}

impl SourceState {
    pub(crate) fn new(reader: PushbackReader<Box<dyn Read>>, boundary: &str) -> Self {
        let delimiter = format!("\r\n--{boundary}").into_bytes();
        Self {
            reader,
            delimiter,
            scratch: Vec::new(),
            created: 0,
            closed: 0,
            final_boundary_seen: false,
            finalized: false,
        }
    }

    pub(crate) fn reader_mut(&mut self) -> &mut PushbackReader<Box<dyn Read>> {
        &mut self.reader
    }

    /// Reads part bytes into `buf`, returning `Ok(0)` exactly when the
    /// stream is positioned at the next boundary delimiter.
    ///
    /// The delimiter itself is never consumed; bytes read while matching a
    /// candidate that turned out to be a false or partial match are pushed
    /// back. A delimiter straddling two underlying reads is still detected
    /// because the scan window extends one delimiter length past `buf`.
    pub(crate) fn read_bounded(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let cap = buf.len() + self.delimiter.len();
        self.scratch.clear();
        self.scratch.resize(cap, 0);
        let mut filled = 0usize;

        loop {
            let n = self.reader.read(&mut self.scratch[filled..cap])?;
            filled += n;

            if let Some(at) = find_subslice(&self.scratch[..filled], &self.delimiter) {
                buf[..at].copy_from_slice(&self.scratch[..at]);
                self.reader.unread(&self.scratch[at..filled]);
                return Ok(at);
            }

            if n == 0 {
                self.reader.unread(&self.scratch[..filled]);
                return Err(
                    CodecError::malformed("stream ended before boundary delimiter").into_io(),
                );
            }

            let hold = partial_delimiter_suffix(&self.scratch[..filled], &self.delimiter);
            let emit = (filled - hold).min(buf.len());
            if emit > 0 {
                buf[..emit].copy_from_slice(&self.scratch[..emit]);
                self.reader.unread(&self.scratch[emit..filled]);
                return Ok(emit);
            }
            // the whole window is a delimiter prefix; read on to decide
        }
    }

    /// Consumes the delimiter line the stream is positioned at.
    pub(crate) fn consume_delimiter(&mut self) -> Result<Delimiter, CodecError> {
        let mut line = vec![0u8; self.delimiter.len()];
        self.reader.read_exact(&mut line).map_err(eof_as_malformed)?;
        if line != self.delimiter {
            return Err(CodecError::malformed("expected boundary delimiter"));
        }

        let mut padded = false;
        loop {
            let Some(byte) = self.read_byte()? else {
                return Err(CodecError::malformed("stream ended inside boundary line"));
            };

            match byte {
                b'-' if !padded => {
                    return match self.read_byte()? {
                        Some(b'-') => Ok(Delimiter::Final),
                        _ => Err(CodecError::malformed("truncated closing boundary")),
                    };
                }
                b' ' | b'\t' => padded = true,
                b'\r' => {
                    return match self.read_byte()? {
                        Some(b'\n') => Ok(Delimiter::Part),
                        _ => Err(CodecError::malformed("boundary line missing CRLF")),
                    };
                }
                b'\n' => return Ok(Delimiter::Part),
                _ => {
                    return Err(CodecError::malformed("unexpected bytes after boundary"));
                }
            }
        }
    }

    pub(crate) fn read_byte(&mut self) -> Result<Option<u8>, CodecError> {
        let mut byte = [0u8; 1];
        let n = self.reader.read(&mut byte).map_err(CodecError::from_io)?;
        Ok((n == 1).then_some(byte[0]))
    }

    pub(crate) fn mark_created(&mut self) {
        self.created += 1;
    }

    pub(crate) fn set_final_boundary_seen(&mut self) {
        self.final_boundary_seen = true;
    }

    /// Records a part-stream close and finalizes when possible.
    pub(crate) fn mark_closed(&mut self) -> io::Result<()> {
        self.closed += 1;
        self.try_finalize()
    }

    /// Drains and releases the underlying stream once the final boundary
    /// has been seen and every created part stream has been closed.
    pub(crate) fn try_finalize(&mut self) -> io::Result<()> {
        if self.finalized || !self.final_boundary_seen || self.closed < self.created {
            return Ok(());
        }

        self.finalized = true;
        io::copy(&mut self.reader, &mut io::sink())?;
        self.reader = PushbackReader::new(Box::new(io::empty()));

        #[cfg(feature = "tracing")]
        tracing::debug!(
            created = self.created,
            "deserializer: underlying stream drained and released"
        );

        Ok(())
    }
}

/// A sub-stream over the shared source bounded by the next delimiter.
///
/// Returns end-of-stream at the start of the boundary without consuming
/// it; the next consumer (delimiter scan, header parser) reads on from
/// there.
#[derive(Debug)]
pub(crate) struct BoundedReader {
    source: Rc<RefCell<SourceState>>,
    done: bool,
}

impl BoundedReader {
    pub(crate) fn new(source: Rc<RefCell<SourceState>>) -> Self {
        Self {
            source,
            done: false,
        }
    }

    /// Reads and discards everything up to the boundary.
    pub(crate) fn discard_remaining(&mut self) -> io::Result<u64> {
        let mut sink = [0u8; 8192];
        let mut total = 0u64;
        loop {
            let n = self.read(&mut sink)?;
            if n == 0 {
                return Ok(total);
            }
            total += n as u64;
        }
    }
}

impl Read for BoundedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.done || buf.is_empty() {
            return Ok(0);
        }

        let n = self.source.borrow_mut().read_bounded(buf)?;
        if n == 0 {
            self.done = true;
        }
        Ok(n)
    }
}

pub(crate) fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }

    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Length of the longest window suffix that is a proper delimiter prefix.
fn partial_delimiter_suffix(window: &[u8], delimiter: &[u8]) -> usize {
    let max = window.len().min(delimiter.len() - 1);
    (1..=max)
        .rev()
        .find(|&len| window.ends_with(&delimiter[..len]))
        .unwrap_or(0)
}

fn eof_as_malformed(err: io::Error) -> CodecError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        CodecError::malformed("stream ended inside boundary delimiter")
    } else {
        CodecError::from_io(err)
    }
}
