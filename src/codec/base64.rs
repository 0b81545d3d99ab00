use std::io::{self, Read, Write};

use base64::{Engine, engine::general_purpose::STANDARD};

const CHUNK: usize = 1024;

/// Streaming standard-base64 decoder over an inner reader.
///
/// Embedded line breaks (and other ASCII whitespace) in the encoded input
/// are tolerated. Symbols are accumulated into four-character quanta
/// across reads, so the caller's buffer size never affects correctness. A
/// trailing partial quantum at end of input is an error.
#[derive(Debug)]
pub struct Base64Decoder<R> {
    inner: R,
    quad: [u8; 4],
    quad_len: usize,
    decoded: Vec<u8>,
    pos: usize,
    eof: bool,
}

impl<R: Read> Base64Decoder<R> {
    /// Wraps a reader producing base64-encoded bytes.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            quad: [0; 4],
            quad_len: 0,
            decoded: Vec::new(),
            pos: 0,
            eof: false,
        }
    }

    /// Returns a mutable reference to the inner reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Unwraps the decoder, returning the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for Base64Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if self.pos < self.decoded.len() {
                let take = (self.decoded.len() - self.pos).min(buf.len());
                buf[..take].copy_from_slice(&self.decoded[self.pos..self.pos + take]);
                self.pos += take;
                return Ok(take);
            }

            if self.eof {
                if self.quad_len != 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "base64 input ended inside a four-character quantum",
                    ));
                }
                return Ok(0);
            }

            self.decoded.clear();
            self.pos = 0;

            let mut chunk = [0u8; CHUNK];
            let n = self.inner.read(&mut chunk)?;
            if n == 0 {
                self.eof = true;
                continue;
            }

            for &byte in &chunk[..n] {
                if byte.is_ascii_whitespace() {
                    continue;
                }

                self.quad[self.quad_len] = byte;
                self.quad_len += 1;
                if self.quad_len == 4 {
                    let mut triple = [0u8; 3];
                    let written = STANDARD
                        .decode_slice(self.quad, &mut triple)
                        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
                    self.decoded.extend_from_slice(&triple[..written]);
                    self.quad_len = 0;
                }
            }
        }
    }
}

/// Streaming standard-base64 encoder over an inner writer.
///
/// Input bytes are carried so that only whole three-byte groups are
/// encoded per write; partial trailing bytes from one write combine with
/// the next, guaranteeing correct output regardless of the caller's
/// buffer sizes. [`Base64Encoder::finish`] emits the padded tail.
#[derive(Debug)]
pub struct Base64Encoder<W> {
    inner: W,
    carry: [u8; 3],
    carry_len: usize,
}

impl<W: Write> Base64Encoder<W> {
    /// Wraps a writer receiving base64-encoded bytes.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            carry: [0; 3],
            carry_len: 0,
        }
    }

    /// Encodes any carried partial group with padding and returns the
    /// inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        if self.carry_len > 0 {
            let encoded = STANDARD.encode(&self.carry[..self.carry_len]);
            self.inner.write_all(encoded.as_bytes())?;
            self.carry_len = 0;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for Base64Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut consumed = 0usize;

        if self.carry_len > 0 {
            let need = 3 - self.carry_len;
            let take = need.min(buf.len());
            self.carry[self.carry_len..self.carry_len + take].copy_from_slice(&buf[..take]);
            self.carry_len += take;
            consumed += take;

            if self.carry_len < 3 {
                return Ok(consumed);
            }

            let encoded = STANDARD.encode(self.carry);
            self.inner.write_all(encoded.as_bytes())?;
            self.carry_len = 0;
        }

        let rest = &buf[consumed..];
        let whole = rest.len() - rest.len() % 3;
        if whole > 0 {
            let encoded = STANDARD.encode(&rest[..whole]);
            self.inner.write_all(encoded.as_bytes())?;
            consumed += whole;
        }

        let tail = &rest[whole..];
        self.carry[..tail.len()].copy_from_slice(tail);
        self.carry_len = tail.len();
        consumed += tail.len();

        Ok(consumed)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
