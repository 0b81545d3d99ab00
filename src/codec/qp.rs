use std::io::{self, Read};

const CHUNK: usize = 1024;

/// Streaming quoted-printable decoder over an inner reader.
///
/// Decodes `=XX` hex escapes and collapses soft line breaks (`=`
/// immediately before a line ending). An escape split across two
/// underlying reads is carried and completed with the next chunk.
#[derive(Debug)]
pub struct QpDecoder<R> {
    inner: R,
    carry: Vec<u8>,
    decoded: Vec<u8>,
    pos: usize,
    eof: bool,
}

impl<R: Read> QpDecoder<R> {
    /// Wraps a reader producing quoted-printable bytes.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            carry: Vec::new(),
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

    fn refill(&mut self) -> io::Result<()> {
        let mut chunk = [0u8; CHUNK];
        let n = self.inner.read(&mut chunk)?;
        if n == 0 {
            self.eof = true;
            if !self.carry.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "quoted-printable input ended inside an escape sequence",
                ));
            }
            return Ok(());
        }

        let mut data = std::mem::take(&mut self.carry);
        data.extend_from_slice(&chunk[..n]);

        self.decoded.clear();
        self.pos = 0;

        let mut i = 0usize;
        while i < data.len() {
            let byte = data[i];
            if byte != b'=' {
                self.decoded.push(byte);
                i += 1;
                continue;
            }

            if i + 1 >= data.len() {
                self.carry = data[i..].to_vec();
                break;
            }

            match data[i + 1] {
                b'\n' => i += 2, // soft break, bare LF
                b'\r' => {
                    if i + 2 >= data.len() {
                        self.carry = data[i..].to_vec();
                        break;
                    }
                    if data[i + 2] != b'\n' {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "quoted-printable soft break missing line feed",
                        ));
                    }
                    i += 3;
                }
                hi => {
                    if i + 2 >= data.len() {
                        self.carry = data[i..].to_vec();
                        break;
                    }
                    let decoded = hex_value(hi)
                        .zip(hex_value(data[i + 2]))
                        .map(|(hi, lo)| (hi << 4) | lo)
                        .ok_or_else(|| {
                            io::Error::new(
                                io::ErrorKind::InvalidData,
                                "invalid quoted-printable hex escape",
                            )
                        })?;
                    self.decoded.push(decoded);
                    i += 3;
                }
            }
        }

        Ok(())
    }
}

impl<R: Read> Read for QpDecoder<R> {
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
                return Ok(0);
            }

            self.refill()?;
        }
    }
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
