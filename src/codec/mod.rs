//! Transfer-codec streams selected by `Content-Transfer-Encoding`.

use std::io::{self, Read};

use crate::{error::CodecError, parser::source::BoundedReader};

/// Streaming base64 decode and encode.
pub mod base64;
/// Streaming quoted-printable decode.
pub mod qp;

pub use self::base64::{Base64Decoder, Base64Encoder};
pub use qp::QpDecoder;

/// Content transfer encodings understood by the codec.
///
/// Resolved once from the header token; unsupported values are a single
/// well-defined error path rather than open-ended string branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    /// Pass-through binary payload (the default).
    #[default]
    Binary,
    /// Pass-through 7bit payload.
    SevenBit,
    /// Pass-through 8bit payload.
    EightBit,
    /// Standard base64 payload.
    Base64,
    /// Quoted-printable payload (decode only).
    QuotedPrintable,
}

impl TransferEncoding {
    /// Resolves a `Content-Transfer-Encoding` token.
    pub fn from_token(token: &str) -> Result<Self, CodecError> {
        let trimmed = token.trim();
        if trimmed.eq_ignore_ascii_case("binary") {
            Ok(Self::Binary)
        } else if trimmed.eq_ignore_ascii_case("7bit") {
            Ok(Self::SevenBit)
        } else if trimmed.eq_ignore_ascii_case("8bit") {
            Ok(Self::EightBit)
        } else if trimmed.eq_ignore_ascii_case("base64") {
            Ok(Self::Base64)
        } else if trimmed.eq_ignore_ascii_case("quoted-printable") {
            Ok(Self::QuotedPrintable)
        } else {
            Err(CodecError::UnsupportedEncoding {
                token: trimmed.to_owned(),
            })
        }
    }

    /// Returns the wire token for this encoding.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Base64 => "base64",
            Self::QuotedPrintable => "quoted-printable",
        }
    }

    /// Returns `true` for encodings that pass bytes through unchanged.
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Binary | Self::SevenBit | Self::EightBit)
    }
}

/// A bounded part stream with its transfer decoding applied.
pub(crate) enum BodyReader {
    Identity(BoundedReader),
    Base64(Base64Decoder<BoundedReader>),
    QuotedPrintable(QpDecoder<BoundedReader>),
}

impl BodyReader {
    pub(crate) fn new(encoding: TransferEncoding, bounded: BoundedReader) -> Self {
        match encoding {
            TransferEncoding::Binary | TransferEncoding::SevenBit | TransferEncoding::EightBit => {
                Self::Identity(bounded)
            }
            TransferEncoding::Base64 => Self::Base64(Base64Decoder::new(bounded)),
            TransferEncoding::QuotedPrintable => Self::QuotedPrintable(QpDecoder::new(bounded)),
        }
    }

    pub(crate) fn bounded_mut(&mut self) -> &mut BoundedReader {
        match self {
            Self::Identity(inner) => inner,
            Self::Base64(inner) => inner.get_mut(),
            Self::QuotedPrintable(inner) => inner.get_mut(),
        }
    }
}

impl std::fmt::Debug for BodyReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Identity(_) => "Identity",
            Self::Base64(_) => "Base64",
            Self::QuotedPrintable(_) => "QuotedPrintable",
        };
        f.debug_tuple("BodyReader").field(&label).finish()
    }
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Identity(inner) => inner.read(buf),
            Self::Base64(inner) => inner.read(buf),
            Self::QuotedPrintable(inner) => inner.read(buf),
        }
    }
}
