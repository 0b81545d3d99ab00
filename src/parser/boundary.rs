use std::io::Read;

use crate::{
    error::CodecError,
    parser::{headers::percent_decode_lossy, source::PushbackReader},
};

const MAX_BOUNDARY_LEN: usize = 70;
/// Bytes of the stream head inspected when sniffing an undeclared boundary.
pub(crate) const SNIFF_WINDOW: usize = 4096;

/// Extracts a usable `boundary=` parameter from a declared content type.
///
/// Returns `None` when the content type does not parse, carries no
/// boundary parameter, or the parameter fails RFC 2046 validation; the
/// caller falls back to sniffing the stream head.
pub fn declared_boundary(content_type: &str) -> Option<String> {
    let parsed = content_type.trim().parse::<mime::Mime>().ok()?;
    let raw = parsed.get_param(mime::BOUNDARY)?.as_str();
    let candidate = percent_decode_lossy(raw);

    if is_valid_boundary(&candidate) {
        Some(candidate)
    } else {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            boundary = raw,
            "declared multipart boundary failed validation; falling back to sniffing"
        );
        None
    }
}

/// Validates an RFC 2046 boundary token.
pub fn is_valid_boundary(boundary: &str) -> bool {
    !boundary.is_empty()
        && boundary.len() <= MAX_BOUNDARY_LEN
        && !boundary.ends_with(' ')
        && boundary.chars().all(is_boundary_char)
}

/// Scans the stream head for a line beginning with `--` and returns its
/// token; every scanned byte is pushed back.
///
/// Only lines fully terminated inside the sniff window are trusted, so a
/// token is never truncated at the window edge.
pub(crate) fn sniff_boundary<R: Read>(
    reader: &mut PushbackReader<R>,
) -> Result<Option<String>, CodecError> {
    let mut window = vec![0u8; SNIFF_WINDOW];
    let mut filled = 0usize;

    loop {
        let n = reader
            .read(&mut window[filled..])
            .map_err(CodecError::from_io)?;
        filled += n;
        if n == 0 || filled == SNIFF_WINDOW {
            break;
        }
    }

    let token = find_boundary_line(&window[..filled]);
    reader.unread(&window[..filled]);

    #[cfg(feature = "tracing")]
    if let Some(token) = &token {
        tracing::debug!(boundary = token.as_str(), "sniffed multipart boundary");
    }

    Ok(token)
}

fn find_boundary_line(head: &[u8]) -> Option<String> {
    let mut start = 0usize;

    while start < head.len() {
        let newline = head[start..]
            .iter()
            .position(|&byte| byte == b'\n')
            .map(|at| start + at);
        let Some(line_end) = newline else {
            // unterminated tail; the token could be cut off
            return None;
        };

        let mut line = &head[start..line_end];
        if line.last() == Some(&b'\r') {
            line = &line[..line.len() - 1];
        }

        if let Some(token) = line.strip_prefix(b"--") {
            if let Ok(token) = std::str::from_utf8(token) {
                if is_valid_boundary(token) {
                    return Some(token.to_owned());
                }
            }
        }

        start = line_end + 1;
    }

    None
}

fn is_boundary_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '\'' | '(' | ')' | '+' | '_' | ',' | '-' | '.' | '/' | ':' | '=' | '?' | ' '
        )
}
