use std::io::Read;

use crate::{error::CodecError, parser::source::PushbackReader};

/// Ordered, case-insensitive-keyed header multimap for one MIME part.
///
/// Entries keep wire order; per-name value order is the order of
/// appearance. Names compare case-insensitively but are stored as
/// received so pass-through serialization preserves the original casing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartHeaders {
    entries: Vec<(String, String)>,
}

impl PartHeaders {
    /// Creates an empty header multimap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header entry, preserving insertion order.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Returns the first value for a name, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(entry, _)| entry.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns every value for a name in order of appearance.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(entry, _)| entry.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns `true` when at least one value exists for a name.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates all entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Returns the number of header entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no headers are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reads an RFC822-style folded header block up to a blank line or EOF.
///
/// A physical line starting with SP/HT continues the previous logical
/// line; the fragments are joined by CRLF before the name/value split. A
/// line with no colon yields a header name with an empty value. A logical
/// line longer than `max_line_len` is fatal, never truncated.
pub fn read_header_block<R: Read>(
    reader: &mut PushbackReader<R>,
    max_line_len: usize,
) -> Result<PartHeaders, CodecError> {
    let mut headers = PartHeaders::new();
    let mut logical: Option<Vec<u8>> = None;

    loop {
        let Some(line) = read_physical_line(reader, max_line_len)? else {
            break;
        };

        if line.is_empty() {
            break;
        }

        if matches!(line.first(), Some(b' ') | Some(b'\t')) {
            if let Some(current) = logical.as_mut() {
                current.extend_from_slice(b"\r\n");
                current.extend_from_slice(&line);
                if current.len() > max_line_len {
                    return Err(CodecError::HeaderTooLarge {
                        limit: max_line_len,
                    });
                }
                continue;
            }
            // continuation with no prior header line; take it as-is
        }

        if let Some(done) = logical.replace(line) {
            push_entry(&mut headers, &done);
        }
    }

    if let Some(done) = logical.take() {
        push_entry(&mut headers, &done);
    }

    Ok(headers)
}

fn read_physical_line<R: Read>(
    reader: &mut PushbackReader<R>,
    max_line_len: usize,
) -> Result<Option<Vec<u8>>, CodecError> {
    let mut line = Vec::new();
    let mut chunk = [0u8; 256];

    loop {
        let n = reader.read(&mut chunk).map_err(CodecError::from_io)?;
        if n == 0 {
            return Ok((!line.is_empty()).then_some(line));
        }

        if let Some(at) = chunk[..n].iter().position(|&byte| byte == b'\n') {
            line.extend_from_slice(&chunk[..at]);
            reader.unread(&chunk[at + 1..n]);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.len() > max_line_len {
                return Err(CodecError::HeaderTooLarge {
                    limit: max_line_len,
                });
            }
            return Ok(Some(line));
        }

        line.extend_from_slice(&chunk[..n]);
        if line.len() > max_line_len {
            return Err(CodecError::HeaderTooLarge {
                limit: max_line_len,
            });
        }
    }
}

fn push_entry(headers: &mut PartHeaders, raw: &[u8]) {
    let text = String::from_utf8_lossy(raw);
    match text.split_once(':') {
        Some((name, value)) => headers.append(name.trim(), value.trim()),
        None => headers.append(text.trim(), ""),
    }
}

/// Normalizes a wire-format `Content-ID` into an attachment identifier.
///
/// Strips surrounding angle brackets and a `cid:` prefix, then
/// percent-decodes; malformed escapes are kept literally.
pub fn normalize_content_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('<')
        .and_then(|value| value.strip_suffix('>'))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_prefix("cid:").unwrap_or(trimmed);
    percent_decode_lossy(trimmed)
}

/// Percent-decodes `%XX` escapes, keeping malformed escapes literally.
pub(crate) fn percent_decode_lossy(value: &str) -> String {
    if !value.as_bytes().contains(&b'%') {
        return value.to_owned();
    }

    let raw = value.as_bytes();
    let mut bytes = Vec::with_capacity(raw.len());
    let mut index = 0usize;

    while index < raw.len() {
        if raw[index] == b'%' {
            if let (Some(hi), Some(lo)) = (
                raw.get(index + 1).copied().and_then(hex_value),
                raw.get(index + 2).copied().and_then(hex_value),
            ) {
                bytes.push((hi << 4) | lo);
                index += 3;
                continue;
            }
        }

        bytes.push(raw[index]);
        index += 1;
    }

    String::from_utf8_lossy(&bytes).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Extracts a named `Content-Disposition` parameter value.
///
/// Handles quoted strings with backslash escapes; `filename` values
/// additionally get percent-decoded when they carry escapes.
pub fn content_disposition_param(value: &str, param: &str) -> Option<String> {
    let mut segments = split_semicolon_aware(value).into_iter();
    segments.next()?; // disposition type

    for segment in segments {
        let trimmed = segment.trim();
        let Some((raw_key, raw_value)) = trimmed.split_once('=') else {
            continue;
        };

        if !raw_key.trim().eq_ignore_ascii_case(param) {
            continue;
        }

        let decoded = unquote_parameter_value(raw_value.trim());
        if param.eq_ignore_ascii_case("filename") {
            return Some(percent_decode_lossy(&decoded));
        }
        return Some(decoded);
    }

    None
}

fn unquote_parameter_value(raw: &str) -> String {
    let Some(stripped) = raw.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return raw.trim().to_owned();
    };

    let mut out = String::with_capacity(stripped.len());
    let mut chars = stripped.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
            continue;
        }
        out.push(ch);
    }
    out
}

fn split_semicolon_aware(value: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for ch in value.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }

        match ch {
            '\\' if in_quotes => {
                current.push(ch);
                escaped = true;
            }
            '"' => {
                current.push(ch);
                in_quotes = !in_quotes;
            }
            ';' if !in_quotes => {
                segments.push(current);
                current = String::new();
            }
            _ => current.push(ch),
        }
    }

    segments.push(current);
    segments
}
