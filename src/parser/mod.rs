/// Boundary determination: declared parameter extraction and head sniffing.
pub mod boundary;
/// RFC822-style folded header block parsing and header helpers.
pub mod headers;
/// Push-back reader and bounded delimiter-aware stream access.
pub mod source;

pub use boundary::{declared_boundary, is_valid_boundary};
pub use headers::{
    PartHeaders, content_disposition_param, normalize_content_id, read_header_block,
};
pub use source::PushbackReader;
