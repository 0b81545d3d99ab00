#![allow(missing_docs)]

use std::io::{Cursor, Read};

use mimegear::{AttachmentDeserializer, CodecConfig, CodecError, MimeCodec, TransferEncoding};

#[test]
fn initializes_from_a_declared_boundary() {
    let body = framed(
        "BOUND",
        &[
            part(&[("Content-Type", "text/xml"), ("Content-ID", "<root@example.com>")], "<doc/>"),
            part(&[("Content-Type", "text/plain"), ("Content-ID", "<a@example.com>")], "alpha"),
        ],
    );
    let mut deserializer = deserializer_for("multipart/related; boundary=BOUND", body);

    let mut root = deserializer.initialize().expect("initialize should succeed");
    assert_eq!(deserializer.boundary(), Some("BOUND"));
    assert_eq!(root.id(), "root@example.com");
    assert_eq!(root.content_type().essence_str(), "text/xml");
    assert_eq!(&root.bytes().expect("root body should read")[..], b"<doc/>");
}

#[test]
fn sniffs_the_boundary_when_none_is_declared() {
    let body = framed(
        "sniffable-token",
        &[
            part(&[("Content-Type", "text/xml")], "<doc/>"),
            part(&[("Content-ID", "<a@example.com>")], "alpha"),
        ],
    );
    let mut deserializer = deserializer_for("text/xml", body);

    let mut root = deserializer.initialize().expect("sniffed boundary should work");
    assert_eq!(deserializer.boundary(), Some("sniffable-token"));
    assert_eq!(&root.bytes().expect("root body should read")[..], b"<doc/>");

    let mut next = deserializer
        .read_next()
        .expect("next part should parse")
        .expect("one attachment expected");
    assert_eq!(next.id(), "a@example.com");
    assert_eq!(&next.bytes().expect("attachment should read")[..], b"alpha");
}

#[test]
fn skips_a_preamble_before_the_first_boundary() {
    let mut body = b"This preamble is ignored by MIME processors.\r\n".to_vec();
    body.extend_from_slice(&framed(
        "BOUND",
        &[part(&[("Content-Type", "text/xml")], "<doc/>")],
    ));
    let mut deserializer = deserializer_for("multipart/related; boundary=BOUND", body);

    let mut root = deserializer.initialize().expect("preamble should be skipped");
    assert_eq!(&root.bytes().expect("root body should read")[..], b"<doc/>");
}

#[test]
fn undeterminable_boundary_is_fatal() {
    let mut deserializer = deserializer_for("text/xml", b"no framing in here\r\nat all\r\n".to_vec());
    let err = deserializer.initialize().expect_err("initialize must fail");
    assert!(matches!(err, CodecError::MalformedFraming { .. }));
}

#[test]
fn empty_stream_with_a_declared_boundary_is_malformed() {
    let mut deserializer = deserializer_for("multipart/related; boundary=BOUND", Vec::new());
    let err = deserializer.initialize().expect_err("initialize must fail");
    assert!(matches!(err, CodecError::MalformedFraming { .. }));
}

#[test]
fn message_without_a_primary_body_part_is_malformed() {
    let mut deserializer =
        deserializer_for("multipart/related; boundary=BOUND", b"--BOUND--\r\n".to_vec());
    let err = deserializer.initialize().expect_err("initialize must fail");
    assert!(matches!(err, CodecError::MalformedFraming { .. }));
}

#[test]
fn yields_attachments_in_wire_order_until_exhausted() {
    let body = framed(
        "BOUND",
        &[
            part(&[("Content-Type", "text/xml")], "<doc/>"),
            part(&[("Content-ID", "<a@x>")], "alpha"),
            part(&[("Content-ID", "<b@x>")], "beta"),
            part(&[("Content-ID", "<c@x>")], "gamma"),
        ],
    );
    let mut deserializer = deserializer_for("multipart/related; boundary=BOUND", body);
    deserializer.initialize().expect("initialize should succeed");

    let mut ids = Vec::new();
    while let Some(attachment) = deserializer.read_next().expect("parts should parse") {
        ids.push(attachment.id().to_owned());
    }
    assert_eq!(ids, ["a@x", "b@x", "c@x"]);

    let after = deserializer.read_next().expect("exhausted read should succeed");
    assert!(after.is_none());
}

#[test]
fn has_next_peeks_without_consuming() {
    let body = framed(
        "BOUND",
        &[
            part(&[("Content-Type", "text/xml")], "<doc/>"),
            part(&[("Content-ID", "<only@x>")], "payload"),
        ],
    );
    let mut deserializer = deserializer_for("multipart/related; boundary=BOUND", body);
    deserializer.initialize().expect("initialize should succeed");

    assert!(deserializer.has_next().expect("peek should succeed"));
    assert!(deserializer.has_next().expect("repeated peek should succeed"));

    let attachment = deserializer
        .read_next()
        .expect("read should succeed")
        .expect("peeked attachment expected");
    assert_eq!(attachment.id(), "only@x");

    assert!(!deserializer.has_next().expect("exhausted peek should succeed"));
}

#[test]
fn assigns_a_generated_identifier_when_content_id_is_absent() {
    let body = framed(
        "BOUND",
        &[
            part(&[("Content-Type", "text/xml")], "<doc/>"),
            part(&[("Content-Type", "text/plain")], "anonymous"),
        ],
    );
    let mut deserializer = deserializer_for("multipart/related; boundary=BOUND", body);
    deserializer.initialize().expect("initialize should succeed");

    let attachment = deserializer
        .read_next()
        .expect("part should parse")
        .expect("attachment expected");
    assert!(attachment.id().ends_with("@generated"));
    assert!(attachment.id().len() > "@generated".len());
}

#[test]
fn defaults_content_type_and_transfer_encoding() {
    let body = framed(
        "BOUND",
        &[
            part(&[("Content-Type", "text/xml")], "<doc/>"),
            part(&[("Content-ID", "<bare@x>")], "bytes"),
        ],
    );
    let mut deserializer = deserializer_for("multipart/related; boundary=BOUND", body);
    deserializer.initialize().expect("initialize should succeed");

    let attachment = deserializer
        .read_next()
        .expect("part should parse")
        .expect("attachment expected");
    assert_eq!(
        attachment.content_type().essence_str(),
        "application/octet-stream"
    );
    assert_eq!(attachment.transfer_encoding(), TransferEncoding::Binary);
}

#[test]
fn decodes_base64_and_quoted_printable_parts() {
    let body = framed(
        "BOUND",
        &[
            part(&[("Content-Type", "text/xml")], "<doc/>"),
            part(
                &[("Content-ID", "<b64@x>"), ("Content-Transfer-Encoding", "base64")],
                "3q2+7w==",
            ),
            part(
                &[("Content-ID", "<qp@x>"), ("Content-Transfer-Encoding", "quoted-printable")],
                "soft=\r\nbreak=21",
            ),
        ],
    );
    let mut deserializer = deserializer_for("multipart/related; boundary=BOUND", body);
    deserializer.initialize().expect("initialize should succeed");

    let mut b64 = deserializer
        .read_next()
        .expect("base64 part should parse")
        .expect("attachment expected");
    assert_eq!(b64.transfer_encoding(), TransferEncoding::Base64);
    assert_eq!(&b64.bytes().expect("payload should decode")[..], [0xDE, 0xAD, 0xBE, 0xEF]);

    let mut qp = deserializer
        .read_next()
        .expect("quoted-printable part should parse")
        .expect("attachment expected");
    assert_eq!(&qp.bytes().expect("payload should decode")[..], b"softbreak!");
}

#[test]
fn oversized_attachment_header_line_is_fatal() {
    let huge = "h".repeat(128);
    let body = framed(
        "BOUND",
        &[
            part(&[("Content-Type", "text/xml")], "<doc/>"),
            part(&[("X-Big", huge.as_str())], "payload"),
        ],
    );
    let config = MimeCodec::builder()
        .max_header_line_len(64)
        .build_config()
        .expect("config should validate");
    let mut deserializer =
        AttachmentDeserializer::new("multipart/related; boundary=BOUND", Cursor::new(body), config);
    deserializer.initialize().expect("root headers fit the cap");

    let err = deserializer.read_next().expect_err("oversized header must fail");
    assert!(matches!(err, CodecError::HeaderTooLarge { limit: 64 }));
}

#[test]
fn unrecognized_transfer_encoding_is_fatal() {
    let body = framed(
        "BOUND",
        &[
            part(&[("Content-Type", "text/xml")], "<doc/>"),
            part(&[("Content-Transfer-Encoding", "x-zip")], "payload"),
        ],
    );
    let mut deserializer = deserializer_for("multipart/related; boundary=BOUND", body);
    deserializer.initialize().expect("initialize should succeed");

    let err = deserializer.read_next().expect_err("unknown encoding must fail");
    assert!(matches!(
        err,
        CodecError::UnsupportedEncoding { token } if token == "x-zip"
    ));
}

#[test]
fn missing_final_boundary_surfaces_as_malformed_framing() {
    let body = concat!(
        "--BOUND\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "dangling payload without a closing delimiter"
    );
    let mut deserializer =
        deserializer_for("multipart/related; boundary=BOUND", body.as_bytes().to_vec());

    let mut root = deserializer.initialize().expect("headers should parse");
    let err = root.bytes().expect_err("truncated body must fail");
    assert!(matches!(err, CodecError::MalformedFraming { .. }));
}

#[test]
fn tolerates_transport_padding_after_boundary_lines() {
    let body = concat!(
        "--BOUND  \r\n",
        "Content-Type: text/xml\r\n",
        "\r\n",
        "<doc/>\r\n",
        "--BOUND \t\r\n",
        "Content-ID: <padded@x>\r\n",
        "\r\n",
        "payload\r\n",
        "--BOUND--\r\n"
    );
    let mut deserializer =
        deserializer_for("multipart/related; boundary=BOUND", body.as_bytes().to_vec());

    deserializer.initialize().expect("padded boundary should parse");
    let attachment = deserializer
        .read_next()
        .expect("padded part boundary should parse")
        .expect("attachment expected");
    assert_eq!(attachment.id(), "padded@x");
}

#[test]
fn advancing_spools_a_partially_read_part() {
    let body = framed(
        "BOUND",
        &[
            part(&[("Content-Type", "text/xml")], "<doc/>"),
            part(&[("Content-ID", "<first@x>")], "abcdefghijklmnop"),
            part(&[("Content-ID", "<second@x>")], "second payload"),
        ],
    );
    let mut deserializer = deserializer_for("multipart/related; boundary=BOUND", body);
    deserializer.initialize().expect("initialize should succeed");

    let mut first = deserializer
        .read_next()
        .expect("first part should parse")
        .expect("attachment expected");
    let mut head = [0u8; 4];
    first
        .body_mut()
        .read_exact(&mut head)
        .expect("partial read should succeed");
    assert_eq!(&head, b"abcd");

    let mut second = deserializer
        .read_next()
        .expect("advancing past an open part should succeed")
        .expect("attachment expected");

    let rest = first.bytes().expect("spooled remainder should read");
    assert_eq!(&rest[..], b"efghijklmnop");
    assert_eq!(&second.bytes().expect("second payload should read")[..], b"second payload");
}

#[test]
fn spooled_part_streams_can_be_read_in_any_order() {
    let body = framed(
        "BOUND",
        &[
            part(&[("Content-Type", "text/xml")], "<doc/>"),
            part(&[("Content-ID", "<a@x>")], "alpha"),
            part(&[("Content-ID", "<b@x>")], "beta"),
            part(&[("Content-ID", "<c@x>")], "gamma"),
        ],
    );
    let mut deserializer = deserializer_for("multipart/related; boundary=BOUND", body);
    deserializer.initialize().expect("initialize should succeed");

    let mut held = Vec::new();
    while let Some(attachment) = deserializer.read_next().expect("parts should parse") {
        held.push(attachment);
    }

    assert_eq!(&held[2].bytes().expect("third should read")[..], b"gamma");
    assert_eq!(&held[0].bytes().expect("first should read")[..], b"alpha");
    assert_eq!(&held[1].bytes().expect("second should read")[..], b"beta");
}

#[test]
fn dropped_unread_streams_do_not_corrupt_later_parts() {
    let body = framed(
        "BOUND",
        &[
            part(&[("Content-Type", "text/xml")], "<doc/>"),
            part(&[("Content-ID", "<skip@x>")], "abandoned payload"),
            part(&[("Content-ID", "<keep@x>")], "wanted payload"),
        ],
    );
    let mut deserializer = deserializer_for("multipart/related; boundary=BOUND", body);
    drop(deserializer.initialize().expect("initialize should succeed"));

    let skipped = deserializer
        .read_next()
        .expect("first part should parse")
        .expect("attachment expected");
    drop(skipped);

    let mut kept = deserializer
        .read_next()
        .expect("second part should parse")
        .expect("attachment expected");
    assert_eq!(kept.id(), "keep@x");
    assert_eq!(&kept.bytes().expect("payload should read")[..], b"wanted payload");
}

#[test]
fn reading_parts_before_initialization_is_invalid_state() {
    let mut deserializer = deserializer_for("multipart/related; boundary=BOUND", Vec::new());
    let err = deserializer.read_next().expect_err("uninitialized read must fail");
    assert!(matches!(err, CodecError::InvalidState { .. }));
}

#[test]
fn initializing_twice_is_invalid_state() {
    let body = framed("BOUND", &[part(&[("Content-Type", "text/xml")], "<doc/>")]);
    let mut deserializer = deserializer_for("multipart/related; boundary=BOUND", body);

    deserializer.initialize().expect("first initialize should succeed");
    let err = deserializer.initialize().expect_err("second initialize must fail");
    assert!(matches!(err, CodecError::InvalidState { .. }));
}

fn deserializer_for(content_type: &str, body: Vec<u8>) -> AttachmentDeserializer {
    AttachmentDeserializer::new(content_type, Cursor::new(body), CodecConfig::default())
}

fn part(headers: &[(&str, &str)], body: &str) -> String {
    let mut out = String::new();
    for (name, value) in headers {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    out.push_str(body);
    out
}

fn framed(boundary: &str, parts: &[String]) -> Vec<u8> {
    let mut out = String::new();
    for part in parts {
        out.push_str("--");
        out.push_str(boundary);
        out.push_str("\r\n");
        out.push_str(part);
        out.push_str("\r\n");
    }
    out.push_str("--");
    out.push_str(boundary);
    out.push_str("--\r\n");
    out.into_bytes()
}
