#![allow(missing_docs)]

use std::io::Cursor;

use mimegear::{
    MimeCodec, OutboundAttachment, OutboundBody, SerializeOptions, TransferEncoding,
};

#[test]
fn serializes_and_decodes_the_canonical_single_attachment_message() {
    let codec = MimeCodec::new();
    let mut wire = Vec::new();
    let mut serializer = codec.serializer(&mut wire, SerializeOptions::new());

    let envelope = serializer
        .write_prolog(&OutboundBody::new("text/xml", "root@example.com"))
        .expect("prolog should write");
    serializer
        .write_body(b"<envelope/>")
        .expect("body should write");

    let mut attachment = OutboundAttachment::new("img1@example.com", "application/octet-stream")
        .transfer_encoding(TransferEncoding::Base64)
        .payload_bytes(vec![0xDE, 0xAD, 0xBE, 0xEF]);
    serializer
        .write_attachment(&mut attachment)
        .expect("attachment should write");
    serializer.finish().expect("finish should write");

    let mut decoded = codec
        .decode(envelope, Cursor::new(wire))
        .expect("decode should succeed");

    assert_eq!(decoded.root.id(), "root@example.com");
    assert_eq!(decoded.root.content_type().essence_str(), "text/xml");
    assert_eq!(
        &decoded.root.bytes().expect("root body should read")[..],
        b"<envelope/>"
    );

    let total = decoded
        .attachments
        .materialize_all()
        .expect("attachments should decode");
    assert_eq!(total, 1);

    let img = &mut decoded.attachments.loaded_mut()[0];
    assert_eq!(img.id(), "img1@example.com");
    assert_eq!(img.content_type().essence_str(), "application/octet-stream");
    assert_eq!(img.transfer_encoding(), TransferEncoding::Base64);
    assert_eq!(
        &img.bytes().expect("payload should decode")[..],
        [0xDE, 0xAD, 0xBE, 0xEF]
    );
}

#[test]
fn round_trips_mixed_encodings_headers_and_payload_sizes() {
    let codec = MimeCodec::new();
    let fixtures: Vec<(String, TransferEncoding, Vec<u8>)> = [0usize, 1, 5, 1023]
        .into_iter()
        .enumerate()
        .flat_map(|(index, size)| {
            [
                (
                    format!("raw-{index}@example.com"),
                    TransferEncoding::Binary,
                    patterned_bytes(size),
                ),
                (
                    format!("b64-{index}@example.com"),
                    TransferEncoding::Base64,
                    patterned_bytes(size),
                ),
            ]
        })
        .collect();

    let mut wire = Vec::new();
    let mut serializer = codec.serializer(&mut wire, SerializeOptions::new());
    let envelope = serializer
        .write_prolog(&OutboundBody::new("text/xml", "root@example.com"))
        .expect("prolog should write");
    serializer.write_body(b"<doc/>").expect("body should write");

    for (id, encoding, payload) in &fixtures {
        let mut attachment = OutboundAttachment::new(id.clone(), "application/octet-stream")
            .transfer_encoding(*encoding)
            .header("X-Origin", "round-trip")
            .payload_bytes(payload.clone());
        serializer
            .write_attachment(&mut attachment)
            .expect("attachment should write");
    }
    serializer.finish().expect("finish should write");

    let mut decoded = codec
        .decode(envelope, Cursor::new(wire))
        .expect("decode should succeed");
    let total = decoded
        .attachments
        .materialize_all()
        .expect("attachments should decode");
    assert_eq!(total, fixtures.len());

    for (index, (id, encoding, payload)) in fixtures.iter().enumerate() {
        let attachment = &mut decoded.attachments.loaded_mut()[index];
        assert_eq!(attachment.id(), id);
        assert_eq!(attachment.transfer_encoding(), *encoding);
        assert_eq!(attachment.headers().get("X-Origin"), Some("round-trip"));
        assert_eq!(
            &attachment.bytes().expect("payload should decode")[..],
            &payload[..],
            "attachment {id}"
        );
    }
}

#[test]
fn xop_framing_round_trips_and_rewrites_the_root_type() {
    let codec = MimeCodec::new();
    let mut wire = Vec::new();
    let mut serializer = codec.serializer(&mut wire, SerializeOptions::xop());
    let envelope = serializer
        .write_prolog(&OutboundBody::new(
            "application/soap+xml",
            "root@example.com",
        ))
        .expect("prolog should write");
    serializer
        .write_body(b"<soap:Envelope/>")
        .expect("body should write");

    let mut attachment = OutboundAttachment::new("blob@example.com", "application/octet-stream")
        .transfer_encoding(TransferEncoding::Base64)
        .payload_bytes(patterned_bytes(300));
    serializer
        .write_attachment(&mut attachment)
        .expect("attachment should write");
    serializer.finish().expect("finish should write");

    assert!(envelope.contains("type=\"application/xop+xml\""));
    assert!(envelope.contains("start-info=\"application/soap+xml\""));

    let mut decoded = codec
        .decode(envelope, Cursor::new(wire))
        .expect("decode should succeed");
    assert_eq!(
        decoded.root.content_type().essence_str(),
        "application/xop+xml"
    );
    assert_eq!(
        &decoded.root.bytes().expect("root body should read")[..],
        b"<soap:Envelope/>"
    );

    decoded
        .attachments
        .materialize_all()
        .expect("attachments should decode");
    assert_eq!(
        &decoded.attachments.loaded_mut()[0]
            .bytes()
            .expect("payload should decode")[..],
        &patterned_bytes(300)[..]
    );
}

#[test]
fn boundary_is_identical_for_every_part_of_one_message() {
    let codec = MimeCodec::new();
    let mut wire = Vec::new();
    let mut serializer = codec.serializer(&mut wire, SerializeOptions::new());
    let boundary = serializer.boundary().to_owned();

    serializer
        .write_prolog(&OutboundBody::new("text/xml", "root@example.com"))
        .expect("prolog should write");
    serializer.write_body(b"<doc/>").expect("body should write");
    for index in 0..3 {
        let mut attachment =
            OutboundAttachment::new(format!("part-{index}@example.com"), "text/plain")
                .payload_bytes(format!("payload {index}").into_bytes());
        serializer
            .write_attachment(&mut attachment)
            .expect("attachment should write");
    }
    serializer.finish().expect("finish should write");

    let text = String::from_utf8(wire).expect("output should be ASCII");
    assert_eq!(text.matches(&format!("--{boundary}\r\n")).count(), 4);
    assert_eq!(text.matches(&format!("--{boundary}--\r\n")).count(), 1);
}

#[test]
fn custom_disposition_headers_survive_the_round_trip() {
    let codec = MimeCodec::new();
    let mut wire = Vec::new();
    let mut serializer = codec.serializer(&mut wire, SerializeOptions::new());
    let envelope = serializer
        .write_prolog(&OutboundBody::new("text/xml", "root@example.com"))
        .expect("prolog should write");
    serializer.write_body(b"<doc/>").expect("body should write");

    let mut attachment = OutboundAttachment::new("photo@example.com", "image/png")
        .header("Content-Disposition", "attachment; filename=\"face.png\"")
        .payload_bytes(b"PNGDATA".to_vec());
    serializer
        .write_attachment(&mut attachment)
        .expect("attachment should write");
    serializer.finish().expect("finish should write");

    let mut decoded = codec
        .decode(envelope, Cursor::new(wire))
        .expect("decode should succeed");
    decoded
        .attachments
        .materialize_all()
        .expect("attachments should decode");

    let photo = &mut decoded.attachments.loaded_mut()[0];
    assert_eq!(photo.filename().as_deref(), Some("face.png"));
    assert_eq!(&photo.bytes().expect("payload should read")[..], b"PNGDATA");
}

#[test]
fn text_attachments_decode_as_utf8() {
    let codec = MimeCodec::new();
    let mut wire = Vec::new();
    let mut serializer = codec.serializer(&mut wire, SerializeOptions::new());
    let envelope = serializer
        .write_prolog(&OutboundBody::new("text/xml", "root@example.com"))
        .expect("prolog should write");
    serializer.write_body(b"<doc/>").expect("body should write");

    let mut attachment = OutboundAttachment::new("note@example.com", "text/plain")
        .payload_reader(Cursor::new("héllo from a reader".as_bytes().to_vec()));
    serializer
        .write_attachment(&mut attachment)
        .expect("attachment should write");
    serializer.finish().expect("finish should write");

    let mut decoded = codec
        .decode(envelope, Cursor::new(wire))
        .expect("decode should succeed");
    decoded
        .attachments
        .materialize_all()
        .expect("attachments should decode");
    assert_eq!(
        decoded.attachments.loaded_mut()[0]
            .text()
            .expect("payload should decode as text"),
        "héllo from a reader"
    );
}

#[test]
fn decoding_a_decoded_identifier_again_is_a_no_op() {
    let codec = MimeCodec::new();
    let mut wire = Vec::new();
    let mut serializer = codec.serializer(&mut wire, SerializeOptions::new());
    let envelope = serializer
        .write_prolog(&OutboundBody::new("text/xml", "root@example.com"))
        .expect("prolog should write");
    serializer.write_body(b"<doc/>").expect("body should write");

    // already-decoded identifier; the encoder must not mutate it further
    let mut attachment = OutboundAttachment::new("user@ex/ample", "text/plain")
        .payload_bytes(b"data".to_vec());
    serializer
        .write_attachment(&mut attachment)
        .expect("attachment should write");
    serializer.finish().expect("finish should write");

    let mut decoded = codec
        .decode(envelope, Cursor::new(wire))
        .expect("decode should succeed");
    decoded
        .attachments
        .materialize_all()
        .expect("attachments should decode");
    assert_eq!(decoded.attachments.loaded_mut()[0].id(), "user@ex/ample");
}

fn patterned_bytes(len: usize) -> Vec<u8> {
    let mut state = 0x9e37_79b9u32;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        })
        .collect()
}
