use s3tp_core::header::{window_distance, Header, HeaderEncodeError, MessageType};

#[test]
fn roundtrip_data_header() {
    let hdr = Header {
        crc: 0xBEEF,
        global_seq: 200,
        sub_seq: 3,
        msg_type: MessageType::Data,
        pdu_length: 1234,
        seq_port: 17,
        more_fragments: true,
        port: 42,
    };
    let encoded = hdr.encode().unwrap();
    assert_eq!(Header::decode(&encoded), hdr);
}

#[test]
fn roundtrip_sync_header_no_more_fragments() {
    let hdr = Header {
        crc: 1,
        global_seq: 0,
        sub_seq: 0,
        msg_type: MessageType::Sync,
        pdu_length: 0,
        seq_port: 0,
        more_fragments: false,
        port: 127,
    };
    let encoded = hdr.encode().unwrap();
    let decoded = Header::decode(&encoded);
    assert_eq!(decoded, hdr);
    assert!(!decoded.more_fragments);
}

#[test]
fn rejects_oversized_fields() {
    let mut hdr = Header {
        crc: 0,
        global_seq: 0,
        sub_seq: 0,
        msg_type: MessageType::Data,
        pdu_length: 0,
        seq_port: 0,
        more_fragments: false,
        port: 128,
    };
    assert_eq!(hdr.encode(), Err(HeaderEncodeError::PortOverflow(128)));
    hdr.port = 1;
    hdr.pdu_length = 0x4000;
    assert_eq!(
        hdr.encode(),
        Err(HeaderEncodeError::PduLengthOverflow(0x4000))
    );
}

#[test]
fn unknown_msg_type_is_reserved() {
    let hdr = Header {
        crc: 0,
        global_seq: 0,
        sub_seq: 0,
        msg_type: MessageType::Reserved(2),
        pdu_length: 0,
        seq_port: 0,
        more_fragments: false,
        port: 0,
    };
    let encoded = hdr.encode().unwrap();
    assert_eq!(Header::decode(&encoded).msg_type, MessageType::Reserved(2));
}

#[test]
fn window_distance_wraps() {
    assert_eq!(window_distance(5, 250), 11);
    assert_eq!(window_distance(250, 5), 245);
    assert_eq!(window_distance(10, 10), 0);
}
