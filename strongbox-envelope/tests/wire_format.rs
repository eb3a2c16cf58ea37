use proptest::prelude::*;
use strongbox_envelope::wire::{
    decode_header, decode_package, encode_header, encode_package, PackageHeader,
};
use strongbox_envelope::WireError;

#[test]
fn header_encoding_is_canonical() {
    let a = encode_header(&PackageHeader::current(5)).unwrap();
    let b = encode_header(&PackageHeader::current(5)).unwrap();
    assert_eq!(a, b);

    let decoded = decode_header(&a).unwrap();
    let re_encoded = encode_header(&decoded).unwrap();
    assert_eq!(a, re_encoded);
}

#[test]
fn header_known_answer() {
    // alg_len=11 || "AES-256-GCM" || version=1 || dek_id=0x01020304
    let header = PackageHeader {
        alg: "AES-256-GCM".to_string(),
        version: 1,
        dek_id: 0x0102_0304,
    };
    let bytes = encode_header(&header).unwrap();
    let expected = {
        let mut v = vec![0x00, 0x0B];
        v.extend_from_slice(b"AES-256-GCM");
        v.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
        v.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]);
        v
    };
    assert_eq!(bytes, expected);
}

#[test]
fn package_roundtrip() {
    let header = PackageHeader::current(9);
    let payload = vec![0xEE; 64];
    let bytes = encode_package(&header, &payload).unwrap();
    let pkg = decode_package(&bytes).unwrap();
    assert_eq!(pkg.header, header);
    assert_eq!(pkg.payload, payload);
}

#[test]
fn decode_rejects_truncation() {
    let bytes = encode_package(&PackageHeader::current(1), b"payload").unwrap();
    for len in 0..bytes.len() {
        assert_eq!(
            decode_package(&bytes[..len]).unwrap_err(),
            WireError::Truncated,
            "prefix of {} bytes decoded",
            len
        );
    }
}

#[test]
fn decode_rejects_trailing_bytes() {
    let mut bytes = encode_package(&PackageHeader::current(1), b"payload").unwrap();
    bytes.push(0x00);
    assert_eq!(decode_package(&bytes).unwrap_err(), WireError::TrailingBytes);
}

#[test]
fn decode_empty_input() {
    assert_eq!(decode_package(&[]).unwrap_err(), WireError::Truncated);
}

proptest! {
    #[test]
    fn package_roundtrip_arbitrary(dek_id: u32, version: u32, payload in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let header = PackageHeader {
            alg: "AES-256-GCM".to_string(),
            version,
            dek_id,
        };
        let bytes = encode_package(&header, &payload).unwrap();
        let pkg = decode_package(&bytes).unwrap();
        prop_assert_eq!(pkg.header, header);
        prop_assert_eq!(pkg.payload, payload);
    }

    #[test]
    fn decode_arbitrary_bytes_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = decode_package(&bytes);
    }
}
