use assert_matches::assert_matches;
use relaytap_codec::*;

#[test]
fn gzip_body_is_decoded() {
    let compressed = gzip_compress(b"ok").unwrap();
    assert_eq!(decode_content(&compressed, Some("gzip")).unwrap(), b"ok");
}

#[test]
fn deflate_means_raw_deflate() {
    let compressed = deflate_compress(b"hello deflate").unwrap();
    assert_eq!(
        decode_content(&compressed, Some("deflate")).unwrap(),
        b"hello deflate"
    );
}

#[test]
fn encoding_name_ignores_case_and_whitespace() {
    assert_eq!(ContentEncoding::parse(Some(" GZip ")), ContentEncoding::Gzip);
    assert_eq!(ContentEncoding::parse(Some("Deflate")), ContentEncoding::Deflate);
}

#[test]
fn unknown_or_missing_encoding_passes_through() {
    assert_eq!(decode_content(b"plain", None).unwrap(), b"plain");
    assert_eq!(decode_content(b"plain", Some("br")).unwrap(), b"plain");
    assert_eq!(decode_content(b"plain", Some("gzip, br")).unwrap(), b"plain");
}

#[test]
fn corrupt_gzip_errors() {
    let err = decode_content(b"not gzip", Some("gzip")).unwrap_err();
    assert_matches!(err, CodecError::Compression(_));
}

#[test]
fn corrupt_deflate_errors() {
    let err = deflate_decompress(b"not deflate").unwrap_err();
    assert_matches!(err, CodecError::Compression(_));
}
