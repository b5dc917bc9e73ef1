use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::{DeflateDecoder, GzDecoder};
use flate2::write::{DeflateEncoder, GzEncoder};

use crate::CodecError;

/// The `Content-Encoding` values the proxy knows how to undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Gzip,
    /// Raw DEFLATE without a zlib wrapper.
    Deflate,
    Identity,
}

impl ContentEncoding {
    /// Classifies a header value. Unknown or stacked encodings are treated as
    /// identity and passed through untouched.
    pub fn parse(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return ContentEncoding::Identity;
        };
        let value = value.trim();
        if value.eq_ignore_ascii_case("gzip") {
            ContentEncoding::Gzip
        } else if value.eq_ignore_ascii_case("deflate") {
            ContentEncoding::Deflate
        } else {
            ContentEncoding::Identity
        }
    }
}

/// Decodes a captured body according to its `Content-Encoding` header value.
pub fn decode_content(buffer: &[u8], encoding: Option<&str>) -> Result<Vec<u8>, CodecError> {
    match ContentEncoding::parse(encoding) {
        ContentEncoding::Gzip => gzip_decompress(buffer),
        ContentEncoding::Deflate => deflate_decompress(buffer),
        ContentEncoding::Identity => Ok(buffer.to_vec()),
    }
}

pub fn gzip_compress(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(input)?;
    Ok(encoder.finish()?)
}

pub fn gzip_decompress(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut output = Vec::new();
    GzDecoder::new(input).read_to_end(&mut output)?;
    Ok(output)
}

pub fn deflate_compress(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(input)?;
    Ok(encoder.finish()?)
}

pub fn deflate_decompress(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut output = Vec::new();
    DeflateDecoder::new(input).read_to_end(&mut output)?;
    Ok(output)
}
