//! Stream filter codec.
//!
//! Decoding honours the `Filter` entry of a stream dictionary (a name or an
//! array of names applied in order): FlateDecode and ASCIIHexDecode are
//! supported, no filter is the identity. Any other filter name yields
//! [`Error::UnsupportedFilter`]; callers patching or removing page content
//! treat that as a skip condition, donor ingestion treats it as fatal.
//!
//! Encoding always applies FlateDecode and rewrites `Filter`/`Length`.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// A single stream filter algorithm.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Filter name as it appears in stream dictionaries.
    fn name(&self) -> &str;
}

/// FlateDecode (zlib/deflate), the common case for content streams.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(input);
        let mut output = Vec::new();
        decoder
            .read_to_end(&mut output)
            .map_err(|e| Error::Decode(format!("FlateDecode: {}", e)))?;
        Ok(output)
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

/// ASCIIHexDecode.
pub struct AsciiHexDecoder;

impl StreamDecoder for AsciiHexDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        // Data runs to the `>` end-of-data marker, if present.
        let end = input.iter().position(|&c| c == b'>').unwrap_or(input.len());
        crate::parser::decode_hex(&input[..end])
    }

    fn name(&self) -> &str {
        "ASCIIHexDecode"
    }
}

/// Compress with zlib at the default level.
fn flate_encode(content: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(content)
        .and_then(|_| encoder.finish())
        .map_err(|e| Error::Decode(format!("FlateDecode encoding: {}", e)))
}

/// Extract the filter chain from a stream dictionary.
///
/// The `Filter` entry can be a single name or an array of names.
pub fn filter_names(dict: &Dictionary) -> Vec<String> {
    match dict.get("Filter") {
        Some(Object::Name(name)) => vec![name.clone()],
        Some(Object::Array(arr)) => arr
            .iter()
            .filter_map(|o| o.as_name().map(|s| s.to_string()))
            .collect(),
        _ => vec![],
    }
}

/// Decode stream data through the dictionary's filter chain.
pub fn decode_stream(dict: &Dictionary, data: &[u8]) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for filter in filter_names(dict) {
        let decoder: Box<dyn StreamDecoder> = match filter.as_str() {
            "FlateDecode" => Box::new(FlateDecoder),
            "ASCIIHexDecode" => Box::new(AsciiHexDecoder),
            _ => return Err(Error::UnsupportedFilter(filter)),
        };
        current = decoder.decode(&current)?;
    }

    Ok(current)
}

/// Encode `content`, rewriting the dictionary's `Filter` and `Length`.
pub fn encode_stream(dict: &mut Dictionary, content: &[u8]) -> Result<bytes::Bytes> {
    let encoded = flate_encode(content)?;
    dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));
    dict.insert("Length".to_string(), Object::Integer(encoded.len() as i64));
    dict.remove("DecodeParms");
    Ok(bytes::Bytes::from(encoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_no_filter_is_identity() {
        let dict = Dictionary::new();
        assert_eq!(decode_stream(&dict, b"Hello").unwrap(), b"Hello");
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let mut dict = Dictionary::new();
        let content = b"BT /Helvetica 24 Tf (Hello) Tj ET ".repeat(10);

        let encoded = encode_stream(&mut dict, &content).unwrap();
        assert_eq!(dict.get("Filter").unwrap().as_name(), Some("FlateDecode"));
        assert_eq!(dict.get("Length").unwrap().as_integer(), Some(encoded.len() as i64));
        assert!(encoded.len() < content.len());

        assert_eq!(decode_stream(&dict, &encoded).unwrap(), content);
    }

    #[test]
    fn test_decode_ascii_hex() {
        let mut dict = Dictionary::new();
        dict.insert("Filter".to_string(), Object::Name("ASCIIHexDecode".to_string()));
        assert_eq!(decode_stream(&dict, b"48656C6C6F>").unwrap(), b"Hello");
    }

    #[test]
    fn test_decode_filter_array() {
        let mut dict = Dictionary::new();
        dict.insert(
            "Filter".to_string(),
            Object::Array(vec![Object::Name("ASCIIHexDecode".to_string())]),
        );
        assert_eq!(decode_stream(&dict, b"4869>").unwrap(), b"Hi");
    }

    #[test]
    fn test_unsupported_filter_sentinel() {
        let mut dict = Dictionary::new();
        dict.insert("Filter".to_string(), Object::Name("JBIG2Decode".to_string()));
        match decode_stream(&dict, b"data") {
            Err(Error::UnsupportedFilter(name)) => assert_eq!(name, "JBIG2Decode"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_decode_corrupt_flate_errors() {
        let mut dict = Dictionary::new();
        dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));
        assert!(matches!(decode_stream(&dict, b"not zlib"), Err(Error::Decode(_))));
    }
}
