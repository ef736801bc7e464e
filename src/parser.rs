//! PDF object parser.
//!
//! Combines tokens from the lexer into complete objects. Recursive descent:
//! read a token, dispatch on its type, recurse for arrays and dictionaries.
//! A dictionary followed by the `stream` keyword becomes a stream object
//! whose payload length is taken from the `Length` entry.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dictionary, Object, ObjectRef};
use nom::IResult;

/// Decode escape sequences in PDF literal strings (ISO 32000-1, 7.3.4.2).
///
/// Handles the single-character escapes, 1-3 digit octal escapes, and
/// backslash line continuations. Unknown escapes keep the backslash
/// literally.
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 >= raw.len() {
            result.push(raw[i]);
            i += 1;
            continue;
        }
        match raw[i + 1] {
            b'n' => {
                result.push(b'\n');
                i += 2;
            },
            b'r' => {
                result.push(b'\r');
                i += 2;
            },
            b't' => {
                result.push(b'\t');
                i += 2;
            },
            b'b' => {
                result.push(8);
                i += 2;
            },
            b'f' => {
                result.push(12);
                i += 2;
            },
            b'(' | b')' | b'\\' => {
                result.push(raw[i + 1]);
                i += 2;
            },
            // Line continuation: \<newline> is ignored
            b'\n' => {
                i += 2;
            },
            b'\r' => {
                i += 2;
                if i < raw.len() && raw[i] == b'\n' {
                    i += 1;
                }
            },
            c if (b'0'..b'8').contains(&c) => {
                let mut value = 0u32;
                let mut len = 0;
                while len < 3 && i + 1 + len < raw.len() && (b'0'..b'8').contains(&raw[i + 1 + len])
                {
                    value = value * 8 + (raw[i + 1 + len] - b'0') as u32;
                    len += 1;
                }
                result.push((value & 0xFF) as u8);
                i += 1 + len;
            },
            _ => {
                result.push(b'\\');
                i += 1;
            },
        }
    }

    result
}

/// Decode a hex string to bytes.
///
/// Whitespace is ignored; an odd trailing digit is padded with 0.
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let digits: Vec<u8> = hex_bytes
        .iter()
        .filter(|c| !c.is_ascii_whitespace())
        .copied()
        .collect();

    let mut result = Vec::with_capacity(digits.len() / 2 + 1);
    for chunk in digits.chunks(2) {
        let hi = hex_digit(chunk[0])?;
        let lo = if chunk.len() == 2 { hex_digit(chunk[1])? } else { 0 };
        result.push(hi << 4 | lo);
    }
    Ok(result)
}

fn hex_digit(c: u8) -> Result<u8> {
    (c as char).to_digit(16).map(|d| d as u8).ok_or_else(|| Error::ParseError {
        offset: 0,
        reason: format!("invalid hex digit: {:?}", c as char),
    })
}

fn parse_err<T>(input: &[u8]) -> IResult<&[u8], T> {
    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))
}

/// Parse a PDF object from input bytes.
///
/// Handles all object types: primitives, arrays, dictionaries, streams, and
/// indirect references (`10 0 R`, detected by lookahead after an integer).
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    let (input, tok) = token(input)?;

    match tok {
        Token::Null => Ok((input, Object::Null)),
        Token::True => Ok((input, Object::Boolean(true))),
        Token::False => Ok((input, Object::Boolean(false))),
        Token::Real(r) => Ok((input, Object::Real(r))),
        Token::Name(name) => Ok((input, Object::Name(name))),

        Token::Integer(i) => {
            // Lookahead for "gen R" to distinguish a reference from a number.
            if let Ok((input2, Token::Integer(gen))) = token(input) {
                if let Ok((input3, Token::R)) = token(input2) {
                    return Ok((input3, Object::Reference(ObjectRef::new(i as u32, gen as u16))));
                }
            }
            Ok((input, Object::Integer(i)))
        },

        Token::LiteralString(bytes) => {
            Ok((input, Object::String(decode_literal_string_escapes(bytes))))
        },

        Token::HexString(hex) => match decode_hex(hex) {
            Ok(decoded) => Ok((input, Object::String(decoded))),
            Err(_) => parse_err(input),
        },

        Token::ArrayStart => parse_array(input),

        Token::DictStart => {
            let (remaining, dict) = parse_dictionary(input)?;

            if let Ok((stream_input, Token::StreamStart)) = token(remaining) {
                let (rest, data) = parse_stream_data(stream_input, &dict)?;
                return Ok((rest, Object::Stream { dict, data: bytes::Bytes::from(data) }));
            }

            Ok((remaining, Object::Dictionary(dict)))
        },

        _ => parse_err(input),
    }
}

/// Parse an array body after `[`.
fn parse_array(input: &[u8]) -> IResult<&[u8], Object> {
    let mut objects = Vec::new();
    let mut remaining = input;

    loop {
        if let Ok((rest, Token::ArrayEnd)) = token(remaining) {
            return Ok((rest, Object::Array(objects)));
        }
        let (rest, obj) = parse_object(remaining)?;
        objects.push(obj);
        remaining = rest;
    }
}

/// Parse a dictionary body after `<<`. Keys must be names.
fn parse_dictionary(input: &[u8]) -> IResult<&[u8], Dictionary> {
    let mut dict = Dictionary::new();
    let mut remaining = input;

    loop {
        let (rest, tok) = token(remaining)?;
        match tok {
            Token::DictEnd => return Ok((rest, dict)),
            Token::Name(key) => {
                let (rest, value) = parse_object(rest)?;
                dict.insert(key, value);
                remaining = rest;
            },
            _ => return parse_err(remaining),
        }
    }
}

/// Parse stream data following the `stream` keyword.
///
/// The keyword must be followed by CRLF or LF (7.3.8.1); a lone CR is
/// accepted leniently. The payload length comes from the `Length` entry,
/// with a scan for `endstream` as fallback.
fn parse_stream_data<'a>(input: &'a [u8], dict: &Dictionary) -> IResult<&'a [u8], Vec<u8>> {
    let input = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        log::warn!("no newline after stream keyword");
        input
    };

    if let Some(length) = dict.get("Length").and_then(|o| o.as_integer()) {
        let length = length as usize;
        if input.len() >= length {
            let data = input[..length].to_vec();
            let remaining = &input[length..];
            // Consume the endstream keyword (whitespace-tolerant).
            if let Ok((rest, Token::StreamEnd)) = token(remaining) {
                return Ok((rest, data));
            }
        }
    }

    // Fallback for missing or wrong Length: scan for the endstream keyword.
    match input.windows(9).position(|w| w == b"endstream") {
        Some(pos) => {
            let mut end = pos;
            // The EOL before endstream belongs to the keyword, not the data.
            if end > 0 && input[end - 1] == b'\n' {
                end -= 1;
            }
            if end > 0 && input[end - 1] == b'\r' {
                end -= 1;
            }
            let (rest, _) = token(&input[pos..])?;
            Ok((rest, input[..end].to_vec()))
        },
        None => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Eof))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> Object {
        parse_object(input).unwrap().1
    }

    #[test]
    fn test_parse_primitives() {
        assert_eq!(parse(b"null"), Object::Null);
        assert_eq!(parse(b"true"), Object::Boolean(true));
        assert_eq!(parse(b"42"), Object::Integer(42));
        assert_eq!(parse(b"-1.5"), Object::Real(-1.5));
        assert_eq!(parse(b"/Name"), Object::Name("Name".to_string()));
    }

    #[test]
    fn test_parse_reference() {
        assert_eq!(parse(b"10 0 R"), Object::Reference(ObjectRef::new(10, 0)));
        // Two integers without R stay plain integers.
        let (rest, obj) = parse_object(b"10 20 30").unwrap();
        assert_eq!(obj, Object::Integer(10));
        assert_eq!(parse_object(rest).unwrap().1, Object::Integer(20));
    }

    #[test]
    fn test_parse_array() {
        let obj = parse(b"[ 1 2 /Name (str) [ 3 ] ]");
        let arr = obj.as_array().unwrap();
        assert_eq!(arr.len(), 5);
        assert_eq!(arr[2].as_name(), Some("Name"));
        assert!(arr[4].as_array().is_some());
    }

    #[test]
    fn test_parse_dictionary() {
        let obj = parse(b"<< /Type /Page /Count 3 /Kids [ 4 0 R ] >>");
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get("Type").unwrap().as_name(), Some("Page"));
        assert_eq!(dict.get("Count").unwrap().as_integer(), Some(3));
        assert_eq!(
            dict.get("Kids").unwrap().as_array().unwrap()[0].as_reference(),
            Some(ObjectRef::new(4, 0))
        );
    }

    #[test]
    fn test_parse_stream() {
        let input = b"<< /Length 5 >>\nstream\nHello\nendstream";
        match parse(input) {
            Object::Stream { dict, data } => {
                assert_eq!(dict.get("Length").unwrap().as_integer(), Some(5));
                assert_eq!(&data[..], b"Hello");
            },
            other => panic!("expected stream, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_parse_stream_without_length() {
        let input = b"<< >>\nstream\nabc\nendstream";
        match parse(input) {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"abc"),
            other => panic!("expected stream, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_literal_string_escapes() {
        assert_eq!(decode_literal_string_escapes(b"a\\(b\\)c"), b"a(b)c");
        assert_eq!(decode_literal_string_escapes(b"\\101"), b"A");
        assert_eq!(decode_literal_string_escapes(b"line\\\ncont"), b"linecont");
        assert_eq!(decode_literal_string_escapes(b"Section \\247 71"), b"Section \xa7 71");
    }

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex(b"48656C6C6F").unwrap(), b"Hello");
        assert_eq!(decode_hex(b"48 65 6C").unwrap(), b"Hel");
        // Odd digit padded with zero.
        assert_eq!(decode_hex(b"901FA").unwrap(), vec![0x90, 0x1F, 0xA0]);
        assert!(decode_hex(b"XY").is_err());
    }

    #[test]
    fn test_parse_hex_string_object() {
        assert_eq!(parse(b"<48656C6C6F>"), Object::String(b"Hello".to_vec()));
    }
}
