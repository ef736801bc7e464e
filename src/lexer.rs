//! PDF tokenizer.
//!
//! Low-level tokenization of PDF byte streams: numbers, literal and hex
//! strings, names, keywords, and delimiters. Whitespace (space, \t, \r, \n,
//! \0, \f) and comments (% to end of line) are skipped between tokens.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, value},
    sequence::{delimited, preceded},
    IResult,
};

/// Token types recognized by the lexer.
///
/// Tokens are the atomic units of PDF syntax; the parser combines them into
/// objects.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g. 42, -123)
    Integer(i64),
    /// Real number (e.g. 3.14, -.5)
    Real(f64),
    /// Literal string bytes; escape sequences are decoded at parser level
    LiteralString(&'a [u8]),
    /// Hexadecimal string bytes; decoded at parser level
    HexString(&'a [u8]),
    /// Name with `#XX` escapes already decoded (e.g. "Type" from "/Type")
    Name(String),
    /// `true` keyword
    True,
    /// `false` keyword
    False,
    /// `null` keyword
    Null,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// `obj` keyword
    ObjStart,
    /// `endobj` keyword
    ObjEnd,
    /// `stream` keyword
    StreamStart,
    /// `endstream` keyword
    StreamEnd,
    /// `R` reference marker
    R,
}

fn is_pdf_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

fn is_delimiter(c: u8) -> bool {
    matches!(c, b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}')
}

/// Skip whitespace and `%` comments before a token.
fn skip_ws(input: &[u8]) -> IResult<&[u8], ()> {
    let mut remaining = input;
    loop {
        let before = remaining;
        let (rest, _) = take_while(is_pdf_whitespace)(remaining)?;
        remaining = rest;
        if remaining.first() == Some(&b'%') {
            let (rest, _) = take_till(|c| c == b'\r' || c == b'\n')(remaining)?;
            remaining = rest;
        }
        if remaining == before {
            return Ok((remaining, ()));
        }
    }
}

/// Parse an integer or real number.
///
/// PDF allows leading signs and numbers starting or ending with a decimal
/// point: 42, -123, +17, 3.14, .5, 0.
fn number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, sign) = opt(one_of("+-"))(input)?;
    let (rest, int_part) = opt(digit1)(rest)?;
    let (rest, frac_part) = opt(preceded(char('.'), opt(digit1)))(rest)?;

    if int_part.is_none() && frac_part.is_none() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)));
    }

    let digit_err = || nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit));

    if frac_part.is_some() {
        let mut s = String::new();
        if sign == Some('-') {
            s.push('-');
        }
        s.push_str(
            int_part
                .map(|b| std::str::from_utf8(b).unwrap_or("0"))
                .unwrap_or("0"),
        );
        s.push('.');
        if let Some(Some(frac)) = frac_part {
            s.push_str(std::str::from_utf8(frac).map_err(|_| digit_err())?);
        } else {
            s.push('0');
        }
        let n: f64 = s.parse().map_err(|_| digit_err())?;
        Ok((rest, Token::Real(n)))
    } else {
        let bytes = int_part.ok_or_else(digit_err)?;
        let mut n: i64 = std::str::from_utf8(bytes)
            .map_err(|_| digit_err())?
            .parse()
            .map_err(|_| digit_err())?;
        if sign == Some('-') {
            n = -n;
        }
        Ok((rest, Token::Integer(n)))
    }
}

/// Parse a literal string enclosed in parentheses.
///
/// Handles balanced nested parentheses and skips over escape sequences
/// (including 1-3 digit octal escapes) so an escaped parenthesis does not
/// change the depth. Raw bytes are returned; decoding is done by the parser.
fn literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (remaining, _) = char('(')(input)?;
    let mut depth = 1;
    let mut pos = 0;

    while depth > 0 && pos < remaining.len() {
        match remaining[pos] {
            b'\\' => {
                pos += 1;
                if pos < remaining.len() {
                    if remaining[pos].is_ascii_digit() {
                        let mut digits = 0;
                        while digits < 3 && pos < remaining.len() && remaining[pos].is_ascii_digit()
                        {
                            pos += 1;
                            digits += 1;
                        }
                    } else {
                        pos += 1;
                    }
                }
            },
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    if depth != 0 {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    Ok((&remaining[pos..], Token::LiteralString(&remaining[..pos - 1])))
}

/// Parse a hexadecimal string enclosed in angle brackets.
fn hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    // `<<` starts a dictionary, not a hex string.
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || c.is_ascii_whitespace()),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

/// Decode `#XX` escape sequences in PDF names (ISO 32000-1, 7.3.5).
///
/// Invalid sequences are preserved literally, e.g. `A#` stays `A#`.
pub fn decode_name_escapes(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '#' {
            result.push(ch);
            continue;
        }
        match (chars.next(), chars.next()) {
            (Some(h1), Some(h2)) => {
                if let Ok(byte) = u8::from_str_radix(&format!("{}{}", h1, h2), 16) {
                    result.push(byte as char);
                } else {
                    result.push('#');
                    result.push(h1);
                    result.push(h2);
                }
            },
            (Some(h1), None) => {
                result.push('#');
                result.push(h1);
            },
            _ => result.push('#'),
        }
    }

    result
}

/// Parse a name starting with `/`.
fn name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(
            take_while(|c: u8| !is_pdf_whitespace(c) && !is_delimiter(c)),
            |bytes| {
                let s = std::str::from_utf8(bytes).unwrap_or("");
                Token::Name(decode_name_escapes(s))
            },
        ),
    )(input)
}

/// Parse keywords and delimiters.
///
/// Order matters: multi-character keywords before their prefixes
/// (`endstream` before `stream`, `<<` before `<`).
fn keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        value(Token::False, tag(b"false")),
        value(Token::True, tag(b"true")),
        value(Token::Null, tag(b"null")),
        value(Token::ObjEnd, tag(b"endobj")),
        value(Token::ObjStart, tag(b"obj")),
        value(Token::StreamEnd, tag(b"endstream")),
        value(Token::StreamStart, tag(b"stream")),
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
        value(Token::R, tag(b"R")),
    ))(input)
}

/// Parse a single token, skipping leading whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = skip_ws(input)?;
    alt((keyword, name, number, literal_string, hex_string))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(input: &[u8]) -> Token<'_> {
        token(input).unwrap().1
    }

    #[test]
    fn test_integers() {
        assert_eq!(tok(b"42"), Token::Integer(42));
        assert_eq!(tok(b"-123"), Token::Integer(-123));
        assert_eq!(tok(b"+17"), Token::Integer(17));
    }

    #[test]
    fn test_reals() {
        assert_eq!(tok(b"3.25"), Token::Real(3.25));
        assert_eq!(tok(b"-.5"), Token::Real(-0.5));
        assert_eq!(tok(b"4."), Token::Real(4.0));
    }

    #[test]
    fn test_names() {
        assert_eq!(tok(b"/Type"), Token::Name("Type".to_string()));
        assert_eq!(tok(b"/A#20B"), Token::Name("A B".to_string()));
    }

    #[test]
    fn test_literal_string_nested() {
        assert_eq!(tok(b"(Hello (World))"), Token::LiteralString(b"Hello (World)"));
    }

    #[test]
    fn test_literal_string_escaped_paren() {
        assert_eq!(tok(b"(a\\) b)"), Token::LiteralString(b"a\\) b"));
    }

    #[test]
    fn test_hex_string_vs_dict() {
        assert_eq!(tok(b"<48656C6C6F>"), Token::HexString(b"48656C6C6F"));
        assert_eq!(tok(b"<< /A 1 >>"), Token::DictStart);
    }

    #[test]
    fn test_keywords() {
        assert_eq!(tok(b"true"), Token::True);
        assert_eq!(tok(b"null"), Token::Null);
        assert_eq!(tok(b"endstream"), Token::StreamEnd);
        assert_eq!(tok(b"endobj"), Token::ObjEnd);
        assert_eq!(tok(b"R"), Token::R);
    }

    #[test]
    fn test_whitespace_and_comments_skipped() {
        assert_eq!(tok(b"  % a comment\n  42"), Token::Integer(42));
    }

    #[test]
    fn test_decode_name_escapes() {
        assert_eq!(decode_name_escapes("A#20B#23C"), "A B#C");
        assert_eq!(decode_name_escapes("Type"), "Type");
        assert_eq!(decode_name_escapes("A#"), "A#");
    }
}
