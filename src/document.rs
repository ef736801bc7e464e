//! Document loading.
//!
//! A strict reader for well-formed PDFs: it locates `startxref`, follows
//! classic cross-reference sections through their `/Prev` chain, reads the
//! trailer, and eagerly materializes every in-use object into the
//! [`XrefTable`]. Cross-reference streams and object streams are not
//! supported; donor documents are assumed to be valid classic-xref files.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::ObjectRef;
use crate::parser::parse_object;
use crate::xref::XrefTable;
use std::collections::HashMap;
use std::path::Path;

/// How many trailing bytes to scan for the `startxref` keyword.
const STARTXREF_WINDOW: usize = 1024;

/// An in-memory PDF document: header version plus the object table.
#[derive(Debug, Clone)]
pub struct Document {
    /// The document's object table.
    pub xref: XrefTable,
    version: (u8, u8),
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document (PDF 1.4) to be populated through the
    /// object table.
    pub fn new() -> Self {
        Self {
            xref: XrefTable::new(),
            version: (1, 4),
        }
    }

    /// Read a document from a file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Read a document from raw bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let version = parse_header(data)?;

        let mut xref = XrefTable::new();
        let mut offsets: HashMap<u32, (u64, u16)> = HashMap::new();
        let mut root: Option<ObjectRef> = None;

        // Walk the xref chain, newest section first; earlier sections never
        // override entries the newer ones already claimed.
        let mut next = Some(find_startxref(data)?);
        while let Some(offset) = next {
            let section = parse_xref_section(data, offset as usize)?;
            for (id, loc) in section.entries {
                offsets.entry(id).or_insert(loc);
            }
            if root.is_none() {
                root = section.root;
            }
            next = section.prev;
        }

        let root = root.ok_or_else(|| Error::InvalidPdf("trailer has no Root entry".to_string()))?;

        for (id, (offset, gen)) in &offsets {
            let object = parse_indirect_object(data, *offset as usize, *id)?;
            xref.set_object(ObjectRef::new(*id, *gen), object);
        }
        xref.set_root(root);

        Ok(Self { xref, version })
    }

    /// Header version `(major, minor)`.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Raise the document version to at least PDF 1.`minor`.
    pub fn ensure_version(&mut self, minor: u8) {
        if self.version.0 == 1 && self.version.1 < minor {
            self.version = (1, minor);
        }
    }

    /// Number of pages, from the page tree root `Count`.
    pub fn page_count(&self) -> Result<usize> {
        let catalog = self.xref.catalog()?;
        let pages = catalog
            .get("Pages")
            .ok_or_else(|| Error::InvalidPdf("catalog has no Pages entry".to_string()))?;
        let count = self
            .xref
            .resolve_dict(pages)?
            .get("Count")
            .and_then(|o| o.as_integer())
            .ok_or_else(|| Error::InvalidPdf("page tree root has no Count".to_string()))?;
        Ok(count as usize)
    }
}

fn parse_header(data: &[u8]) -> Result<(u8, u8)> {
    if !data.starts_with(b"%PDF-") {
        let seen = String::from_utf8_lossy(&data[..data.len().min(8)]).into_owned();
        return Err(Error::InvalidHeader(seen));
    }
    // "%PDF-1.7": be lenient about anything after the minor digit.
    let major = data.get(5).copied().unwrap_or(b'1').wrapping_sub(b'0');
    let minor = data.get(7).copied().unwrap_or(b'0').wrapping_sub(b'0');
    Ok((major, minor))
}

/// Locate the offset announced by the trailing `startxref` keyword.
fn find_startxref(data: &[u8]) -> Result<u64> {
    let window_start = data.len().saturating_sub(STARTXREF_WINDOW);
    let window = &data[window_start..];

    let pos = window
        .windows(9)
        .rposition(|w| w == b"startxref")
        .ok_or(Error::InvalidXref)?;

    let rest = &window[pos + 9..];
    let text = String::from_utf8_lossy(rest);
    text.split_whitespace()
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or(Error::InvalidXref)
}

struct XrefSection {
    entries: HashMap<u32, (u64, u16)>,
    root: Option<ObjectRef>,
    prev: Option<u64>,
}

/// Parse one classic cross-reference section plus its trailer.
fn parse_xref_section(data: &[u8], offset: usize) -> Result<XrefSection> {
    if offset >= data.len() {
        return Err(Error::InvalidXref);
    }

    let mut cursor = Cursor { data, pos: offset };
    let first = cursor.line()?;
    if first != "xref" {
        // A number here means the offset points at an object: a PDF 1.5+
        // cross-reference stream.
        if first.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            return Err(Error::Unsupported("cross-reference streams".to_string()));
        }
        return Err(Error::InvalidXref);
    }

    let mut entries = HashMap::new();
    loop {
        let line = cursor.line()?;
        if line == "trailer" {
            break;
        }

        let mut parts = line.split_whitespace();
        let start: u32 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or(Error::InvalidXref)?;
        let count: u32 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or(Error::InvalidXref)?;

        for i in 0..count {
            let entry = cursor.line()?;
            let mut fields = entry.split_whitespace();
            let entry_offset: u64 = fields
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or(Error::InvalidXref)?;
            let gen: u16 = fields
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or(Error::InvalidXref)?;
            let kind = fields.next().ok_or(Error::InvalidXref)?;

            // Free entries (and the object 0 head of the free list) are skipped.
            if kind == "n" {
                entries.insert(start + i, (entry_offset, gen));
            }
        }
    }

    let (_, trailer) = parse_object(&data[cursor.pos..]).map_err(|_| Error::InvalidXref)?;
    let trailer = trailer.expect_dict()?;

    let root = trailer.get("Root").and_then(|o| o.as_reference());
    let prev = trailer
        .get("Prev")
        .and_then(|o| o.as_integer())
        .map(|p| p as u64);

    Ok(XrefSection { entries, root, prev })
}

/// Parse `N G obj ... endobj` at `offset`, checking the object number.
fn parse_indirect_object(data: &[u8], offset: usize, expect_id: u32) -> Result<crate::object::Object> {
    if offset >= data.len() {
        return Err(Error::InvalidXref);
    }
    let input = &data[offset..];

    let parse_failure = |reason: &str| Error::ParseError {
        offset,
        reason: reason.to_string(),
    };

    let (input, id) = match token(input) {
        Ok((rest, Token::Integer(i))) => (rest, i as u32),
        _ => return Err(parse_failure("expected object number")),
    };
    if id != expect_id {
        log::warn!("xref offset for object {} points at object {}", expect_id, id);
    }
    let input = match token(input) {
        Ok((rest, Token::Integer(_))) => rest,
        _ => return Err(parse_failure("expected generation number")),
    };
    let input = match token(input) {
        Ok((rest, Token::ObjStart)) => rest,
        _ => return Err(parse_failure("expected obj keyword")),
    };

    let (_, object) = parse_object(input).map_err(|_| parse_failure("malformed object body"))?;
    Ok(object)
}

/// Byte cursor with ASCII line reading for the xref table layout.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    /// Read the next non-empty line, trimmed.
    fn line(&mut self) -> Result<String> {
        loop {
            if self.pos >= self.data.len() {
                return Err(Error::InvalidXref);
            }
            let rest = &self.data[self.pos..];
            let end = rest.iter().position(|&c| c == b'\n' || c == b'\r').unwrap_or(rest.len());
            let line = String::from_utf8_lossy(&rest[..end]).trim().to_string();
            self.pos += end + 1;
            // Swallow the LF of a CRLF pair.
            if end < rest.len() && rest[end] == b'\r' && rest.get(end + 1) == Some(&b'\n') {
                self.pos += 1;
            }
            if !line.is_empty() {
                return Ok(line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A minimal one-page document with an uncompressed content stream,
    /// assembled with correct byte offsets.
    fn minimal_pdf() -> Vec<u8> {
        let mut buf: Vec<u8> = Vec::new();
        let mut offsets = Vec::new();

        buf.extend_from_slice(b"%PDF-1.4\n");

        let objects: Vec<(u32, Vec<u8>)> = vec![
            (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
            (
                2,
                b"<< /Type /Pages /Kids [ 3 0 R ] /Count 1 /MediaBox [ 0 0 612 792 ] >>".to_vec(),
            ),
            (
                3,
                b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Resources << >> >>".to_vec(),
            ),
            (4, b"<< /Length 42 >>\nstream\nBT /F1 12 Tf 72 720 Td (Hello donor) Tj ET\nendstream".to_vec()),
        ];

        for (id, body) in &objects {
            offsets.push((*id, buf.len()));
            buf.extend_from_slice(format!("{} 0 obj\n", id).as_bytes());
            buf.extend_from_slice(body);
            buf.extend_from_slice(b"\nendobj\n");
        }

        let xref_offset = buf.len();
        buf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        buf.extend_from_slice(b"0000000000 65535 f \n");
        for (_, offset) in &offsets {
            buf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        buf.extend_from_slice(b"trailer\n<< /Size 5 /Root 1 0 R >>\n");
        buf.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());

        buf
    }

    #[test]
    fn test_open_minimal_pdf() {
        let doc = Document::from_bytes(&minimal_pdf()).unwrap();
        assert_eq!(doc.version(), (1, 4));
        assert_eq!(doc.page_count().unwrap(), 1);

        let catalog = doc.xref.catalog().unwrap();
        assert_eq!(catalog.get("Type").unwrap().as_name(), Some("Catalog"));
    }

    #[test]
    fn test_page_dict_of_loaded_document() {
        let doc = Document::from_bytes(&minimal_pdf()).unwrap();
        let (page_ref, attrs) = doc.xref.page_dict(1).unwrap();

        let page = doc.xref.object(page_ref).unwrap().as_dict().unwrap();
        assert_eq!(page.get("Type").unwrap().as_name(), Some("Page"));
        assert_eq!(attrs.viewport().unwrap().width(), 612.0);
    }

    #[test]
    fn test_content_stream_loaded() {
        let doc = Document::from_bytes(&minimal_pdf()).unwrap();
        let (page_ref, _) = doc.xref.page_dict(1).unwrap();
        let page = doc.xref.object(page_ref).unwrap().as_dict().unwrap();
        let contents = doc.xref.resolve(page.get("Contents").unwrap()).unwrap();

        match contents {
            crate::object::Object::Stream { data, .. } => {
                assert!(data.starts_with(b"BT"));
            },
            other => panic!("expected stream, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_invalid_header() {
        assert!(matches!(
            Document::from_bytes(b"not a pdf at all"),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_missing_startxref() {
        assert!(matches!(
            Document::from_bytes(b"%PDF-1.4\njust a header"),
            Err(Error::InvalidXref)
        ));
    }

    #[test]
    fn test_ensure_version() {
        let mut doc = Document::new();
        assert_eq!(doc.version(), (1, 4));
        doc.ensure_version(5);
        assert_eq!(doc.version(), (1, 5));
        doc.ensure_version(3);
        assert_eq!(doc.version(), (1, 5));
    }
}
