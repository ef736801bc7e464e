//! Error types for the watermarking library.

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while reading documents or applying overlays.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where the error occurred
        offset: usize,
        /// Reason for the parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in the object table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter.
    ///
    /// Non-fatal while patching or removing page content (the stream is
    /// skipped); fatal when ingesting a donor PDF page.
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Invalid watermark configuration string
    #[error("{0}")]
    WatermarkConfig(String),

    /// Font name outside the base-font metrics catalogue
    #[error("{0} is unsupported, try one of Helvetica, Times-Roman, Courier")]
    UnsupportedFont(String),

    /// Donor PDF page has an empty content stream
    #[error("stamp: PDF page has no content")]
    NoContent,

    /// Donor page number out of range
    #[error("unknown page number: {0}")]
    UnknownPage(usize),

    /// Corrupt resource structures encountered during removal
    #[error("OCProperties: corrupt OCGs element")]
    CorruptResourceDict,

    /// No watermark found on any selected page
    #[error("no watermarks found - nothing removed")]
    NoWatermarksFound,

    /// Image error
    #[error("Image error: {0}")]
    Image(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
