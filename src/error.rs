//! Error types for the pdfmend library.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pdfmend operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while repairing a translated PDF.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An input file does not exist.
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// The file format is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// An input file exists but cannot be used as a PDF.
    #[error("Invalid PDF {}: {reason}", path.display())]
    InvalidInput {
        /// The offending file
        path: PathBuf,
        /// What went wrong while opening it
        reason: String,
    },

    /// The PDF opened but has no pages.
    #[error("PDF has no pages: {}", .0.display())]
    EmptyDocument(PathBuf),

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// A required PDF object is missing.
    #[error("Missing required object: {0}")]
    MissingObject(String),

    /// Page number is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(usize, usize),

    /// Page count changed while a document was being rewritten.
    #[error("Page count mismatch: expected {expected}, found {found}")]
    PageCountMismatch {
        /// Pages before the rewrite
        expected: usize,
        /// Pages after the rewrite
        found: usize,
    },

    /// A page content stream could not be decoded or re-encoded.
    #[error("Content stream error on page {page}: {reason}")]
    Content {
        /// 0-based page index
        page: usize,
        /// Decoder message
        reason: String,
    },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A pipeline stage failed.
    #[error("{stage} failed: {source}")]
    Stage {
        /// Name of the failing stage
        stage: &'static str,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap an error with the name of the stage that produced it.
    pub fn in_stage(self, stage: &'static str) -> Self {
        match self {
            // Input errors already carry the offending path.
            Error::InputNotFound(_) | Error::InvalidInput { .. } | Error::EmptyDocument(_) => self,
            other => Error::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            _ => Error::PdfParse(err.to_string()),
        }
    }
}
