//! Input validation: PDF header sniffing before a file is handed to lopdf.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/// PDF header information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfHeader {
    /// PDF version (e.g., "1.7", "2.0")
    pub version: String,
    /// Byte offset of the `%PDF-` marker (non-zero when junk precedes it)
    pub offset: usize,
}

impl std::fmt::Display for PdfHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF {}", self.version)
    }
}

const PDF_MAGIC: &[u8] = b"%PDF-";
const VERSION_LEN: usize = 3;

/// Readers tolerate leading garbage before the header; so do we, up to this many bytes.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Sniff the PDF header of a file on disk.
///
/// Missing files map to [`Error::InputNotFound`]; anything that is not a PDF
/// maps to [`Error::InvalidInput`] carrying the path.
pub fn check_input<P: AsRef<Path>>(path: P) -> Result<PdfHeader> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::InputNotFound(path.to_path_buf()),
        _ => Error::InvalidInput {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })?;

    let mut head = Vec::with_capacity(HEADER_SEARCH_WINDOW);
    file.by_ref()
        .take(HEADER_SEARCH_WINDOW as u64)
        .read_to_end(&mut head)?;

    detect_header(&head).map_err(|e| Error::InvalidInput {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Find and parse the `%PDF-x.y` header in the leading bytes of a file.
pub fn detect_header(data: &[u8]) -> Result<PdfHeader> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let offset = window
        .windows(PDF_MAGIC.len())
        .position(|w| w == PDF_MAGIC)
        .ok_or(Error::UnknownFormat)?;

    let start = offset + PDF_MAGIC.len();
    let version_bytes = data
        .get(start..start + VERSION_LEN)
        .ok_or(Error::UnknownFormat)?;
    let version = String::from_utf8_lossy(version_bytes).to_string();

    if !is_valid_version(&version) {
        return Err(Error::UnknownFormat);
    }

    Ok(PdfHeader { version, offset })
}

fn is_valid_version(version: &str) -> bool {
    let bytes = version.as_bytes();
    bytes.len() == 3 && bytes[0].is_ascii_digit() && bytes[1] == b'.' && bytes[2].is_ascii_digit()
}

/// Check whether a file looks like a PDF.
pub fn is_pdf<P: AsRef<Path>>(path: P) -> bool {
    check_input(path).is_ok()
}
