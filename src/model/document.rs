//! Document-level types.

use std::fs;
use std::path::{Path, PathBuf};

use lopdf::Document as LopdfDocument;

use super::{GeometrySnapshot, PageInfo};
use crate::detect::check_input;
use crate::error::{Error, Result};
use crate::text::{self, TextBlock};

/// A PDF document opened for mutation, backed by a file path.
///
/// Changes stay in memory until [`PdfDocument::save`] writes them out.
#[derive(Debug)]
pub struct PdfDocument {
    inner: LopdfDocument,
    path: PathBuf,
}

impl PdfDocument {
    /// Open a PDF file for reading and in-memory mutation.
    ///
    /// Fails with the offending path when the file is missing, is not a PDF,
    /// cannot be parsed, or has no pages.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        check_input(path)?;

        let inner = LopdfDocument::load(path).map_err(|e| Error::InvalidInput {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if inner.is_encrypted() {
            log::warn!("{} is encrypted; content edits may not render", path.display());
        }

        Self::from_document(inner, path)
    }

    /// Wrap an already loaded document. It must have at least one page.
    pub fn from_document<P: AsRef<Path>>(inner: LopdfDocument, path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if inner.get_pages().is_empty() {
            return Err(Error::EmptyDocument(path));
        }
        Ok(Self { inner, path })
    }

    /// Parse a document from bytes; `path` is where it will be saved by default.
    pub fn from_bytes<P: AsRef<Path>>(data: &[u8], path: P) -> Result<Self> {
        let inner = LopdfDocument::load_mem(data).map_err(|e| Error::InvalidInput {
            path: path.as_ref().to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_document(inner, path)
    }

    /// The path this document was opened from (or will be saved to).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.inner.get_pages().len()
    }

    /// Page at a 0-based index.
    pub fn page(&self, index: usize) -> Result<PageInfo> {
        let id = crate::pdf::page_id_at(&self.inner, index)?;
        Ok(PageInfo::read(&self.inner, index, id))
    }

    /// All pages in order.
    pub fn pages(&self) -> Vec<PageInfo> {
        crate::pdf::page_ids(&self.inner)
            .into_iter()
            .enumerate()
            .map(|(index, id)| PageInfo::read(&self.inner, index, id))
            .collect()
    }

    /// Geometry of every page, in order.
    pub fn geometry(&self) -> Vec<GeometrySnapshot> {
        self.pages().into_iter().map(|p| p.geometry).collect()
    }

    /// Text blocks of a page, computed on demand from its content stream.
    pub fn text_blocks(&self, index: usize) -> Result<Vec<TextBlock>> {
        let id = crate::pdf::page_id_at(&self.inner, index)?;
        let page = text::PageText::extract(&self.inner, id).map_err(|e| match e {
            Error::Content { reason, .. } => Error::Content {
                page: index,
                reason,
            },
            other => other,
        })?;
        Ok(page.blocks())
    }

    /// Plain text of a page, blocks separated by blank lines.
    pub fn page_text(&self, index: usize) -> Result<String> {
        Ok(self
            .text_blocks(index)?
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    /// Borrow the underlying lopdf document.
    pub fn inner(&self) -> &LopdfDocument {
        &self.inner
    }

    /// Mutably borrow the underlying lopdf document.
    pub fn inner_mut(&mut self) -> &mut LopdfDocument {
        &mut self.inner
    }

    /// Consume the wrapper.
    pub fn into_inner(self) -> LopdfDocument {
        self.inner
    }

    /// Write the document to `dest` atomically and make `dest` its new path.
    ///
    /// The bytes go to a temporary file in the destination directory which is
    /// renamed into place only after a complete write, so a failure never
    /// leaves a partial file at `dest`. Objects orphaned by earlier edits are
    /// pruned first.
    pub fn save<P: AsRef<Path>>(&mut self, dest: P) -> Result<()> {
        let dest = dest.as_ref();
        self.inner.prune_objects();
        self.inner.compress();
        write_atomically(&mut self.inner, dest)?;
        self.path = dest.to_path_buf();
        log::debug!("Saved {} ({} pages)", dest.display(), self.page_count());
        Ok(())
    }
}

/// Serialize a lopdf document to `dest` through a temporary sibling file.
pub(crate) fn write_atomically(doc: &mut LopdfDocument, dest: &Path) -> Result<()> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".pdfmend-")
        .suffix(".part")
        .tempfile_in(&dir)?;
    doc.save_to(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Copy a file to `dest` atomically.
pub(crate) fn copy_atomically(src: &Path, dest: &Path) -> Result<()> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let tmp = tempfile::Builder::new()
        .prefix(".pdfmend-")
        .suffix(".part")
        .tempfile_in(&dir)?;
    fs::copy(src, tmp.path())?;
    tmp.persist(dest).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
