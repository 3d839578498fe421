//! Page geometry normalization.
//!
//! Translated PDFs often come back with a stored `/Rotate`, or with a crop
//! box that no longer matches the media box. Viewers and the later stages
//! disagree about such pages, so they are rewritten into plain pages: no
//! rotation, crop box equal to media box.

use std::path::Path;

use lopdf::{Document as LopdfDocument, Object, ObjectId};
use serde::Serialize;

use super::options::RotationPolicy;
use super::workspace::remove_logged;
use crate::error::{Error, Result};
use crate::model::{copy_atomically, fmt_num, GeometrySnapshot, PageInfo, PdfDocument, Rect};
use crate::pdf::{self, INHERITABLE_KEYS};

/// What a normalization pass did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizeReport {
    /// Number of pages in the document
    pub pages: usize,
    /// 0-based indices of pages that were problematic before the pass
    pub problematic_pages: Vec<usize>,
    /// The document was copied unchanged
    pub fast_path: bool,
    /// Geometry of every page before the pass
    pub before: Vec<GeometrySnapshot>,
}

/// Rewrites page geometry so that every page is normalized.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageNormalizer {
    policy: RotationPolicy,
}

impl PageNormalizer {
    pub fn new(policy: RotationPolicy) -> Self {
        Self { policy }
    }

    /// Normalize a document in memory.
    ///
    /// Every page loses its rotation and crop box (a differing crop box
    /// becomes the media box), with page-tree inheritance materialized on the
    /// pages themselves. Every page that was problematic additionally gets its
    /// content turned a quarter turn clockwise and its media box swapped to
    /// `[0 0 h w]`.
    pub fn normalize(&self, doc: &mut PdfDocument) -> Result<NormalizeReport> {
        let pages = doc.pages();
        let problematic: Vec<usize> = pages
            .iter()
            .filter(|p| p.is_problematic())
            .map(|p| p.index)
            .collect();
        let report = NormalizeReport {
            pages: pages.len(),
            problematic_pages: problematic.clone(),
            fast_path: problematic.is_empty() && self.policy == RotationPolicy::Conditional,
            before: pages.iter().map(|p| p.geometry).collect(),
        };

        if report.fast_path {
            log::debug!("All {} pages already normalized", pages.len());
            return Ok(report);
        }

        let inner = doc.inner_mut();
        for page in &pages {
            flatten_page(inner, page)?;
        }
        strip_inherited_geometry(inner, &pages);
        for page in pages.iter().filter(|p| p.is_problematic()) {
            quarter_turn(inner, page)?;
        }

        log::info!(
            "Normalized {} pages ({} problematic)",
            report.pages,
            problematic.len()
        );
        Ok(report)
    }

    /// Normalize `src` into `dest`.
    ///
    /// Without problematic pages (and under [`RotationPolicy::Conditional`])
    /// the file is copied unchanged. Otherwise the rewritten document is saved
    /// and read back; a page count differing from the input removes `dest`
    /// and fails with [`Error::PageCountMismatch`].
    pub fn normalize_file(&self, src: &Path, dest: &Path) -> Result<NormalizeReport> {
        let mut doc = PdfDocument::open(src)?;
        let report = self.normalize(&mut doc)?;

        if report.fast_path {
            copy_atomically(src, dest)?;
            return Ok(report);
        }

        doc.save(dest)?;

        let found = match PdfDocument::open(dest) {
            Ok(reread) => reread.page_count(),
            Err(Error::EmptyDocument(_)) => 0,
            Err(e) => {
                remove_logged(dest);
                return Err(e);
            }
        };
        if found != report.pages {
            remove_logged(dest);
            return Err(Error::PageCountMismatch {
                expected: report.pages,
                found,
            });
        }
        Ok(report)
    }
}

/// Whether every page of a document is normalized.
pub fn verify_normalized(doc: &PdfDocument) -> bool {
    doc.pages().iter().all(|p| !p.is_problematic())
}

/// Clear rotation, fold the crop box into the media box and put the
/// resulting geometry on the page itself.
fn flatten_page(doc: &mut LopdfDocument, page: &PageInfo) -> Result<()> {
    let geometry = page.geometry;
    let media = if geometry.crop_box.approx_eq(&geometry.media_box) {
        geometry.media_box
    } else {
        // The visible part of a page never extends past its media box.
        clamp_to(&geometry.crop_box, &geometry.media_box)
    };

    let dict = doc.get_object_mut(page.id).and_then(Object::as_dict_mut)?;
    dict.set("MediaBox", media.to_pdf_array());
    dict.remove(b"CropBox");
    dict.remove(b"Rotate");
    Ok(())
}

fn clamp_to(rect: &Rect, bounds: &Rect) -> Rect {
    let clamped = Rect::new(
        rect.x0.max(bounds.x0),
        rect.y0.max(bounds.y0),
        rect.x1.min(bounds.x1),
        rect.y1.min(bounds.y1),
    );
    if clamped.width() > 0.0 && clamped.height() > 0.0 {
        clamped
    } else {
        *rect
    }
}

/// Drop inheritable geometry from the page-tree nodes above the given pages.
fn strip_inherited_geometry(doc: &mut LopdfDocument, pages: &[PageInfo]) {
    let mut nodes: Vec<ObjectId> = Vec::new();
    for page in pages {
        let mut current = page.id;
        for _ in 0..64 {
            let parent = doc
                .get_dictionary(current)
                .ok()
                .and_then(|d| d.get(b"Parent").ok())
                .and_then(|p| p.as_reference().ok());
            match parent {
                Some(parent) if !nodes.contains(&parent) => {
                    nodes.push(parent);
                    current = parent;
                }
                _ => break,
            }
        }
    }

    for id in nodes {
        if let Ok(dict) = doc.get_object_mut(id).and_then(Object::as_dict_mut) {
            for key in INHERITABLE_KEYS.iter().filter(|k| **k != b"Resources") {
                dict.remove(key);
            }
        }
    }
}

/// Turn a flattened page's content a quarter turn clockwise.
fn quarter_turn(doc: &mut LopdfDocument, page: &PageInfo) -> Result<()> {
    let current = PageInfo::read(doc, page.index, page.id);
    let mb = current.geometry.media_box;
    let (w, h) = (mb.width(), mb.height());

    let prefix = format!("q\n0 -1 1 0 {} {} cm\n", fmt_num(-mb.y0), fmt_num(mb.x1));
    pdf::wrap_page_content(doc, page.id, prefix.into_bytes(), b"\nQ\n".to_vec())?;

    let dict = doc.get_object_mut(page.id).and_then(Object::as_dict_mut)?;
    dict.set("MediaBox", Rect::from_size(h, w).to_pdf_array());
    dict.set("Rotate", 0);

    log::debug!(
        "Page {}: turned {}x{} content onto {}x{} media box",
        page.index,
        fmt_num(w),
        fmt_num(h),
        fmt_num(h),
        fmt_num(w)
    );
    Ok(())
}
