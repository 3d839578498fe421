//! Side-by-side comparison documents.

use std::path::Path;

use lopdf::{dictionary, Document as LopdfDocument, Object, Stream};
use serde::Serialize;

use super::options::DividerStyle;
use crate::error::{Error, Result};
use crate::model::{fmt_num, Matrix, PageInfo, PdfDocument, Rect};
use crate::pdf::{self, ObjectImporter};

/// How the two pages of a pair are arranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Original on the left, translation on the right
    Portrait,
    /// Original on top, translation below
    Landscape,
}

impl Orientation {
    /// Portrait when strictly taller than wide.
    pub fn of_size(width: f64, height: f64) -> Self {
        if width < height {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }
}

/// Placement of one pair of pages on a merged canvas, in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub width: f64,
    pub height: f64,
    /// Bottom-left corner of the original page
    pub original_at: (f64, f64),
    /// Bottom-left corner of the translated page
    pub translated_at: (f64, f64),
    /// Divider line end points
    pub divider: ((f64, f64), (f64, f64)),
}

impl Layout {
    /// Arrange an original page of size `a` and a translated page of size `b`.
    ///
    /// Portrait pairs sit side by side, top aligned, with a vertical divider
    /// at the original's width. Landscape pairs are stacked, left aligned,
    /// with a horizontal divider the original's height below the top.
    pub fn arrange(orientation: Orientation, a: (f64, f64), b: (f64, f64)) -> Self {
        let ((w1, h1), (w2, h2)) = (a, b);
        match orientation {
            Orientation::Portrait => {
                let width = w1 + w2;
                let height = h1.max(h2);
                Self {
                    width,
                    height,
                    original_at: (0.0, height - h1),
                    translated_at: (w1, height - h2),
                    divider: ((w1, 0.0), (w1, height)),
                }
            }
            Orientation::Landscape => {
                let width = w1.max(w2);
                let height = h1 + h2;
                Self {
                    width,
                    height,
                    original_at: (0.0, height - h1),
                    translated_at: (0.0, height - h1 - h2),
                    divider: ((0.0, height - h1), (width, height - h1)),
                }
            }
        }
    }
}

/// What composition produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposeReport {
    pub orientation: Orientation,
    /// Merged pages written
    pub pages: usize,
    /// Page counts of the inputs
    pub original_pages: usize,
    pub translated_pages: usize,
}

/// Merges original and translated pages into comparison pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageComposer {
    divider: DividerStyle,
}

impl PageComposer {
    pub fn new(divider: DividerStyle) -> Self {
        Self { divider }
    }

    /// Build the merged document in memory.
    ///
    /// Pairs are formed up to the shorter document's length. Orientation is
    /// decided once, from the original's first page; canvas sizes follow
    /// each pair's own page sizes.
    pub fn build(
        &self,
        original: &PdfDocument,
        translated: &PdfDocument,
    ) -> Result<(LopdfDocument, ComposeReport)> {
        let left = original.pages();
        let right = translated.pages();
        let first = left
            .first()
            .ok_or_else(|| Error::EmptyDocument(original.path().to_path_buf()))?;
        let orientation = Orientation::of_size(first.width(), first.height());

        let pairs = left.len().min(right.len());
        if left.len() != right.len() {
            log::warn!(
                "Page counts differ (original {}, translated {}); merging {} pairs",
                left.len(),
                right.len(),
                pairs
            );
        }

        let (mut merged, pages_id) = pdf::new_document();
        let mut from_original = ObjectImporter::new();
        let mut from_translated = ObjectImporter::new();

        for (a, b) in left.iter().zip(right.iter()) {
            let visible_a = visible_box(a);
            let visible_b = visible_box(b);
            let layout = Layout::arrange(
                orientation,
                (visible_a.width(), visible_a.height()),
                (visible_b.width(), visible_b.height()),
            );

            let form_a = pdf::page_to_form(
                original.inner(),
                a.id,
                &mut merged,
                &mut from_original,
                Some(visible_a),
            )?;
            let form_b = pdf::page_to_form(
                translated.inner(),
                b.id,
                &mut merged,
                &mut from_translated,
                Some(visible_b),
            )?;

            let mut content = String::new();
            content.push_str(&pdf::draw_form("Orig", &place(&visible_a, layout.original_at)));
            content.push_str(&pdf::draw_form("Trans", &place(&visible_b, layout.translated_at)));
            content.push_str(&self.divider_ops(&layout));

            let content_id = merged.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            pdf::push_page(&mut merged, pages_id, dictionary! {
                "MediaBox" => Rect::from_size(layout.width, layout.height).to_pdf_array(),
                "Resources" => dictionary! {
                    "XObject" => dictionary! {
                        "Orig" => Object::Reference(form_a),
                        "Trans" => Object::Reference(form_b),
                    },
                },
                "Contents" => content_id,
            })?;

            log::debug!(
                "Merged page {}: {}x{}",
                a.index,
                fmt_num(layout.width),
                fmt_num(layout.height)
            );
        }

        pdf::stamp_info(&mut merged, &chrono::Utc::now());

        let report = ComposeReport {
            orientation,
            pages: pairs,
            original_pages: left.len(),
            translated_pages: right.len(),
        };
        Ok((merged, report))
    }

    /// Build the merged document and save it to `dest`.
    pub fn compose(
        &self,
        original: &PdfDocument,
        translated: &PdfDocument,
        dest: &Path,
    ) -> Result<ComposeReport> {
        let (merged, report) = self.build(original, translated)?;
        let mut merged = PdfDocument::from_document(merged, dest)?;
        merged.save(dest)?;
        log::info!(
            "Wrote {} merged {:?} pages to {}",
            report.pages,
            report.orientation,
            dest.display()
        );
        Ok(report)
    }

    fn divider_ops(&self, layout: &Layout) -> String {
        if self.divider.width <= 0.0 {
            return String::new();
        }
        let ((x0, y0), (x1, y1)) = layout.divider;
        format!(
            "q\n{} G\n{} w\n{} {} m\n{} {} l\nS\nQ\n",
            fmt_num(self.divider.gray),
            fmt_num(self.divider.width),
            fmt_num(x0),
            fmt_num(y0),
            fmt_num(x1),
            fmt_num(y1)
        )
    }
}

/// The part of a page a viewer shows.
fn visible_box(page: &PageInfo) -> Rect {
    if !page.geometry.rotation.is_none() {
        log::debug!(
            "Page {} still carries a rotation of {}; composing unrotated",
            page.index,
            page.geometry.rotation.degrees()
        );
    }
    page.geometry.crop_box
}

/// Matrix moving a page box's bottom-left corner to `at`.
fn place(visible: &Rect, at: (f64, f64)) -> Matrix {
    Matrix::translate(at.0 - visible.x0, at.1 - visible.y0)
}
