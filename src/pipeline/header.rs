//! Restoring the header strip of the first page.
//!
//! Translation services tend to drop or mangle the very top of the first
//! page (logos, running headers). The strip is copied from the original as
//! vector content, so text in it stays selectable. Only operations painting
//! inside the strip are copied; the rest of the original page never reaches
//! the translated document.

use std::path::{Path, PathBuf};

use lopdf::{dictionary, Document as LopdfDocument, Object};
use serde::Serialize;

use super::workspace::Workspace;
use crate::error::{Error, Result};
use crate::model::{fmt_num, write_atomically, Matrix, PdfDocument, Rect};
use crate::pdf::{self, ObjectImporter};

/// Height in points of the strip copied from the top of the original page.
pub const DEFAULT_STRIP_HEIGHT: f64 = 20.0;

/// File name of the strip artifact inside the workspace.
const STRIP_ARTIFACT: &str = "header_strip.pdf";

/// Where a strip was taken from and placed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderReport {
    /// Strip rectangle on the original first page
    pub source: Rect,
    /// Strip rectangle on the translated first page
    pub target: Rect,
}

/// A one-page PDF holding the strip, on disk in a workspace.
#[derive(Debug)]
pub struct StripArtifact {
    pub path: PathBuf,
    /// Strip rectangle on the original first page
    pub source: Rect,
}

/// Copies the top strip of the original's first page onto the translated one.
#[derive(Debug, Clone, Copy)]
pub struct HeaderPatcher {
    strip_height: f64,
}

impl Default for HeaderPatcher {
    fn default() -> Self {
        Self::new(DEFAULT_STRIP_HEIGHT)
    }
}

impl HeaderPatcher {
    pub fn new(strip_height: f64) -> Self {
        Self { strip_height }
    }

    pub fn strip_height(&self) -> f64 {
        self.strip_height
    }

    /// Stamp the original's header strip onto `translated` and save the
    /// result to `single_path`.
    ///
    /// The strip passes through a temporary PDF in `workspace`, which is
    /// removed afterwards whether or not stamping succeeded.
    pub fn patch(
        &self,
        original: &PdfDocument,
        translated: &mut PdfDocument,
        workspace: &Workspace,
        single_path: &Path,
    ) -> Result<HeaderReport> {
        let artifact = self.extract_strip(original, &workspace.artifact(STRIP_ARTIFACT))?;
        let stamped = self.stamp_strip(translated, &artifact);
        workspace.remove_artifact(&artifact.path);

        let target = stamped?;
        translated.save(single_path)?;

        log::info!(
            "Header strip of {}pt restored into {}",
            fmt_num(artifact.source.height()),
            single_path.display()
        );
        Ok(HeaderReport {
            source: artifact.source,
            target,
        })
    }

    /// Write the top strip of the original's first page to a one-page PDF.
    ///
    /// The page content is reduced to what paints inside the strip, embedded
    /// as a form with the strip as its bounding box and drawn over an opaque
    /// white backing, on a page exactly the size of the strip.
    pub fn extract_strip(&self, original: &PdfDocument, dest: &Path) -> Result<StripArtifact> {
        let page = original.page(0)?;
        let media = page.geometry.media_box;
        let height = self.strip_height.min(media.height());
        if height < self.strip_height {
            log::debug!(
                "Strip height {} exceeds page height, using {}",
                fmt_num(self.strip_height),
                fmt_num(height)
            );
        }
        let source = Rect::new(media.x0, media.y1 - height, media.x1, media.y1);

        let (mut strip, pages_id) = pdf::new_document();
        let mut importer = ObjectImporter::new();
        let clipped = pdf::clip_page_content(original.inner(), page.id, &source)?;
        let form_id = pdf::content_to_form(
            original.inner(),
            &mut strip,
            &mut importer,
            source,
            clipped.content,
            &clipped.resources,
        );

        let content = format!(
            "q\n1 g\n0 0 {} {} re\nf\nQ\n{}",
            fmt_num(source.width()),
            fmt_num(source.height()),
            pdf::draw_form("Strip", &Matrix::translate(-source.x0, -source.y0))
        );
        let content_id = strip.add_object(lopdf::Stream::new(dictionary! {}, content.into_bytes()));
        pdf::push_page(&mut strip, pages_id, dictionary! {
            "MediaBox" => Rect::from_size(source.width(), source.height()).to_pdf_array(),
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Strip" => Object::Reference(form_id) },
            },
            "Contents" => content_id,
        })?;

        write_atomically(&mut strip, dest)?;
        log::debug!("Header strip written to {}", dest.display());

        Ok(StripArtifact {
            path: dest.to_path_buf(),
            source,
        })
    }

    /// Draw a strip artifact at the top-left of the translated first page,
    /// above its existing content. Returns the covered rectangle.
    pub fn stamp_strip(&self, translated: &mut PdfDocument, artifact: &StripArtifact) -> Result<Rect> {
        let strip = LopdfDocument::load(&artifact.path).map_err(|e| Error::InvalidInput {
            path: artifact.path.clone(),
            reason: e.to_string(),
        })?;
        let strip_page = pdf::page_id_at(&strip, 0)?;

        let target_page = translated.page(0)?;
        let media = target_page.geometry.media_box;
        let (w, h) = (artifact.source.width(), artifact.source.height());
        let target = Rect::new(media.x0, media.y1 - h, media.x0 + w, media.y1);

        let inner = translated.inner_mut();
        let mut importer = ObjectImporter::new();
        let form_id = pdf::page_to_form(&strip, strip_page, inner, &mut importer, None)?;
        let name = pdf::add_page_xobject(inner, target_page.id, "Hdr", form_id)?;

        let overlay = pdf::draw_form(&name, &Matrix::translate(target.x0, target.y0));
        pdf::overlay_page_content(inner, target_page.id, overlay.as_bytes())?;

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::{new_document, push_page};
    use crate::text::PageText;
    use lopdf::Stream;

    fn single_page(text: &str, width: i64, height: i64) -> PdfDocument {
        let content = format!("BT /F1 10 Tf 10 {} Td ({}) Tj ET", height - 12, text);
        page_with_content(&content, width, height)
    }

    fn page_with_content(content: &str, width: i64, height: i64) -> PdfDocument {
        let (mut doc, pages_id) = new_document();
        let content = content.to_string();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        push_page(&mut doc, pages_id, dictionary! {
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    "F1" => dictionary! { "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica" },
                },
            },
            "Contents" => content_id,
        })
        .unwrap();
        PdfDocument::from_document(doc, "mem.pdf").unwrap()
    }

    #[test]
    fn test_extract_strip_page_size() {
        let dir = tempfile::tempdir().unwrap();
        let original = single_page("Header", 600, 800);

        let artifact = HeaderPatcher::default()
            .extract_strip(&original, &dir.path().join("strip.pdf"))
            .unwrap();
        assert_eq!(artifact.source, Rect::new(0.0, 780.0, 600.0, 800.0));

        let strip = PdfDocument::open(&artifact.path).unwrap();
        assert_eq!(strip.page_count(), 1);
        assert_eq!(strip.page(0).unwrap().dimensions(), (600.0, 20.0));
    }

    #[test]
    fn test_patch_stamps_and_cleans_up() {
        let out = tempfile::tempdir().unwrap();
        let workspace = Workspace::create().unwrap();
        let original = single_page("Header", 600, 800);
        let mut translated = single_page("Kopf", 600, 800);
        let single = out.path().join("doc_de.en_single.pdf");

        let report = HeaderPatcher::default()
            .patch(&original, &mut translated, &workspace, &single)
            .unwrap();

        assert_eq!(report.target, Rect::new(0.0, 780.0, 600.0, 800.0));
        assert!(single.exists());
        assert!(!workspace.artifact(STRIP_ARTIFACT).exists());

        let patched = PdfDocument::open(&single).unwrap();
        let page = patched.page(0).unwrap();
        let resources = pdf::page_resources(patched.inner(), page.id);
        assert!(resources.has(b"XObject"));
        // The page's own text is still there; the strip lives in a form.
        let text = PageText::extract(patched.inner(), page.id).unwrap();
        assert_eq!(text.runs.len(), 1);
        assert_eq!(text.runs[0].text, "Kopf");
    }

    #[test]
    fn test_strip_clamped_to_short_page() {
        let dir = tempfile::tempdir().unwrap();
        let original = single_page("x", 300, 12);
        let artifact = HeaderPatcher::new(50.0)
            .extract_strip(&original, &dir.path().join("strip.pdf"))
            .unwrap();
        assert_eq!(artifact.source.height(), 12.0);
    }

    #[test]
    fn test_stamp_missing_artifact_fails() {
        let mut translated = single_page("Kopf", 600, 800);
        let artifact = StripArtifact {
            path: PathBuf::from("/nonexistent/strip.pdf"),
            source: Rect::new(0.0, 780.0, 600.0, 800.0),
        };
        assert!(HeaderPatcher::default()
            .stamp_strip(&mut translated, &artifact)
            .is_err());
    }

    /// Every stream of a document, decoded where possible, as one string.
    fn all_streams(doc: &LopdfDocument) -> String {
        doc.objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .map(|s| {
                let data = s.decompressed_content().unwrap_or_else(|_| s.content.clone());
                String::from_utf8_lossy(&data).into_owned()
            })
            .collect()
    }

    #[test]
    fn test_strip_carries_nothing_from_below_it() {
        let dir = tempfile::tempdir().unwrap();
        let original = page_with_content(
            "BT /F1 10 Tf 10 788 Td (Masthead) Tj ET\n\
             BT /F1 10 Tf 50 100 Td (ConfidentialBodyOfOriginal) Tj ET\n\
             q 0.5 g 50 50 300 300 re f Q",
            600,
            800,
        );

        let artifact = HeaderPatcher::default()
            .extract_strip(&original, &dir.path().join("strip.pdf"))
            .unwrap();
        let strip = LopdfDocument::load(&artifact.path).unwrap();
        let streams = all_streams(&strip);
        assert!(streams.contains("(Masthead) Tj"));
        assert!(!streams.contains("ConfidentialBodyOfOriginal"));
        assert!(!streams.contains("50 50 300 300 re"));
    }

    #[test]
    fn test_stamped_strip_stays_in_top_strip() {
        let out = tempfile::tempdir().unwrap();
        let workspace = Workspace::create().unwrap();
        let original = page_with_content(
            "BT /F1 10 Tf 10 788 Td (Masthead) Tj ET\n\
             BT /F1 10 Tf 50 100 Td (ConfidentialBodyOfOriginal) Tj ET",
            600,
            800,
        );
        let mut translated = single_page("Kopf", 600, 800);
        let single = out.path().join("doc_de.en_single.pdf");

        HeaderPatcher::default()
            .patch(&original, &mut translated, &workspace, &single)
            .unwrap();

        let patched = PdfDocument::open(&single).unwrap();
        let page = patched.page(0).unwrap();
        let resources = pdf::page_resources(patched.inner(), page.id);
        let xobjects = resources.get(b"XObject").unwrap();
        let xobjects = pdf::dictionary_owned(patched.inner(), xobjects).unwrap();
        let (name, form) = xobjects.iter().next().unwrap();
        assert!(name.starts_with(b"Hdr"));

        let form = patched
            .inner()
            .get_object(form.as_reference().unwrap())
            .unwrap()
            .as_stream()
            .unwrap();
        let bbox = Rect::from_pdf_array(form.dict.get(b"BBox").unwrap().as_array().unwrap());
        assert_eq!(bbox, Some(Rect::new(0.0, 0.0, 600.0, 20.0)));

        let content = String::from_utf8(pdf::page_content(patched.inner(), page.id).unwrap()).unwrap();
        assert!(content.contains("1 0 0 1 0 780 cm"));

        let streams = all_streams(patched.inner());
        assert!(streams.contains("Masthead"));
        assert!(!streams.contains("ConfidentialBodyOfOriginal"));
    }
}
