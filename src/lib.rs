//! # pdfmend
//!
//! Post-processing for machine-translated PDFs.
//!
//! Given an original PDF and its machine translation, pdfmend repairs the
//! translation and produces two files next to it:
//!
//! - `<stem>_<src>.<dst>_single.pdf`: the translation with page geometry
//!   normalized, the translation service's watermark removed and the
//!   original's header strip restored on the first page.
//! - `<stem>_<src>.<dst>_merged.pdf`: original and translated pages side by
//!   side (or stacked, for landscape documents) with a divider line.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfmend::process_files;
//!
//! fn main() -> pdfmend::Result<()> {
//!     let outcome = process_files("report.pdf", "report_de.en.pdf", "en", "Translated by")?;
//!     println!("Single: {}", outcome.single.display());
//!     println!("Merged: {}", outcome.merged.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Geometry repair**: crop boxes, inherited boxes and rotations flattened
//! - **Watermark redaction**: text blocks found by content-stream interpretation
//! - **Vector output**: pages are embedded as Form XObjects, text stays selectable
//! - **Parallel batches**: many jobs on a Rayon thread pool

pub mod detect;
pub mod error;
pub mod model;
pub mod pdf;
pub mod pipeline;
pub mod text;

// Re-export commonly used types
pub use detect::{check_input, detect_header, is_pdf, PdfHeader};
pub use error::{Error, Result};
pub use model::{GeometrySnapshot, Matrix, PageInfo, PdfDocument, Rect, Rotation};
pub use pipeline::{
    process_batch, ComposeReport, DividerStyle, ErrorMode, HeaderPatcher, Job,
    LanguageResolution, MarkerSource, NormalizeReport, Orchestrator, Orientation, OutputNames,
    Outcome, PageComposer, PageNormalizer, PipelineOptions, RedactionReport, RotationPolicy, Stage,
    WatermarkRedactor,
};
pub use text::{TextBlock, TextRun};

use std::path::Path;

/// Repair a translated PDF and compose it with its original.
///
/// # Arguments
///
/// * `original` - Path to the source-language PDF
/// * `translated` - Path to the machine-translated PDF
/// * `target_lang` - Target language used when the file name carries none
/// * `marker` - Text identifying the watermark block
///
/// # Example
///
/// ```no_run
/// use pdfmend::process_files;
///
/// let outcome = process_files("a.pdf", "a_fr.en.pdf", "en", "Translated by").unwrap();
/// assert!(outcome.merged.exists());
/// ```
pub fn process_files<P, Q>(original: P, translated: Q, target_lang: &str, marker: &str) -> Result<Outcome>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let options = PipelineOptions::new().with_marker(marker);
    process_files_with_options(original, translated, target_lang, options)
}

/// Repair a translated PDF with custom options.
///
/// # Example
///
/// ```no_run
/// use pdfmend::{process_files_with_options, PipelineOptions, RotationPolicy};
///
/// let options = PipelineOptions::new()
///     .with_marker("Translated by")
///     .with_rotation_policy(RotationPolicy::Always)
///     .lenient();
/// let outcome = process_files_with_options("a.pdf", "a_fr.en.pdf", "en", options).unwrap();
/// ```
pub fn process_files_with_options<P, Q>(
    original: P,
    translated: Q,
    target_lang: &str,
    options: PipelineOptions,
) -> Result<Outcome>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let job = Job::new(original.as_ref(), translated.as_ref(), target_lang);
    Orchestrator::new(options).run(&job)
}

/// Open a PDF and report the geometry of every page.
///
/// # Example
///
/// ```no_run
/// let pages = pdfmend::inspect("document.pdf").unwrap();
/// for page in pages {
///     println!("{}: {}x{}", page.index, page.width(), page.height());
/// }
/// ```
pub fn inspect<P: AsRef<Path>>(path: P) -> Result<Vec<PageInfo>> {
    Ok(PdfDocument::open(path)?.pages())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_files_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let result = process_files(
            dir.path().join("a.pdf"),
            dir.path().join("a_fr.en.pdf"),
            "en",
            "wm",
        );
        assert!(matches!(result, Err(Error::InputNotFound(_))));
    }

    #[test]
    fn test_inspect_rejects_non_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"just some text").unwrap();
        assert!(inspect(&path).is_err());
    }
}
