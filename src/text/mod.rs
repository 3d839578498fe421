//! Positioned text extraction.
//!
//! Text is located by interpreting a page's content stream: every
//! text-showing operation becomes a [`TextRun`] with its page-space bounding
//! box, and nearby runs are grouped into [`TextBlock`]s. Runs keep the index
//! of the operation that produced them so callers can rewrite exactly those
//! operations.

mod blocks;
mod cmap;
mod font;
mod interpreter;

pub use blocks::{group_runs, TextBlock};
pub use cmap::ToUnicodeMap;
pub use font::{FontMetrics, FontSet};
pub use interpreter::{ShowOp, TextInterpreter, TextRun};

use lopdf::content::Content;
use lopdf::{Document, ObjectId};
use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};

/// Decoded content of one page together with its text runs.
#[derive(Debug)]
pub struct PageText {
    /// The page's content, all streams concatenated and decoded
    pub content: Content,
    /// Text runs in content order
    pub runs: Vec<TextRun>,
}

impl PageText {
    /// Decode a page's content and locate its text.
    ///
    /// Content that cannot be decoded is reported as [`Error::Content`] with
    /// page index 0; callers that know the index replace it.
    pub fn extract(doc: &Document, page_id: ObjectId) -> Result<Self> {
        let data = crate::pdf::page_content(doc, page_id).map_err(|e| match e {
            Error::Content { .. } => e,
            other => Error::Content {
                page: 0,
                reason: other.to_string(),
            },
        })?;
        let content = Content::decode(&data).map_err(|e| Error::Content {
            page: 0,
            reason: e.to_string(),
        })?;

        let resources = crate::pdf::page_resources(doc, page_id);
        let fonts = FontSet::from_resources(doc, &resources);
        let runs = TextInterpreter::new(&fonts).run(&content);

        log::debug!(
            "Page {:?}: {} operations, {} fonts, {} text runs",
            page_id,
            content.operations.len(),
            fonts.len(),
            runs.len()
        );

        Ok(Self { content, runs })
    }

    /// Group the runs into blocks.
    pub fn blocks(&self) -> Vec<TextBlock> {
        group_runs(&self.runs)
    }
}

/// Fold text for marker matching: NFKC, lowercase, no whitespace.
pub fn fold_for_match(text: &str) -> String {
    text.nfkc()
        .flat_map(char::to_lowercase)
        .filter(|c| !c.is_whitespace())
        .collect()
}
