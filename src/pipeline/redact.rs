//! Watermark redaction.

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use serde::Serialize;

use super::options::ErrorMode;
use crate::error::{Error, Result};
use crate::model::{fmt_num, PdfDocument, Rect};
use crate::text::{fold_for_match, PageText, TextBlock};

/// What a redaction pass removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RedactionReport {
    /// Pages examined
    pub pages_scanned: usize,
    /// 0-based indices of pages that had marker text removed
    pub pages_redacted: Vec<usize>,
    /// Number of matching blocks
    pub blocks_removed: usize,
    /// Number of text operations turned into positioning
    pub operations_neutralized: usize,
    /// Pages skipped in lenient mode because their content was unreadable
    pub pages_skipped: Vec<usize>,
}

/// Removes text blocks that contain a marker string.
#[derive(Debug, Clone)]
pub struct WatermarkRedactor {
    marker: String,
    folded: String,
    error_mode: ErrorMode,
}

impl WatermarkRedactor {
    /// Create a redactor for `marker`. An empty or blank marker is rejected.
    pub fn new(marker: &str, error_mode: ErrorMode) -> Result<Self> {
        let folded = fold_for_match(marker);
        if folded.is_empty() {
            return Err(Error::Config("watermark marker is empty".to_string()));
        }
        Ok(Self {
            marker: marker.to_string(),
            folded,
            error_mode,
        })
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Whether a block's text contains the marker, ignoring case, whitespace
    /// and compatibility forms.
    pub fn matches(&self, block: &TextBlock) -> bool {
        fold_for_match(&block.text).contains(&self.folded)
    }

    /// Redact every page of a document in memory.
    pub fn redact(&self, doc: &mut PdfDocument) -> Result<RedactionReport> {
        let mut report = RedactionReport::default();

        for page in doc.pages() {
            report.pages_scanned += 1;
            match self.redact_page(doc, page.index, page.id) {
                Ok(Some((blocks, ops))) => {
                    report.pages_redacted.push(page.index);
                    report.blocks_removed += blocks;
                    report.operations_neutralized += ops;
                }
                Ok(None) => {}
                Err(e @ Error::Content { .. }) if self.error_mode == ErrorMode::Lenient => {
                    log::warn!("Skipping page {}: {}", page.index, e);
                    report.pages_skipped.push(page.index);
                }
                Err(e) => return Err(e),
            }
        }

        log::info!(
            "Redacted {} blocks on {} of {} pages",
            report.blocks_removed,
            report.pages_redacted.len(),
            report.pages_scanned
        );
        Ok(report)
    }

    /// Redact one page. Returns the number of blocks and operations removed,
    /// or `None` when nothing matched and the page was left untouched.
    fn redact_page(
        &self,
        doc: &mut PdfDocument,
        index: usize,
        page_id: lopdf::ObjectId,
    ) -> Result<Option<(usize, usize)>> {
        let with_page = |e: Error| match e {
            Error::Content { reason, .. } => Error::Content {
                page: index,
                reason,
            },
            other => other,
        };

        let text = PageText::extract(doc.inner(), page_id).map_err(with_page)?;
        let matched: Vec<TextBlock> = text
            .blocks()
            .into_iter()
            .filter(|b| self.matches(b))
            .collect();
        if matched.is_empty() {
            return Ok(None);
        }

        let rects: Vec<Rect> = matched.iter().map(|b| b.rect).collect();

        // Operation index -> run that produced it.
        let mut targets = BTreeMap::new();
        for run in matched.iter().flat_map(|b| b.runs.iter()) {
            targets.insert(run.op_index, run.clone());
        }
        for run in &text.runs {
            let (cx, cy) = run.rect.center();
            if rects.iter().any(|r| r.contains_point(cx, cy)) {
                targets.entry(run.op_index).or_insert_with(|| run.clone());
            }
        }

        let mut operations: Vec<Operation> = Vec::with_capacity(text.content.operations.len() + 2);
        operations.push(Operation::new("q", vec![]));
        for (i, op) in text.content.operations.iter().enumerate() {
            match targets.get(&i) {
                Some(run) => operations.extend(run.positioning_ops(op)),
                None => operations.push(op.clone()),
            }
        }
        operations.push(Operation::new("Q", vec![]));

        let mut data = Content { operations }.encode().map_err(|e| Error::Content {
            page: index,
            reason: e.to_string(),
        })?;
        data.extend_from_slice(white_fill(&rects).as_bytes());

        crate::pdf::set_page_content(doc.inner_mut(), page_id, data)?;

        log::debug!(
            "Page {}: removed {} marker blocks ({} operations)",
            index,
            matched.len(),
            targets.len()
        );
        Ok(Some((matched.len(), targets.len())))
    }
}

/// Content snippet painting opaque white rectangles.
fn white_fill(rects: &[Rect]) -> String {
    let mut out = String::from("\nq\n1 g\n");
    for r in rects {
        out.push_str(&format!(
            "{} {} {} {} re\n",
            fmt_num(r.x0),
            fmt_num(r.y0),
            fmt_num(r.width()),
            fmt_num(r.height())
        ));
    }
    out.push_str("f\nQ\n");
    out
}
