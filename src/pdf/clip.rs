//! Keeping only the part of a page that lands inside a region.
//!
//! A form's `/BBox` clips what is painted but the form still carries every
//! operator and resource of the page. Before a page fragment is embedded
//! elsewhere, operations that paint outside the region are removed and the
//! resources are cut down to what the remaining operations name.

use std::collections::{BTreeMap, BTreeSet};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};

use super::{dictionary_owned, number, page_resources, resolve};
use crate::error::{Error, Result};
use crate::model::{Matrix, Rect};
use crate::text::{PageText, TextRun};

/// Content and resources of a page, reduced to a region.
#[derive(Debug)]
pub struct ClippedContent {
    /// Encoded content stream
    pub content: Vec<u8>,
    /// Page resources restricted to the fonts and XObjects still used
    pub resources: Dictionary,
    /// Painting operations that were dropped or turned into positioning
    pub removed: usize,
}

/// Reduce a page's content to the operations painting inside `region`.
///
/// Text shows outside the region become pure text positioning, so later runs
/// keep their place. Paths are dropped whole when their bounds miss the
/// region, except clipping paths. Images and forms are dropped when their
/// placed bounds miss it. Graphics and text state operators are kept.
pub fn clip_page_content(doc: &Document, page_id: ObjectId, region: &Rect) -> Result<ClippedContent> {
    let text = PageText::extract(doc, page_id)?;
    let runs: BTreeMap<usize, &TextRun> = text.runs.iter().map(|r| (r.op_index, r)).collect();

    let resources = page_resources(doc, page_id);
    let xobjects = sub_dictionary(doc, &resources, b"XObject");

    let mut ctm = Matrix::IDENTITY;
    let mut stack: Vec<Matrix> = Vec::new();
    let mut path = PendingPath::default();

    let mut kept: Vec<Operation> = Vec::with_capacity(text.content.operations.len());
    let mut fonts = BTreeSet::new();
    let mut used_xobjects = BTreeSet::new();
    let mut removed = 0;

    for (index, op) in text.content.operations.iter().enumerate() {
        match op.operator.as_str() {
            "q" => {
                stack.push(ctm);
                kept.push(op.clone());
            }
            "Q" => {
                if let Some(prev) = stack.pop() {
                    ctm = prev;
                }
                kept.push(op.clone());
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(&op.operands) {
                    ctm = m.multiply(&ctm);
                }
                kept.push(op.clone());
            }
            "m" | "l" | "c" | "v" | "y" | "re" | "h" => path.extend(op, &ctm),
            "W" | "W*" => {
                path.clipping = true;
                path.ops.push(op.clone());
            }
            "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" | "n" => {
                path.ops.push(op.clone());
                if path.clipping || path.bounds.is_some_and(|b| b.intersects(region)) {
                    kept.append(&mut path.ops);
                } else {
                    removed += 1;
                }
                path = PendingPath::default();
            }
            "Tf" => {
                if let Some(Object::Name(name)) = op.operands.first() {
                    fonts.insert(name.clone());
                }
                kept.push(op.clone());
            }
            "Tj" | "TJ" | "'" | "\"" => match runs.get(&index) {
                Some(run) if !run.rect.intersects(region) => {
                    kept.extend(run.positioning_ops(op));
                    removed += 1;
                }
                _ => kept.push(op.clone()),
            },
            "Do" => {
                let Some(Object::Name(name)) = op.operands.first() else {
                    continue;
                };
                let placed = xobjects
                    .get(name)
                    .ok()
                    .and_then(|o| resolve(doc, o))
                    .and_then(|o| o.as_stream().ok())
                    .and_then(|s| xobject_bounds(&s.dict, &ctm));
                if placed.is_some_and(|b| b.intersects(region)) {
                    used_xobjects.insert(name.clone());
                    kept.push(op.clone());
                } else {
                    removed += 1;
                }
            }
            _ => kept.push(op.clone()),
        }
    }

    let content = Content { operations: kept }.encode().map_err(|e| Error::Content {
        page: 0,
        reason: e.to_string(),
    })?;

    let font_dict = retain(sub_dictionary(doc, &resources, b"Font"), &fonts);
    let mut resources = resources;
    resources.set("Font", font_dict);
    resources.set("XObject", retain(xobjects, &used_xobjects));

    log::debug!(
        "Page {:?} clipped to {}: {} painting operations removed",
        page_id,
        region,
        removed
    );
    Ok(ClippedContent {
        content,
        resources,
        removed,
    })
}

/// Path construction operators seen since the last painting operator.
#[derive(Default)]
struct PendingPath {
    ops: Vec<Operation>,
    bounds: Option<Rect>,
    clipping: bool,
}

impl PendingPath {
    fn extend(&mut self, op: &Operation, ctm: &Matrix) {
        let nums: Vec<f64> = op.operands.iter().filter_map(number).collect();
        let mut points: Vec<(f64, f64)> = nums.chunks_exact(2).map(|p| (p[0], p[1])).collect();
        if op.operator == "re" && nums.len() == 4 {
            points.push((nums[0] + nums[2], nums[1] + nums[3]));
        }
        for (x, y) in points {
            let (px, py) = ctm.apply(x, y);
            let point = Rect::new(px, py, px, py);
            self.bounds = Some(self.bounds.map_or(point, |b| b.union(&point)));
        }
        self.ops.push(op.clone());
    }
}

/// Page-space bounds of an image or form XObject drawn under `ctm`.
fn xobject_bounds(dict: &Dictionary, ctm: &Matrix) -> Option<Rect> {
    match dict.get(b"Subtype").ok()?.as_name().ok()? {
        b"Image" => Some(ctm.transform_rect(&Rect::new(0.0, 0.0, 1.0, 1.0))),
        b"Form" => {
            let bbox = Rect::from_pdf_array(dict.get(b"BBox").ok()?.as_array().ok()?)?;
            let matrix = dict
                .get(b"Matrix")
                .ok()
                .and_then(|o| o.as_array().ok())
                .and_then(|a| Matrix::from_operands(a))
                .unwrap_or(Matrix::IDENTITY);
            Some(matrix.multiply(ctm).transform_rect(&bbox))
        }
        _ => None,
    }
}

fn sub_dictionary(doc: &Document, resources: &Dictionary, key: &[u8]) -> Dictionary {
    resources
        .get(key)
        .ok()
        .and_then(|o| dictionary_owned(doc, o))
        .unwrap_or_else(Dictionary::new)
}

fn retain(dict: Dictionary, names: &BTreeSet<Vec<u8>>) -> Dictionary {
    dict.into_iter()
        .filter(|(name, _)| names.contains(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::{new_document, push_page};
    use lopdf::{dictionary, Stream};

    const TOP: Rect = Rect {
        x0: 0.0,
        y0: 780.0,
        x1: 600.0,
        y1: 800.0,
    };

    fn page_with(content: &str) -> (Document, ObjectId) {
        let (mut doc, pages_id) = new_document();
        let logo_id = doc.add_object(Stream::new(
            dictionary! { "Type" => "XObject", "Subtype" => "Image", "Width" => 1, "Height" => 1 },
            vec![0],
        ));
        let chart_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
            },
            b"0 0 100 100 re f".to_vec(),
        ));
        let helvetica = dictionary! { "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica" };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        let page_id = push_page(&mut doc, pages_id, dictionary! {
            "MediaBox" => vec![0.into(), 0.into(), 600.into(), 800.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => helvetica.clone(), "F2" => helvetica },
                "XObject" => dictionary! { "Logo" => logo_id, "Chart" => chart_id },
            },
            "Contents" => content_id,
        })
        .unwrap();
        (doc, page_id)
    }

    fn names(dict: &Dictionary, key: &[u8]) -> Vec<String> {
        dict.get(key)
            .unwrap()
            .as_dict()
            .unwrap()
            .iter()
            .map(|(k, _)| String::from_utf8_lossy(k).into_owned())
            .collect()
    }

    #[test]
    fn test_text_outside_region_becomes_positioning() {
        let (doc, page_id) =
            page_with("BT /F1 10 Tf 10 788 Td (Masthead) Tj 0 -688 Td (Secret body) Tj ET");

        let clipped = clip_page_content(&doc, page_id, &TOP).unwrap();
        let content = String::from_utf8(clipped.content).unwrap();
        assert!(content.contains("(Masthead) Tj"));
        assert!(!content.contains("Secret"));
        assert!(content.contains("TJ"));
        assert_eq!(clipped.removed, 1);
        assert_eq!(names(&clipped.resources, b"Font"), vec!["F1"]);
    }

    #[test]
    fn test_paths_and_xobjects_outside_region_are_dropped() {
        let (doc, page_id) = page_with(concat!(
            "q 0 0 1 rg 0 790 600 10 re f Q\n",
            "q 1 0 0 rg 50 50 200 200 re f Q\n",
            "q 0 0 600 800 re W n 40 0 0 15 5 782 cm /Logo Do Q\n",
            "q 1 0 0 1 50 300 cm /Chart Do Q\n",
        ));

        let clipped = clip_page_content(&doc, page_id, &TOP).unwrap();
        let content = String::from_utf8(clipped.content).unwrap();
        assert!(content.contains("0 790 600 10 re"));
        assert!(!content.contains("50 50 200 200 re"));
        assert!(content.contains("W"));
        assert!(content.contains("/Logo Do"));
        assert!(!content.contains("/Chart Do"));
        assert_eq!(clipped.removed, 2);
        assert_eq!(names(&clipped.resources, b"XObject"), vec!["Logo"]);
    }
}
