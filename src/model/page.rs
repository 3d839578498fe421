//! Page-level types.

use super::{GeometrySnapshot, Rect, Rotation};
use lopdf::{Document as LopdfDocument, ObjectId};
use serde::{Deserialize, Serialize};

/// A page of a [`PdfDocument`](super::PdfDocument) and its geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    /// Page index (0-based)
    pub index: usize,

    /// Object id of the page dictionary
    #[serde(skip)]
    pub id: ObjectId,

    /// Media box, crop box and rotation, with inheritance resolved
    pub geometry: GeometrySnapshot,
}

impl PageInfo {
    /// Read the effective geometry of a page.
    ///
    /// A missing media box falls back to US Letter; a missing crop box equals
    /// the media box; a missing rotation is 0.
    pub fn read(doc: &LopdfDocument, index: usize, id: ObjectId) -> Self {
        let read_box = |key: &[u8]| {
            crate::pdf::inherited(doc, id, key)
                .and_then(|obj| obj.as_array().ok())
                .and_then(|items| Rect::from_pdf_array(items))
        };

        let media_box = read_box(b"MediaBox").unwrap_or_else(|| Rect::from_size(612.0, 792.0));
        let crop_box = read_box(b"CropBox").unwrap_or(media_box);
        let rotation = crate::pdf::inherited(doc, id, b"Rotate")
            .and_then(crate::pdf::number)
            .map(|deg| Rotation::from_degrees(deg as i64))
            .unwrap_or_default();

        Self {
            index,
            id,
            geometry: GeometrySnapshot {
                media_box,
                crop_box,
                rotation,
            },
        }
    }

    /// Page width in points (unrotated media box).
    pub fn width(&self) -> f64 {
        self.geometry.media_box.width()
    }

    /// Page height in points (unrotated media box).
    pub fn height(&self) -> f64 {
        self.geometry.media_box.height()
    }

    /// Get page dimensions as (width, height) tuple.
    pub fn dimensions(&self) -> (f64, f64) {
        self.geometry.size()
    }

    /// Portrait means strictly taller than wide.
    pub fn is_portrait(&self) -> bool {
        self.width() < self.height()
    }

    /// Crop box differs from media box, or a rotation is stored.
    pub fn is_problematic(&self) -> bool {
        !self.geometry.is_normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::{new_document, push_page};
    use lopdf::{dictionary, Object};

    #[test]
    fn test_read_defaults() {
        let (mut doc, pages_id) = new_document();
        let id = push_page(&mut doc, pages_id, dictionary! {}).unwrap();

        let page = PageInfo::read(&doc, 0, id);
        assert_eq!(page.dimensions(), (612.0, 792.0));
        assert!(page.is_portrait());
        assert!(!page.is_problematic());
    }

    #[test]
    fn test_read_crop_and_rotation() {
        let (mut doc, pages_id) = new_document();
        let id = push_page(&mut doc, pages_id, dictionary! {
            "MediaBox" => vec![0.into(), 0.into(), 800.into(), 600.into()],
            "CropBox" => vec![Object::Real(10.0), 10.into(), 790.into(), 590.into()],
            "Rotate" => 270,
        })
        .unwrap();

        let page = PageInfo::read(&doc, 0, id);
        assert!(!page.is_portrait());
        assert!(page.is_problematic());
        assert_eq!(page.geometry.rotation, Rotation::ThreeQuarter);
        assert_eq!(page.geometry.crop_box, Rect::new(10.0, 10.0, 790.0, 590.0));
    }
}
