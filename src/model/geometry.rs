//! Page geometry: rectangles, rotations and affine matrices in PDF user space.
//!
//! All coordinates here use the PDF convention: origin at the bottom-left,
//! y growing upwards, units in points (1/72 inch).

use lopdf::Object;
use serde::{Deserialize, Serialize};

/// Two boxes closer than this (per edge, in points) are considered equal.
pub const GEOMETRY_TOLERANCE: f64 = 0.01;

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub x0: f64,
    /// Bottom edge
    pub y0: f64,
    /// Right edge
    pub x1: f64,
    /// Top edge
    pub y1: f64,
}

impl Rect {
    /// Create a rectangle, normalizing the corner order.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Rectangle anchored at the origin.
    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// Read a `[x0 y0 x1 y1]` PDF array.
    pub fn from_pdf_array(items: &[Object]) -> Option<Self> {
        if items.len() != 4 {
            return None;
        }
        let mut values = [0.0; 4];
        for (slot, item) in values.iter_mut().zip(items) {
            *slot = crate::pdf::number(item)?;
        }
        Some(Self::new(values[0], values[1], values[2], values[3]))
    }

    /// Write as a `[x0 y0 x1 y1]` PDF array.
    pub fn to_pdf_array(&self) -> Object {
        Object::Array(vec![
            crate::pdf::real(self.x0),
            crate::pdf::real(self.y0),
            crate::pdf::real(self.x1),
            crate::pdf::real(self.y1),
        ])
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    /// Whether the two rectangles share a region of positive area.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Grow each edge outwards by the given margins.
    pub fn expand(&self, dx: f64, dy: f64) -> Rect {
        Rect {
            x0: self.x0 - dx,
            y0: self.y0 - dy,
            x1: self.x1 + dx,
            y1: self.y1 + dy,
        }
    }

    /// Edge-wise equality within [`GEOMETRY_TOLERANCE`].
    pub fn approx_eq(&self, other: &Rect) -> bool {
        (self.x0 - other.x0).abs() <= GEOMETRY_TOLERANCE
            && (self.y0 - other.y0).abs() <= GEOMETRY_TOLERANCE
            && (self.x1 - other.x1).abs() <= GEOMETRY_TOLERANCE
            && (self.y1 - other.y1).abs() <= GEOMETRY_TOLERANCE
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} {} {} {}]",
            fmt_num(self.x0),
            fmt_num(self.y0),
            fmt_num(self.x1),
            fmt_num(self.y1)
        )
    }
}

/// Viewer-applied page rotation, a multiple of 90 degrees clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    /// Map a `/Rotate` value. Values that are not multiples of 90 are rounded
    /// down to the previous quarter turn, as viewers do.
    pub fn from_degrees(degrees: i64) -> Self {
        match degrees.rem_euclid(360) / 90 {
            1 => Rotation::Quarter,
            2 => Rotation::Half,
            3 => Rotation::ThreeQuarter,
            _ => Rotation::None,
        }
    }

    pub fn degrees(&self) -> i64 {
        match self {
            Rotation::None => 0,
            Rotation::Quarter => 90,
            Rotation::Half => 180,
            Rotation::ThreeQuarter => 270,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Rotation::None)
    }
}

/// Media box, crop box and rotation of a page at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometrySnapshot {
    /// Full page canvas
    pub media_box: Rect,
    /// Visible region (equals the media box when the page has none)
    pub crop_box: Rect,
    /// Stored rotation
    pub rotation: Rotation,
}

impl GeometrySnapshot {
    /// Crop box equals media box and no rotation is stored.
    pub fn is_normalized(&self) -> bool {
        self.crop_box.approx_eq(&self.media_box) && self.rotation.is_none()
    }

    /// Unrotated page size (width, height) from the media box.
    pub fn size(&self) -> (f64, f64) {
        (self.media_box.width(), self.media_box.height())
    }
}

/// A PDF transformation matrix `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Read the six operands of a `cm` or `Tm` operator.
    pub fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() != 6 {
            return None;
        }
        let mut v = [0.0; 6];
        for (slot, operand) in v.iter_mut().zip(operands) {
            *slot = crate::pdf::number(operand)?;
        }
        Some(Self::new(v[0], v[1], v[2], v[3], v[4], v[5]))
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Bounding box of a rectangle after transformation.
    pub fn transform_rect(&self, rect: &Rect) -> Rect {
        let corners = [
            self.apply(rect.x0, rect.y0),
            self.apply(rect.x1, rect.y0),
            self.apply(rect.x0, rect.y1),
            self.apply(rect.x1, rect.y1),
        ];
        let mut out = Rect {
            x0: f64::INFINITY,
            y0: f64::INFINITY,
            x1: f64::NEG_INFINITY,
            y1: f64::NEG_INFINITY,
        };
        for (x, y) in corners {
            out.x0 = out.x0.min(x);
            out.y0 = out.y0.min(y);
            out.x1 = out.x1.max(x);
            out.y1 = out.y1.max(y);
        }
        out
    }

    /// Content-stream operator text for this matrix.
    pub fn to_cm(&self) -> String {
        format!(
            "{} {} {} {} {} {} cm",
            fmt_num(self.a),
            fmt_num(self.b),
            fmt_num(self.c),
            fmt_num(self.d),
            fmt_num(self.e),
            fmt_num(self.f)
        )
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Format a number for a content stream: up to four decimals, no trailing zeros.
pub fn fmt_num(value: f64) -> String {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    if rounded == rounded.trunc() {
        format!("{}", rounded as i64)
    } else {
        let s = format!("{:.4}", rounded);
        s.trim_end_matches('0').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_normalizes_corners() {
        let r = Rect::new(10.0, 20.0, 0.0, 5.0);
        assert_eq!(r, Rect::new(0.0, 5.0, 10.0, 20.0));
        assert_eq!(r.width(), 10.0);
        assert_eq!(r.height(), 15.0);
    }

    #[test]
    fn test_rect_intersection_excludes_touching_edges() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&Rect::new(5.0, 5.0, 15.0, 15.0)));
        assert!(!a.intersects(&Rect::new(10.0, 0.0, 20.0, 10.0)));
    }

    #[test]
    fn test_rect_pdf_array() {
        let items = vec![Object::Integer(0), Object::Real(0.5), 612.into(), 792.into()];
        let r = Rect::from_pdf_array(&items).unwrap();
        assert_eq!(r, Rect::new(0.0, 0.5, 612.0, 792.0));
        assert!(Rect::from_pdf_array(&items[..3]).is_none());
    }

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(Rotation::from_degrees(0), Rotation::None);
        assert_eq!(Rotation::from_degrees(90), Rotation::Quarter);
        assert_eq!(Rotation::from_degrees(-90), Rotation::ThreeQuarter);
        assert_eq!(Rotation::from_degrees(450), Rotation::Quarter);
        assert_eq!(Rotation::Half.degrees(), 180);
    }

    #[test]
    fn test_snapshot_normalized() {
        let media = Rect::from_size(600.0, 800.0);
        let snap = GeometrySnapshot {
            media_box: media,
            crop_box: Rect::new(0.0, 0.0, 600.004, 800.0),
            rotation: Rotation::None,
        };
        assert!(snap.is_normalized());

        let rotated = GeometrySnapshot {
            rotation: Rotation::Quarter,
            ..snap
        };
        assert!(!rotated.is_normalized());
    }

    #[test]
    fn test_matrix_multiply_order() {
        let scale = Matrix::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let shift = Matrix::translate(10.0, 0.0);
        // scale first, then shift
        assert_eq!(scale.multiply(&shift).apply(1.0, 1.0), (12.0, 2.0));
        // shift first, then scale
        assert_eq!(shift.multiply(&scale).apply(1.0, 1.0), (22.0, 2.0));
    }

    #[test]
    fn test_quarter_turn_maps_box() {
        // -90 degrees on a 600x800 page with origin (0,0)
        let m = Matrix::new(0.0, -1.0, 1.0, 0.0, 0.0, 600.0);
        let r = m.transform_rect(&Rect::from_size(600.0, 800.0));
        assert!(r.approx_eq(&Rect::from_size(800.0, 600.0)));
    }

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(600.0), "600");
        assert_eq!(fmt_num(1.5), "1.5");
        assert_eq!(fmt_num(-0.25), "-0.25");
        assert_eq!(fmt_num(1.0 / 3.0), "0.3333");
    }
}
