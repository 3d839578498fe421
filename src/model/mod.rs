//! Document model types.
//!
//! A [`PdfDocument`] is an ordered sequence of pages backed by a file path.
//! Page geometry is read with inheritance resolved into [`PageInfo`] and
//! [`GeometrySnapshot`] values; text blocks are computed on demand.

mod document;
mod geometry;
mod page;

pub(crate) use document::{copy_atomically, write_atomically};
pub use document::PdfDocument;
pub use geometry::{fmt_num, GeometrySnapshot, Matrix, Rect, Rotation, GEOMETRY_TOLERANCE};
pub use page::PageInfo;
