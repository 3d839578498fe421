//! Embedding pages as Form XObjects.

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use super::{inherited, page_content, page_resources, ObjectImporter};
use crate::error::{Error, Result};
use crate::model::{Matrix, Rect};

/// Wrap a page of `src` as a Form XObject inside `dest`.
///
/// The form keeps the page's own coordinate system: its `/BBox` is the page
/// media box, or `clip` when given, which also clips everything drawn outside
/// of it. Resources are deep-copied through `importer`, so vector content and
/// text stay intact in the destination.
pub fn page_to_form(
    src: &Document,
    page_id: ObjectId,
    dest: &mut Document,
    importer: &mut ObjectImporter,
    clip: Option<Rect>,
) -> Result<ObjectId> {
    let media_box = inherited(src, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .and_then(|items| Rect::from_pdf_array(items));
    let bbox = clip
        .or(media_box)
        .ok_or_else(|| Error::MissingObject(format!("MediaBox of page {:?}", page_id)))?;

    let content = page_content(src, page_id)?;
    let resources = page_resources(src, page_id);
    Ok(content_to_form(src, dest, importer, bbox, content, &resources))
}

/// Build a Form XObject in `dest` from content and resources of `src`.
pub fn content_to_form(
    src: &Document,
    dest: &mut Document,
    importer: &mut ObjectImporter,
    bbox: Rect,
    content: Vec<u8>,
    resources: &Dictionary,
) -> ObjectId {
    let resources = importer.import_dictionary(src, dest, resources);
    let form = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "FormType" => 1,
            "BBox" => bbox.to_pdf_array(),
            "Resources" => Object::Dictionary(resources),
        },
        content,
    );
    dest.add_object(form)
}

/// Content-stream snippet drawing a named form with the given placement.
pub fn draw_form(name: &str, placement: &Matrix) -> String {
    format!("q\n{}\n/{} Do\nQ\n", placement.to_cm(), name)
}
