//! Low-level helpers over the lopdf object model.
//!
//! Page attribute inheritance, resource dictionaries, content stream
//! replacement, cross-document object import and page-to-form conversion.

mod clip;
mod form;
mod import;

pub use clip::{clip_page_content, ClippedContent};
pub use form::{content_to_form, draw_form, page_to_form};
pub use import::ObjectImporter;

use chrono::{DateTime, Utc};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::error::{Error, Result};

/// Page-tree depth guard against cyclic `/Parent` chains.
const MAX_TREE_DEPTH: usize = 64;

/// Keys a page may inherit from its ancestors in the page tree.
pub const INHERITABLE_KEYS: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Rotate", b"Resources"];

/// Read a numeric object as `f64`.
pub fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Build a real-valued object, collapsing integral values to integers.
pub fn real(value: f64) -> Object {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    if rounded == rounded.trunc() && rounded.abs() < i64::MAX as f64 {
        Object::Integer(rounded as i64)
    } else {
        Object::Real(rounded as f32)
    }
}

/// Follow references until a direct object is reached.
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    let mut current = obj;
    for _ in 0..MAX_TREE_DEPTH {
        match current {
            Object::Reference(id) => current = doc.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

/// Resolve an object that should be a dictionary and clone it.
pub fn dictionary_owned(doc: &Document, obj: &Object) -> Option<Dictionary> {
    match resolve(doc, obj)? {
        Object::Dictionary(dict) => Some(dict.clone()),
        Object::Stream(stream) => Some(stream.dict.clone()),
        _ => None,
    }
}

/// Look up a page attribute, walking up `/Parent` links when the page itself
/// does not define it.
pub fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return resolve(doc, value);
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Effective resource dictionary of a page (inherited and dereferenced).
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    match inherited(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    }
}

/// Pick a resource name with the given prefix that is not yet used in `dict`.
pub fn unique_name(dict: &Dictionary, prefix: &str) -> String {
    (0..)
        .map(|n| format!("{}{}", prefix, n))
        .find(|name| !dict.has(name.as_bytes()))
        .unwrap_or_else(|| prefix.to_string())
}

/// Register an XObject in a page's own resource dictionary and return its name.
///
/// Inherited or indirect resources are copied onto the page first so other
/// pages sharing them are not affected.
pub fn add_page_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    prefix: &str,
    xobject_id: ObjectId,
) -> Result<String> {
    let mut resources = page_resources(doc, page_id);
    let mut xobjects = resources
        .get(b"XObject")
        .ok()
        .and_then(|obj| dictionary_owned(doc, obj))
        .unwrap_or_else(Dictionary::new);

    let name = unique_name(&xobjects, prefix);
    xobjects.set(name.as_bytes().to_vec(), Object::Reference(xobject_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)?
        .set("Resources", Object::Dictionary(resources));
    Ok(name)
}

/// Object ids of a page's content streams, in drawing order.
pub fn content_stream_ids(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            // An indirect array of stream references.
            Ok(Object::Array(items)) => items
                .iter()
                .filter_map(|o| o.as_reference().ok())
                .collect(),
            _ => vec![*id],
        },
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|o| o.as_reference().ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// Decoded page content, all streams concatenated.
pub fn page_content(doc: &Document, page_id: ObjectId) -> Result<Vec<u8>> {
    let mut content = Vec::new();
    for id in content_stream_ids(doc, page_id) {
        let stream = doc.get_object(id).and_then(Object::as_stream)?;
        if stream.dict.has(b"Filter") {
            let data = stream
                .decompressed_content()
                .map_err(|e| e.to_string())
                .and_then(|data| {
                    // lopdf logs corrupt deflate data and yields nothing
                    if data.is_empty() && !stream.content.is_empty() {
                        Err("filter produced no data".to_string())
                    } else {
                        Ok(data)
                    }
                })
                .map_err(|reason| Error::Content {
                    page: 0,
                    reason: format!("cannot decode stream {} {}: {}", id.0, id.1, reason),
                })?;
            content.extend_from_slice(&data);
        } else {
            content.extend_from_slice(&stream.content);
        }
        content.push(b'\n');
    }
    Ok(content)
}

/// Replace a page's content with a single new stream.
pub fn set_page_content(doc: &mut Document, page_id: ObjectId, content: Vec<u8>) -> Result<()> {
    let stream_id = doc.add_object(Stream::new(Dictionary::new(), content));
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)?
        .set("Contents", Object::Reference(stream_id));
    Ok(())
}

/// Draw `overlay` on top of a page's existing content.
///
/// The existing content is isolated in `q … Q` so a graphics state it leaves
/// behind (an unbalanced `cm`, a clip) cannot leak into the overlay.
pub fn overlay_page_content(doc: &mut Document, page_id: ObjectId, overlay: &[u8]) -> Result<()> {
    let mut close = b"\nQ\n".to_vec();
    close.extend_from_slice(overlay);
    wrap_page_content(doc, page_id, b"q\n".to_vec(), close)
}

/// Surround a page's existing content streams with `prefix` and `suffix`
/// streams, leaving the existing streams untouched.
pub fn wrap_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    prefix: Vec<u8>,
    suffix: Vec<u8>,
) -> Result<()> {
    let existing = content_stream_ids(doc, page_id);
    let open_id = doc.add_object(Stream::new(Dictionary::new(), prefix));
    let close_id = doc.add_object(Stream::new(Dictionary::new(), suffix));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(existing.into_iter().map(Object::Reference));
    contents.push(Object::Reference(close_id));

    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)?
        .set("Contents", Object::Array(contents));
    Ok(())
}

/// Ordered page object ids (index 0 is the first page).
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Object id of the page at a 0-based index.
pub fn page_id_at(doc: &Document, index: usize) -> Result<ObjectId> {
    let ids = page_ids(doc);
    ids.get(index)
        .copied()
        .ok_or(Error::PageOutOfRange(index, ids.len()))
}

/// Create an empty document with a catalog and an empty page tree.
///
/// Returns the document and the id of its `/Pages` node.
pub fn new_document() -> (Document, ObjectId) {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    (doc, pages_id)
}

/// Format a timestamp as a PDF date string (`D:YYYYMMDDHHmmSSZ`).
pub fn pdf_date(time: &DateTime<Utc>) -> String {
    time.format("D:%Y%m%d%H%M%SZ").to_string()
}

/// Record the producer and creation date in the document information dictionary.
pub fn stamp_info(doc: &mut Document, created: &DateTime<Utc>) {
    let info_id = doc.add_object(dictionary! {
        "Producer" => Object::string_literal(format!("pdfmend {}", env!("CARGO_PKG_VERSION"))),
        "CreationDate" => Object::string_literal(pdf_date(created)),
        "ModDate" => Object::string_literal(pdf_date(created)),
    });
    doc.trailer.set("Info", info_id);
}

/// Append a page dictionary to a flat page tree created by [`new_document`].
pub fn push_page(doc: &mut Document, pages_id: ObjectId, mut page: Dictionary) -> Result<ObjectId> {
    page.set("Type", "Page");
    page.set("Parent", pages_id);
    let page_id = doc.add_object(page);

    let pages = doc.get_object_mut(pages_id).and_then(Object::as_dict_mut)?;
    let count = match pages.get_mut(b"Kids") {
        Ok(Object::Array(kids)) => {
            kids.push(Object::Reference(page_id));
            kids.len()
        }
        _ => return Err(Error::MissingObject("page tree /Kids".into())),
    };
    pages.set("Count", count as i64);
    Ok(page_id)
}
