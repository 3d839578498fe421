//! Synthetic PDF fixtures for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use lopdf::{dictionary, Document, Object, Stream};

/// One page of a fixture document.
#[derive(Debug, Clone)]
pub struct PageSpec {
    pub width: i64,
    pub height: i64,
    pub rotate: i64,
    pub crop: Option<[i64; 4]>,
    /// Lines of Helvetica 10pt text at (x, y)
    pub texts: Vec<(i64, i64, String)>,
}

impl PageSpec {
    pub fn new(width: i64, height: i64) -> Self {
        Self {
            width,
            height,
            rotate: 0,
            crop: None,
            texts: Vec::new(),
        }
    }

    pub fn rotated(mut self, degrees: i64) -> Self {
        self.rotate = degrees;
        self
    }

    pub fn cropped(mut self, crop: [i64; 4]) -> Self {
        self.crop = Some(crop);
        self
    }

    pub fn text(mut self, x: i64, y: i64, text: &str) -> Self {
        self.texts.push((x, y, text.to_string()));
        self
    }
}

fn int_array(values: &[i64]) -> Object {
    Object::Array(values.iter().map(|v| Object::Integer(*v)).collect())
}

/// Build a document with the given pages.
pub fn build_pdf(pages: &[PageSpec]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for spec in pages {
        let content: String = spec
            .texts
            .iter()
            .map(|(x, y, text)| format!("BT /F1 10 Tf {} {} Td ({}) Tj ET\n", x, y, text))
            .collect();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => int_array(&[0, 0, spec.width, spec.height]),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
            "Contents" => content_id,
        };
        if spec.rotate != 0 {
            page.set("Rotate", spec.rotate);
        }
        if let Some(crop) = spec.crop {
            page.set("CropBox", int_array(&crop));
        }
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

/// Write a fixture document to `dir/name` and return its path.
pub fn write_pdf(dir: &Path, name: &str, pages: &[PageSpec]) -> PathBuf {
    let path = dir.join(name);
    let mut doc = build_pdf(pages);
    doc.save(&path).unwrap();
    path
}

/// Point the first page's `/Contents` at a dictionary instead of a stream.
pub fn break_first_page_contents(path: &Path) {
    let mut doc = Document::load(path).unwrap();
    let page_id = *doc.get_pages().get(&1).unwrap();
    let bogus = doc.add_object(dictionary! { "Length" => 0 });
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .unwrap()
        .set("Contents", bogus);
    doc.save(path).unwrap();
}

/// Every stream of a saved document, decoded where possible, as one string.
pub fn all_streams(path: &Path) -> String {
    let doc = Document::load(path).unwrap();
    doc.objects
        .values()
        .filter_map(|o| o.as_stream().ok())
        .map(|s| {
            let data = s.decompressed_content().unwrap_or_else(|_| s.content.clone());
            String::from_utf8_lossy(&data).into_owned()
        })
        .collect()
}

/// `count` portrait pages of 600x800, each with one line of body text.
pub fn portrait_pages(count: usize, label: &str) -> Vec<PageSpec> {
    (0..count)
        .map(|i| PageSpec::new(600, 800).text(50, 700, &format!("{} {}", label, i + 1)))
        .collect()
}

/// Sorted file names in a directory.
pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
