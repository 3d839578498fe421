//! Copying object graphs between documents.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, ObjectId};

/// Deep-copies objects from one document into another, remapping references.
///
/// Each source object is copied at most once per importer, so shared fonts
/// and images imported for several pages stay shared in the destination and
/// reference cycles terminate. `/Parent` entries are not followed: pulling a
/// page tree in along with a resource is never wanted.
#[derive(Debug, Default)]
pub struct ObjectImporter {
    map: HashMap<ObjectId, ObjectId>,
}

impl ObjectImporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indirect objects copied so far.
    pub fn imported_count(&self) -> usize {
        self.map.len()
    }

    /// Copy a direct object, importing everything it references.
    pub fn import_object(&mut self, src: &Document, dest: &mut Document, obj: &Object) -> Object {
        match obj {
            Object::Reference(id) => Object::Reference(self.import_reference(src, dest, *id)),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.import_object(src, dest, item))
                    .collect(),
            ),
            Object::Dictionary(dict) => Object::Dictionary(self.import_dictionary(src, dest, dict)),
            Object::Stream(stream) => {
                let mut copy = stream.clone();
                copy.dict = self.import_dictionary(src, dest, &stream.dict);
                Object::Stream(copy)
            }
            other => other.clone(),
        }
    }

    /// Copy a dictionary, importing everything it references.
    pub fn import_dictionary(
        &mut self,
        src: &Document,
        dest: &mut Document,
        dict: &Dictionary,
    ) -> Dictionary {
        let mut out = Dictionary::new();
        for (key, value) in dict.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            let copied = self.import_object(src, dest, value);
            out.set(key.clone(), copied);
        }
        out
    }

    /// Copy an indirect object and return its id in the destination.
    pub fn import_reference(&mut self, src: &Document, dest: &mut Document, id: ObjectId) -> ObjectId {
        if let Some(mapped) = self.map.get(&id) {
            return *mapped;
        }

        // Reserve the id before recursing so cycles resolve to it.
        let new_id = dest.new_object_id();
        self.map.insert(id, new_id);

        let copied = match src.get_object(id) {
            Ok(obj) => self.import_object(src, dest, obj),
            Err(_) => {
                log::debug!("Dangling reference {:?} imported as null", id);
                Object::Null
            }
        };
        dest.objects.insert(new_id, copied);
        new_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    #[test]
    fn test_import_shares_repeated_references() {
        let mut src = Document::with_version("1.5");
        let font_id = src.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id, "F2" => font_id },
        };

        let mut dest = Document::with_version("1.5");
        let mut importer = ObjectImporter::new();
        let copied = importer.import_dictionary(&src, &mut dest, &resources);

        let fonts = copied.get(b"Font").unwrap().as_dict().unwrap();
        let f1 = fonts.get(b"F1").unwrap().as_reference().unwrap();
        let f2 = fonts.get(b"F2").unwrap().as_reference().unwrap();
        assert_eq!(f1, f2);
        assert_eq!(importer.imported_count(), 1);
        assert!(dest.get_dictionary(f1).unwrap().has(b"BaseFont"));
    }

    #[test]
    fn test_import_terminates_on_cycles() {
        let mut src = Document::with_version("1.5");
        let a = src.new_object_id();
        let b = src.add_object(dictionary! { "Next" => a });
        src.objects
            .insert(a, Object::Dictionary(dictionary! { "Next" => b }));

        let mut dest = Document::with_version("1.5");
        let mut importer = ObjectImporter::new();
        let new_a = importer.import_reference(&src, &mut dest, a);

        let new_b = dest
            .get_dictionary(new_a)
            .unwrap()
            .get(b"Next")
            .unwrap()
            .as_reference()
            .unwrap();
        let back = dest
            .get_dictionary(new_b)
            .unwrap()
            .get(b"Next")
            .unwrap()
            .as_reference()
            .unwrap();
        assert_eq!(back, new_a);
    }

    #[test]
    fn test_import_skips_parent_and_keeps_stream_bytes() {
        let mut src = Document::with_version("1.5");
        let pages_id = src.add_object(dictionary! { "Type" => "Pages" });
        let stream = Stream::new(dictionary! { "Parent" => pages_id }, b"0 0 m".to_vec());

        let mut dest = Document::with_version("1.5");
        let mut importer = ObjectImporter::new();
        let copied = importer.import_object(&src, &mut dest, &Object::Stream(stream));

        let copied = copied.as_stream().unwrap();
        assert!(!copied.dict.has(b"Parent"));
        assert_eq!(copied.content, b"0 0 m".to_vec());
        assert_eq!(importer.imported_count(), 0);
    }
}
