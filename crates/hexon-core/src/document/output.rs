//! Output documents and serialization

use std::collections::HashSet;
use std::str::FromStr;

use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::clone::PageSet;
use super::source::SourceDocument;
use crate::error::HexonError;

/// Structural save strategy
///
/// None of the profiles re-encode image or font data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionProfile {
    /// Write objects as they are
    Low,
    /// Flate-compress unfiltered streams and drop unreachable objects
    #[default]
    Medium,
    /// Medium, plus drop thumbnails and private application data,
    /// delete empty streams and renumber objects densely
    High,
}

impl CompressionProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionProfile::Low => "low",
            CompressionProfile::Medium => "medium",
            CompressionProfile::High => "high",
        }
    }
}

impl FromStr for CompressionProfile {
    type Err = HexonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(CompressionProfile::Low),
            "medium" => Ok(CompressionProfile::Medium),
            "high" => Ok(CompressionProfile::High),
            other => Err(HexonError::InvalidRequest(format!(
                "Invalid compression level '{}'. Must be 'low', 'medium', or 'high'",
                other
            ))),
        }
    }
}

enum PageTree {
    /// Flat tree built by this crate: one Pages node, pages appended in order
    Rebuilt { pages_id: ObjectId, kids: Vec<ObjectId> },
    /// Tree taken over unchanged from a source document
    Preserved { page_count: u32 },
}

/// A document under construction
pub struct OutputDocument {
    doc: Document,
    tree: PageTree,
}

impl OutputDocument {
    /// Empty document with a catalog and an empty page tree
    pub fn new(version: &str) -> Self {
        let mut doc = Document::with_version(version);
        let pages_id = doc.new_object_id();

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Kids", Object::Array(vec![]));
        pages.set("Count", Object::Integer(0));
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));

        OutputDocument {
            doc,
            tree: PageTree::Rebuilt {
                pages_id,
                kids: Vec::new(),
            },
        }
    }

    /// Structural copy of a whole source document, catalog included
    ///
    /// References to undefined objects are replaced with null.
    pub fn from_source(source: &SourceDocument) -> Self {
        let mut doc = source.inner().clone();
        let nulled = null_undefined_refs(&mut doc);
        if nulled > 0 {
            warn!(count = nulled, "References to undefined objects replaced with null");
        }
        OutputDocument {
            doc,
            tree: PageTree::Preserved {
                page_count: source.page_ids().len() as u32,
            },
        }
    }

    pub fn page_count(&self) -> u32 {
        match &self.tree {
            PageTree::Rebuilt { kids, .. } => kids.len() as u32,
            PageTree::Preserved { page_count } => *page_count,
        }
    }

    /// Move the pages of a `PageSet` to the end of this document
    ///
    /// Arena ids are shifted past the current highest object id.
    pub fn append(&mut self, set: PageSet) -> Result<(), HexonError> {
        let PageTree::Rebuilt { pages_id, kids } = &mut self.tree else {
            return Err(HexonError::SerializeError(
                "Cannot append pages to a preserved page tree".into(),
            ));
        };

        let offset = self.doc.max_id;
        let (objects, pages) = set.into_parts();
        let count = objects.len() as u32;

        for (index, object) in objects.into_iter().enumerate() {
            let id = (index as u32 + 1 + offset, 0);
            self.doc.objects.insert(id, remap_object_refs(object, offset));
        }
        for page in pages {
            let id = (page.id.0 + offset, page.id.1);
            if let Some(Object::Dictionary(dict)) = self.doc.objects.get_mut(&id) {
                dict.set("Parent", Object::Reference(*pages_id));
            }
            kids.push(id);
        }

        self.doc.max_id = offset + count;
        Ok(())
    }

    /// Write the document out with the given save strategy
    pub fn serialize(mut self, profile: CompressionProfile) -> Result<Vec<u8>, HexonError> {
        if let PageTree::Rebuilt { pages_id, kids } = &self.tree {
            update_page_tree(&mut self.doc, *pages_id, kids)?;
        }

        match profile {
            CompressionProfile::Low => {}
            CompressionProfile::Medium => {
                self.doc.prune_objects();
                self.doc.compress();
            }
            CompressionProfile::High => {
                strip_page_extras(&mut self.doc);
                self.doc.prune_objects();
                self.doc.delete_zero_length_streams();
                self.doc.renumber_objects();
                self.doc.compress();
            }
        }

        check_references(&self.doc)?;

        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| HexonError::SerializeError(format!("Save failed: {}", e)))?;

        debug!(
            profile = profile.as_str(),
            bytes = buffer.len(),
            "Serialized PDF"
        );
        Ok(buffer)
    }
}

/// Shift every reference in an object by a fixed offset
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(dict) => Object::Dictionary(remap_dict(dict, offset)),
        Object::Stream(mut stream) => {
            stream.dict = remap_dict(stream.dict, offset);
            Object::Stream(stream)
        }
        other => other,
    }
}

fn remap_dict(mut dict: Dictionary, offset: u32) -> Dictionary {
    for (_, value) in dict.iter_mut() {
        let taken = std::mem::replace(value, Object::Null);
        *value = remap_object_refs(taken, offset);
    }
    dict
}

/// Write the Kids and Count of the flat page tree
fn update_page_tree(
    doc: &mut Document,
    pages_id: ObjectId,
    kids: &[ObjectId],
) -> Result<(), HexonError> {
    if let Some(Object::Dictionary(ref mut pages_dict)) = doc.objects.get_mut(&pages_id) {
        let refs = kids.iter().map(|&id| Object::Reference(id)).collect();
        pages_dict.set("Kids", Object::Array(refs));
        pages_dict.set("Count", Object::Integer(kids.len() as i64));
        Ok(())
    } else {
        Err(HexonError::SerializeError(
            "Invalid pages dictionary".into(),
        ))
    }
}

/// Remove page thumbnails and private application data
fn strip_page_extras(doc: &mut Document) {
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for id in page_ids {
        if let Ok(dict) = doc.get_dictionary_mut(id) {
            dict.remove(b"Thumb");
            dict.remove(b"PieceInfo");
        }
    }
    let root = doc.trailer.get(b"Root").and_then(Object::as_reference);
    if let Ok(catalog) = root.and_then(|id| doc.get_dictionary_mut(id)) {
        catalog.remove(b"PieceInfo");
    }
}

/// Replace every reference to an object missing from the table with null
fn null_undefined_refs(doc: &mut Document) -> usize {
    let known: HashSet<ObjectId> = doc.objects.keys().copied().collect();
    let mut count = 0;
    for object in doc.objects.values_mut() {
        count += null_missing(object, &known);
    }
    for (_, value) in doc.trailer.iter_mut() {
        count += null_missing(value, &known);
    }
    count
}

fn null_missing(object: &mut Object, known: &HashSet<ObjectId>) -> usize {
    if matches!(*object, Object::Reference(id) if !known.contains(&id)) {
        *object = Object::Null;
        return 1;
    }
    match object {
        Object::Array(items) => items.iter_mut().map(|item| null_missing(item, known)).sum(),
        Object::Dictionary(dict) => dict.iter_mut().map(|(_, v)| null_missing(v, known)).sum(),
        Object::Stream(stream) => stream
            .dict
            .iter_mut()
            .map(|(_, v)| null_missing(v, known))
            .sum(),
        _ => 0,
    }
}

/// Fail if any indirect reference points at an object that is not in the document
fn check_references(doc: &Document) -> Result<(), HexonError> {
    let known: HashSet<ObjectId> = doc.objects.keys().copied().collect();
    let mut pending: Vec<&Object> = doc.objects.values().collect();
    pending.extend(doc.trailer.iter().map(|(_, v)| v));

    while let Some(object) = pending.pop() {
        match object {
            Object::Reference(id) => {
                if !known.contains(id) {
                    return Err(HexonError::SerializeError(format!(
                        "Dangling reference {} {} R",
                        id.0, id.1
                    )));
                }
            }
            Object::Array(items) => pending.extend(items.iter()),
            Object::Dictionary(dict) => pending.extend(dict.iter().map(|(_, v)| v)),
            Object::Stream(stream) => pending.extend(stream.dict.iter().map(|(_, v)| v)),
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{create_test_pdf, page_texts, TestPdf};
    use pretty_assertions::assert_eq;

    fn roundtrip(source: &SourceDocument, indices: &[usize]) -> Document {
        let mut out = OutputDocument::new(source.version());
        out.append(source.copy_pages(indices).unwrap()).unwrap();
        let bytes = out.serialize(CompressionProfile::Medium).unwrap();
        Document::load_mem(&bytes).unwrap()
    }

    #[test]
    fn test_profile_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<CompressionProfile>().unwrap(), CompressionProfile::High);
        assert_eq!(" low ".parse::<CompressionProfile>().unwrap(), CompressionProfile::Low);
        assert!("extreme".parse::<CompressionProfile>().is_err());
    }

    #[test]
    fn test_copy_serialize_load_keeps_order_and_repeats() {
        let source = SourceDocument::load(&create_test_pdf(3, "Src")).unwrap();
        let doc = roundtrip(&source, &[0, 0, 2]);

        assert_eq!(doc.get_pages().len(), 3);
        assert_eq!(
            page_texts(&doc),
            vec!["Src-Page-1", "Src-Page-1", "Src-Page-3"]
        );
    }

    #[test]
    fn test_non_monotonic_order() {
        let source = SourceDocument::load(&create_test_pdf(4, "Rev")).unwrap();
        let doc = roundtrip(&source, &[3, 1, 2, 0]);
        assert_eq!(
            page_texts(&doc),
            vec!["Rev-Page-4", "Rev-Page-2", "Rev-Page-3", "Rev-Page-1"]
        );
    }

    #[test]
    fn test_source_is_unaffected_by_copies() {
        let pdf = create_test_pdf(2, "Keep");
        let source = SourceDocument::load(&pdf).unwrap();
        let before = source.inner().objects.len();
        let _ = roundtrip(&source, &[1, 1, 1]);
        assert_eq!(source.inner().objects.len(), before);
        assert_eq!(source.page_count(), 2);
    }

    #[test]
    fn test_append_two_sets_in_order() {
        let a = SourceDocument::load(&create_test_pdf(2, "A")).unwrap();
        let b = SourceDocument::load(&create_test_pdf(1, "B")).unwrap();

        let mut out = OutputDocument::new("1.7");
        out.append(a.copy_pages(&[0, 1]).unwrap()).unwrap();
        out.append(b.copy_pages(&[0]).unwrap()).unwrap();
        assert_eq!(out.page_count(), 3);

        let doc = Document::load_mem(&out.serialize(CompressionProfile::Low).unwrap()).unwrap();
        assert_eq!(page_texts(&doc), vec!["A-Page-1", "A-Page-2", "B-Page-1"]);
    }

    #[test]
    fn test_empty_document_serializes() {
        let bytes = OutputDocument::new("1.5")
            .serialize(CompressionProfile::Medium)
            .unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 0);
    }

    #[test]
    fn test_from_source_keeps_nested_tree() {
        let pdf = TestPdf::new(5, "Nested").nested_tree(true).build();
        let source = SourceDocument::load(&pdf).unwrap();
        let out = OutputDocument::from_source(&source);
        assert_eq!(out.page_count(), 5);

        let doc = Document::load_mem(&out.serialize(CompressionProfile::High).unwrap()).unwrap();
        assert_eq!(doc.get_pages().len(), 5);
        assert_eq!(page_texts(&doc)[4], "Nested-Page-5");
    }

    #[test]
    fn test_append_to_preserved_tree_fails() {
        let source = SourceDocument::load(&create_test_pdf(1, "P")).unwrap();
        let mut out = OutputDocument::from_source(&source);
        let set = source.copy_pages(&[0]).unwrap();
        assert!(out.append(set).is_err());
    }

    #[test]
    fn test_high_profile_drops_thumbnails() {
        let pdf = TestPdf::new(2, "Thumb").with_thumbnails(true).build();
        let source = SourceDocument::load(&pdf).unwrap();

        let low = OutputDocument::from_source(&source)
            .serialize(CompressionProfile::Low)
            .unwrap();
        let high = OutputDocument::from_source(&source)
            .serialize(CompressionProfile::High)
            .unwrap();

        assert!(high.len() < low.len());
        let doc = Document::load_mem(&high).unwrap();
        for (_, id) in doc.get_pages() {
            assert!(!doc.get_dictionary(id).unwrap().has(b"Thumb"));
        }
    }

    #[test]
    fn test_from_source_nulls_undefined_references() {
        let pdf = TestPdf::new(2, "Stale")
            .stale_info(true)
            .stale_annotation(true)
            .dangling_contents(1)
            .build();
        let source = SourceDocument::load(&pdf).unwrap();

        for profile in [
            CompressionProfile::Low,
            CompressionProfile::Medium,
            CompressionProfile::High,
        ] {
            let bytes = OutputDocument::from_source(&source).serialize(profile).unwrap();
            let doc = Document::load_mem(&bytes).unwrap();
            assert_eq!(doc.get_pages().len(), 2);
            assert_eq!(page_texts(&doc)[0], "Stale-Page-1");
        }
    }

    #[test]
    fn test_reference_outside_document_rejected_on_serialize() {
        let mut set = PageSet::new();
        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Contents", Object::Reference((99, 0)));
        let page_id = set.push(page);
        set.push_page(page_id, 612.0, 792.0);

        let mut out = OutputDocument::new("1.7");
        out.append(set).unwrap();
        let err = out.serialize(CompressionProfile::Low).unwrap_err();
        assert!(matches!(err, HexonError::SerializeError(_)));
    }
}
