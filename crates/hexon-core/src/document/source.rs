//! Loaded input documents

use std::collections::HashSet;

use lopdf::{Document, Object, ObjectId};
use tracing::debug;

use super::clone::{PageSet, SubtreeCopier};
use crate::error::HexonError;

/// Default page size (US Letter) used when no MediaBox can be found
pub const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// Attributes a page may inherit from its ancestors in the page tree
pub(crate) const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// An opened, parsed PDF
///
/// The object table is never mutated after `load`; every operation reads from
/// it and writes into a new document.
#[derive(Debug)]
pub struct SourceDocument {
    doc: Document,
    pages: Vec<ObjectId>,
    tree_nodes: HashSet<ObjectId>,
    byte_len: usize,
}

impl SourceDocument {
    /// Parse PDF bytes into a page-addressable document
    pub fn load(bytes: &[u8]) -> Result<Self, HexonError> {
        if !bytes.starts_with(b"%PDF-") {
            return Err(HexonError::ParseError(
                "Not a valid PDF file (missing %PDF- header)".into(),
            ));
        }

        let doc = Document::load_mem(bytes).map_err(|e| HexonError::ParseError(e.to_string()))?;

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        let tree_nodes = collect_tree_nodes(&doc, &pages);

        debug!(
            version = %doc.version,
            pages = pages.len(),
            bytes = bytes.len(),
            "Loaded PDF"
        );

        Ok(SourceDocument {
            doc,
            pages,
            tree_nodes,
            byte_len: bytes.len(),
        })
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Size of the byte buffer this document was loaded from
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn version(&self) -> &str {
        &self.doc.version
    }

    /// Clone the pages at the given 0-based indices, in the given order
    ///
    /// Repeated indices produce distinct page clones. Objects shared between
    /// the selected pages (fonts, images) are copied once.
    pub fn copy_pages(&self, indices: &[usize]) -> Result<PageSet, HexonError> {
        let page_ids = indices
            .iter()
            .map(|&index| {
                self.pages.get(index).copied().ok_or_else(|| {
                    HexonError::InvalidRange(format!(
                        "Page {} does not exist (document has {} pages)",
                        index + 1,
                        self.pages.len()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        SubtreeCopier::copy_pages(self, &page_ids)
    }

    /// Width and height of the page at a 0-based index, in points
    pub fn page_size(&self, index: usize) -> Option<(f32, f32)> {
        let page_id = *self.pages.get(index)?;
        Some(self.page_dimensions(page_id))
    }

    pub(crate) fn inner(&self) -> &Document {
        &self.doc
    }

    pub(crate) fn page_ids(&self) -> &[ObjectId] {
        &self.pages
    }

    pub(crate) fn is_tree_node(&self, id: ObjectId) -> bool {
        self.tree_nodes.contains(&id)
    }

    /// Look up a page attribute on the page itself or its nearest ancestor
    pub(crate) fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = page_id;
        let mut seen = HashSet::new();
        while seen.insert(current) {
            let dict = self.doc.get_dictionary(current).ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(value);
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
        }
        None
    }

    /// Ids of the indirect annotations a page lists that exist in the document
    pub(crate) fn annotation_ids(&self, page_id: ObjectId) -> Vec<ObjectId> {
        let annots = self
            .doc
            .get_dictionary(page_id)
            .and_then(|page| page.get(b"Annots"))
            .ok()
            .and_then(|annots| self.resolve(annots))
            .and_then(|annots| annots.as_array().ok());
        match annots {
            Some(items) => items
                .iter()
                .filter_map(|item| item.as_reference().ok())
                .filter(|id| self.doc.has_object(*id))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Resolve a direct object or follow one level of indirection
    pub(crate) fn resolve<'a>(&'a self, obj: &'a Object) -> Option<&'a Object> {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).ok(),
            other => Some(other),
        }
    }

    fn media_box_of(&self, obj: Option<&Object>) -> Option<Vec<f32>> {
        let array = self.resolve(obj?)?.as_array().ok()?;
        array
            .iter()
            .map(|v| self.resolve(v).and_then(|v| v.as_float().ok()))
            .collect()
    }

    pub(crate) fn page_dimensions(&self, page_id: ObjectId) -> (f32, f32) {
        match self.media_box_of(self.inherited(page_id, b"MediaBox")) {
            Some(values) => box_size(&values),
            None => DEFAULT_PAGE_SIZE,
        }
    }
}

fn box_size(values: &[f32]) -> (f32, f32) {
    if values.len() != 4 {
        return DEFAULT_PAGE_SIZE;
    }
    ((values[2] - values[0]).abs(), (values[3] - values[1]).abs())
}

/// Every page plus every ancestor node of the page tree
fn collect_tree_nodes(doc: &Document, pages: &[ObjectId]) -> HashSet<ObjectId> {
    let mut nodes = HashSet::new();
    for &page in pages {
        let mut current = page;
        while nodes.insert(current) {
            let parent = doc
                .get_dictionary(current)
                .and_then(|d| d.get(b"Parent"))
                .and_then(Object::as_reference);
            match parent {
                Ok(id) => current = id,
                Err(_) => break,
            }
        }
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{create_test_pdf, TestPdf};

    #[test]
    fn test_load_counts_pages() {
        let pdf = create_test_pdf(4, "Load");
        let doc = SourceDocument::load(&pdf).unwrap();
        assert_eq!(doc.page_count(), 4);
        assert_eq!(doc.byte_len(), pdf.len());
    }

    #[test]
    fn test_load_rejects_missing_header() {
        let err = SourceDocument::load(b"hello world").unwrap_err();
        assert!(matches!(err, HexonError::ParseError(_)));
    }

    #[test]
    fn test_load_rejects_truncated_body() {
        let pdf = create_test_pdf(2, "Trunc");
        let err = SourceDocument::load(&pdf[..pdf.len() / 3]).unwrap_err();
        assert!(matches!(err, HexonError::ParseError(_)));
    }

    #[test]
    fn test_page_size_inherited_from_tree() {
        let pdf = TestPdf::new(2, "Size")
            .inherited_media_box(true)
            .media_box([0, 0, 300, 400])
            .build();
        let doc = SourceDocument::load(&pdf).unwrap();
        assert_eq!(doc.page_size(0), Some((300.0, 400.0)));
        assert_eq!(doc.page_size(1), Some((300.0, 400.0)));
        assert_eq!(doc.page_size(5), None);
    }

    #[test]
    fn test_copy_pages_rejects_out_of_bounds_index() {
        let pdf = create_test_pdf(2, "Oob");
        let doc = SourceDocument::load(&pdf).unwrap();
        let err = doc.copy_pages(&[0, 2]).unwrap_err();
        assert!(matches!(err, HexonError::InvalidRange(_)));
    }
}
