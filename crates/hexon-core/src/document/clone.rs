//! Page cloning into an owned object arena
//!
//! A `PageSet` owns deep copies of everything its pages reference. Objects in
//! the arena refer to each other with arena-local ids (`index + 1`, generation
//! 0), so the set carries no link back to the document it was copied from.

use std::collections::HashMap;

use lopdf::{Dictionary, Object, ObjectId, Stream};
use tracing::{trace, warn};

use super::source::{SourceDocument, INHERITABLE_KEYS};
use crate::error::HexonError;

/// A cloned page inside a `PageSet` arena
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClonedPage {
    /// Arena-local id of the page dictionary
    pub id: ObjectId,
    pub width: f32,
    pub height: f32,
}

/// Deep copies of one or more pages and everything they reference
#[derive(Debug, Clone, Default)]
pub struct PageSet {
    objects: Vec<Object>,
    pages: Vec<ClonedPage>,
}

impl PageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pages(&self) -> &[ClonedPage] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Number of arena objects (pages included)
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        arena_index(id).and_then(|i| self.objects.get(i))
    }

    /// Add an object to the arena and return its arena-local id
    pub fn push(&mut self, object: impl Into<Object>) -> ObjectId {
        self.objects.push(object.into());
        (self.objects.len() as u32, 0)
    }

    /// Register an arena object as the next page of the set
    pub fn push_page(&mut self, id: ObjectId, width: f32, height: f32) {
        self.pages.push(ClonedPage { id, width, height });
    }

    pub(crate) fn into_parts(self) -> (Vec<Object>, Vec<ClonedPage>) {
        (self.objects, self.pages)
    }

    fn reserve(&mut self) -> ObjectId {
        self.push(Object::Null)
    }

    fn fill(&mut self, id: ObjectId, object: Object) {
        if let Some(slot) = arena_index(id).and_then(|i| self.objects.get_mut(i)) {
            *slot = object;
        }
    }
}

fn arena_index(id: ObjectId) -> Option<usize> {
    (id.0 as usize).checked_sub(1)
}

/// Copies page subtrees out of a `SourceDocument` into a `PageSet`
///
/// Non-page objects are memoized so that resources shared between pages are
/// copied once per set. Annotations are the exception: every page occurrence
/// gets its own, so that `/P` names the page that lists them.
pub(crate) struct SubtreeCopier<'a> {
    source: &'a SourceDocument,
    set: PageSet,
    copied: HashMap<ObjectId, ObjectId>,
    /// Selected source pages mapped to the clone of their first occurrence
    page_clones: HashMap<ObjectId, ObjectId>,
    /// Annotations of the page currently being copied
    page_annots: HashMap<ObjectId, ObjectId>,
    /// Source id and clone id of the page currently being copied
    current_page: Option<(ObjectId, ObjectId)>,
}

impl<'a> SubtreeCopier<'a> {
    /// Clone the given pages, in order, into a fresh `PageSet`
    ///
    /// Page slots are reserved up front so that links between selected pages
    /// resolve to the clones regardless of order.
    pub(crate) fn copy_pages(
        source: &'a SourceDocument,
        page_ids: &[ObjectId],
    ) -> Result<PageSet, HexonError> {
        let mut copier = SubtreeCopier {
            source,
            set: PageSet::new(),
            copied: HashMap::new(),
            page_clones: HashMap::new(),
            page_annots: HashMap::new(),
            current_page: None,
        };

        let slots: Vec<ObjectId> = page_ids
            .iter()
            .map(|&page_id| {
                let slot = copier.set.reserve();
                copier.page_clones.entry(page_id).or_insert(slot);
                slot
            })
            .collect();

        for (&page_id, &slot) in page_ids.iter().zip(&slots) {
            copier.copy_page(page_id, slot)?;
        }
        Ok(copier.set)
    }

    /// Clone one page dictionary and everything it references into `clone_id`
    fn copy_page(&mut self, page_id: ObjectId, clone_id: ObjectId) -> Result<(), HexonError> {
        let source = self.source;
        let page = source.inner().get_dictionary(page_id).map_err(|e| {
            HexonError::SerializeError(format!("Page {} {} R unreadable: {}", page_id.0, page_id.1, e))
        })?;

        self.current_page = Some((page_id, clone_id));
        self.page_annots.clear();
        let mut annots = Vec::new();
        for annot_id in source.annotation_ids(page_id) {
            if !self.page_annots.contains_key(&annot_id) {
                let slot = self.set.reserve();
                self.page_annots.insert(annot_id, slot);
                annots.push((annot_id, slot));
            }
        }

        let mut dict = Dictionary::new();
        for (key, value) in page.iter() {
            let copy = match key.as_slice() {
                b"Parent" => continue,
                // Inline the list so each occurrence refers to its own annotations
                b"Annots" => match source.resolve(value) {
                    Some(Object::Array(items)) => Object::Array(
                        items
                            .iter()
                            .map(|item| self.copy_value(item))
                            .collect::<Result<_, _>>()?,
                    ),
                    _ => self.copy_value(value)?,
                },
                _ => self.copy_value(value)?,
            };
            dict.set(key.clone(), copy);
        }
        for key in INHERITABLE_KEYS {
            if dict.has(key) {
                continue;
            }
            if let Some(value) = source.inherited(page_id, key) {
                dict.set(key.to_vec(), self.copy_value(value)?);
            }
        }

        for (annot_id, slot) in annots {
            let copy = match self.lookup(annot_id)? {
                Some(object) => self.copy_value(object)?,
                None => Object::Null,
            };
            self.set.fill(slot, copy);
        }

        self.current_page = None;
        self.page_annots.clear();
        self.set.fill(clone_id, Object::Dictionary(dict));

        let (width, height) = source.page_dimensions(page_id);
        self.set.push_page(clone_id, width, height);
        trace!(source = ?page_id, clone = ?clone_id, "Cloned page");

        Ok(())
    }

    fn copy_value(&mut self, value: &Object) -> Result<Object, HexonError> {
        Ok(match value {
            Object::Reference(id) => self.copy_reference(*id)?,
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.copy_value(item))
                    .collect::<Result<_, _>>()?,
            ),
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dict(dict)?),
            Object::Stream(stream) => {
                let mut copy = Stream::new(self.copy_dict(&stream.dict)?, stream.content.clone());
                copy.allows_compression = stream.allows_compression;
                Object::Stream(copy)
            }
            other => other.clone(),
        })
    }

    fn copy_dict(&mut self, dict: &Dictionary) -> Result<Dictionary, HexonError> {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            copy.set(key.clone(), self.copy_value(value)?);
        }
        Ok(copy)
    }

    fn copy_reference(&mut self, id: ObjectId) -> Result<Object, HexonError> {
        if let Some((source_page, clone)) = self.current_page {
            if id == source_page {
                return Ok(Object::Reference(clone));
            }
        }
        if let Some(&mapped) = self.page_annots.get(&id) {
            return Ok(Object::Reference(mapped));
        }
        if let Some(&mapped) = self.page_clones.get(&id) {
            return Ok(Object::Reference(mapped));
        }
        // Unselected pages and Pages nodes must not drag the page tree along
        if self.source.is_tree_node(id) {
            return Ok(Object::Null);
        }
        if let Some(&mapped) = self.copied.get(&id) {
            return Ok(Object::Reference(mapped));
        }

        let Some(object) = self.lookup(id)? else {
            return Ok(Object::Null);
        };

        let clone_id = self.set.reserve();
        self.copied.insert(id, clone_id);
        let copy = self.copy_value(object)?;
        self.set.fill(clone_id, copy);

        Ok(Object::Reference(clone_id))
    }

    /// Resolve a source object; an undefined object reads as `None`
    fn lookup(&self, id: ObjectId) -> Result<Option<&'a Object>, HexonError> {
        let source: &'a SourceDocument = self.source;
        match source.inner().get_object(id) {
            Ok(object) => Ok(Some(object)),
            Err(lopdf::Error::ObjectNotFound) => {
                warn!(object = ?id, "Reference to undefined object copied as null");
                Ok(None)
            }
            Err(e) => Err(HexonError::SerializeError(format!(
                "Unresolvable reference {} {} R: {}",
                id.0, id.1, e
            ))),
        }
    }
}
