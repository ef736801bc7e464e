//! Object table: numbered indirect objects plus the page-tree walk.
//!
//! The table owns every materialized object of a document and hands out
//! fresh object numbers from a monotonically increasing allocator. All
//! watermarking operations run against this table.

use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::object::{Dictionary, Object, ObjectRef};
use std::collections::HashMap;

/// A single object-table entry.
#[derive(Debug, Clone)]
pub struct XrefEntry {
    /// The materialized object.
    pub object: Object,
    /// Generation number of the entry.
    pub generation: u16,
}

/// Where a page's effective `Resources` dictionary lives.
///
/// Pages may inherit resources from an ancestor node, and the entry may be
/// inline or indirect; mutation has to happen wherever the dict actually
/// resides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLocation {
    /// The `Resources` entry is a reference to this object.
    Indirect(ObjectRef),
    /// The node with this reference holds a direct `Resources` dict.
    Inline(ObjectRef),
}

/// Inheritable page attributes accumulated while walking the page tree
/// (ISO 32000-1, 7.7.3.4): `Resources`, `MediaBox`, `CropBox`, `Rotate`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InheritedPageAttrs {
    /// Effective media box.
    pub media_box: Option<Rect>,
    /// Effective crop box.
    pub crop_box: Option<Rect>,
    /// Effective page rotation in degrees.
    pub rotate: f64,
    /// Location of the effective resource dictionary, if any.
    pub resources: Option<ResourceLocation>,
}

impl InheritedPageAttrs {
    /// The visible page region: crop box if defined, else media box.
    pub fn viewport(&self) -> Option<Rect> {
        self.crop_box.or(self.media_box)
    }
}

/// Object table with dereferencing and new-object allocation.
#[derive(Debug, Clone, Default)]
pub struct XrefTable {
    entries: HashMap<u32, XrefEntry>,
    size: u32,
    root: Option<ObjectRef>,
}

impl XrefTable {
    /// Create an empty table. Object number 0 is reserved, so allocation
    /// starts at 1.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            size: 1,
            root: None,
        }
    }

    /// The allocator position: the next object number to be handed out.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Set the document catalog reference (trailer `Root`).
    pub fn set_root(&mut self, root: ObjectRef) {
        self.root = Some(root);
    }

    /// The document catalog reference, if set.
    pub fn root(&self) -> Option<ObjectRef> {
        self.root
    }

    /// Look up an object by reference.
    pub fn object(&self, r: ObjectRef) -> Result<&Object> {
        self.entries
            .get(&r.id)
            .map(|e| &e.object)
            .ok_or(Error::ObjectNotFound(r.id, r.gen))
    }

    /// Look up an object by reference, mutably.
    pub fn object_mut(&mut self, r: ObjectRef) -> Result<&mut Object> {
        self.entries
            .get_mut(&r.id)
            .map(|e| &mut e.object)
            .ok_or(Error::ObjectNotFound(r.id, r.gen))
    }

    /// Whether the table has an entry for this object number.
    pub fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    /// Follow references until a direct object is reached.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> Result<&'a Object> {
        let mut current = obj;
        // Chains of references are rare but legal; guard against cycles.
        for _ in 0..32 {
            match current {
                Object::Reference(r) => current = self.object(*r)?,
                _ => return Ok(current),
            }
        }
        Err(Error::InvalidPdf("reference chain too deep".to_string()))
    }

    /// Resolve to a dictionary (stream dicts qualify).
    pub fn resolve_dict<'a>(&'a self, obj: &'a Object) -> Result<&'a Dictionary> {
        self.resolve(obj)?.expect_dict()
    }

    /// Resolve to an array.
    pub fn resolve_array<'a>(&'a self, obj: &'a Object) -> Result<&'a Vec<Object>> {
        self.resolve(obj)?.expect_array()
    }

    /// Allocate the next object number for `obj` and return its reference.
    pub fn add_object(&mut self, obj: Object) -> ObjectRef {
        let id = self.size;
        self.size += 1;
        self.entries.insert(id, XrefEntry { object: obj, generation: 0 });
        ObjectRef::new(id, 0)
    }

    /// Install `obj` under an explicit object number, advancing the
    /// allocator past it if needed.
    pub fn set_object(&mut self, r: ObjectRef, obj: Object) {
        self.entries.insert(r.id, XrefEntry { object: obj, generation: r.gen });
        if r.id >= self.size {
            self.size = r.id + 1;
        }
    }

    /// Free the table slot behind a reference. Direct objects are a no-op.
    pub fn delete_object(&mut self, obj: &Object) {
        if let Some(r) = obj.as_reference() {
            self.entries.remove(&r.id);
        }
    }

    /// The document catalog dictionary.
    pub fn catalog(&self) -> Result<&Dictionary> {
        let root = self.root.ok_or_else(|| Error::InvalidPdf("no document catalog".to_string()))?;
        self.object(root)?.expect_dict()
    }

    /// The document catalog dictionary, mutably.
    pub fn catalog_mut(&mut self) -> Result<&mut Dictionary> {
        let root = self.root.ok_or_else(|| Error::InvalidPdf("no document catalog".to_string()))?;
        self.object_mut(root)?
            .as_dict_mut()
            .ok_or_else(|| Error::InvalidPdf("catalog is not a dictionary".to_string()))
    }

    /// Locate the 1-based page `page_nr`, returning its reference and the
    /// inherited attributes in effect for it.
    pub fn page_dict(&self, page_nr: usize) -> Result<(ObjectRef, InheritedPageAttrs)> {
        let catalog = self.catalog()?;
        let pages_ref = catalog
            .get("Pages")
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::InvalidPdf("catalog has no Pages reference".to_string()))?;

        let mut seen = 0usize;
        self.walk_page_tree(pages_ref, page_nr, &mut seen, InheritedPageAttrs::default())?
            .ok_or(Error::UnknownPage(page_nr))
    }

    fn walk_page_tree(
        &self,
        node_ref: ObjectRef,
        target: usize,
        seen: &mut usize,
        mut attrs: InheritedPageAttrs,
    ) -> Result<Option<(ObjectRef, InheritedPageAttrs)>> {
        let node = self.object(node_ref)?.expect_dict()?;

        if let Some(o) = node.get("MediaBox") {
            attrs.media_box = Rect::from_array(self.resolve_array(o)?);
        }
        if let Some(o) = node.get("CropBox") {
            attrs.crop_box = Rect::from_array(self.resolve_array(o)?);
        }
        if let Some(o) = node.get("Rotate") {
            if let Some(r) = self.resolve(o)?.as_number() {
                attrs.rotate = r;
            }
        }
        if let Some(o) = node.get("Resources") {
            attrs.resources = Some(match o.as_reference() {
                Some(r) => ResourceLocation::Indirect(r),
                None => ResourceLocation::Inline(node_ref),
            });
        }

        match node.get("Type").and_then(|o| o.as_name()) {
            Some("Page") => {
                *seen += 1;
                if *seen == target {
                    return Ok(Some((node_ref, attrs)));
                }
                Ok(None)
            },
            _ => {
                let kids = match node.get("Kids") {
                    Some(k) => self.resolve_array(k)?,
                    None => return Ok(None),
                };
                for kid in kids {
                    let kid_ref = kid.as_reference().ok_or_else(|| {
                        Error::InvalidPdf("page tree kid is not a reference".to_string())
                    })?;
                    if let Some(found) = self.walk_page_tree(kid_ref, target, seen, attrs)? {
                        return Ok(Some(found));
                    }
                }
                Ok(None)
            },
        }
    }

    /// The resource dictionary at `loc`.
    pub fn resources_dict(&self, loc: ResourceLocation) -> Result<&Dictionary> {
        match loc {
            ResourceLocation::Indirect(r) => self.object(r)?.expect_dict(),
            ResourceLocation::Inline(holder) => self
                .object(holder)?
                .expect_dict()?
                .get("Resources")
                .ok_or(Error::CorruptResourceDict)?
                .expect_dict(),
        }
    }

    /// The resource dictionary at `loc`, mutably.
    pub fn resources_dict_mut(&mut self, loc: ResourceLocation) -> Result<&mut Dictionary> {
        let target = match loc {
            ResourceLocation::Indirect(r) => self.object_mut(r)?,
            ResourceLocation::Inline(holder) => self
                .object_mut(holder)?
                .as_dict_mut()
                .ok_or(Error::CorruptResourceDict)?
                .get_mut("Resources")
                .ok_or(Error::CorruptResourceDict)?,
        };
        target.as_dict_mut().ok_or(Error::CorruptResourceDict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(entries: Vec<(&str, Object)>) -> Object {
        Object::Dictionary(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    /// Build a two-page document: catalog -> pages -> [page1, page2], with
    /// MediaBox and Resources on the pages node so both are inherited.
    fn two_page_doc() -> (XrefTable, ObjectRef, ObjectRef) {
        let mut xref = XrefTable::new();

        let res = xref.add_object(dict(vec![(
            "Font",
            dict(vec![("F1", Object::Name("Helvetica".to_string()))]),
        )]));
        let page1 = xref.add_object(dict(vec![("Type", Object::Name("Page".to_string()))]));
        let page2 = xref.add_object(dict(vec![
            ("Type", Object::Name("Page".to_string())),
            ("Rotate", Object::Integer(90)),
        ]));
        let pages = xref.add_object(dict(vec![
            ("Type", Object::Name("Pages".to_string())),
            ("Count", Object::Integer(2)),
            (
                "Kids",
                Object::Array(vec![Object::Reference(page1), Object::Reference(page2)]),
            ),
            (
                "MediaBox",
                Rect::new(0.0, 0.0, 612.0, 792.0).to_array(),
            ),
            ("Resources", Object::Reference(res)),
        ]));
        let catalog = xref.add_object(dict(vec![
            ("Type", Object::Name("Catalog".to_string())),
            ("Pages", Object::Reference(pages)),
        ]));
        xref.set_root(catalog);
        (xref, page1, page2)
    }

    #[test]
    fn test_add_and_resolve() {
        let mut xref = XrefTable::new();
        let r = xref.add_object(Object::Integer(7));
        assert_eq!(r.id, 1);
        assert_eq!(xref.size(), 2);

        let obj = Object::Reference(r);
        assert_eq!(xref.resolve(&obj).unwrap().as_integer(), Some(7));
        // Direct objects resolve to themselves.
        assert_eq!(xref.resolve(&Object::Integer(3)).unwrap().as_integer(), Some(3));
    }

    #[test]
    fn test_object_not_found() {
        let xref = XrefTable::new();
        match xref.object(ObjectRef::new(5, 0)) {
            Err(Error::ObjectNotFound(5, 0)) => {},
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_delete_object() {
        let mut xref = XrefTable::new();
        let r = xref.add_object(Object::Integer(1));
        xref.delete_object(&Object::Reference(r));
        assert!(xref.object(r).is_err());
        // The allocator never reuses a freed number.
        assert_eq!(xref.add_object(Object::Integer(2)).id, 2);
    }

    #[test]
    fn test_page_dict_inheritance() {
        let (xref, page1, page2) = two_page_doc();

        let (r1, attrs1) = xref.page_dict(1).unwrap();
        assert_eq!(r1, page1);
        let vp = attrs1.viewport().unwrap();
        assert_eq!(vp.width(), 612.0);
        assert_eq!(attrs1.rotate, 0.0);
        assert!(matches!(attrs1.resources, Some(ResourceLocation::Indirect(_))));

        let (r2, attrs2) = xref.page_dict(2).unwrap();
        assert_eq!(r2, page2);
        assert_eq!(attrs2.rotate, 90.0);
    }

    #[test]
    fn test_page_dict_out_of_range() {
        let (xref, _, _) = two_page_doc();
        match xref.page_dict(3) {
            Err(Error::UnknownPage(3)) => {},
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_resources_dict_mut_through_location() {
        let (mut xref, _, _) = two_page_doc();
        let (_, attrs) = xref.page_dict(1).unwrap();
        let loc = attrs.resources.unwrap();

        xref.resources_dict_mut(loc)
            .unwrap()
            .insert("ExtGState".to_string(), Object::Dictionary(Dictionary::new()));
        assert!(xref.resources_dict(loc).unwrap().contains_key("ExtGState"));
    }
}
