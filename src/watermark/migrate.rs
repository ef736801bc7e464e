//! Donor object-graph migration.
//!
//! Everything a donor object reaches through indirect references is
//! relocated into the host table under fresh object numbers, with every
//! reference in the migrated graph rewritten to the new numbering. Donor
//! numbers are assigned in ascending order starting at the host allocator
//! position, so migration is deterministic.

use crate::error::Result;
use crate::object::{Object, ObjectRef};
use crate::xref::XrefTable;
use std::collections::{BTreeSet, HashMap};

/// Migrate `obj` (typically a donor resource dict) from `src` into `dest`.
///
/// `obj` itself is patched in place and not installed; the caller decides
/// where it goes. All objects it transitively references are installed
/// into `dest` under their new numbers.
pub fn migrate_object(src: &XrefTable, dest: &mut XrefTable, obj: &mut Object) -> Result<()> {
    let mut obj_nrs = BTreeSet::new();
    identify_obj_nrs(src, obj, &mut obj_nrs)?;

    // Renumber in ascending donor order, starting at the host allocator.
    let start = dest.size();
    let lookup: HashMap<u32, u32> = obj_nrs
        .iter()
        .enumerate()
        .map(|(i, &nr)| (nr, start + i as u32))
        .collect();

    patch_object(obj, &lookup);

    for &nr in &obj_nrs {
        let mut migrated = src.object(ObjectRef::new(nr, 0))?.clone();
        patch_object(&mut migrated, &lookup);
        dest.set_object(ObjectRef::new(lookup[&nr], 0), migrated);
    }

    Ok(())
}

/// Transitively collect every object number reachable from `obj`.
///
/// The set doubles as the visited guard terminating reference cycles.
fn identify_obj_nrs(src: &XrefTable, obj: &Object, obj_nrs: &mut BTreeSet<u32>) -> Result<()> {
    match obj {
        Object::Reference(r) => {
            if !obj_nrs.insert(r.id) {
                return Ok(());
            }
            let target = src.object(*r)?;
            identify_obj_nrs(src, target, obj_nrs)?;
        },
        Object::Dictionary(d) => {
            for v in d.values() {
                identify_obj_nrs(src, v, obj_nrs)?;
            }
        },
        Object::Stream { dict, .. } => {
            for v in dict.values() {
                identify_obj_nrs(src, v, obj_nrs)?;
            }
        },
        Object::Array(elements) => {
            for v in elements {
                identify_obj_nrs(src, v, obj_nrs)?;
            }
        },
        _ => {},
    }
    Ok(())
}

/// Rewrite every indirect reference in `obj` through the lookup table.
fn patch_object(obj: &mut Object, lookup: &HashMap<u32, u32>) {
    match obj {
        Object::Reference(r) => {
            if let Some(&new) = lookup.get(&r.id) {
                r.id = new;
            }
        },
        Object::Dictionary(d) => {
            for v in d.values_mut() {
                patch_object(v, lookup);
            }
        },
        Object::Stream { dict, .. } => {
            for v in dict.values_mut() {
                patch_object(v, lookup);
            }
        },
        Object::Array(elements) => {
            for v in elements {
                patch_object(v, lookup);
            }
        },
        _ => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Dictionary;

    fn donor_with_chain() -> (XrefTable, Object) {
        // font -> descriptor, resources -> { Font: { F1: font }, depth: [font] }
        let mut src = XrefTable::new();
        let descriptor = src.add_object(Object::Name("descriptor".to_string()));

        let mut font = Dictionary::new();
        font.insert("FontDescriptor".to_string(), Object::Reference(descriptor));
        let font_ref = src.add_object(Object::Dictionary(font));

        let mut fonts = Dictionary::new();
        fonts.insert("F1".to_string(), Object::Reference(font_ref));
        let mut resources = Dictionary::new();
        resources.insert("Font".to_string(), Object::Dictionary(fonts));
        resources.insert(
            "Extra".to_string(),
            Object::Array(vec![Object::Reference(font_ref)]),
        );

        (src, Object::Dictionary(resources))
    }

    #[test]
    fn test_migration_renumbers_from_host_allocator() {
        let (src, mut resources) = donor_with_chain();

        let mut dest = XrefTable::new();
        // Occupy host numbers 1..=3 so migrated objects start at 4.
        for i in 0..3 {
            dest.add_object(Object::Integer(i));
        }

        migrate_object(&src, &mut dest, &mut resources).unwrap();

        // Two donor objects migrated, ascending donor order: 1 -> 4, 2 -> 5.
        assert_eq!(dest.size(), 6);
        let fonts = resources.as_dict().unwrap().get("Font").unwrap().as_dict().unwrap();
        let font_ref = fonts.get("F1").unwrap().as_reference().unwrap();
        assert_eq!(font_ref.id, 5);

        // The migrated font's own reference was rewritten too.
        let font = dest.object(font_ref).unwrap().as_dict().unwrap();
        let descriptor_ref = font.get("FontDescriptor").unwrap().as_reference().unwrap();
        assert_eq!(descriptor_ref.id, 4);
        assert_eq!(
            dest.object(descriptor_ref).unwrap().as_name(),
            Some("descriptor")
        );
    }

    #[test]
    fn test_shared_reference_migrated_once() {
        let (src, mut resources) = donor_with_chain();
        let mut dest = XrefTable::new();

        migrate_object(&src, &mut dest, &mut resources).unwrap();

        // font_ref appears under Font and Extra; both rewrite to the same id.
        let d = resources.as_dict().unwrap();
        let from_fonts = d.get("Font").unwrap().as_dict().unwrap()["F1"]
            .as_reference()
            .unwrap();
        let from_extra = d.get("Extra").unwrap().as_array().unwrap()[0]
            .as_reference()
            .unwrap();
        assert_eq!(from_fonts, from_extra);
    }

    #[test]
    fn test_cycle_terminates() {
        let mut src = XrefTable::new();
        // Two objects referencing each other.
        let a = ObjectRef::new(1, 0);
        let b = ObjectRef::new(2, 0);
        let mut da = Dictionary::new();
        da.insert("Next".to_string(), Object::Reference(b));
        let mut db = Dictionary::new();
        db.insert("Prev".to_string(), Object::Reference(a));
        src.set_object(a, Object::Dictionary(da));
        src.set_object(b, Object::Dictionary(db));

        let mut dest = XrefTable::new();
        let mut obj = Object::Reference(a);
        migrate_object(&src, &mut dest, &mut obj).unwrap();

        assert_eq!(dest.size(), 3);
        let new_a = obj.as_reference().unwrap();
        let next = dest.object(new_a).unwrap().as_dict().unwrap()["Next"]
            .as_reference()
            .unwrap();
        let prev = dest.object(next).unwrap().as_dict().unwrap()["Prev"]
            .as_reference()
            .unwrap();
        assert_eq!(prev, new_a);
    }

    #[test]
    fn test_dangling_reference_errors() {
        let src = XrefTable::new();
        let mut dest = XrefTable::new();
        let mut obj = Object::Reference(ObjectRef::new(9, 0));
        assert!(migrate_object(&src, &mut dest, &mut obj).is_err());
    }
}
