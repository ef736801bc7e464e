//! Watermark removal.
//!
//! Removal is textual: content streams are decoded and scanned for the
//! exact artifact envelope the patcher emits. Each excised segment also
//! names the graphics-state and form resources it used, which are then
//! dropped from the page's resource dictionary and freed.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::filters;
use crate::object::{Dictionary, Object, ObjectRef};
use crate::xref::{ResourceLocation, XrefTable};
use std::collections::HashSet;

/// The envelope opener; removal depends on the exact byte sequence.
const MARKER_BDC: &[u8] = b"/Artifact <</Subtype /Watermark /Type /Pagination >>BDC";
const MARKER_EMC: &[u8] = b"EMC";

/// Remove watermarks from all selected pages (1-based).
pub(crate) fn remove_watermarks(doc: &mut Document, selected: &HashSet<usize>) -> Result<()> {
    log::debug!("remove_watermarks");

    ensure_overlay_ocg(&doc.xref)?;

    let mut pages: Vec<usize> = selected.iter().copied().collect();
    pages.sort_unstable();

    let mut removed_something = false;
    for page in pages {
        if remove_page_watermark(&mut doc.xref, page)? {
            removed_something = true;
        }
    }

    if !removed_something {
        return Err(Error::NoWatermarksFound);
    }
    Ok(())
}

/// The catalog must advertise an overlay OCG named "Background" or
/// "Watermark"; a document without that signal has nothing to remove.
fn ensure_overlay_ocg(xref: &XrefTable) -> Result<()> {
    let catalog = xref.catalog()?;
    let oc_props = catalog.get("OCProperties").ok_or(Error::NoWatermarksFound)?;
    let d = xref.resolve_dict(oc_props)?;
    let ocgs = d.get("OCGs").ok_or(Error::NoWatermarksFound)?;
    let a = xref
        .resolve_array(ocgs)
        .map_err(|_| Error::CorruptResourceDict)?;

    for o in a {
        let d = match xref.resolve(o)? {
            Object::Null => continue,
            other => other.expect_dict()?,
        };
        if d.get("Type").and_then(|o| o.as_name()) != Some("OCG") {
            continue;
        }
        match d.get("Name").and_then(|o| o.as_string()) {
            Some(b"Background") | Some(b"Watermark") => return Ok(()),
            _ => continue,
        }
    }

    Err(Error::NoWatermarksFound)
}

/// Remove any overlay from one page. Returns whether something was excised.
pub(crate) fn remove_page_watermark(xref: &mut XrefTable, page_nr: usize) -> Result<bool> {
    let (page_ref, attrs) = xref.page_dict(page_nr)?;
    let res_loc = attrs
        .resources
        .ok_or_else(|| Error::InvalidPdf(format!("page {}: no resource dict found", page_nr)))?;
    let contents = xref
        .object(page_ref)?
        .expect_dict()?
        .get("Contents")
        .cloned()
        .ok_or_else(|| Error::InvalidPdf(format!("page {}: no page watermark found", page_nr)))?;

    let targets = content_stream_targets(xref, &contents)?;

    let mut found = false;
    let mut gs_ids = Vec::new();
    let mut xo_ids = Vec::new();

    for r in targets {
        if let Object::Stream { mut dict, data } = xref.object(r)?.clone() {
            if let Some((patched, gs, xo)) = remove_artifacts(&mut dict, &data)? {
                xref.set_object(r, Object::Stream { dict, data: patched });
                gs_ids.extend(gs);
                xo_ids.extend(xo);
                found = true;
            }
        }
    }

    if !found {
        return Ok(false);
    }

    remove_resource_entries(xref, res_loc, "ExtGState", &gs_ids, page_nr)?;
    remove_resource_entries(xref, res_loc, "XObject", &xo_ids, page_nr)?;
    Ok(true)
}

/// The streams worth scanning: a single content stream, or the first and
/// last of a content array (watermarks sit at the beginning, stamps at the
/// end).
fn content_stream_targets(xref: &XrefTable, contents: &Object) -> Result<Vec<ObjectRef>> {
    let element_refs = |elements: &[Object]| -> Result<Vec<ObjectRef>> {
        let mut targets = Vec::new();
        if let Some(first) = elements.first().and_then(|o| o.as_reference()) {
            targets.push(first);
        }
        if elements.len() > 1 {
            if let Some(last) = elements.last().and_then(|o| o.as_reference()) {
                targets.push(last);
            }
        }
        Ok(targets)
    };

    match contents {
        Object::Reference(r) => match xref.object(*r)? {
            Object::Stream { .. } => Ok(vec![*r]),
            Object::Array(elements) => element_refs(elements),
            other => Err(Error::InvalidObjectType {
                expected: "Stream or Array".to_string(),
                found: other.type_name().to_string(),
            }),
        },
        Object::Array(elements) => element_refs(elements),
        // A stream stored directly in the page dict carries no object
        // number to rewrite; nothing to scan.
        Object::Stream { .. } => Ok(Vec::new()),
        other => Err(Error::InvalidObjectType {
            expected: "Stream or Array".to_string(),
            found: other.type_name().to_string(),
        }),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Excise every artifact envelope from one content stream.
///
/// Returns the re-encoded data plus the graphics-state and form names the
/// excised segments referenced, or None when nothing matched (including
/// streams behind unsupported filters, which are skipped).
fn remove_artifacts(
    dict: &mut Dictionary,
    data: &[u8],
) -> Result<Option<(bytes::Bytes, Vec<String>, Vec<String>)>> {
    let mut content = match filters::decode_stream(dict, data) {
        Ok(c) => c,
        Err(Error::UnsupportedFilter(_)) => {
            log::info!("unsupported filter: unable to remove watermark from content.");
            return Ok(None);
        },
        Err(e) => return Err(e),
    };

    let mut ext_g_states = Vec::new();
    let mut forms = Vec::new();
    let mut patched = false;

    loop {
        let Some(beg) = find(&content, MARKER_BDC) else {
            break;
        };
        let Some(end) = find(&content[beg..], MARKER_EMC) else {
            break;
        };

        let segment = content[beg..beg + end].to_vec();
        if let Some(name) = resource_name_in(&segment, b"/GS", b" gs") {
            ext_g_states.push(format!("GS{}", name));
        }
        if let Some(name) = resource_name_in(&segment, b"/Fm", b" Do") {
            forms.push(format!("Fm{}", name));
        }

        content.drain(beg..beg + end + MARKER_EMC.len());
        patched = true;
    }

    if !patched {
        return Ok(None);
    }

    let encoded = filters::encode_stream(dict, &content)?;
    Ok(Some((encoded, ext_g_states, forms)))
}

/// Extract the resource number between `open` (e.g. `/GS`) and `close`
/// (e.g. ` gs`) inside an excised segment.
fn resource_name_in(segment: &[u8], open: &[u8], close: &[u8]) -> Option<String> {
    let i = find(segment, open)?;
    let j = i + open.len();
    let k = find(&segment[j..], close)?;
    if k == 0 {
        return None;
    }
    Some(String::from_utf8_lossy(&segment[j..j + k]).into_owned())
}

/// Drop the collected names from a resource subdict, freeing the objects
/// they referenced; an emptied subdict is removed entirely.
fn remove_resource_entries(
    xref: &mut XrefTable,
    loc: ResourceLocation,
    category: &str,
    ids: &[String],
    page_nr: usize,
) -> Result<()> {
    let corrupt = || Error::InvalidPdf(format!("page {}: corrupt resource dict", page_nr));

    let (subdict_ref, mut subdict) = {
        let res = xref.resources_dict(loc)?;
        let entry = res.get(category).ok_or_else(corrupt)?;
        match entry.as_reference() {
            Some(r) => (Some(r), xref.object(r)?.expect_dict()?.clone()),
            None => (None, entry.expect_dict()?.clone()),
        }
    };

    let mut freed = Vec::new();
    for id in ids {
        if let Some(value) = subdict.remove(id) {
            freed.push(value);
        }
    }
    for value in &freed {
        xref.delete_object(value);
    }

    if subdict.is_empty() {
        xref.resources_dict_mut(loc)?.remove(category);
        return Ok(());
    }

    match subdict_ref {
        Some(r) => xref.set_object(r, Object::Dictionary(subdict)),
        None => {
            xref.resources_dict_mut(loc)?
                .insert(category.to_string(), Object::Dictionary(subdict));
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_artifacts_excises_envelope() {
        let mut dict = Dictionary::new();
        let content = b"0 0 m 5 5 l S /Artifact <</Subtype /Watermark /Type /Pagination >>BDC q 1.00 0.00 0.00 1.00 50.00 50.00 cm /GS0 gs /Fm0 Do Q EMC ";

        let (patched, gs, xo) = remove_artifacts(&mut dict, content).unwrap().unwrap();
        let text = filters::decode_stream(&dict, &patched).unwrap();
        assert_eq!(text, b"0 0 m 5 5 l S  ");
        assert_eq!(gs, vec!["GS0"]);
        assert_eq!(xo, vec!["Fm0"]);
    }

    #[test]
    fn test_remove_artifacts_multiple_envelopes() {
        let mut dict = Dictionary::new();
        let envelope = |gs: &str, fm: &str| {
            format!(
                "/Artifact <</Subtype /Watermark /Type /Pagination >>BDC q cm /{} gs /{} Do Q EMC",
                gs, fm
            )
        };
        let content = format!("A {} B {} C", envelope("GS1", "Fm1"), envelope("GS2", "Fm2"));

        let (patched, gs, xo) = remove_artifacts(&mut dict, content.as_bytes()).unwrap().unwrap();
        let text = filters::decode_stream(&dict, &patched).unwrap();
        assert_eq!(text, b"A  B  C");
        assert_eq!(gs, vec!["GS1", "GS2"]);
        assert_eq!(xo, vec!["Fm1", "Fm2"]);
    }

    #[test]
    fn test_remove_artifacts_none_present() {
        let mut dict = Dictionary::new();
        assert!(remove_artifacts(&mut dict, b"plain content").unwrap().is_none());
    }

    #[test]
    fn test_remove_artifacts_skips_unsupported_filter() {
        let mut dict = Dictionary::new();
        dict.insert("Filter".to_string(), Object::Name("CCITTFaxDecode".to_string()));
        assert!(remove_artifacts(&mut dict, b"data").unwrap().is_none());
    }

    #[test]
    fn test_unmatched_marker_without_emc_is_ignored() {
        let mut dict = Dictionary::new();
        let content = b"A /Artifact <</Subtype /Watermark /Type /Pagination >>BDC dangling";
        assert!(remove_artifacts(&mut dict, content).unwrap().is_none());
    }

    #[test]
    fn test_resource_name_extraction() {
        let segment = b"q 1 0 0 1 0 0 cm /GS12 gs /Fm7 Do Q ";
        assert_eq!(resource_name_in(segment, b"/GS", b" gs"), Some("12".to_string()));
        assert_eq!(resource_name_in(segment, b"/Fm", b" Do"), Some("7".to_string()));
        assert_eq!(resource_name_in(b"no names here", b"/GS", b" gs"), None);
    }

    #[test]
    fn test_remove_resource_entries_cleans_empty_subdict() {
        let mut xref = XrefTable::new();
        let gs_obj = xref.add_object(Object::Dictionary(Dictionary::new()));

        let mut sub = Dictionary::new();
        sub.insert("GS0".to_string(), Object::Reference(gs_obj));
        let mut resources = Dictionary::new();
        resources.insert("ExtGState".to_string(), Object::Dictionary(sub));
        let res_ref = xref.add_object(Object::Dictionary(resources));
        let loc = ResourceLocation::Indirect(res_ref);

        remove_resource_entries(&mut xref, loc, "ExtGState", &["GS0".to_string()], 1).unwrap();

        // Entry gone, subdict gone, referenced object freed.
        assert!(!xref.resources_dict(loc).unwrap().contains_key("ExtGState"));
        assert!(xref.object(gs_obj).is_err());
    }

    #[test]
    fn test_remove_resource_entries_keeps_other_entries() {
        let mut xref = XrefTable::new();
        let gs0 = xref.add_object(Object::Dictionary(Dictionary::new()));
        let gs1 = xref.add_object(Object::Dictionary(Dictionary::new()));

        let mut sub = Dictionary::new();
        sub.insert("GS0".to_string(), Object::Reference(gs0));
        sub.insert("GS1".to_string(), Object::Reference(gs1));
        let mut resources = Dictionary::new();
        resources.insert("ExtGState".to_string(), Object::Dictionary(sub));
        let res_ref = xref.add_object(Object::Dictionary(resources));
        let loc = ResourceLocation::Indirect(res_ref);

        remove_resource_entries(&mut xref, loc, "ExtGState", &["GS0".to_string()], 1).unwrap();

        let res = xref.resources_dict(loc).unwrap();
        let sub = res.get("ExtGState").unwrap().as_dict().unwrap();
        assert!(!sub.contains_key("GS0"));
        assert!(sub.contains_key("GS1"));
        assert!(xref.object(gs1).is_ok());
    }

    #[test]
    fn test_missing_category_is_corrupt() {
        let mut xref = XrefTable::new();
        let res_ref = xref.add_object(Object::Dictionary(Dictionary::new()));
        let loc = ResourceLocation::Indirect(res_ref);

        let result = remove_resource_entries(&mut xref, loc, "ExtGState", &["GS0".to_string()], 3);
        assert!(matches!(result, Err(Error::InvalidPdf(msg)) if msg.contains("corrupt resource dict")));
    }
}
