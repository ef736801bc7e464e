//! Page patching: resource-name allocation and content-stream insertion.
//!
//! Each patched page gets the overlay painted through an artifact envelope
//! referencing a graphics state (`GSn`) and the form (`Fmn`) under the
//! page's effective resource dictionary. Content-stream object numbers are
//! tracked so shared streams are patched at most once per run.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::filters;
use crate::object::{Dictionary, Object, ObjectRef};
use crate::watermark::config::Watermark;
use crate::watermark::{form, placement, remove, WatermarkCtx};
use crate::xref::{ResourceLocation, XrefTable};

/// Apply the watermark to one page.
pub(crate) fn add_page_watermark(
    doc: &mut Document,
    page_nr: usize,
    wm: &Watermark,
    ctx: &mut WatermarkCtx,
) -> Result<()> {
    log::debug!("add_page_watermark page:{}", page_nr);

    if wm.update {
        log::debug!("updating");
        remove::remove_page_watermark(&mut doc.xref, page_nr)?;
    }

    let (page_ref, attrs) = doc.xref.page_dict(page_nr)?;
    ctx.vp = attrs
        .viewport()
        .ok_or_else(|| Error::InvalidPdf(format!("page {}: no media box", page_nr)))?;
    ctx.page_rot = attrs.rotate;

    form::create_form(&mut doc.xref, wm, ctx)?;
    log::debug!("\n{}", wm);

    let (gs_id, xo_id) = match attrs.resources {
        None => {
            insert_page_resources(&mut doc.xref, page_ref, ctx)?;
            ("GS0".to_string(), "Fm0".to_string())
        },
        Some(loc) => update_page_resources(&mut doc.xref, loc, ctx)?,
    };

    let contents = doc.xref.object(page_ref)?.expect_dict()?.get("Contents").cloned();
    match contents {
        None => insert_page_contents(&mut doc.xref, page_ref, wm, ctx, &gs_id, &xo_id),
        Some(obj) => update_page_contents(&mut doc.xref, page_ref, obj, wm, ctx, &gs_id, &xo_id),
    }
}

/// The page-level wrapping content painting the form within the artifact
/// envelope the remover searches for.
pub(crate) fn wm_content(wm: &Watermark, ctx: &WatermarkCtx, gs_id: &str, xo_id: &str) -> Vec<u8> {
    let m = placement::transform_matrix(wm, ctx.vp, ctx.bb, ctx.page_rot);

    format!(
        " /Artifact <</Subtype /Watermark /Type /Pagination >>BDC q {:.2} {:.2} {:.2} {:.2} {:.2} {:.2} cm /{} gs /{} Do Q EMC ",
        m[0][0], m[0][1], m[1][0], m[1][1], m[2][0], m[2][1], gs_id, xo_id
    )
    .into_bytes()
}

/// A page without inherited resources gets a fresh `Resources` dict with
/// the default GS0/Fm0 names.
fn insert_page_resources(xref: &mut XrefTable, page_ref: ObjectRef, ctx: &WatermarkCtx) -> Result<()> {
    let form = required_form(ctx)?;

    let mut ext_g_state = Dictionary::new();
    ext_g_state.insert("GS0".to_string(), Object::Reference(ctx.ext_g_state));
    let mut xobject = Dictionary::new();
    xobject.insert("Fm0".to_string(), Object::Reference(form));

    let mut resources = Dictionary::new();
    resources.insert("ExtGState".to_string(), Object::Dictionary(ext_g_state));
    resources.insert("XObject".to_string(), Object::Dictionary(xobject));

    xref.object_mut(page_ref)?
        .as_dict_mut()
        .ok_or_else(|| Error::InvalidPdf("page is not a dictionary".to_string()))?
        .insert("Resources".to_string(), Object::Dictionary(resources));

    Ok(())
}

/// Register the graphics state and the form under the first unused
/// `GSn`/`Fmn` names of the effective resource dictionary.
fn update_page_resources(
    xref: &mut XrefTable,
    loc: ResourceLocation,
    ctx: &WatermarkCtx,
) -> Result<(String, String)> {
    let form = required_form(ctx)?;
    let gs_id = insert_resource_entry(xref, loc, "ExtGState", "GS", ctx.ext_g_state)?;
    let xo_id = insert_resource_entry(xref, loc, "XObject", "Fm", form)?;
    Ok((gs_id, xo_id))
}

enum SubdictPlan {
    /// No category subdict yet.
    Create,
    /// Inline subdict; insert under the given free name.
    Inline(String),
    /// Indirect subdict behind the given reference.
    Indirect(ObjectRef, String),
}

fn insert_resource_entry(
    xref: &mut XrefTable,
    loc: ResourceLocation,
    category: &str,
    prefix: &str,
    value: ObjectRef,
) -> Result<String> {
    let plan = {
        let res = xref.resources_dict(loc)?;
        match res.get(category) {
            None => SubdictPlan::Create,
            Some(o) => match o.as_reference() {
                Some(r) => {
                    let d = xref.object(r)?.expect_dict()?;
                    SubdictPlan::Indirect(r, free_name(d, prefix))
                },
                None => SubdictPlan::Inline(free_name(o.expect_dict()?, prefix)),
            },
        }
    };

    match plan {
        SubdictPlan::Create => {
            let name = format!("{}0", prefix);
            let mut sub = Dictionary::new();
            sub.insert(name.clone(), Object::Reference(value));
            xref.resources_dict_mut(loc)?
                .insert(category.to_string(), Object::Dictionary(sub));
            Ok(name)
        },
        SubdictPlan::Inline(name) => {
            xref.resources_dict_mut(loc)?
                .get_mut(category)
                .and_then(|o| o.as_dict_mut())
                .ok_or(Error::CorruptResourceDict)?
                .insert(name.clone(), Object::Reference(value));
            Ok(name)
        },
        SubdictPlan::Indirect(r, name) => {
            xref.object_mut(r)?
                .as_dict_mut()
                .ok_or(Error::CorruptResourceDict)?
                .insert(name.clone(), Object::Reference(value));
            Ok(name)
        },
    }
}

/// First unused `<prefix>n` with n in [0, 1000).
fn free_name(d: &Dictionary, prefix: &str) -> String {
    for i in 0..1000 {
        let name = format!("{}{}", prefix, i);
        if !d.contains_key(&name) {
            return name;
        }
    }
    format!("{}999", prefix)
}

fn required_form(ctx: &WatermarkCtx) -> Result<ObjectRef> {
    ctx.form
        .ok_or_else(|| Error::InvalidPdf("no form created for page".to_string()))
}

/// A page without contents gets a new stream holding just the wrapping
/// content.
fn insert_page_contents(
    xref: &mut XrefTable,
    page_ref: ObjectRef,
    wm: &Watermark,
    ctx: &mut WatermarkCtx,
    gs_id: &str,
    xo_id: &str,
) -> Result<()> {
    let mut dict = Dictionary::new();
    let data = filters::encode_stream(&mut dict, &wm_content(wm, ctx, gs_id, xo_id))?;
    let ir = xref.add_object(Object::Stream { dict, data });

    xref.object_mut(page_ref)?
        .as_dict_mut()
        .ok_or_else(|| Error::InvalidPdf("page is not a dictionary".to_string()))?
        .insert("Contents".to_string(), Object::Reference(ir));

    Ok(())
}

/// Attach the wrapping content to existing page contents.
fn update_page_contents(
    xref: &mut XrefTable,
    page_ref: ObjectRef,
    contents: Object,
    wm: &Watermark,
    ctx: &mut WatermarkCtx,
    gs_id: &str,
    xo_id: &str,
) -> Result<()> {
    match contents {
        Object::Reference(r) => match xref.object(r)?.clone() {
            Object::Stream { mut dict, data } => {
                if ctx.objs.contains(&r.id) {
                    // Already applied to this (shared) content stream.
                    return Ok(());
                }
                if let Some(patched) = patch_content(&mut dict, &data, wm, ctx, gs_id, xo_id, true)? {
                    xref.set_object(r, Object::Stream { dict, data: patched });
                }
                ctx.objs.insert(r.id);
                Ok(())
            },
            Object::Array(elements) => {
                patch_content_array(xref, &elements, wm, ctx, gs_id, xo_id)
            },
            other => Err(Error::InvalidObjectType {
                expected: "Stream or Array".to_string(),
                found: other.type_name().to_string(),
            }),
        },
        Object::Array(elements) => patch_content_array(xref, &elements, wm, ctx, gs_id, xo_id),
        Object::Stream { mut dict, data } => {
            // Contents stored directly in the page dict.
            if let Some(patched) = patch_content(&mut dict, &data, wm, ctx, gs_id, xo_id, true)? {
                xref.object_mut(page_ref)?
                    .as_dict_mut()
                    .ok_or_else(|| Error::InvalidPdf("page is not a dictionary".to_string()))?
                    .insert("Contents".to_string(), Object::Stream { dict, data: patched });
            }
            Ok(())
        },
        other => Err(Error::InvalidObjectType {
            expected: "Stream or Array".to_string(),
            found: other.type_name().to_string(),
        }),
    }
}

/// Patch a content-stream array.
///
/// A watermark goes before the first stream. A stamp wraps the existing
/// content in `q … Q` across the first and last streams and appends the
/// wrapping content after the last.
fn patch_content_array(
    xref: &mut XrefTable,
    elements: &[Object],
    wm: &Watermark,
    ctx: &mut WatermarkCtx,
    gs_id: &str,
    xo_id: &str,
) -> Result<()> {
    let first = elements
        .first()
        .and_then(|o| o.as_reference())
        .ok_or_else(|| Error::InvalidPdf("content array element is not a reference".to_string()))?;

    if elements.len() == 1 || !wm.on_top {
        if ctx.objs.contains(&first.id) {
            return Ok(());
        }
        return patch_stream_ref(xref, first, wm, ctx, gs_id, xo_id, true);
    }

    if !ctx.objs.contains(&first.id) {
        patch_first_stream_ref(xref, first)?;
        ctx.objs.insert(first.id);
    }

    let last = elements
        .last()
        .and_then(|o| o.as_reference())
        .ok_or_else(|| Error::InvalidPdf("content array element is not a reference".to_string()))?;
    if ctx.objs.contains(&last.id) {
        return Ok(());
    }
    patch_stream_ref(xref, last, wm, ctx, gs_id, xo_id, false)
}

/// Patch the stream behind `r` and mark it applied.
fn patch_stream_ref(
    xref: &mut XrefTable,
    r: ObjectRef,
    wm: &Watermark,
    ctx: &mut WatermarkCtx,
    gs_id: &str,
    xo_id: &str,
    save_g_state: bool,
) -> Result<()> {
    match xref.object(r)?.clone() {
        Object::Stream { mut dict, data } => {
            if let Some(patched) =
                patch_content(&mut dict, &data, wm, ctx, gs_id, xo_id, save_g_state)?
            {
                xref.set_object(r, Object::Stream { dict, data: patched });
            }
            ctx.objs.insert(r.id);
            Ok(())
        },
        other => Err(Error::InvalidObjectType {
            expected: "Stream".to_string(),
            found: other.type_name().to_string(),
        }),
    }
}

/// Decode, wrap, and re-encode one content stream.
///
/// Returns None when the stream uses an unsupported filter; the page is
/// left untouched in that case.
fn patch_content(
    dict: &mut Dictionary,
    data: &[u8],
    wm: &Watermark,
    ctx: &WatermarkCtx,
    gs_id: &str,
    xo_id: &str,
    save_g_state: bool,
) -> Result<Option<bytes::Bytes>> {
    let mut content = match filters::decode_stream(dict, data) {
        Ok(c) => c,
        Err(Error::UnsupportedFilter(_)) => {
            log::info!("unsupported filter: unable to patch content with watermark.");
            return Ok(None);
        },
        Err(e) => return Err(e),
    };

    let wm_bytes = wm_content(wm, ctx, gs_id, xo_id);

    if wm.on_top {
        if save_g_state {
            let mut wrapped = b"q ".to_vec();
            wrapped.extend_from_slice(&content);
            content = wrapped;
        }
        content.extend_from_slice(b" Q");
        content.extend_from_slice(&wm_bytes);
    } else {
        let mut prefixed = wm_bytes;
        prefixed.extend_from_slice(&content);
        content = prefixed;
    }

    Ok(Some(filters::encode_stream(dict, &content)?))
}

/// `q ` prefix for the first stream of a stamped content array.
fn patch_first_stream_ref(xref: &mut XrefTable, r: ObjectRef) -> Result<()> {
    match xref.object(r)?.clone() {
        Object::Stream { mut dict, data } => {
            let content = match filters::decode_stream(&dict, &data) {
                Ok(c) => c,
                Err(Error::UnsupportedFilter(_)) => {
                    log::info!("unsupported filter: unable to patch content with watermark.");
                    return Ok(());
                },
                Err(e) => return Err(e),
            };
            let mut wrapped = b"q ".to_vec();
            wrapped.extend_from_slice(&content);
            let encoded = filters::encode_stream(&mut dict, &wrapped)?;
            xref.set_object(r, Object::Stream { dict, data: encoded });
            Ok(())
        },
        other => Err(Error::InvalidObjectType {
            expected: "Stream".to_string(),
            found: other.type_name().to_string(),
        }),
    }
}
