//! Form XObject synthesis.
//!
//! The form renders the overlay at its local origin: the text, the
//! unit-square image scaled to the bounding box, or the donor page content
//! scaled to the viewport. Placement happens entirely through the
//! page-level `cm`, so the form matrix stays identity.

use crate::error::Result;
use crate::filters;
use crate::fonts;
use crate::object::{name_array, Dictionary, Object, ObjectRef};
use crate::watermark::config::Watermark;
use crate::watermark::placement;
use crate::watermark::{ContentResource, WatermarkCtx};
use crate::xref::XrefTable;
use std::fmt::Write;

/// Build (or fetch from the cache) the form for the current page viewport.
///
/// Computes the bounding box first; identical bounding boxes share one form
/// XObject, so N pages with the same viewport produce a single form.
pub(crate) fn create_form(xref: &mut XrefTable, wm: &Watermark, ctx: &mut WatermarkCtx) -> Result<()> {
    let bb = placement::bounding_box(wm, ctx.vp, ctx.resource.donor_dims());
    ctx.bb = bb.rect;
    ctx.scaled_font_size = bb.scaled_font_size;

    let key = (bb.rect.width().to_bits(), bb.rect.height().to_bits());
    if let Some(&form) = ctx.f_cache.get(&key) {
        ctx.form = Some(form);
        return Ok(());
    }

    let content = form_content(wm, ctx);
    let resources = form_resources(xref, wm, ctx);

    let mut dict = Dictionary::new();
    dict.insert("Type".to_string(), Object::Name("XObject".to_string()));
    dict.insert("Subtype".to_string(), Object::Name("Form".to_string()));
    dict.insert("BBox".to_string(), ctx.bb.to_array());
    dict.insert(
        "Matrix".to_string(),
        Object::Array(vec![
            Object::Integer(1),
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(1),
            Object::Integer(0),
            Object::Integer(0),
        ]),
    );
    dict.insert("OC".to_string(), Object::Reference(ctx.ocg));
    dict.insert("Resources".to_string(), Object::Reference(resources));

    let data = filters::encode_stream(&mut dict, &content)?;
    let form = xref.add_object(Object::Stream { dict, data });

    ctx.f_cache.insert(key, form);
    ctx.form = Some(form);
    Ok(())
}

/// The form's content stream for the active content kind.
fn form_content(wm: &Watermark, ctx: &WatermarkCtx) -> Vec<u8> {
    match &ctx.resource {
        ContentResource::Pdf { content, .. } => {
            let mut b = format!(
                "{:.6} 0 0 {:.6} 0 0 cm ",
                ctx.bb.width() / ctx.vp.width(),
                ctx.bb.height() / ctx.vp.height()
            )
            .into_bytes();
            b.extend_from_slice(content);
            b
        },
        ContentResource::Image { .. } => format!(
            "q {:.6} 0 0 {:.6} 0 0 cm /Im0 Do Q",
            ctx.bb.width(),
            ctx.bb.height()
        )
        .into_bytes(),
        ContentResource::Font(_) => text_content(wm, ctx).into_bytes(),
    }
}

/// Text content: a graphics-state prelude, then one text object per line,
/// emitted in reverse so line 0 paints on top.
fn text_content(wm: &Watermark, ctx: &WatermarkCtx) -> String {
    let mut b = String::new();
    let size = ctx.scaled_font_size;

    write!(
        b,
        "0 g 0 G 0 i 0 J []0 d 0 j 1 w 10 M 0 Tc 0 Tw 100 Tz 0 TL {} Tr 0 Ts ",
        wm.render_mode as i32
    )
    .ok();

    // 12 font points result in a vertical displacement of 9.47.
    let dy = -(size as f64) / 12.0 * 9.47;

    let mut j = 1;
    for line in wm.text_lines.iter().rev() {
        let line_width = fonts::text_width(line, &wm.font_name, size);
        let dx = ctx.bb.width() / 2.0 - line_width / 2.0;
        let ty = dy + (j * size) as f64;

        write!(
            b,
            "BT /{} {} Tf {:.2} {:.2} {:.2} rg {:.2} {:.2} Td ({}) Tj ET ",
            wm.font_name,
            size,
            wm.color.r,
            wm.color.g,
            wm.color.b,
            dx,
            ty,
            escape_string(line)
        )
        .ok();
        j += 1;
    }

    b
}

/// The kind-specific resource dictionary backing the form.
fn form_resources(xref: &mut XrefTable, wm: &Watermark, ctx: &WatermarkCtx) -> ObjectRef {
    match &ctx.resource {
        // The migrated donor resource dict is reused verbatim.
        ContentResource::Pdf { res_dict, .. } => *res_dict,
        ContentResource::Image { xobject, .. } => {
            let mut inner = Dictionary::new();
            inner.insert("Im0".to_string(), Object::Reference(*xobject));
            let mut d = Dictionary::new();
            d.insert("ProcSet".to_string(), name_array(&["PDF", "ImageC"]));
            d.insert("XObject".to_string(), Object::Dictionary(inner));
            xref.add_object(Object::Dictionary(d))
        },
        ContentResource::Font(font) => {
            let mut inner = Dictionary::new();
            inner.insert(wm.font_name.clone(), Object::Reference(*font));
            let mut d = Dictionary::new();
            d.insert("Font".to_string(), Object::Dictionary(inner));
            d.insert("ProcSet".to_string(), name_array(&["PDF", "Text"]));
            xref.add_object(Object::Dictionary(d))
        },
    }
}

/// Escape parentheses and backslashes for a literal string operand.
fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out
}
