//! Watermarking and stamping engine.
//!
//! [`add_watermarks`] composes a text, image, or PDF-page overlay onto the
//! selected pages of a document. The overlay is painted as a Form XObject
//! behind (watermark) or in front of (stamp) the page content, wrapped in a
//! marked-content artifact envelope and associated with an optional-content
//! group so viewers can toggle it and [`remove_watermarks`] can find and
//! excise it again.

pub mod config;
pub(crate) mod placement;

mod form;
mod migrate;
mod patch;
mod remove;

pub use config::{Anchor, Color, Diagonal, RenderMode, Watermark};
pub use migrate::migrate_object;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::filters;
use crate::geometry::Rect;
use crate::images;
use crate::object::{name_array, Dictionary, Object, ObjectRef};
use crate::xref::XrefTable;
use std::collections::{HashMap, HashSet};

/// The document objects backing one content kind.
#[derive(Debug, Clone)]
pub(crate) enum ContentResource {
    /// Base font dictionary for text overlays.
    Font(ObjectRef),
    /// Image XObject plus pixel dimensions.
    Image {
        xobject: ObjectRef,
        width: i32,
        height: i32,
    },
    /// Migrated donor resource dict, raw donor content, page dimensions.
    Pdf {
        res_dict: ObjectRef,
        content: Vec<u8>,
        width: i32,
        height: i32,
    },
}

impl ContentResource {
    /// Donor dimensions for image and PDF content, None for text.
    fn donor_dims(&self) -> Option<(i32, i32)> {
        match self {
            ContentResource::Font(_) => None,
            ContentResource::Image { width, height, .. } => Some((*width, *height)),
            ContentResource::Pdf { width, height, .. } => Some((*width, *height)),
        }
    }
}

/// Mutable per-run state accumulated while processing pages.
///
/// One context serves one `add_watermarks` invocation; the engine is
/// single-threaded and non-reentrant per context.
pub(crate) struct WatermarkCtx {
    /// The optional-content group the overlay belongs to.
    pub ocg: ObjectRef,
    /// Shared opacity graphics state.
    pub ext_g_state: ObjectRef,
    /// Content-kind resources created once per run.
    pub resource: ContentResource,
    /// Current page viewport.
    pub vp: Rect,
    /// Current overlay bounding box.
    pub bb: Rect,
    /// Current page rotation.
    pub page_rot: f64,
    /// Font size in effect for the current page.
    pub scaled_font_size: i32,
    /// Form XObject for the current bounding box.
    pub form: Option<ObjectRef>,
    /// Content-stream object numbers already patched in this run.
    pub objs: HashSet<u32>,
    /// Form cache keyed by bounding-box dimensions.
    pub f_cache: HashMap<(u64, u64), ObjectRef>,
}

impl WatermarkCtx {
    fn new(ocg: ObjectRef, ext_g_state: ObjectRef, resource: ContentResource) -> Self {
        Self {
            ocg,
            ext_g_state,
            resource,
            vp: Rect::for_dim(0.0, 0.0),
            bb: Rect::for_dim(0.0, 0.0),
            page_rot: 0.0,
            scaled_font_size: 0,
            form: None,
            objs: HashSet::new(),
            f_cache: HashMap::new(),
        }
    }
}

/// Add the watermark or stamp to all selected pages (1-based).
///
/// Document-level optional-content properties and the per-overlay resources
/// are created once, then the selected pages are patched in ascending
/// order. On error the document is left partially modified and should be
/// discarded.
pub fn add_watermarks(doc: &mut Document, selected: &HashSet<usize>, wm: &Watermark) -> Result<()> {
    log::debug!("add_watermarks:\n{}", wm);

    let ocg = prepare_oc_properties(&mut doc.xref, wm)?;
    let resource = create_content_resource(&mut doc.xref, wm)?;
    let ext_g_state = create_ext_g_state(&mut doc.xref, wm);
    let mut ctx = WatermarkCtx::new(ocg, ext_g_state, resource);

    let mut pages: Vec<usize> = selected.iter().copied().collect();
    pages.sort_unstable();
    for page in pages {
        patch::add_page_watermark(doc, page, wm, &mut ctx)?;
    }

    // Optional content needs PDF 1.5.
    doc.ensure_version(5);

    Ok(())
}

/// Remove watermarks and stamps from all selected pages (1-based).
///
/// Fails with [`Error::NoWatermarksFound`] when the document does not
/// advertise an overlay OCG or no selected page yields an excision.
pub fn remove_watermarks(doc: &mut Document, selected: &HashSet<usize>) -> Result<()> {
    remove::remove_watermarks(doc, selected)
}

/// Make sure the catalog has `OCProperties`, returning the overlay's OCG.
///
/// An existing `OCGs` array is reused (first entry); otherwise a fresh OCG
/// is allocated and `OCProperties` is populated with View/Print/Export
/// intents all ON.
fn prepare_oc_properties(xref: &mut XrefTable, wm: &Watermark) -> Result<ObjectRef> {
    if let Some(o) = xref.catalog()?.get("OCProperties").cloned() {
        let d = xref.resolve_dict(&o)?;
        if let Some(ocgs) = d.get("OCGs") {
            let a = xref.resolve_array(ocgs).map_err(|_| Error::CorruptResourceDict)?;
            return a
                .first()
                .and_then(|o| o.as_reference())
                .ok_or(Error::CorruptResourceDict);
        }
    }

    let ocg = create_ocg(xref, wm);

    let intent = |event: &str| {
        let mut d = Dictionary::new();
        d.insert("Category".to_string(), name_array(&[event]));
        d.insert("Event".to_string(), Object::Name(event.to_string()));
        d.insert("OCGs".to_string(), Object::Array(vec![Object::Reference(ocg)]));
        Object::Dictionary(d)
    };

    let mut config = Dictionary::new();
    config.insert(
        "AS".to_string(),
        Object::Array(vec![intent("View"), intent("Print"), intent("Export")]),
    );
    config.insert("ON".to_string(), Object::Array(vec![Object::Reference(ocg)]));
    config.insert("Order".to_string(), Object::Array(vec![]));
    config.insert("RBGroups".to_string(), Object::Array(vec![]));

    let mut oc_props = Dictionary::new();
    oc_props.insert("OCGs".to_string(), Object::Array(vec![Object::Reference(ocg)]));
    oc_props.insert("D".to_string(), Object::Dictionary(config));

    xref.catalog_mut()?
        .insert("OCProperties".to_string(), Object::Dictionary(oc_props));

    Ok(ocg)
}

/// Allocate the overlay's optional-content group: "Watermark"/FG for
/// stamps, "Background"/BG for watermarks, visible in all intents.
fn create_ocg(xref: &mut XrefTable, wm: &Watermark) -> ObjectRef {
    let (name, subtype) = if wm.on_top {
        ("Watermark", "FG")
    } else {
        ("Background", "BG")
    };

    let state = |key: &str, value: &str| {
        let mut d = Dictionary::new();
        d.insert(key.to_string(), Object::Name(value.to_string()));
        Object::Dictionary(d)
    };

    let mut usage = Dictionary::new();
    usage.insert("PageElement".to_string(), state("Subtype", subtype));
    usage.insert("View".to_string(), state("ViewState", "ON"));
    usage.insert("Print".to_string(), state("PrintState", "ON"));
    usage.insert("Export".to_string(), state("ExportState", "ON"));

    let mut d = Dictionary::new();
    d.insert("Name".to_string(), Object::String(name.as_bytes().to_vec()));
    d.insert("Type".to_string(), Object::Name("OCG".to_string()));
    d.insert("Usage".to_string(), Object::Dictionary(usage));

    xref.add_object(Object::Dictionary(d))
}

/// Create the once-per-run content resources: a font dict, an image
/// XObject, or the migrated donor page.
fn create_content_resource(xref: &mut XrefTable, wm: &Watermark) -> Result<ContentResource> {
    if wm.is_pdf() {
        return create_pdf_resource(xref, wm);
    }

    if wm.is_image() {
        let file = std::fs::File::open(&wm.file_name)?;
        let (xobject, width, height) = images::create_image_resource(xref, file)?;
        return Ok(ContentResource::Image { xobject, width, height });
    }

    let mut d = Dictionary::new();
    d.insert("Type".to_string(), Object::Name("Font".to_string()));
    d.insert("Subtype".to_string(), Object::Name("Type1".to_string()));
    d.insert("BaseFont".to_string(), Object::Name(wm.font_name.clone()));
    Ok(ContentResource::Font(xref.add_object(Object::Dictionary(d))))
}

/// Ingest the donor page: decode its content, migrate every object its
/// resource dict reaches into the host table.
fn create_pdf_resource(xref: &mut XrefTable, wm: &Watermark) -> Result<ContentResource> {
    // The donor file is assumed to be valid.
    let donor = Document::open(&wm.file_name)?;

    let (page_ref, attrs) = donor.xref.page_dict(wm.page)?;
    let page = donor.xref.object(page_ref)?.expect_dict()?;

    let contents = page.get("Contents").ok_or(Error::NoContent)?;
    let content = donor_content_stream(&donor.xref, contents)?;

    let mut resources = match attrs.resources {
        Some(loc) => Object::Dictionary(donor.xref.resources_dict(loc)?.clone()),
        None => Object::Dictionary(Dictionary::new()),
    };
    migrate::migrate_object(&donor.xref, xref, &mut resources)?;
    let res_dict = xref.add_object(resources);

    let vp = attrs
        .viewport()
        .ok_or_else(|| Error::InvalidPdf("donor page has no media box".to_string()))?;

    Ok(ContentResource::Pdf {
        res_dict,
        content,
        width: vp.width() as i32,
        height: vp.height() as i32,
    })
}

/// Concatenate the decoded content streams of the donor page.
fn donor_content_stream(xref: &XrefTable, contents: &Object) -> Result<Vec<u8>> {
    let decode = |dict: &Dictionary, data: &[u8]| {
        filters::decode_stream(dict, data).map_err(|e| match e {
            Error::UnsupportedFilter(_) => Error::UnsupportedFilter(
                "unable to decode content for PDF watermark".to_string(),
            ),
            other => other,
        })
    };

    let mut bb = Vec::new();
    match xref.resolve(contents)? {
        Object::Stream { dict, data } => {
            bb = decode(dict, data)?;
        },
        Object::Array(elements) => {
            for element in elements {
                match xref.resolve(element)? {
                    Object::Stream { dict, data } => bb.extend_from_slice(&decode(dict, data)?),
                    Object::Null => continue,
                    other => {
                        return Err(Error::InvalidObjectType {
                            expected: "Stream".to_string(),
                            found: other.type_name().to_string(),
                        })
                    },
                }
            }
        },
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            })
        },
    }

    if bb.is_empty() {
        return Err(Error::NoContent);
    }
    Ok(bb)
}

/// One ExtGState carrying the overlay opacity for both stroking and
/// non-stroking operations.
fn create_ext_g_state(xref: &mut XrefTable, wm: &Watermark) -> ObjectRef {
    let mut d = Dictionary::new();
    d.insert("Type".to_string(), Object::Name("ExtGState".to_string()));
    d.insert("CA".to_string(), Object::Real(wm.opacity));
    d.insert("ca".to_string(), Object::Real(wm.opacity));
    xref.add_object(Object::Dictionary(d))
}
