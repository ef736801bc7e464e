//! Overlay placement: bounding-box and transform-matrix computation.
//!
//! The form XObject renders the overlay at its local origin with the
//! bounding box as its BBox and an identity matrix; the page-level `cm`
//! computed here does all the positioning.

use crate::fonts;
use crate::geometry::{Matrix, Point, Rect, IDENTITY};
use crate::watermark::config::{Anchor, Diagonal, Watermark};

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;
const RAD_TO_DEG: f64 = 180.0 / std::f64::consts::PI;

/// A computed bounding box, with the effective font size for text content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BoundingBox {
    /// The overlay bounding box, lower-left at the origin.
    pub rect: Rect,
    /// Per-page font size; 0 for image and PDF content.
    pub scaled_font_size: i32,
}

/// Anchor the bounding box inside the viewport, returning the lower-left
/// corner the box is lowered to. Coordinates are relative to the viewport
/// origin.
pub(crate) fn lower_left_corner(vp_w: f64, vp_h: f64, bb_w: f64, bb_h: f64, anchor: Anchor) -> Point {
    let left = 0.0;
    let center_x = vp_w / 2.0 - bb_w / 2.0;
    let right = vp_w - bb_w;
    let bottom = 0.0;
    let center_y = vp_h / 2.0 - bb_h / 2.0;
    let top = vp_h - bb_h;

    let (x, y) = match anchor {
        Anchor::TopLeft => (left, top),
        Anchor::TopCenter => (center_x, top),
        Anchor::TopRight => (right, top),
        Anchor::Left => (left, center_y),
        Anchor::Center => (center_x, center_y),
        Anchor::Right => (right, center_y),
        Anchor::BottomLeft => (left, bottom),
        Anchor::BottomCenter => (center_x, bottom),
        Anchor::BottomRight => (right, bottom),
    };

    Point::new(x, y)
}

/// The widest display line at the given font size.
fn max_text_width(wm: &Watermark, points: i32) -> f64 {
    wm.text_lines
        .iter()
        .map(|l| fonts::text_width(l, &wm.font_name, points))
        .fold(0.0, f64::max)
}

/// The largest font size at which every display line fits `width`.
fn min_font_size(wm: &Watermark, width: f64) -> i32 {
    wm.text_lines
        .iter()
        .map(|l| fonts::font_size(l, &wm.font_name, width))
        .min()
        .unwrap_or(0)
}

/// Compute the overlay bounding box for the current page viewport.
///
/// `donor` carries the pixel or page dimensions for image and PDF content.
pub(crate) fn bounding_box(wm: &Watermark, vp: Rect, donor: Option<(i32, i32)>) -> BoundingBox {
    if let Some((w, h)) = donor {
        let natural = Rect::for_dim(w as f64, h as f64);
        let ar = natural.aspect_ratio();

        let rect = if wm.scale_abs {
            let width = wm.scale * natural.width();
            Rect::for_dim(width, width / ar)
        } else if ar >= 1.0 {
            let width = wm.scale * vp.width();
            Rect::for_dim(width, width / ar)
        } else {
            let height = wm.scale * vp.height();
            Rect::for_dim(height * ar, height)
        };

        return BoundingBox { rect, scaled_font_size: 0 };
    }

    // Text content.
    let (width, scaled_font_size) = if wm.scale_abs {
        let size = (wm.font_size as f64 * wm.scale).round() as i32;
        (max_text_width(wm, size), size)
    } else {
        let target = wm.scale * vp.width();
        (target, min_font_size(wm, target))
    };
    let height = wm.text_lines.len() as f64 * scaled_font_size as f64;

    BoundingBox {
        rect: Rect::for_dim(width, height),
        scaled_font_size,
    }
}

/// Compute the page-level transform for painting the form reference.
///
/// The rotation angle comes from the diagonal (derived from the viewport
/// aspect, corrected by -90 degrees for portrait bounding boxes, negated
/// for upper-left-to-lower-right) or the explicit rotation, plus the page
/// rotation in effect. The result is R·T with the translation anchoring
/// the box into the viewport.
pub(crate) fn transform_matrix(wm: &Watermark, vp: Rect, bb: Rect, page_rot: f64) -> Matrix {
    let mut r = wm.rotation;

    if wm.diagonal != Diagonal::None {
        r = (vp.height() / vp.width()).atan() * RAD_TO_DEG;
        if bb.aspect_ratio() < 1.0 {
            r -= 90.0;
        }
        if wm.diagonal == Diagonal::ULToLR {
            r = -r;
        }
    }

    r += page_rot;

    let sin = (r * DEG_TO_RAD).sin();
    let cos = (r * DEG_TO_RAD).cos();

    let mut m1 = IDENTITY;
    m1.0[0][0] = cos;
    m1.0[0][1] = sin;
    m1.0[1][0] = -sin;
    m1.0[1][1] = cos;

    // Text baselines sit relative to the box bottom.
    let dy = if wm.is_text() { bb.ll.y } else { 0.0 };

    let ll = lower_left_corner(vp.width(), vp.height(), bb.width(), bb.height(), wm.pos);

    let mut m2 = IDENTITY;
    m2.0[2][0] =
        ll.x + bb.width() / 2.0 + wm.dx as f64 + sin * (bb.height() / 2.0 + dy) - cos * bb.width() / 2.0;
    m2.0[2][1] =
        ll.y + bb.height() / 2.0 + wm.dy as f64 - cos * (bb.height() / 2.0 + dy) - sin * bb.width() / 2.0;

    m1.multiply(&m2)
}
