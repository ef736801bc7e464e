//! Glyph-width metrics for the supported base fonts.
//!
//! Text overlays are limited to Helvetica, Times-Roman, and Courier; the
//! widths below are the standard Adobe font metrics in 1/1000 em units
//! (Courier is monospaced at 600). Characters outside the tables fall back
//! to 500, matching the handling of unknown glyphs elsewhere in the stack.

use lazy_static::lazy_static;
use std::collections::HashMap;

/// Width of a monospaced Courier glyph.
const COURIER_WIDTH: f64 = 600.0;

/// Fallback width for characters missing from a table.
const DEFAULT_WIDTH: f64 = 500.0;

lazy_static! {
    static ref HELVETICA_WIDTHS: HashMap<char, f64> = widths_map(HELVETICA_PAIRS, 556.0);
    static ref TIMES_WIDTHS: HashMap<char, f64> = widths_map(TIMES_PAIRS, 500.0);
}

const HELVETICA_PAIRS: &[(char, f64)] = &[
    (' ', 278.0),
    ('!', 278.0),
    ('"', 355.0),
    ('#', 556.0),
    ('$', 556.0),
    ('%', 889.0),
    ('&', 667.0),
    ('\'', 191.0),
    ('(', 333.0),
    (')', 333.0),
    ('*', 389.0),
    ('+', 584.0),
    (',', 278.0),
    ('-', 333.0),
    ('.', 278.0),
    ('/', 278.0),
    (':', 278.0),
    (';', 278.0),
    ('<', 584.0),
    ('=', 584.0),
    ('>', 584.0),
    ('?', 556.0),
    ('@', 1015.0),
    ('A', 667.0),
    ('B', 667.0),
    ('C', 722.0),
    ('D', 722.0),
    ('E', 667.0),
    ('F', 611.0),
    ('G', 778.0),
    ('H', 722.0),
    ('I', 278.0),
    ('J', 500.0),
    ('K', 667.0),
    ('L', 556.0),
    ('M', 833.0),
    ('N', 722.0),
    ('O', 778.0),
    ('P', 667.0),
    ('Q', 778.0),
    ('R', 722.0),
    ('S', 667.0),
    ('T', 611.0),
    ('U', 722.0),
    ('V', 667.0),
    ('W', 944.0),
    ('X', 667.0),
    ('Y', 667.0),
    ('Z', 611.0),
    ('[', 278.0),
    ('\\', 278.0),
    (']', 278.0),
    ('^', 469.0),
    ('_', 556.0),
    ('`', 333.0),
    ('a', 556.0),
    ('b', 556.0),
    ('c', 500.0),
    ('d', 556.0),
    ('e', 556.0),
    ('f', 278.0),
    ('g', 556.0),
    ('h', 556.0),
    ('i', 222.0),
    ('j', 222.0),
    ('k', 500.0),
    ('l', 222.0),
    ('m', 833.0),
    ('n', 556.0),
    ('o', 556.0),
    ('p', 556.0),
    ('q', 556.0),
    ('r', 333.0),
    ('s', 500.0),
    ('t', 278.0),
    ('u', 556.0),
    ('v', 500.0),
    ('w', 722.0),
    ('x', 500.0),
    ('y', 500.0),
    ('z', 500.0),
    ('{', 334.0),
    ('|', 260.0),
    ('}', 334.0),
    ('~', 584.0),
];

const TIMES_PAIRS: &[(char, f64)] = &[
    (' ', 250.0),
    ('!', 333.0),
    ('"', 408.0),
    ('#', 500.0),
    ('$', 500.0),
    ('%', 833.0),
    ('&', 778.0),
    ('\'', 180.0),
    ('(', 333.0),
    (')', 333.0),
    ('*', 500.0),
    ('+', 564.0),
    (',', 250.0),
    ('-', 333.0),
    ('.', 250.0),
    ('/', 278.0),
    (':', 278.0),
    (';', 278.0),
    ('<', 564.0),
    ('=', 564.0),
    ('>', 564.0),
    ('?', 444.0),
    ('@', 921.0),
    ('A', 722.0),
    ('B', 667.0),
    ('C', 667.0),
    ('D', 722.0),
    ('E', 611.0),
    ('F', 556.0),
    ('G', 722.0),
    ('H', 722.0),
    ('I', 333.0),
    ('J', 389.0),
    ('K', 722.0),
    ('L', 611.0),
    ('M', 889.0),
    ('N', 722.0),
    ('O', 722.0),
    ('P', 556.0),
    ('Q', 722.0),
    ('R', 667.0),
    ('S', 556.0),
    ('T', 611.0),
    ('U', 722.0),
    ('V', 722.0),
    ('W', 944.0),
    ('X', 722.0),
    ('Y', 722.0),
    ('Z', 611.0),
    ('[', 333.0),
    ('\\', 278.0),
    (']', 333.0),
    ('^', 469.0),
    ('_', 500.0),
    ('`', 333.0),
    ('a', 444.0),
    ('b', 500.0),
    ('c', 444.0),
    ('d', 500.0),
    ('e', 444.0),
    ('f', 333.0),
    ('g', 500.0),
    ('h', 500.0),
    ('i', 278.0),
    ('j', 278.0),
    ('k', 500.0),
    ('l', 278.0),
    ('m', 778.0),
    ('n', 500.0),
    ('o', 500.0),
    ('p', 500.0),
    ('q', 500.0),
    ('r', 333.0),
    ('s', 389.0),
    ('t', 278.0),
    ('u', 500.0),
    ('v', 500.0),
    ('w', 722.0),
    ('x', 500.0),
    ('y', 500.0),
    ('z', 444.0),
    ('{', 480.0),
    ('|', 200.0),
    ('}', 480.0),
    ('~', 541.0),
];

fn widths_map(pairs: &[(char, f64)], digit_width: f64) -> HashMap<char, f64> {
    let mut m: HashMap<char, f64> = pairs.iter().copied().collect();
    // Digits share one width per font family.
    for d in '0'..='9' {
        m.insert(d, digit_width);
    }
    m
}

/// The fonts this catalogue can measure.
pub fn font_names() -> &'static [&'static str] {
    &["Courier", "Helvetica", "Times-Roman"]
}

/// Whether `name` is in the catalogue.
pub fn supported(name: &str) -> bool {
    font_names().contains(&name)
}

fn char_width(ch: char, font_name: &str) -> f64 {
    match font_name {
        "Courier" => COURIER_WIDTH,
        "Helvetica" => *HELVETICA_WIDTHS.get(&ch).unwrap_or(&DEFAULT_WIDTH),
        "Times-Roman" => *TIMES_WIDTHS.get(&ch).unwrap_or(&DEFAULT_WIDTH),
        _ => DEFAULT_WIDTH,
    }
}

/// Width of `text` in user-space units at the given point size.
pub fn text_width(text: &str, font_name: &str, points: i32) -> f64 {
    let units: f64 = text.chars().map(|c| char_width(c, font_name)).sum();
    units * points as f64 / 1000.0
}

/// The point size at which `text` fits `width` user-space units.
///
/// Width is linear in point size, so the inversion is exact up to the
/// integer truncation.
pub fn font_size(text: &str, font_name: &str, width: f64) -> i32 {
    let unit = text_width(text, font_name, 1);
    if unit <= 0.0 {
        return 0;
    }
    (width / unit) as i32
}
