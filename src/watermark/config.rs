//! Watermark configuration and the configuration-string parser.
//!
//! A configuration string is a comma-separated list. The first element
//! selects the content: literal text (lines split on the two-character
//! sequence `\n`), an image file, or a PDF file with an optional `:page`
//! suffix. The remaining elements are `key:value` pairs whose keys are
//! matched by unambiguous prefix.

use crate::error::{Error, Result};
use crate::fonts;
use std::path::Path;

/// Position anchor inside the page viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Top left corner
    TopLeft,
    /// Top center
    TopCenter,
    /// Top right corner
    TopRight,
    /// Left center
    Left,
    /// Page center
    Center,
    /// Right center
    Right,
    /// Bottom left corner
    BottomLeft,
    /// Bottom center
    BottomCenter,
    /// Bottom right corner
    BottomRight,
}

/// Text render mode (ISO 32000-1, Table 106).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Fill text
    Fill = 0,
    /// Stroke text
    Stroke = 1,
    /// Fill, then stroke text
    FillAndStroke = 2,
}

/// Orientation along one of the two page diagonals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagonal {
    /// Explicit rotation in effect instead
    None = 0,
    /// Lower left to upper right
    LLToUR = 1,
    /// Upper left to lower right
    ULToLR = 2,
}

/// RGB fill color with intensities in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    /// Red intensity
    pub r: f32,
    /// Green intensity
    pub g: f32,
    /// Blue intensity
    pub b: f32,
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r={:.1} g={:.1} b={:.1}", self.r, self.g, self.b)
    }
}

/// Parsed watermark/stamp configuration.
///
/// Immutable during a run; all per-page derived state lives in the internal
/// run context.
#[derive(Debug, Clone, PartialEq)]
pub struct Watermark {
    /// Raw display text (empty for file-based content).
    pub text: String,
    /// Display lines, split on the literal two-character sequence `\n`.
    pub text_lines: Vec<String>,
    /// Image or PDF source path (empty for text content).
    pub file_name: String,
    /// 1-based page number of a PDF source.
    pub page: usize,
    /// True for a stamp (painted on top), false for a watermark.
    pub on_top: bool,
    /// Position anchor.
    pub pos: Anchor,
    /// Anchor x offset in user units.
    pub dx: i32,
    /// Anchor y offset in user units.
    pub dy: i32,
    /// Base font name; Helvetica, Times-Roman, or Courier.
    pub font_name: String,
    /// Font size in points.
    pub font_size: i32,
    /// Fill (non-stroking) color.
    pub color: Color,
    /// Rotation in degrees, -180 <= r <= 180.
    pub rotation: f64,
    /// Diagonal orientation; exclusive with rotation.
    pub diagonal: Diagonal,
    /// True once the user set either rotation or diagonal.
    pub user_rot_or_diagonal: bool,
    /// Opacity, 0 <= o <= 1.
    pub opacity: f64,
    /// Text render mode.
    pub render_mode: RenderMode,
    /// Scale factor, 0 <= s <= 1.
    pub scale: f64,
    /// True for absolute scaling, false for viewport-relative.
    pub scale_abs: bool,
    /// True to replace an existing overlay on the target pages.
    pub update: bool,
}

impl Default for Watermark {
    fn default() -> Self {
        Self {
            text: String::new(),
            text_lines: Vec::new(),
            file_name: String::new(),
            page: 1,
            on_top: false,
            pos: Anchor::Center,
            dx: 0,
            dy: 0,
            font_name: "Helvetica".to_string(),
            font_size: 24,
            color: Color { r: 0.5, g: 0.5, b: 0.5 },
            rotation: 0.0,
            diagonal: Diagonal::LLToUR,
            user_rot_or_diagonal: false,
            opacity: 1.0,
            render_mode: RenderMode::Fill,
            scale: 0.5,
            scale_abs: false,
            update: false,
        }
    }
}

/// The parameter names prefix completion resolves against.
const PARAM_NAMES: &[&str] = &[
    "fontname",
    "points",
    "color",
    "rotation",
    "diagonal",
    "opacity",
    "mode",
    "rendermode",
    "position",
    "offset",
    "scalefactor",
];

impl Watermark {
    /// Parse a configuration string into a watermark (`on_top` = false) or
    /// stamp (`on_top` = true) description.
    pub fn parse(spec: &str, on_top: bool) -> Result<Self> {
        let mut wm = Watermark { on_top, ..Default::default() };

        let mut parts = spec.split(',');
        // split always yields at least one element
        let content = parts.next().unwrap_or("");
        wm.set_content(content)?;

        for param in parts {
            let (prefix, value) = param
                .split_once(':')
                .map(|(k, v)| (k.trim(), v.trim()))
                .ok_or_else(|| config_error(on_top))?;
            wm.handle_param(prefix, value)?;
        }

        Ok(wm)
    }

    /// "watermark" or "stamp", whichever applies.
    pub fn on_top_string(&self) -> &'static str {
        if self.on_top {
            "stamp"
        } else {
            "watermark"
        }
    }

    /// Whether the content is a page of another PDF.
    pub fn is_pdf(&self) -> bool {
        !self.file_name.is_empty() && extension_of(&self.file_name) == "pdf"
    }

    /// Whether the content is a raster image.
    pub fn is_image(&self) -> bool {
        !self.file_name.is_empty() && extension_of(&self.file_name) != "pdf"
    }

    /// Whether the content is text.
    pub fn is_text(&self) -> bool {
        self.file_name.is_empty()
    }

    fn kind(&self) -> &'static str {
        if self.is_image() {
            "image"
        } else if self.is_pdf() {
            "pdf"
        } else {
            "text"
        }
    }

    /// Resolve the content kind from the first spec element.
    fn set_content(&mut self, s: &str) -> Result<()> {
        let mut parts = s.splitn(2, ':');
        let text = parts.next().unwrap_or("");
        let page_suffix = parts.next();

        self.text = text.to_string();
        self.text_lines = text.split("\\n").map(|l| l.to_string()).collect();

        if self.text_lines.len() > 1 {
            // Multiline content is always text.
            return Ok(());
        }

        let known_exts = ["jpg", "jpeg", "png", "tif", "tiff", "pdf"];
        if known_exts.contains(&extension_of(text).as_str()) {
            self.file_name = self.text.clone();
        }

        if let Some(nr) = page_suffix {
            self.page = nr
                .parse()
                .map_err(|_| Error::WatermarkConfig(format!("illegal page number value: {}", nr)))?;
        }

        Ok(())
    }

    /// Resolve an unambiguous parameter prefix and apply the value.
    fn handle_param(&mut self, prefix: &str, value: &str) -> Result<()> {
        let mut resolved = None;
        for name in PARAM_NAMES {
            if !name.starts_with(prefix) {
                continue;
            }
            if resolved.is_some() {
                return Err(Error::WatermarkConfig(format!(
                    "ambiguous parameter prefix \"{}\"",
                    prefix
                )));
            }
            resolved = Some(*name);
        }

        let name = resolved.ok_or_else(|| {
            Error::WatermarkConfig(format!("unknown parameter prefix \"{}\"", prefix))
        })?;

        match name {
            "fontname" => self.parse_font_name(value),
            "points" => self.parse_font_size(value),
            "color" => self.parse_color(value),
            "rotation" => self.parse_rotation(value),
            "diagonal" => self.parse_diagonal(value),
            "opacity" => self.parse_opacity(value),
            "mode" | "rendermode" => self.parse_render_mode(value),
            "position" => self.parse_anchor(value),
            "offset" => self.parse_offset(value),
            "scalefactor" => self.parse_scale_factor(value),
            _ => unreachable!("prefix resolution yields names from PARAM_NAMES"),
        }
    }

    fn parse_font_name(&mut self, s: &str) -> Result<()> {
        if !fonts::supported(s) {
            return Err(Error::UnsupportedFont(s.to_string()));
        }
        self.font_name = s.to_string();
        Ok(())
    }

    fn parse_font_size(&mut self, s: &str) -> Result<()> {
        self.font_size = s
            .parse()
            .map_err(|_| Error::WatermarkConfig(format!("font size must be an integer value: {}", s)))?;
        Ok(())
    }

    fn parse_color(&mut self, s: &str) -> Result<()> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(Error::WatermarkConfig(format!(
                "illegal color string: 3 intensities 0.0 <= i <= 1.0, {}",
                s
            )));
        }

        let mut channels = [0.0f32; 3];
        for (i, (part, channel)) in parts.iter().zip(["red", "green", "blue"]).enumerate() {
            let v: f32 = part.parse().map_err(|_| {
                Error::WatermarkConfig(format!("{} must be a float value: {}", channel, part))
            })?;
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::WatermarkConfig(format!(
                    "{}: a color value is an intensity between 0.0 and 1.0",
                    channel
                )));
            }
            channels[i] = v;
        }

        self.color = Color { r: channels[0], g: channels[1], b: channels[2] };
        Ok(())
    }

    fn parse_rotation(&mut self, s: &str) -> Result<()> {
        if self.user_rot_or_diagonal {
            return Err(Error::WatermarkConfig(
                "please specify rotation or diagonal (r or d)".to_string(),
            ));
        }

        let r: f64 = s
            .parse()
            .map_err(|_| Error::WatermarkConfig(format!("rotation must be a float value: {}", s)))?;
        if !(-180.0..=180.0).contains(&r) {
            return Err(Error::WatermarkConfig(format!(
                "illegal rotation: -180 <= r <= 180 degrees, {}",
                s
            )));
        }

        self.rotation = r;
        self.diagonal = Diagonal::None;
        self.user_rot_or_diagonal = true;
        Ok(())
    }

    fn parse_diagonal(&mut self, s: &str) -> Result<()> {
        if self.user_rot_or_diagonal {
            return Err(Error::WatermarkConfig(
                "please specify rotation or diagonal (r or d)".to_string(),
            ));
        }

        let d: i32 = s.parse().map_err(|_| {
            Error::WatermarkConfig(format!("illegal diagonal value: allowed 1 or 2, {}", s))
        })?;
        self.diagonal = match d {
            1 => Diagonal::LLToUR,
            2 => Diagonal::ULToLR,
            _ => {
                return Err(Error::WatermarkConfig(
                    "diagonal: 1..lower left to upper right, 2..upper left to lower right"
                        .to_string(),
                ))
            },
        };

        self.rotation = 0.0;
        self.user_rot_or_diagonal = true;
        Ok(())
    }

    fn parse_opacity(&mut self, s: &str) -> Result<()> {
        let o: f64 = s
            .parse()
            .map_err(|_| Error::WatermarkConfig(format!("opacity must be a float value: {}", s)))?;
        if !(0.0..=1.0).contains(&o) {
            return Err(Error::WatermarkConfig(format!(
                "illegal opacity: 0.0 <= r <= 1.0, {}",
                s
            )));
        }
        self.opacity = o;
        Ok(())
    }

    fn parse_render_mode(&mut self, s: &str) -> Result<()> {
        let m: i32 = s.parse().map_err(|_| {
            Error::WatermarkConfig(format!("illegal render mode value: allowed 0,1,2, {}", s))
        })?;
        self.render_mode = match m {
            0 => RenderMode::Fill,
            1 => RenderMode::Stroke,
            2 => RenderMode::FillAndStroke,
            _ => {
                return Err(Error::WatermarkConfig(
                    "valid rendermodes: 0..fill, 1..stroke, 2..fill&stroke".to_string(),
                ))
            },
        };
        Ok(())
    }

    fn parse_anchor(&mut self, s: &str) -> Result<()> {
        self.pos = match s {
            "tl" => Anchor::TopLeft,
            "tc" => Anchor::TopCenter,
            "tr" => Anchor::TopRight,
            "l" => Anchor::Left,
            "c" => Anchor::Center,
            "r" => Anchor::Right,
            "bl" => Anchor::BottomLeft,
            "bc" => Anchor::BottomCenter,
            "br" => Anchor::BottomRight,
            _ => {
                return Err(Error::WatermarkConfig(format!("unknown position anchor: {}", s)));
            },
        };
        Ok(())
    }

    fn parse_offset(&mut self, s: &str) -> Result<()> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() != 2 {
            return Err(Error::WatermarkConfig(format!(
                "illegal position offset string: need 2 numeric values, {}",
                s
            )));
        }

        let bad = |v: &str| Error::WatermarkConfig(format!("offset must be an integer value: {}", v));
        self.dx = parts[0].parse().map_err(|_| bad(parts[0]))?;
        self.dy = parts[1].parse().map_err(|_| bad(parts[1]))?;
        Ok(())
    }

    fn parse_scale_factor(&mut self, s: &str) -> Result<()> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.is_empty() || parts.len() > 2 {
            return Err(Error::WatermarkConfig(format!(
                "illegal scale string: 0.0 <= i <= 1.0 {{abs|rel}}, {}",
                s
            )));
        }

        let sc: f64 = parts[0].parse().map_err(|_| {
            Error::WatermarkConfig(format!("scale factor must be a float value: {}", parts[0]))
        })?;
        if !(0.0..=1.0).contains(&sc) {
            return Err(Error::WatermarkConfig(format!(
                "illegal scale factor: 0.0 <= s <= 1.0, {}",
                parts[0]
            )));
        }

        let scale_abs = match parts.get(1) {
            None => false,
            Some(&"a") | Some(&"abs") => true,
            Some(&"r") | Some(&"rel") => false,
            Some(mode) => {
                return Err(Error::WatermarkConfig(format!(
                    "illegal scale mode: abs|rel, {}",
                    mode
                )));
            },
        };

        self.scale = sc;
        self.scale_abs = scale_abs;
        Ok(())
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let t = if self.text.is_empty() { &self.file_name } else { &self.text };
        let on_top = if self.on_top { "" } else { "not " };
        let scaling = if self.scale_abs { "absolute" } else { "relative" };

        writeln!(f, "Watermark: <{}> is {}on top, typ:{}", t, on_top, self.kind())?;
        writeln!(f, "{} {} points", self.font_name, self.font_size)?;
        writeln!(f, "PDFpage#: {}", self.page)?;
        writeln!(f, "scaling: {:.1} {}", self.scale, scaling)?;
        writeln!(f, "color: {}", self.color)?;
        writeln!(f, "rotation: {:.1}", self.rotation)?;
        writeln!(f, "diagonal: {}", self.diagonal as i32)?;
        writeln!(f, "opacity: {:.1}", self.opacity)?;
        writeln!(f, "renderMode: {}", self.render_mode as i32)
    }
}

fn config_error(on_top: bool) -> Error {
    let s = if on_top { "stamp" } else { "watermark" };
    Error::WatermarkConfig(format!("invalid {} configuration string", s))
}

fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}
