use std::{path::PathBuf, sync::Arc};

use crate::foundation::core::{Color, Point, Vec2};

/// Opaque element identifier, unique within one template.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ElementId(pub(crate) u64);

impl ElementId {
    /// Construct an [`ElementId`] from a raw value.
    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    /// Access the raw value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Horizontal anchoring of single-line text relative to its `left` coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    /// Text starts at `left`.
    #[default]
    Left,
    /// Text is centered on `left`.
    Center,
    /// Text ends at `left`.
    Right,
}

/// A data-bound text overlay. All lengths are preview-space pixels.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    /// Element id.
    pub id: ElementId,
    /// Dataset header whose value is drawn.
    pub field_name: String,
    /// Top-left anchor of the glyph box.
    pub position: Point,
    /// Font size.
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    /// Requested font family; resolved best-effort against available fonts.
    #[serde(default = "default_font_family")]
    pub font_family: String,
    /// Fill color.
    #[serde(default = "default_color")]
    pub color: Color,
    /// Bold weight.
    #[serde(default)]
    pub bold: bool,
    /// Italic style.
    #[serde(default)]
    pub italic: bool,
    /// Underline the drawn text.
    #[serde(default)]
    pub underline: bool,
    /// Horizontal anchoring.
    #[serde(default)]
    pub align: TextAlign,
    /// Element opacity in `0..=1`.
    #[serde(default = "one")]
    pub opacity: f64,
    /// Outline color; outline is drawn only with a positive `stroke_width`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<Color>,
    /// Outline width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    /// Draw the fixed drop shadow.
    #[serde(default)]
    pub shadow: bool,
}

impl TextElement {
    /// Default font size for newly added fields.
    pub const DEFAULT_FONT_SIZE: f64 = 24.0;
    /// Default font family for newly added fields.
    pub const DEFAULT_FONT_FAMILY: &'static str = "Arial";
    /// Default fill color for newly added fields.
    pub const DEFAULT_COLOR: Color = Color::rgb(0x1a, 0x1a, 0x1a);

    /// A new text element with the editor defaults.
    pub fn new(id: ElementId, field_name: impl Into<String>, position: Point) -> Self {
        Self {
            id,
            field_name: field_name.into(),
            position,
            font_size: Self::DEFAULT_FONT_SIZE,
            font_family: Self::DEFAULT_FONT_FAMILY.to_string(),
            color: Self::DEFAULT_COLOR,
            bold: false,
            italic: false,
            underline: false,
            align: TextAlign::Left,
            opacity: 1.0,
            stroke_color: None,
            stroke_width: None,
            shadow: false,
        }
    }

    /// Outline `(color, width)` when one should be drawn.
    pub fn stroke(&self) -> Option<(Color, f64)> {
        match self.stroke_width {
            Some(w) if w > 0.0 && w.is_finite() => {
                Some((self.stroke_color.unwrap_or(Color::BLACK), w))
            }
            _ => None,
        }
    }

    /// Placeholder shown on the preview canvas instead of record data.
    pub fn preview_label(&self) -> String {
        format!("{{{{{}}}}}", self.field_name)
    }
}

/// Where an image element's pixels come from.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    /// A file, relative to the resolver's root directory.
    File(PathBuf),
    /// A remote image (for example a [`STICKERS`] entry). Fetched by a resolver that allows it.
    Url(String),
    /// Encoded bytes held in memory (PNG, JPEG, SVG, ...).
    #[serde(skip)]
    Bytes(Arc<Vec<u8>>),
}

impl ImageSource {
    /// In-memory source from encoded bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(Arc::new(bytes.into()))
    }

    /// Remote source for the built-in sticker `id`, if the catalog has it.
    pub fn sticker(id: &str) -> Option<Self> {
        STICKERS
            .iter()
            .find(|s| s.id == id)
            .map(|s| Self::Url(s.url.to_string()))
    }
}

/// A sticker or uploaded picture overlay. Position is preview-space; `scale` multiplies the
/// source image's intrinsic pixel size.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageElement {
    /// Element id.
    pub id: ElementId,
    /// Pixel source.
    pub source: ImageSource,
    /// Top-left of the unrotated image box.
    pub position: Point,
    /// Per-axis multiplier of the intrinsic size.
    #[serde(default = "unit_scale")]
    pub scale: Vec2,
    /// Clockwise rotation about the image center.
    #[serde(default)]
    pub rotation_degrees: f64,
    /// Element opacity in `0..=1`.
    #[serde(default = "one")]
    pub opacity: f64,
}

impl ImageElement {
    /// A new image element with unit scale, no rotation and full opacity.
    pub fn new(id: ElementId, source: ImageSource, position: Point) -> Self {
        Self {
            id,
            source,
            position,
            scale: unit_scale(),
            rotation_degrees: 0.0,
            opacity: 1.0,
        }
    }
}

/// Any placed overlay.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    /// Data-bound text.
    Text(TextElement),
    /// Image or sticker.
    Image(ImageElement),
}

impl Element {
    /// Element id.
    pub fn id(&self) -> ElementId {
        match self {
            Self::Text(t) => t.id,
            Self::Image(i) => i.id,
        }
    }

    /// Preview-space position.
    pub fn position(&self) -> Point {
        match self {
            Self::Text(t) => t.position,
            Self::Image(i) => i.position,
        }
    }

    /// Bound field name for text elements.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t.field_name.as_str()),
            Self::Image(_) => None,
        }
    }

    /// Opacity clamped to `0..=1`.
    pub fn opacity(&self) -> f64 {
        let o = match self {
            Self::Text(t) => t.opacity,
            Self::Image(i) => i.opacity,
        };
        if o.is_finite() { o.clamp(0.0, 1.0) } else { 1.0 }
    }

    pub(crate) fn set_id(&mut self, id: ElementId) {
        match self {
            Self::Text(t) => t.id = id,
            Self::Image(i) => i.id = id,
        }
    }

    pub(crate) fn set_position(&mut self, p: Point) {
        match self {
            Self::Text(t) => t.position = p,
            Self::Image(i) => i.position = p,
        }
    }
}

fn one() -> f64 {
    1.0
}

fn default_font_size() -> f64 {
    TextElement::DEFAULT_FONT_SIZE
}

fn default_font_family() -> String {
    TextElement::DEFAULT_FONT_FAMILY.to_string()
}

fn default_color() -> Color {
    TextElement::DEFAULT_COLOR
}

fn unit_scale() -> Vec2 {
    Vec2::new(1.0, 1.0)
}

/// Font families offered by the editor's style picker.
pub const FONT_OPTIONS: &[&str] = &[
    "Arial",
    "Times New Roman",
    "Georgia",
    "Courier New",
    "Verdana",
    "Trebuchet MS",
    "Palatino Linotype",
    "Impact",
    "Comic Sans MS",
    "Lucida Console",
    "Playfair Display",
    "Plus Jakarta Sans",
];

/// Font sizes offered by the editor's style picker.
pub const FONT_SIZES: &[f64] = &[
    12.0, 14.0, 16.0, 18.0, 20.0, 24.0, 28.0, 32.0, 36.0, 40.0, 48.0, 56.0, 64.0, 72.0, 80.0,
    96.0,
];

/// Swatches offered by the editor's color picker.
pub const COLOR_PRESETS: &[Color] = &[
    Color::rgb(0x1a, 0x1a, 0x1a),
    Color::rgb(0xff, 0xff, 0xff),
    Color::rgb(0xdc, 0x26, 0x26),
    Color::rgb(0x16, 0xa3, 0x4a),
    Color::rgb(0x25, 0x63, 0xeb),
    Color::rgb(0x93, 0x33, 0xea),
    Color::rgb(0xca, 0x8a, 0x04),
    Color::rgb(0x08, 0x91, 0xb2),
    Color::rgb(0xec, 0x48, 0x99),
    Color::rgb(0xf9, 0x73, 0x16),
    Color::rgb(0x00, 0x00, 0x00),
    Color::rgb(0x37, 0x41, 0x51),
    Color::rgb(0x6b, 0x72, 0x80),
    Color::rgb(0x9c, 0xa3, 0xaf),
    Color::rgb(0xd1, 0xd5, 0xdb),
];

/// A built-in sticker offered by the editor's sticker picker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sticker {
    /// Stable catalog id.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// SVG download location.
    pub url: &'static str,
}

macro_rules! twemoji {
    ($id:literal, $name:literal, $code:literal) => {
        Sticker {
            id: $id,
            name: $name,
            url: concat!(
                "https://cdn.jsdelivr.net/gh/twitter/twemoji@14.0.2/assets/svg/",
                $code,
                ".svg"
            ),
        }
    };
}

/// Built-in stickers (Twemoji SVGs).
pub const STICKERS: &[Sticker] = &[
    twemoji!("star", "Gold Star", "2b50"),
    twemoji!("trophy", "Trophy", "1f3c6"),
    twemoji!("medal", "Medal", "1f3c5"),
    twemoji!("ribbon", "Ribbon", "1f380"),
    twemoji!("crown", "Crown", "1f451"),
    twemoji!("sparkles", "Sparkles", "2728"),
    twemoji!("check", "Check Mark", "2705"),
    twemoji!("leaf", "Leaf", "1f33f"),
    twemoji!("tree", "Tree", "1f333"),
    twemoji!("globe", "Earth", "1f30d"),
    twemoji!("recycle", "Recycle", "267b"),
    twemoji!("heart", "Heart", "2764"),
    twemoji!("fire", "Fire", "1f525"),
    twemoji!("rocket", "Rocket", "1f680"),
    twemoji!("diamond", "Diamond", "1f48e"),
    twemoji!("hundred", "100", "1f4af"),
];

#[cfg(test)]
#[path = "../../tests/unit/model/element.rs"]
mod tests;
