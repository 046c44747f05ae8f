use std::{borrow::Cow, collections::HashMap};

use crate::{
    foundation::error::{StampError, StampResult},
    text::fonts::{FontBook, ResolvedFont},
};

/// Single-line text shaped with one resolved face.
#[derive(Clone)]
pub struct ShapedText {
    /// Parley layout; glyph positions are relative to the layout's top-left corner.
    pub layout: parley::Layout<()>,
    /// Face used for every glyph in `layout`.
    pub font: vello_cpu::peniko::FontData,
    /// Advance width of the line.
    pub width: f64,
    /// Line box height.
    pub height: f64,
    /// Distance from the top of the line box to the alphabetic baseline.
    pub baseline: f64,
}

impl std::fmt::Debug for ShapedText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapedText")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("baseline", &self.baseline)
            .finish()
    }
}

/// Font selection and size for one shaping call.
#[derive(Clone, Copy, Debug)]
pub struct TextStyle<'a> {
    /// Requested family name.
    pub family: &'a str,
    /// Font size in pixels.
    pub size_px: f64,
    /// Bold weight requested.
    pub bold: bool,
    /// Italic style requested.
    pub italic: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct FaceKey {
    family: String,
    weight: u16,
    italic: bool,
    index: u32,
}

struct RegisteredFace {
    family: String,
    font: vello_cpu::peniko::FontData,
}

/// Stateful helper for building Parley layouts from faces picked by a [`FontBook`].
///
/// Each resolved face is registered once with Parley; shaping then selects it by its own
/// family, weight and style so the layout and the glyph outlines always come from the same face.
pub struct TextShaper {
    fonts: FontBook,
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<()>,
    registered: HashMap<FaceKey, RegisteredFace>,
}

impl std::fmt::Debug for TextShaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextShaper")
            .field("fonts", &self.fonts)
            .field("registered", &self.registered.len())
            .finish()
    }
}

impl TextShaper {
    /// Shaper over `fonts`.
    pub fn new(fonts: FontBook) -> Self {
        Self {
            fonts,
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
            registered: HashMap::new(),
        }
    }

    /// Underlying font book.
    pub fn fonts_mut(&mut self) -> &mut FontBook {
        &mut self.fonts
    }

    /// Shape `text` on a single unbroken line.
    ///
    /// Returns `Ok(None)` when no font face is available at all; the caller decides whether
    /// that skips the element.
    pub fn shape(&mut self, text: &str, style: TextStyle<'_>) -> StampResult<Option<ShapedText>> {
        if !style.size_px.is_finite() || style.size_px <= 0.0 {
            return Err(StampError::validation(
                "text size must be finite and > 0",
            ));
        }

        let Some(resolved) = self.fonts.resolve(style.family, style.bold, style.italic) else {
            return Ok(None);
        };
        let key = FaceKey {
            family: resolved.family.clone(),
            weight: resolved.weight,
            italic: resolved.italic,
            index: resolved.index,
        };
        if !self.registered.contains_key(&key) {
            let face = self.register(&resolved)?;
            self.registered.insert(key.clone(), face);
        }
        let (family, font) = match self.registered.get(&key) {
            Some(face) => (face.family.clone(), face.font.clone()),
            None => return Ok(None),
        };

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(Cow::Owned(family)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(style.size_px as f32));
        builder.push_default(parley::style::StyleProperty::FontWeight(
            parley::style::FontWeight::new(f32::from(resolved.weight)),
        ));
        builder.push_default(parley::style::StyleProperty::FontStyle(
            if resolved.italic {
                parley::style::FontStyle::Italic
            } else {
                parley::style::FontStyle::Normal
            },
        ));

        let mut layout: parley::Layout<()> = builder.build(text);
        layout.break_all_lines(None);

        let baseline = layout
            .lines()
            .next()
            .map(|line| f64::from(line.metrics().baseline))
            .unwrap_or(style.size_px);

        Ok(Some(ShapedText {
            width: f64::from(layout.width()),
            height: f64::from(layout.height()),
            baseline,
            font,
            layout,
        }))
    }

    fn register(&mut self, resolved: &ResolvedFont) -> StampResult<RegisteredFace> {
        let blob = parley::fontique::Blob::from(resolved.bytes.as_ref().clone());
        let families = self.font_ctx.collection.register_fonts(blob, None);
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| StampError::render("no font families registered from font bytes"))?;
        let family = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| StampError::render("registered font family has no name"))?
            .to_string();

        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(resolved.bytes.as_ref().clone()),
            resolved.index,
        );
        tracing::debug!(family = %family, weight = resolved.weight, "registered font face");
        Ok(RegisteredFace { family, font })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/text/shape.rs"]
mod tests;
