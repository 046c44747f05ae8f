use crate::{
    foundation::core::{Color, Point, Vec2},
    foundation::error::{StampError, StampResult},
    model::element::{Element, ElementId, ImageSource, TextAlign},
};

/// Partial attribute update for one element.
///
/// `None` leaves an attribute unchanged. Setting a text-only attribute on an image element (or
/// the reverse) is a validation error; the element is left untouched in that case.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ElementPatch {
    /// New preview-space position (any element).
    pub position: Option<Point>,
    /// New opacity (any element).
    pub opacity: Option<f64>,
    /// New font size (text).
    pub font_size: Option<f64>,
    /// New font family (text).
    pub font_family: Option<String>,
    /// New fill color (text).
    pub color: Option<Color>,
    /// Bold toggle (text).
    pub bold: Option<bool>,
    /// Italic toggle (text).
    pub italic: Option<bool>,
    /// Underline toggle (text).
    pub underline: Option<bool>,
    /// Alignment (text).
    pub align: Option<TextAlign>,
    /// Outline color; `Some(None)` clears it (text).
    pub stroke_color: Option<Option<Color>>,
    /// Outline width; `Some(None)` clears it (text).
    pub stroke_width: Option<Option<f64>>,
    /// Shadow toggle (text).
    pub shadow: Option<bool>,
    /// Scale multiplier (image).
    pub scale: Option<Vec2>,
    /// Rotation in degrees (image).
    pub rotation_degrees: Option<f64>,
    /// Replacement pixel source (image).
    pub source: Option<ImageSource>,
}

impl ElementPatch {
    /// Patch that only moves the element.
    pub fn moved_to(position: Point) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    /// Patch that only rescales an image element.
    pub fn scaled_to(scale: Vec2) -> Self {
        Self {
            scale: Some(scale),
            ..Self::default()
        }
    }

    /// Patch that only rotates an image element.
    pub fn rotated_to(degrees: f64) -> Self {
        Self {
            rotation_degrees: Some(degrees),
            ..Self::default()
        }
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn has_text_fields(&self) -> bool {
        self.font_size.is_some()
            || self.font_family.is_some()
            || self.color.is_some()
            || self.bold.is_some()
            || self.italic.is_some()
            || self.underline.is_some()
            || self.align.is_some()
            || self.stroke_color.is_some()
            || self.stroke_width.is_some()
            || self.shadow.is_some()
    }

    fn has_image_fields(&self) -> bool {
        self.scale.is_some() || self.rotation_degrees.is_some() || self.source.is_some()
    }

    pub(crate) fn validate_for(&self, element: &Element) -> StampResult<()> {
        let id = element.id();
        match element {
            Element::Text(_) if self.has_image_fields() => Err(StampError::validation(format!(
                "element {id} is a text element; scale/rotation/source do not apply"
            ))),
            Element::Image(_) if self.has_text_fields() => Err(StampError::validation(format!(
                "element {id} is an image element; text styling does not apply"
            ))),
            _ => {
                check_finite(id, "position.x", self.position.map(|p| p.x))?;
                check_finite(id, "position.y", self.position.map(|p| p.y))?;
                check_finite(id, "rotation_degrees", self.rotation_degrees)?;
                if let Some(o) = self.opacity
                    && !(0.0..=1.0).contains(&o)
                {
                    return Err(StampError::validation(format!(
                        "element {id}: opacity must be within 0..=1, got {o}"
                    )));
                }
                if let Some(size) = self.font_size
                    && !(size.is_finite() && size > 0.0)
                {
                    return Err(StampError::validation(format!(
                        "element {id}: font size must be finite and > 0"
                    )));
                }
                if let Some(Some(w)) = self.stroke_width
                    && !(w.is_finite() && w >= 0.0)
                {
                    return Err(StampError::validation(format!(
                        "element {id}: stroke width must be finite and >= 0"
                    )));
                }
                if let Some(s) = self.scale
                    && !(s.x.is_finite() && s.y.is_finite() && s.x > 0.0 && s.y > 0.0)
                {
                    return Err(StampError::validation(format!(
                        "element {id}: scale must be finite and > 0"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Apply to `element`. Callers validate first.
    pub(crate) fn apply_to(self, element: &mut Element) {
        if let Some(p) = self.position {
            element.set_position(p);
        }
        match element {
            Element::Text(t) => {
                if let Some(v) = self.opacity {
                    t.opacity = v;
                }
                if let Some(v) = self.font_size {
                    t.font_size = v;
                }
                if let Some(v) = self.font_family {
                    t.font_family = v;
                }
                if let Some(v) = self.color {
                    t.color = v;
                }
                if let Some(v) = self.bold {
                    t.bold = v;
                }
                if let Some(v) = self.italic {
                    t.italic = v;
                }
                if let Some(v) = self.underline {
                    t.underline = v;
                }
                if let Some(v) = self.align {
                    t.align = v;
                }
                if let Some(v) = self.stroke_color {
                    t.stroke_color = v;
                }
                if let Some(v) = self.stroke_width {
                    t.stroke_width = v;
                }
                if let Some(v) = self.shadow {
                    t.shadow = v;
                }
            }
            Element::Image(i) => {
                if let Some(v) = self.opacity {
                    i.opacity = v;
                }
                if let Some(v) = self.scale {
                    i.scale = v;
                }
                if let Some(v) = self.rotation_degrees {
                    i.rotation_degrees = v;
                }
                if let Some(v) = self.source {
                    i.source = v;
                }
            }
        }
    }
}

fn check_finite(id: ElementId, what: &str, v: Option<f64>) -> StampResult<()> {
    match v {
        Some(v) if !v.is_finite() => Err(StampError::validation(format!(
            "element {id}: {what} must be finite"
        ))),
        _ => Ok(()),
    }
}
