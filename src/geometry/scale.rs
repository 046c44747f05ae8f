//! Conversions between preview space and source (template-native) space.
//!
//! Every element position, font size and stroke width is stored in preview space: the fixed
//! editing canvas the template is displayed on after being scaled by [`fit_scale`]. Export
//! divides each of those linear measurements by the same factor, which is what keeps the
//! editor and the rendered output in agreement.

use crate::foundation::core::{Point, Size};

/// Fixed bounding box of the editing canvas, in preview pixels.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PreviewBox {
    /// Maximum preview width.
    pub width: f64,
    /// Maximum preview height.
    pub height: f64,
}

impl Default for PreviewBox {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

impl PreviewBox {
    /// Parse a `"WxH"` string such as `"800x600"`.
    pub fn parse(s: &str) -> Option<Self> {
        let (w, h) = s.trim().split_once(['x', 'X'])?;
        let width = w.trim().parse::<f64>().ok()?;
        let height = h.trim().parse::<f64>().ok()?;
        (width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0)
            .then_some(Self { width, height })
    }
}

/// Uniform factor that fits a `template_w` x `template_h` image inside `max_w` x `max_h`
/// without cropping.
///
/// Degenerate inputs (zero or non-finite dimensions) fall back to `1.0`.
pub fn fit_scale(template_w: f64, template_h: f64, max_w: f64, max_h: f64) -> f64 {
    let s = (max_w / template_w).min(max_h / template_h);
    if template_w > 0.0 && template_h > 0.0 && s.is_finite() && s > 0.0 {
        s
    } else {
        1.0
    }
}

/// Map a preview-space linear measurement to source space.
pub fn preview_to_source(value: f64, fit_scale: f64) -> f64 {
    value / sanitize(fit_scale)
}

/// Map a source-space linear measurement to preview space.
pub fn source_to_preview(value: f64, fit_scale: f64) -> f64 {
    value * sanitize(fit_scale)
}

fn sanitize(fit_scale: f64) -> f64 {
    if fit_scale.is_finite() && fit_scale > 0.0 {
        fit_scale
    } else {
        1.0
    }
}

/// A fixed mapping between the preview canvas of one template and its native pixels.
///
/// `Scaler` is a plain value; it carries no state beyond the factor and the source size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scaler {
    fit_scale: f64,
    source: Size,
}

impl Scaler {
    /// Build the scaler for a template of `source_w` x `source_h` pixels in `preview_box`.
    pub fn for_template(source_w: u32, source_h: u32, preview_box: PreviewBox) -> Self {
        let (w, h) = (f64::from(source_w), f64::from(source_h));
        Self {
            fit_scale: fit_scale(w, h, preview_box.width, preview_box.height),
            source: Size::new(w, h),
        }
    }

    /// Identity mapping, used when drawing directly in preview space.
    pub fn identity(size: Size) -> Self {
        Self {
            fit_scale: 1.0,
            source: size,
        }
    }

    /// The fit factor (source -> preview).
    pub fn fit_scale(&self) -> f64 {
        self.fit_scale
    }

    /// Native template size.
    pub fn source_size(&self) -> Size {
        self.source
    }

    /// Size of the preview canvas: the source size multiplied by the fit factor.
    pub fn preview_size(&self) -> Size {
        Size::new(
            self.source.width * self.fit_scale,
            self.source.height * self.fit_scale,
        )
    }

    /// Preview-space length to source space.
    pub fn len_to_source(&self, v: f64) -> f64 {
        preview_to_source(v, self.fit_scale)
    }

    /// Preview-space point to source space.
    pub fn point_to_source(&self, p: Point) -> Point {
        Point::new(self.len_to_source(p.x), self.len_to_source(p.y))
    }

    /// Source-space point to preview space.
    pub fn point_to_preview(&self, p: Point) -> Point {
        Point::new(
            source_to_preview(p.x, self.fit_scale),
            source_to_preview(p.y, self.fit_scale),
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/geometry/scale.rs"]
mod tests;
