//! One-image compositing: template base layer plus every element in z-order.
//!
//! Export and preview share the same drawing code. Export maps preview-space measurements to
//! native pixels by `1 / fit_scale`; preview draws the downscaled template and keeps element
//! measurements as stored.

use std::collections::HashMap;

use crate::{
    assets::decode::rasterize_svg_to_premul_rgba8,
    assets::store::{DecodedSource, PreparedImage, PreparedTemplate},
    foundation::core::{Affine, Color, Point, Rect, Vec2},
    foundation::error::{StampError, StampResult},
    model::dataset::Record,
    model::element::{Element, ElementId, ImageElement, TextAlign, TextElement},
    model::template::TemplateId,
    render::blur::{blur_rgba8_premul, radius_for_sigma},
    text::fonts::FontBook,
    text::shape::{ShapedText, TextShaper, TextStyle},
};

/// Shadow blur (canvas `shadowBlur`) in preview pixels.
pub const SHADOW_BLUR: f64 = 4.0;
/// Shadow offset in preview pixels.
pub const SHADOW_OFFSET: Vec2 = Vec2::new(2.0, 2.0);
/// Shadow color: black at 50%.
pub const SHADOW_COLOR: Color = Color::rgba(0, 0, 0, 128);

#[derive(Clone, Debug)]
/// CPU-readback frame payload.
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel bytes in RGBA8 layout.
    pub data: Vec<u8>,
    /// Whether `data` is alpha-premultiplied.
    pub premultiplied: bool,
}

/// Text drawn for `el` against `record`.
///
/// An absent field renders the field name itself so gaps in the data stay visible.
pub fn resolve_display_text<'a>(el: &'a TextElement, record: &'a Record) -> &'a str {
    record.get(&el.field_name).unwrap_or(&el.field_name)
}

#[derive(Clone, Copy)]
enum Pass<'r> {
    Export(&'r Record),
    Preview,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct SvgRasterKey {
    element: ElementId,
    width: u32,
    height: u32,
}

#[derive(Default)]
struct PassCache {
    pass_id: u64,
    base: Option<vello_cpu::Image>,
    images: HashMap<ElementId, vello_cpu::Image>,
    svgs: HashMap<SvgRasterKey, vello_cpu::Image>,
}

/// Deterministic single-image renderer.
///
/// Decoded-pixel paints are cached per prepared template and reused across records. The cache
/// for a template is dropped as soon as a newer preparation of it is drawn, when the template is
/// evicted, or when a batch finishes.
pub struct Compositor {
    shaper: TextShaper,
    caches: HashMap<TemplateId, PassCache>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("shaper", &self.shaper)
            .field("cached_templates", &self.caches.len())
            .finish()
    }
}

impl Compositor {
    /// Compositor over an existing shaper.
    pub fn new(shaper: TextShaper) -> Self {
        Self {
            shaper,
            caches: HashMap::new(),
        }
    }

    /// Compositor shaping text with `fonts`.
    pub fn with_fonts(fonts: FontBook) -> Self {
        Self::new(TextShaper::new(fonts))
    }

    /// Shaper used for text elements.
    pub fn shaper_mut(&mut self) -> &mut TextShaper {
        &mut self.shaper
    }

    /// Number of templates with cached paints.
    pub fn cached_templates(&self) -> usize {
        self.caches.len()
    }

    /// Drop the cached paints of one template.
    pub fn evict(&mut self, id: TemplateId) {
        self.caches.remove(&id);
    }

    /// Drop every cached paint.
    pub fn clear_cache(&mut self) {
        self.caches.clear();
    }

    /// Render `prepared` at native resolution with text fields taken from `record`.
    #[tracing::instrument(skip_all, fields(template = %prepared.name()))]
    pub fn render(
        &mut self,
        prepared: &PreparedTemplate,
        record: &Record,
    ) -> StampResult<FrameRGBA> {
        let size = prepared.scaler().source_size();
        self.draw(prepared, Pass::Export(record), size.width, size.height)
    }

    /// Render the editor view: template at `fit_scale`, elements at their stored preview
    /// coordinates, text elements showing their `{{field}}` labels.
    #[tracing::instrument(skip_all, fields(template = %prepared.name()))]
    pub fn render_preview(&mut self, prepared: &PreparedTemplate) -> StampResult<FrameRGBA> {
        let size = prepared.scaler().preview_size();
        self.draw(
            prepared,
            Pass::Preview,
            size.width.round().max(1.0),
            size.height.round().max(1.0),
        )
    }

    fn draw(
        &mut self,
        prepared: &PreparedTemplate,
        pass: Pass<'_>,
        width: f64,
        height: f64,
    ) -> StampResult<FrameRGBA> {
        let (w16, h16) = surface_dims(width, height)?;
        let fit = prepared.scaler().fit_scale();
        // element measurements are preview-space; `k` maps them onto this surface
        let (k, base_scale) = match pass {
            Pass::Export(_) => (1.0 / fit, 1.0),
            Pass::Preview => (1.0, fit),
        };

        let cache = self.caches.entry(prepared.template_id()).or_default();
        if cache.pass_id != prepared.pass_id() {
            *cache = PassCache {
                pass_id: prepared.pass_id(),
                ..PassCache::default()
            };
        }

        let mut ctx = vello_cpu::RenderContext::new(w16, h16);
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);

        let base = match &cache.base {
            Some(paint) => paint.clone(),
            None => {
                let paint = image_paint(prepared.base())?;
                cache.base = Some(paint.clone());
                paint
            }
        };
        let b = prepared.base();
        ctx.set_transform(affine_to_cpu(Affine::scale(base_scale)));
        ctx.set_paint(base);
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(b.width),
            f64::from(b.height),
        ));

        for el in prepared.elements() {
            match el {
                Element::Image(img) => {
                    let Some(decoded) = prepared.image(img.id) else {
                        continue;
                    };
                    let Some(cache) = self.caches.get_mut(&prepared.template_id()) else {
                        continue;
                    };
                    draw_image(&mut ctx, cache, img, decoded, k)?;
                }
                Element::Text(text) => {
                    let label;
                    let display = match pass {
                        Pass::Export(record) => resolve_display_text(text, record),
                        Pass::Preview => {
                            label = text.preview_label();
                            label.as_str()
                        }
                    };
                    if !draw_text(&mut ctx, &mut self.shaper, text, display, k)? {
                        tracing::warn!(
                            element = %text.id,
                            field = %text.field_name,
                            "text element not drawn: no usable font"
                        );
                    }
                }
            }
        }

        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(w16, h16);
        ctx.render_to_pixmap(&mut pixmap);

        Ok(FrameRGBA {
            width: u32::from(w16),
            height: u32::from(h16),
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }
}

fn surface_dims(width: f64, height: f64) -> StampResult<(u16, u16)> {
    let conv = |v: f64, what: &str| -> StampResult<u16> {
        if !v.is_finite() || v < 1.0 || v > f64::from(u16::MAX) {
            return Err(StampError::render(format!(
                "surface {what} {v} is outside 1..={}",
                u16::MAX
            )));
        }
        Ok(v.round() as u16)
    };
    Ok((conv(width, "width")?, conv(height, "height")?))
}

fn draw_image(
    ctx: &mut vello_cpu::RenderContext,
    cache: &mut PassCache,
    el: &ImageElement,
    decoded: &DecodedSource,
    k: f64,
) -> StampResult<()> {
    let (iw, ih) = decoded.intrinsic_size();
    let draw_w = f64::from(iw) * el.scale.x * k;
    let draw_h = f64::from(ih) * el.scale.y * k;
    if !(draw_w > 0.0 && draw_h > 0.0) {
        return Ok(());
    }

    let (paint, pw, ph) = match decoded {
        DecodedSource::Raster(img) => {
            let paint = match cache.images.get(&el.id) {
                Some(p) => p.clone(),
                None => {
                    let p = image_paint(img)?;
                    cache.images.insert(el.id, p.clone());
                    p
                }
            };
            (paint, f64::from(img.width), f64::from(img.height))
        }
        DecodedSource::Svg(svg) => {
            // rasterize at the final pixel size instead of resampling the intrinsic raster
            let key = SvgRasterKey {
                element: el.id,
                width: (draw_w.ceil() as u32).max(1),
                height: (draw_h.ceil() as u32).max(1),
            };
            let limit = u32::from(u16::MAX);
            if key.width > limit || key.height > limit {
                return Err(StampError::render(format!(
                    "svg element {} would rasterize at {}x{}, above {limit} px",
                    el.id, key.width, key.height
                )));
            }
            let paint = match cache.svgs.get(&key) {
                Some(p) => p.clone(),
                None => {
                    let rgba8_premul =
                        rasterize_svg_to_premul_rgba8(&svg.tree, key.width, key.height)?;
                    let p = image_paint(&PreparedImage {
                        width: key.width,
                        height: key.height,
                        rgba8_premul: std::sync::Arc::new(rgba8_premul),
                    })?;
                    cache.svgs.insert(key, p.clone());
                    p
                }
            };
            (paint, f64::from(key.width), f64::from(key.height))
        }
    };

    let transform = image_transform(el, k, draw_w, draw_h, pw, ph);
    ctx.set_transform(affine_to_cpu(transform));
    ctx.set_paint(paint);

    let opacity = el_opacity(el.opacity);
    if opacity < 1.0 {
        ctx.push_opacity_layer(opacity);
    }
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, pw, ph));
    if opacity < 1.0 {
        ctx.pop_layer();
    }
    Ok(())
}

/// Place a `pw` x `ph` paint as a `draw_w` x `draw_h` box at the element's position, rotated
/// about the box center.
fn image_transform(
    el: &ImageElement,
    k: f64,
    draw_w: f64,
    draw_h: f64,
    pw: f64,
    ph: f64,
) -> Affine {
    let origin = Vec2::new(el.position.x * k, el.position.y * k);
    let center = Point::new(draw_w / 2.0, draw_h / 2.0);
    Affine::translate(origin)
        * Affine::rotate_about(el.rotation_degrees.to_radians(), center)
        * Affine::scale_non_uniform(draw_w / pw, draw_h / ph)
}

/// Draw one text element; `Ok(false)` when no font could shape it.
fn draw_text(
    ctx: &mut vello_cpu::RenderContext,
    shaper: &mut TextShaper,
    el: &TextElement,
    text: &str,
    k: f64,
) -> StampResult<bool> {
    if text.is_empty() {
        return Ok(true);
    }

    let size = el.font_size * k;
    let Some(shaped) = shaper.shape(
        text,
        TextStyle {
            family: &el.font_family,
            size_px: size,
            bold: el.bold,
            italic: el.italic,
        },
    )?
    else {
        return Ok(false);
    };

    let origin = text_origin(el, &shaped, k);
    let stroke = el.stroke().map(|(c, w)| (c, w * k));

    let opacity = el_opacity(el.opacity);
    if opacity < 1.0 {
        ctx.push_opacity_layer(opacity);
    }

    if el.shadow {
        draw_text_shadow(ctx, &shaped, origin, stroke.map(|(_, w)| w), k)?;
    }

    ctx.set_transform(affine_to_cpu(Affine::translate(origin.to_vec2())));
    if let Some((color, width)) = stroke {
        ctx.set_stroke(vello_cpu::kurbo::Stroke::new(width));
        ctx.set_paint(to_cpu_color(color));
        paint_glyphs(ctx, &shaped, GlyphPaint::Stroke);
    }
    ctx.set_paint(to_cpu_color(el.color));
    paint_glyphs(ctx, &shaped, GlyphPaint::Fill);

    if el.underline {
        let thickness = (size / 15.0).max(1.0);
        let y = shaped.baseline + thickness;
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            y,
            shaped.width,
            y + thickness,
        ));
    }

    if opacity < 1.0 {
        ctx.pop_layer();
    }
    Ok(true)
}

/// Top-left corner of the text box: `left` anchors the start, middle or end of the line.
fn text_origin(el: &TextElement, shaped: &ShapedText, k: f64) -> Point {
    let left = el.position.x * k;
    let x = match el.align {
        TextAlign::Left => left,
        TextAlign::Center => left - shaped.width / 2.0,
        TextAlign::Right => left - shaped.width,
    };
    Point::new(x, el.position.y * k)
}

fn draw_text_shadow(
    ctx: &mut vello_cpu::RenderContext,
    shaped: &ShapedText,
    origin: Point,
    stroke_width: Option<f64>,
    k: f64,
) -> StampResult<()> {
    // canvas shadowBlur is twice the gaussian sigma
    let sigma = SHADOW_BLUR / 2.0 * k;
    let radius = radius_for_sigma(sigma);
    let pad = f64::from(radius) + stroke_width.unwrap_or(0.0).ceil() + 1.0;
    let w = shaped.width.ceil() + 2.0 * pad;
    let h = shaped.height.ceil() + 2.0 * pad;
    let (w16, h16) = surface_dims(w, h)?;

    let mut off = vello_cpu::RenderContext::new(w16, h16);
    off.set_transform(affine_to_cpu(Affine::translate((pad, pad))));
    off.set_paint(to_cpu_color(SHADOW_COLOR));
    if let Some(width) = stroke_width {
        off.set_stroke(vello_cpu::kurbo::Stroke::new(width));
        paint_glyphs(&mut off, shaped, GlyphPaint::Stroke);
    }
    paint_glyphs(&mut off, shaped, GlyphPaint::Fill);
    off.flush();
    let mut pixmap = vello_cpu::Pixmap::new(w16, h16);
    off.render_to_pixmap(&mut pixmap);

    let (wu, hu) = (u32::from(w16), u32::from(h16));
    let blurred = blur_rgba8_premul(pixmap.data_as_u8_slice(), wu, hu, radius, sigma)?;
    let paint = image_paint(&PreparedImage {
        width: wu,
        height: hu,
        rgba8_premul: std::sync::Arc::new(blurred),
    })?;

    let at = origin.to_vec2() + SHADOW_OFFSET * k - Vec2::new(pad, pad);
    ctx.set_transform(affine_to_cpu(Affine::translate(at)));
    ctx.set_paint(paint);
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
        0.0,
        0.0,
        f64::from(wu),
        f64::from(hu),
    ));
    Ok(())
}

#[derive(Clone, Copy)]
enum GlyphPaint {
    Fill,
    Stroke,
}

fn paint_glyphs(ctx: &mut vello_cpu::RenderContext, shaped: &ShapedText, mode: GlyphPaint) {
    for line in shaped.layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y,
            });
            let builder = ctx
                .glyph_run(&shaped.font)
                .font_size(run.run().font_size());
            match mode {
                GlyphPaint::Fill => builder.fill_glyphs(glyphs),
                GlyphPaint::Stroke => builder.stroke_glyphs(glyphs),
            }
        }
    }
}

fn el_opacity(opacity: f64) -> f32 {
    if opacity.is_finite() {
        opacity.clamp(0.0, 1.0) as f32
    } else {
        1.0
    }
}

fn to_cpu_color(c: Color) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn image_paint(img: &PreparedImage) -> StampResult<vello_cpu::Image> {
    let pixmap = image_premul_bytes_to_pixmap(img.rgba8_premul.as_slice(), img.width, img.height)?;
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(std::sync::Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

fn image_premul_bytes_to_pixmap(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> StampResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| StampError::render("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| StampError::render("image height exceeds u16"))?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(StampError::render("prepared image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let pixels = rgba8_premul
        .chunks_exact(4)
        .map(|px| {
            may_have_opacities |= px[3] != 255;
            vello_cpu::peniko::color::PremulRgba8 {
                r: px[0],
                g: px[1],
                b: px[2],
                a: px[3],
            }
        })
        .collect::<Vec<_>>();

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

/// Axis-aligned bounds of an image element in preview space, rotation included.
pub(crate) fn image_bounds(el: &ImageElement, intrinsic: (u32, u32)) -> Rect {
    let draw_w = f64::from(intrinsic.0) * el.scale.x;
    let draw_h = f64::from(intrinsic.1) * el.scale.y;
    let xf = image_transform(el, 1.0, draw_w, draw_h, draw_w.max(1e-9), draw_h.max(1e-9));
    xf.transform_rect_bbox(Rect::new(0.0, 0.0, draw_w, draw_h))
}

/// Bounds of shaped text in preview space, alignment applied.
pub(crate) fn text_bounds(el: &TextElement, shaped: &ShapedText) -> Rect {
    let origin = text_origin(el, shaped, 1.0);
    Rect::from_origin_size(origin, (shaped.width, shaped.height))
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
