use std::sync::Arc;

use anyhow::Context;

use crate::{
    assets::store::{DecodedSource, PreparedImage, PreparedSvg},
    foundation::error::{StampError, StampResult},
    foundation::math::premultiply_rgba8_in_place,
};

/// Decode encoded raster bytes and convert to premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> StampResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

/// Parse SVG bytes into a prepared `usvg` tree.
pub fn parse_svg(bytes: &[u8]) -> StampResult<PreparedSvg> {
    let opts = usvg::Options::default();
    let tree = usvg::Tree::from_data(bytes, &opts).context("parse svg tree")?;
    Ok(PreparedSvg {
        tree: Arc::new(tree),
    })
}

/// Decode either a raster image or an SVG document.
pub fn decode_source(bytes: &[u8]) -> StampResult<DecodedSource> {
    if looks_like_svg(bytes) {
        return parse_svg(bytes).map(DecodedSource::Svg);
    }
    decode_image(bytes).map(DecodedSource::Raster)
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    let head = String::from_utf8_lossy(head);
    let head = head.trim_start_matches('\u{feff}').trim_start();
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}

/// Rasterize `tree` into a `width` x `height` premultiplied RGBA8 buffer, stretching the SVG's
/// logical size to fill it.
pub fn rasterize_svg_to_premul_rgba8(
    tree: &usvg::Tree,
    width: u32,
    height: u32,
) -> StampResult<Vec<u8>> {
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| StampError::render("failed to allocate svg pixmap"))?;

    let sx = (width as f32) / tree.size().width();
    let sy = (height as f32) / tree.size().height();
    let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);

    resvg::render(tree, xform, &mut pixmap.as_mut());
    Ok(pixmap.data().to_vec())
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
