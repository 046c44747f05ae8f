use std::io::Cursor;

use anyhow::Context;

use crate::{
    foundation::error::{StampError, StampResult},
    foundation::math::unpremultiply_rgba8_in_place,
    render::compositor::FrameRGBA,
};

/// Encode a frame as PNG (straight alpha, no timestamps or other varying metadata).
pub fn encode_png(frame: &FrameRGBA) -> StampResult<Vec<u8>> {
    let mut rgba = frame.data.clone();
    if frame.premultiplied {
        unpremultiply_rgba8_in_place(&mut rgba);
    }
    let img = image::RgbaImage::from_raw(frame.width, frame.height, rgba)
        .ok_or_else(|| StampError::render("frame byte length does not match its size"))?;

    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .context("encode frame as png")?;
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/render/encode.rs"]
mod tests;
