//! certstamp stamps per-record text and image overlays onto certificate templates.
//!
//! Elements are placed on a fixed-size preview canvas and stored in preview-space coordinates.
//! Export renders every eligible template once per dataset record at the template's native
//! resolution, dividing each preview-space measurement by the template's fit scale, and packs
//! the PNGs into one zip archive.
//!
//! # Pipeline overview
//!
//! 1. **Model**: [`Template`] + [`Element`] list (z-order = list order), [`Dataset`] of [`Record`]s
//! 2. **Prepare**: [`PreparedTemplate::prepare`] decodes the template and every image source once
//! 3. **Composite**: [`Compositor::render`] draws one record into a [`FrameRGBA`]
//! 4. **Batch**: [`BatchRenderer::run`] walks templates x records into a [`BatchOutput`] archive
//!
//! Design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Deterministic**: the same template, elements and record always give the same pixels.
//! - **No IO in renderers**: source loading happens in the prepare step.
//! - **Narrow failure scope**: a bad sticker or record is skipped and reported, never fatal to a
//!   batch.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod assets;
mod foundation;
mod geometry;
mod model;
mod preview;
mod project;
mod render;
mod session;
mod text;

pub use assets::decode::{decode_image, decode_source, parse_svg};
pub use assets::store::{
    DecodedSource, FsResolver, PreparedImage, PreparedSvg, PreparedTemplate, SourceResolver,
    normalize_rel_path,
};
#[cfg(feature = "fetch")]
pub use assets::store::HttpResolver;
pub use foundation::core::{Affine, Color, Point, Rect, Size, Vec2};
pub use foundation::error::{StampError, StampResult};
pub use geometry::scale::{PreviewBox, Scaler, fit_scale, preview_to_source, source_to_preview};
pub use model::dataset::{Dataset, Record};
pub use model::element::{
    COLOR_PRESETS, Element, ElementId, FONT_OPTIONS, FONT_SIZES, ImageElement, ImageSource,
    STICKERS, Sticker, TextAlign, TextElement,
};
pub use model::patch::ElementPatch;
pub use model::template::{DUPLICATE_OFFSET, Template, TemplateId, TemplateImage};
pub use preview::surface::{
    ElementUpdate, PreviewSurface, Primitive, PrimitiveKind, ZOrder, ZOrderRequest,
};
pub use project::{Project, ProjectFile, TemplateSpec};
pub use render::archive::ArchiveBuilder;
pub use render::batch::{BatchOutput, BatchProgress, BatchRenderer, Skipped, safe_file_name};
pub use render::blur::blur_rgba8_premul;
pub use render::compositor::{
    Compositor, FrameRGBA, SHADOW_BLUR, SHADOW_COLOR, SHADOW_OFFSET, resolve_display_text,
};
pub use render::encode::encode_png;
pub use render::settings::{
    ArchiveCompression, ENV_ARCHIVE_STORE, ENV_FONT_DIR, ENV_PREVIEW_BOX, RenderSettings,
};
pub use session::{Session, SessionStats};
pub use text::fonts::{FontBook, ResolvedFont};
pub use text::shape::{ShapedText, TextShaper, TextStyle};
