use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::Context;

use crate::{
    assets::decode::{decode_image, decode_source},
    foundation::error::{StampError, StampResult},
    geometry::scale::Scaler,
    model::element::{Element, ElementId, ImageSource},
    model::template::{Template, TemplateId},
};

#[derive(Clone, Debug)]
/// Prepared raster image in premultiplied RGBA8 form.
pub struct PreparedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

#[derive(Clone, Debug)]
/// Prepared SVG document represented as a parsed `usvg` tree.
pub struct PreparedSvg {
    /// Parsed SVG tree.
    pub tree: Arc<usvg::Tree>,
}

impl PreparedSvg {
    /// Logical size rounded up to whole pixels (at least 1x1).
    pub fn intrinsic_size(&self) -> (u32, u32) {
        let size = self.tree.size();
        (
            (size.width().ceil() as u32).max(1),
            (size.height().ceil() as u32).max(1),
        )
    }
}

#[derive(Clone, Debug)]
/// Pixel data of one image element after decoding.
pub enum DecodedSource {
    /// Bitmap, drawn by resampling.
    Raster(PreparedImage),
    /// Vector document, rasterized at the final draw size.
    Svg(PreparedSvg),
}

impl DecodedSource {
    /// Intrinsic pixel size that element scale factors multiply.
    pub fn intrinsic_size(&self) -> (u32, u32) {
        match self {
            Self::Raster(img) => (img.width, img.height),
            Self::Svg(svg) => svg.intrinsic_size(),
        }
    }
}

/// Fetches the encoded bytes behind an [`ImageSource`].
///
/// Resolution happens once per render pass, before any drawing; renderers never perform IO.
pub trait SourceResolver {
    /// Load encoded bytes for `source`.
    fn load(&self, source: &ImageSource) -> StampResult<Arc<Vec<u8>>>;
}

/// Resolves file sources relative to a root directory.
#[derive(Clone, Debug)]
pub struct FsResolver {
    root: PathBuf,
}

impl FsResolver {
    /// Resolver rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory used when resolving relative paths.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SourceResolver for FsResolver {
    fn load(&self, source: &ImageSource) -> StampResult<Arc<Vec<u8>>> {
        match source {
            ImageSource::Bytes(bytes) => Ok(Arc::clone(bytes)),
            ImageSource::File(rel) => {
                let norm = normalize_rel_path(&rel.to_string_lossy())?;
                let path = self.root.join(Path::new(&norm));
                let bytes = std::fs::read(&path)
                    .with_context(|| format!("read image bytes from '{}'", path.display()))?;
                Ok(Arc::new(bytes))
            }
            ImageSource::Url(url) => Err(StampError::validation(format!(
                "remote image '{url}' needs a fetching resolver"
            ))),
        }
    }
}

/// [`FsResolver`] that also downloads [`ImageSource::Url`] sources over HTTP(S).
#[cfg(feature = "fetch")]
#[derive(Debug)]
pub struct HttpResolver {
    files: FsResolver,
    client: reqwest::blocking::Client,
}

#[cfg(feature = "fetch")]
impl HttpResolver {
    /// Resolver for files under `root` and remote URLs, with a 30 s request timeout.
    pub fn new(root: impl Into<PathBuf>) -> StampResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("build http client")?;
        Ok(Self {
            files: FsResolver::new(root),
            client,
        })
    }
}

#[cfg(feature = "fetch")]
impl SourceResolver for HttpResolver {
    fn load(&self, source: &ImageSource) -> StampResult<Arc<Vec<u8>>> {
        let ImageSource::Url(url) = source else {
            return self.files.load(source);
        };
        tracing::debug!(%url, "fetching remote image");
        let bytes = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes())
            .with_context(|| format!("fetch image from '{url}'"))?;
        Ok(Arc::new(bytes.to_vec()))
    }
}

/// Normalize and validate root-relative source paths.
///
/// The normalized result uses `/` separators, removes `.` segments, and rejects absolute paths or
/// parent traversals (`..`).
pub fn normalize_rel_path(source: &str) -> StampResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(StampError::validation("image paths must be relative"));
    }
    if s.is_empty() {
        return Err(StampError::validation("image path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(StampError::validation("image paths must not contain '..'"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(StampError::validation(
            "image path must contain a file name",
        ));
    }

    Ok(out.join("/"))
}

static NEXT_PASS_ID: AtomicU64 = AtomicU64::new(1);

/// A template with every pixel source decoded, ready for repeated rendering.
///
/// This is the per-pass image cache: element id -> decoded pixels, filled once and read-only
/// afterwards. Elements whose source failed to load are absent and listed in
/// [`PreparedTemplate::skipped`].
#[derive(Debug)]
pub struct PreparedTemplate {
    pass_id: u64,
    template_id: TemplateId,
    name: String,
    base: PreparedImage,
    scaler: Scaler,
    elements: Arc<Vec<Element>>,
    images: HashMap<ElementId, DecodedSource>,
    skipped: Vec<StampError>,
}

impl PreparedTemplate {
    /// Decode the template image and every image element of `template`.
    ///
    /// Fails only when the template image itself cannot be decoded.
    #[tracing::instrument(skip(template, resolver), fields(template = %template.name()))]
    pub fn prepare(template: &Template, resolver: &dyn SourceResolver) -> StampResult<Self> {
        let base = decode_image(&template.image().bytes)?;
        let declared = template.image();
        let scaler = if (base.width, base.height) == (declared.width, declared.height) {
            template.scaler()
        } else {
            tracing::warn!(
                declared_w = declared.width,
                declared_h = declared.height,
                decoded_w = base.width,
                decoded_h = base.height,
                "template image size differs from its declared size; using decoded size"
            );
            Scaler::for_template(base.width, base.height, template.preview_box())
        };

        let elements = template.snapshot();
        let mut images = HashMap::new();
        let mut skipped = Vec::new();
        for el in elements.iter() {
            let Element::Image(img) = el else {
                continue;
            };
            let decoded = resolver
                .load(&img.source)
                .and_then(|bytes| decode_source(&bytes));
            match decoded {
                Ok(d) => {
                    images.insert(img.id, d);
                }
                Err(e) => {
                    let err = StampError::image_decode(img.id, format!("{e:#}"));
                    tracing::warn!(element = %img.id, error = %err, "skipping image element");
                    skipped.push(err);
                }
            }
        }

        Ok(Self {
            pass_id: NEXT_PASS_ID.fetch_add(1, Ordering::Relaxed),
            template_id: template.id(),
            name: template.name().to_string(),
            base,
            scaler,
            elements,
            images,
            skipped,
        })
    }

    /// Unique id of this preparation; paint caches keyed on it never outlive the pixels.
    pub fn pass_id(&self) -> u64 {
        self.pass_id
    }

    /// Id of the source template.
    pub fn template_id(&self) -> TemplateId {
        self.template_id
    }

    /// Name of the source template.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decoded template image.
    pub fn base(&self) -> &PreparedImage {
        &self.base
    }

    /// Preview/source mapping.
    pub fn scaler(&self) -> Scaler {
        self.scaler
    }

    /// Element snapshot in z-order.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Decoded pixels for an image element, if its source loaded.
    pub fn image(&self, id: ElementId) -> Option<&DecodedSource> {
        self.images.get(&id)
    }

    /// Elements left out of this pass, as [`StampError::ImageDecode`] values.
    pub fn skipped(&self) -> &[StampError] {
        &self.skipped
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/store.rs"]
mod tests;
