//! Editing session: templates, the loaded dataset and export statistics.

use std::sync::Arc;

use crate::{
    assets::store::{FsResolver, PreparedTemplate, SourceResolver},
    foundation::error::{StampError, StampResult},
    model::dataset::Dataset,
    model::element::{Element, ElementId, ImageElement, ImageSource, TextElement},
    model::patch::ElementPatch,
    model::template::{Template, TemplateId, TemplateImage},
    preview::surface::{ElementUpdate, PreviewSurface, ZOrderRequest},
    render::batch::{BatchOutput, BatchProgress, BatchRenderer},
    render::compositor::{Compositor, FrameRGBA},
    render::settings::RenderSettings,
    text::fonts::FontBook,
};

/// Counts kept across batch runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Finished batch exports.
    pub batches_completed: u64,
    /// Images rendered across all batches.
    pub images_generated: u64,
}

/// Owns everything one editor works on.
pub struct Session {
    settings: RenderSettings,
    templates: Vec<Template>,
    dataset: Dataset,
    stats: SessionStats,
    compositor: Compositor,
    resolver: Box<dyn SourceResolver>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("settings", &self.settings)
            .field("templates", &self.templates.len())
            .field("records", &self.dataset.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl Session {
    /// Session using system fonts plus `settings.font_dirs`, resolving files from the working
    /// directory.
    pub fn new(settings: RenderSettings) -> Self {
        let fonts = FontBook::system(&settings.font_dirs);
        Self::with_fonts(settings, fonts)
    }

    /// Session with an explicit font book.
    pub fn with_fonts(settings: RenderSettings, fonts: FontBook) -> Self {
        Self {
            settings,
            templates: Vec::new(),
            dataset: Dataset::default(),
            stats: SessionStats::default(),
            compositor: Compositor::with_fonts(fonts),
            resolver: Box::new(FsResolver::new(".")),
        }
    }

    /// Resolve image element files through `resolver`.
    pub fn with_resolver(mut self, resolver: impl SourceResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    /// Active settings.
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Export statistics.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Templates in export order.
    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// One template.
    pub fn template(&self, id: TemplateId) -> StampResult<&Template> {
        self.templates
            .iter()
            .find(|t| t.id() == id)
            .ok_or_else(|| unknown_template(id))
    }

    fn template_mut(&mut self, id: TemplateId) -> StampResult<&mut Template> {
        self.templates
            .iter_mut()
            .find(|t| t.id() == id)
            .ok_or_else(|| unknown_template(id))
    }

    /// Add a template using the session's preview box.
    pub fn add_template(&mut self, name: impl Into<String>, image: TemplateImage) -> TemplateId {
        let t = Template::new(name, image).with_preview_box(self.settings.preview_box);
        let id = t.id();
        tracing::debug!(template = %t.name(), "template added");
        self.templates.push(t);
        id
    }

    /// Add an already built template (for example one loaded from a project file).
    pub fn push_template(&mut self, template: Template) -> TemplateId {
        let id = template.id();
        self.templates.push(template);
        id
    }

    /// Remove a template and its elements.
    pub fn remove_template(&mut self, id: TemplateId) -> StampResult<Template> {
        let idx = self
            .templates
            .iter()
            .position(|t| t.id() == id)
            .ok_or_else(|| unknown_template(id))?;
        self.compositor.evict(id);
        Ok(self.templates.remove(idx))
    }

    /// Swap a template's image. Placed elements are cleared because their coordinates belong
    /// to the old image's preview.
    pub fn replace_template_image(
        &mut self,
        id: TemplateId,
        image: TemplateImage,
    ) -> StampResult<Arc<Vec<Element>>> {
        let cleared = self.template_mut(id)?.replace_image(image);
        self.compositor.evict(id);
        Ok(cleared)
    }

    /// Loaded dataset.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Replace the dataset. Existing text elements keep their bindings; absent fields render
    /// their own name.
    pub fn set_dataset(&mut self, dataset: Dataset) {
        tracing::info!(
            headers = dataset.headers().len(),
            records = dataset.len(),
            "dataset loaded"
        );
        self.dataset = dataset;
    }

    /// Headers not yet placed on template `id`.
    pub fn available_fields(&self, id: TemplateId) -> StampResult<Vec<String>> {
        let t = self.template(id)?;
        Ok(t
            .available_fields(self.dataset.headers())
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    /// Bind a dataset header to a new text element on template `id`.
    pub fn add_text_element(
        &mut self,
        id: TemplateId,
        field_name: &str,
    ) -> StampResult<TextElement> {
        if !self.dataset.has_header(field_name) {
            return Err(StampError::UnknownField {
                field: field_name.to_string(),
            });
        }
        self.template_mut(id)?.add_text_element(field_name)
    }

    /// Place an image or sticker on template `id`.
    pub fn add_image_element(
        &mut self,
        id: TemplateId,
        source: ImageSource,
    ) -> StampResult<ImageElement> {
        Ok(self.template_mut(id)?.add_image_element(source))
    }

    /// Partial update of one element.
    pub fn update_element(
        &mut self,
        id: TemplateId,
        element: ElementId,
        patch: ElementPatch,
    ) -> StampResult<Arc<Vec<Element>>> {
        self.template_mut(id)?.update_element(element, patch)
    }

    /// Remove one element.
    pub fn remove_element(
        &mut self,
        id: TemplateId,
        element: ElementId,
    ) -> StampResult<Arc<Vec<Element>>> {
        self.template_mut(id)?.remove_element(element)
    }

    /// Duplicate one image element.
    pub fn duplicate_element(
        &mut self,
        id: TemplateId,
        element: ElementId,
    ) -> StampResult<Element> {
        self.template_mut(id)?.duplicate_element(element)
    }

    /// Apply an update emitted by a [`PreviewSurface`].
    pub fn apply_update(
        &mut self,
        id: TemplateId,
        update: ElementUpdate,
    ) -> StampResult<Arc<Vec<Element>>> {
        update.apply(self.template_mut(id)?)
    }

    /// Apply a z-order request emitted by a [`PreviewSurface`].
    pub fn apply_reorder(
        &mut self,
        id: TemplateId,
        request: ZOrderRequest,
    ) -> StampResult<Arc<Vec<Element>>> {
        request.apply(self.template_mut(id)?)
    }

    /// Fresh editing surface for template `id`.
    pub fn preview_surface(&mut self, id: TemplateId) -> StampResult<PreviewSurface> {
        let prepared = self.prepare(id)?;
        Ok(PreviewSurface::load(&prepared, self.compositor.shaper_mut()))
    }

    /// Raster of the editor view of template `id`.
    pub fn render_preview(&mut self, id: TemplateId) -> StampResult<FrameRGBA> {
        let prepared = self.prepare(id)?;
        self.compositor.render_preview(&prepared)
    }

    fn prepare(&self, id: TemplateId) -> StampResult<PreparedTemplate> {
        let t = self.template(id)?;
        PreparedTemplate::prepare(t, self.resolver.as_ref())
    }

    /// Export every eligible template for every record and update the statistics.
    pub fn generate(
        &mut self,
        on_progress: impl FnMut(BatchProgress),
    ) -> StampResult<BatchOutput> {
        let out = BatchRenderer::new(&mut self.compositor, self.resolver.as_ref())
            .with_compression(self.settings.archive_compression)
            .run(&self.templates, &self.dataset, on_progress)?;
        self.stats.batches_completed += 1;
        self.stats.images_generated += out.images_generated as u64;
        Ok(out)
    }
}

fn unknown_template(id: TemplateId) -> StampError {
    StampError::validation(format!("unknown template {}", id.as_u64()))
}

#[cfg(test)]
#[path = "../tests/unit/session.rs"]
mod tests;
