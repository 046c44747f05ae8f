use std::{
    collections::HashSet,
    io::Cursor,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::Context;

use crate::{
    foundation::core::{Point, Vec2},
    foundation::error::{StampError, StampResult},
    geometry::scale::{PreviewBox, Scaler},
    model::element::{Element, ElementId, ImageElement, ImageSource, TextElement},
    model::patch::ElementPatch,
};

/// Preview-space offset applied to duplicated elements.
pub const DUPLICATE_OFFSET: Vec2 = Vec2::new(20.0, 20.0);

static NEXT_TEMPLATE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique template identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TemplateId(u64);

impl TemplateId {
    fn next() -> Self {
        Self(NEXT_TEMPLATE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Access the raw value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Encoded template image plus its intrinsic pixel size.
#[derive(Clone, Debug, PartialEq)]
pub struct TemplateImage {
    /// Encoded bytes (PNG, JPEG, ...).
    pub bytes: Arc<Vec<u8>>,
    /// Intrinsic width in pixels.
    pub width: u32,
    /// Intrinsic height in pixels.
    pub height: u32,
}

impl TemplateImage {
    /// Wrap bytes whose dimensions were already decoded by the caller.
    pub fn new(bytes: impl Into<Vec<u8>>, width: u32, height: u32) -> Self {
        Self {
            bytes: Arc::new(bytes.into()),
            width,
            height,
        }
    }

    /// Read the intrinsic size from the encoded header.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> StampResult<Self> {
        let bytes = bytes.into();
        let (width, height) = image::ImageReader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()
            .context("guess template image format")?
            .into_dimensions()
            .context("read template image dimensions")?;
        Ok(Self::new(bytes, width, height))
    }

    /// Whether either dimension is zero.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A template image and the overlays placed on it.
///
/// The element list is held behind an [`Arc`]; every mutation produces a fresh list, so a
/// snapshot obtained through [`Template::snapshot`] never changes under its holder. List order
/// is z-order: the first element is drawn first (bottom-most).
#[derive(Clone, Debug)]
pub struct Template {
    id: TemplateId,
    name: String,
    image: TemplateImage,
    preview_box: PreviewBox,
    elements: Arc<Vec<Element>>,
    next_element: u64,
}

impl Template {
    /// New template with no elements and the default preview box.
    pub fn new(name: impl Into<String>, image: TemplateImage) -> Self {
        Self {
            id: TemplateId::next(),
            name: name.into(),
            image,
            preview_box: PreviewBox::default(),
            elements: Arc::new(Vec::new()),
            next_element: 1,
        }
    }

    /// Use a different editing bounding box.
    pub fn with_preview_box(mut self, preview_box: PreviewBox) -> Self {
        self.preview_box = preview_box;
        self
    }

    /// Rebuild a template from stored elements, checking the model invariants.
    pub fn from_parts(
        name: impl Into<String>,
        image: TemplateImage,
        preview_box: PreviewBox,
        elements: Vec<Element>,
    ) -> StampResult<Self> {
        let mut ids = HashSet::new();
        let mut fields = HashSet::new();
        for el in &elements {
            if !ids.insert(el.id()) {
                return Err(StampError::validation(format!(
                    "element id {} is used more than once",
                    el.id()
                )));
            }
            if let Some(field) = el.field_name()
                && !fields.insert(field.to_string())
            {
                return Err(StampError::duplicate_field(field));
            }
        }
        let next_element = elements.iter().map(|e| e.id().0).max().unwrap_or(0) + 1;
        Ok(Self {
            next_element,
            elements: Arc::new(elements),
            ..Self::new(name, image).with_preview_box(preview_box)
        })
    }

    /// Template id.
    pub fn id(&self) -> TemplateId {
        self.id
    }

    /// Display name, also used as the archive folder name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the template.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Template image.
    pub fn image(&self) -> &TemplateImage {
        &self.image
    }

    /// Replace the template image. Existing elements are cleared.
    pub fn replace_image(&mut self, image: TemplateImage) -> Arc<Vec<Element>> {
        self.image = image;
        self.elements = Arc::new(Vec::new());
        self.snapshot()
    }

    /// Editing bounding box.
    pub fn preview_box(&self) -> PreviewBox {
        self.preview_box
    }

    /// Preview/source mapping for this template.
    pub fn scaler(&self) -> Scaler {
        Scaler::for_template(self.image.width, self.image.height, self.preview_box)
    }

    /// Elements in z-order.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Shared, immutable view of the current element list.
    pub fn snapshot(&self) -> Arc<Vec<Element>> {
        Arc::clone(&self.elements)
    }

    /// Lookup one element.
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| e.id() == id)
    }

    /// Number of text elements.
    pub fn text_element_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| matches!(e, Element::Text(_)))
            .count()
    }

    /// Whether the template has at least one data-bound field and can be personalized.
    pub fn is_eligible(&self) -> bool {
        self.text_element_count() > 0
    }

    /// Headers from `headers` that have no text element yet, in header order.
    pub fn available_fields<'h>(&self, headers: &'h [String]) -> Vec<&'h str> {
        headers
            .iter()
            .map(String::as_str)
            .filter(|h| !self.has_field(h))
            .collect()
    }

    /// Whether a text element is bound to `field_name`.
    pub fn has_field(&self, field_name: &str) -> bool {
        self.elements
            .iter()
            .any(|e| e.field_name() == Some(field_name))
    }

    /// Add a text element for `field_name` with the editor defaults, centered on the preview.
    pub fn add_text_element(&mut self, field_name: &str) -> StampResult<TextElement> {
        if self.has_field(field_name) {
            return Err(StampError::duplicate_field(field_name));
        }
        let preview = self.scaler().preview_size();
        let position = Point::new(preview.width / 2.0 - 50.0, preview.height / 2.0 - 15.0);
        let el = TextElement::new(self.alloc_id(), field_name, position);
        Arc::make_mut(&mut self.elements).push(Element::Text(el.clone()));
        tracing::debug!(
            template = %self.name,
            id = %el.id,
            field = field_name,
            "text element added"
        );
        Ok(el)
    }

    /// Add an image element; multiple elements may share a source.
    pub fn add_image_element(&mut self, source: ImageSource) -> ImageElement {
        let preview = self.scaler().preview_size();
        let position = Point::new(preview.width / 2.0 - 50.0, preview.height / 2.0 - 50.0);
        let el = ImageElement::new(self.alloc_id(), source, position);
        Arc::make_mut(&mut self.elements).push(Element::Image(el.clone()));
        tracing::debug!(template = %self.name, id = %el.id, "image element added");
        el
    }

    /// Apply a partial update to one element.
    pub fn update_element(
        &mut self,
        id: ElementId,
        patch: ElementPatch,
    ) -> StampResult<Arc<Vec<Element>>> {
        let idx = self.index_of(id)?;
        patch.validate_for(&self.elements[idx])?;
        if !patch.is_empty() {
            patch.apply_to(&mut Arc::make_mut(&mut self.elements)[idx]);
        }
        Ok(self.snapshot())
    }

    /// Remove one element.
    pub fn remove_element(&mut self, id: ElementId) -> StampResult<Arc<Vec<Element>>> {
        let idx = self.index_of(id)?;
        Arc::make_mut(&mut self.elements).remove(idx);
        Ok(self.snapshot())
    }

    /// Copy an element under a new id, offset by [`DUPLICATE_OFFSET`], placed directly above the
    /// original.
    ///
    /// Text elements cannot be duplicated: their field binding must stay unique.
    pub fn duplicate_element(&mut self, id: ElementId) -> StampResult<Element> {
        let idx = self.index_of(id)?;
        if let Some(field) = self.elements[idx].field_name() {
            return Err(StampError::duplicate_field(field));
        }
        let mut copy = self.elements[idx].clone();
        copy.set_id(self.alloc_id());
        copy.set_position(copy.position() + DUPLICATE_OFFSET);
        Arc::make_mut(&mut self.elements).insert(idx + 1, copy.clone());
        Ok(copy)
    }

    /// Move one step up in z-order. No-op at the top.
    pub fn bring_forward(&mut self, id: ElementId) -> StampResult<Arc<Vec<Element>>> {
        let idx = self.index_of(id)?;
        if idx + 1 < self.elements.len() {
            Arc::make_mut(&mut self.elements).swap(idx, idx + 1);
        }
        Ok(self.snapshot())
    }

    /// Move one step down in z-order. No-op at the bottom.
    pub fn send_backward(&mut self, id: ElementId) -> StampResult<Arc<Vec<Element>>> {
        let idx = self.index_of(id)?;
        if idx > 0 {
            Arc::make_mut(&mut self.elements).swap(idx, idx - 1);
        }
        Ok(self.snapshot())
    }

    /// Move to the top of the z-order.
    pub fn bring_to_front(&mut self, id: ElementId) -> StampResult<Arc<Vec<Element>>> {
        let idx = self.index_of(id)?;
        if idx + 1 < self.elements.len() {
            let list = Arc::make_mut(&mut self.elements);
            let el = list.remove(idx);
            list.push(el);
        }
        Ok(self.snapshot())
    }

    /// Move to the bottom of the z-order.
    pub fn send_to_back(&mut self, id: ElementId) -> StampResult<Arc<Vec<Element>>> {
        let idx = self.index_of(id)?;
        if idx > 0 {
            let list = Arc::make_mut(&mut self.elements);
            let el = list.remove(idx);
            list.insert(0, el);
        }
        Ok(self.snapshot())
    }

    fn index_of(&self, id: ElementId) -> StampResult<usize> {
        self.elements
            .iter()
            .position(|e| e.id() == id)
            .ok_or(StampError::UnknownElement(id))
    }

    fn alloc_id(&mut self) -> ElementId {
        let id = ElementId(self.next_element);
        self.next_element += 1;
        id
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/template.rs"]
mod tests;
