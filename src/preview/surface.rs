//! Editor-side projection of one template.
//!
//! The surface is rebuilt from the element snapshot on every load and only ever emits
//! [`ElementUpdate`] and [`ZOrderRequest`] values; the [`Template`] stays the single source of
//! truth. All coordinates here are preview space.

use std::sync::Arc;

use crate::{
    assets::store::PreparedTemplate,
    foundation::core::{Point, Rect, Size, Vec2},
    foundation::error::{StampError, StampResult},
    geometry::scale::Scaler,
    model::element::{Element, ElementId, TextAlign, TextElement},
    model::patch::ElementPatch,
    model::template::Template,
    render::compositor::{image_bounds, text_bounds},
    text::shape::{TextShaper, TextStyle},
};

/// What a primitive draws.
#[derive(Clone, Debug, PartialEq)]
pub enum PrimitiveKind {
    /// Text element shown as its `{{field}}` label.
    Text {
        /// Label text.
        label: String,
    },
    /// Image or sticker.
    Image,
}

/// One render primitive, rebuilt from an element.
#[derive(Clone, Debug, PartialEq)]
pub struct Primitive {
    /// Element this primitive projects.
    pub id: ElementId,
    /// Drawn content.
    pub kind: PrimitiveKind,
    /// Stored element position.
    pub origin: Point,
    /// Hit-test bounds; empty when the element could not be measured.
    pub bounds: Rect,
}

/// Attribute change reported by the surface for one element.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementUpdate {
    /// Target element.
    pub id: ElementId,
    /// Changed attributes.
    pub patch: ElementPatch,
    /// `true` for the final value of an interaction (pointer released).
    pub committed: bool,
}

impl ElementUpdate {
    /// Feed this update into the model.
    pub fn apply(self, template: &mut Template) -> StampResult<Arc<Vec<Element>>> {
        template.update_element(self.id, self.patch)
    }
}

/// Z-order command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZOrder {
    /// One step up.
    BringForward,
    /// One step down.
    SendBackward,
    /// To the top.
    BringToFront,
    /// To the bottom.
    SendToBack,
}

/// Z-order change requested for one element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZOrderRequest {
    /// Target element.
    pub id: ElementId,
    /// Requested move.
    pub order: ZOrder,
}

impl ZOrderRequest {
    /// Feed this request into the model.
    pub fn apply(self, template: &mut Template) -> StampResult<Arc<Vec<Element>>> {
        match self.order {
            ZOrder::BringForward => template.bring_forward(self.id),
            ZOrder::SendBackward => template.send_backward(self.id),
            ZOrder::BringToFront => template.bring_to_front(self.id),
            ZOrder::SendToBack => template.send_to_back(self.id),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Drag {
    id: ElementId,
    grab: Vec2,
    position: Point,
}

/// Interactive editing surface for one template.
#[derive(Clone, Debug)]
pub struct PreviewSurface {
    scaler: Scaler,
    primitives: Vec<Primitive>,
    selection: Option<ElementId>,
    drag: Option<Drag>,
}

impl PreviewSurface {
    /// Build the surface for `prepared`: size it to the template at `fit_scale` and create
    /// one primitive per element from its stored preview coordinates.
    pub fn load(prepared: &PreparedTemplate, shaper: &mut TextShaper) -> Self {
        Self {
            scaler: prepared.scaler(),
            primitives: build_primitives(prepared, shaper),
            selection: None,
            drag: None,
        }
    }

    /// Rebuild primitives after the model changed; the selection survives when its element
    /// still exists.
    pub fn reload(&mut self, prepared: &PreparedTemplate, shaper: &mut TextShaper) {
        self.scaler = prepared.scaler();
        self.primitives = build_primitives(prepared, shaper);
        self.drag = None;
        if let Some(id) = self.selection
            && !self.primitives.iter().any(|p| p.id == id)
        {
            self.selection = None;
        }
    }

    /// Surface size: template size times `fit_scale`.
    pub fn size(&self) -> Size {
        self.scaler.preview_size()
    }

    /// Mapping used when the surface was loaded.
    pub fn scaler(&self) -> Scaler {
        self.scaler
    }

    /// Primitives in draw order.
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    /// Currently selected element.
    pub fn selection(&self) -> Option<ElementId> {
        self.selection
    }

    /// Select an element (or clear with `None`). Unknown ids clear the selection.
    pub fn select(&mut self, id: Option<ElementId>) {
        self.selection = id.filter(|id| self.primitives.iter().any(|p| p.id == *id));
    }

    /// Topmost primitive under `p`.
    pub fn hit_test(&self, p: Point) -> Option<ElementId> {
        self.primitives
            .iter()
            .rev()
            .find(|prim| prim.bounds.area() > 0.0 && prim.bounds.contains(p))
            .map(|prim| prim.id)
    }

    /// Pointer pressed: select the element under `p` and start dragging it, or clear the
    /// selection on background.
    pub fn pointer_down(&mut self, p: Point) -> Option<ElementId> {
        let hit = self.hit_test(p);
        self.selection = hit;
        self.drag = hit.and_then(|id| {
            let prim = self.primitives.iter().find(|prim| prim.id == id)?;
            Some(Drag {
                id,
                grab: p - prim.origin,
                position: prim.origin,
            })
        });
        hit
    }

    /// Pointer moved while pressed: report the dragged element's new position.
    pub fn pointer_move(&mut self, p: Point) -> Option<ElementUpdate> {
        let drag = self.drag.as_mut()?;
        let position = p - drag.grab;
        let delta = position - drag.position;
        drag.position = position;
        let id = drag.id;
        self.translate_primitive(id, position, delta);
        Some(ElementUpdate {
            id,
            patch: ElementPatch::moved_to(position),
            committed: false,
        })
    }

    /// Pointer released: report the committed final position and end the drag.
    pub fn pointer_up(&mut self, p: Point) -> Option<ElementUpdate> {
        let mut update = self.pointer_move(p)?;
        update.committed = true;
        self.drag = None;
        Some(update)
    }

    /// Resize handle moved: report a new scale for an image element.
    pub fn resize(
        &self,
        id: ElementId,
        scale: Vec2,
        committed: bool,
    ) -> StampResult<ElementUpdate> {
        self.require_image(id, "resize")?;
        Ok(ElementUpdate {
            id,
            patch: ElementPatch::scaled_to(scale),
            committed,
        })
    }

    /// Rotation handle moved: report a new rotation for an image element.
    pub fn rotate(
        &self,
        id: ElementId,
        degrees: f64,
        committed: bool,
    ) -> StampResult<ElementUpdate> {
        self.require_image(id, "rotate")?;
        Ok(ElementUpdate {
            id,
            patch: ElementPatch::rotated_to(degrees),
            committed,
        })
    }

    /// Z-order command for the current selection; the local draw order follows immediately.
    pub fn reorder(&mut self, order: ZOrder) -> Option<ZOrderRequest> {
        let id = self.selection?;
        let idx = self.primitives.iter().position(|p| p.id == id)?;
        let last = self.primitives.len() - 1;
        match order {
            ZOrder::BringForward if idx < last => self.primitives.swap(idx, idx + 1),
            ZOrder::SendBackward if idx > 0 => self.primitives.swap(idx, idx - 1),
            ZOrder::BringToFront => {
                let prim = self.primitives.remove(idx);
                self.primitives.push(prim);
            }
            ZOrder::SendToBack => {
                let prim = self.primitives.remove(idx);
                self.primitives.insert(0, prim);
            }
            _ => {}
        }
        Some(ZOrderRequest { id, order })
    }

    fn require_image(&self, id: ElementId, what: &str) -> StampResult<()> {
        let prim = self
            .primitives
            .iter()
            .find(|p| p.id == id)
            .ok_or(StampError::UnknownElement(id))?;
        match prim.kind {
            PrimitiveKind::Image => Ok(()),
            PrimitiveKind::Text { .. } => Err(StampError::validation(format!(
                "cannot {what} text element {id}"
            ))),
        }
    }

    fn translate_primitive(&mut self, id: ElementId, origin: Point, delta: Vec2) {
        if let Some(prim) = self.primitives.iter_mut().find(|p| p.id == id) {
            prim.origin = origin;
            prim.bounds = prim.bounds + delta;
        }
    }
}

fn build_primitives(prepared: &PreparedTemplate, shaper: &mut TextShaper) -> Vec<Primitive> {
    prepared
        .elements()
        .iter()
        .map(|el| match el {
            Element::Text(t) => {
                let label = t.preview_label();
                Primitive {
                    id: t.id,
                    bounds: measure_label(t, &label, shaper),
                    kind: PrimitiveKind::Text { label },
                    origin: t.position,
                }
            }
            Element::Image(img) => Primitive {
                id: img.id,
                kind: PrimitiveKind::Image,
                origin: img.position,
                bounds: prepared
                    .image(img.id)
                    .map(|d| image_bounds(img, d.intrinsic_size()))
                    .unwrap_or(Rect::from_origin_size(img.position, Size::ZERO)),
            },
        })
        .collect()
}

fn measure_label(el: &TextElement, label: &str, shaper: &mut TextShaper) -> Rect {
    let style = TextStyle {
        family: &el.font_family,
        size_px: el.font_size,
        bold: el.bold,
        italic: el.italic,
    };
    match shaper.shape(label, style) {
        Ok(Some(shaped)) => text_bounds(el, &shaped),
        // rough box so the element stays grabbable without fonts
        _ => {
            let w = label.chars().count() as f64 * el.font_size * 0.6;
            let h = el.font_size * 1.2;
            let x = match el.align {
                TextAlign::Left => el.position.x,
                TextAlign::Center => el.position.x - w / 2.0,
                TextAlign::Right => el.position.x - w,
            };
            Rect::from_origin_size((x, el.position.y), (w, h))
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/preview/surface.rs"]
mod tests;
