//! Interaction controller, the only writer of the caption model.
//!
//! The GUI (or the headless CLI) owns one [`CaptionController`] and feeds it
//! discrete [`EditorEvent`]s. Every handler runs to completion before the next
//! event, so export always sees a consistent snapshot of the model.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::caption::{
    Caption, CaptionId, CaptionModel, FontChoice, Point, Rgb, clamp_origin,
};
use crate::error::CaptionError;
use crate::settings::PreferenceStore;
use crate::surface::EditingSurface;

/// An in-progress pointer drag.
#[derive(Clone, Copy, Debug, PartialEq)]
struct DragState {
    id: CaptionId,
    /// Pointer position minus caption origin at drag start.
    offset: Point,
}

/// Discrete UI inputs, each mapped onto one controller operation.
#[derive(Clone, Debug, PartialEq)]
pub enum EditorEvent {
    AddCaption,
    Select(CaptionId),
    DeselectAll,
    BeginDrag { id: CaptionId, pointer: Point },
    UpdateDrag { pointer: Point },
    EndDrag,
    SetText { id: CaptionId, text: String },
    SetFont { id: CaptionId, font: FontChoice },
    SetColor { id: CaptionId, color: Rgb },
    SetFontSize { id: CaptionId, size: i32 },
    AdjustFontSize { id: CaptionId, delta: i32 },
    Delete(CaptionId),
}

pub struct CaptionController<P: PreferenceStore> {
    model: CaptionModel,
    prefs: P,
    drag: Option<DragState>,
    rng: StdRng,
}

impl<P: PreferenceStore> CaptionController<P> {
    pub fn new(prefs: P) -> Self {
        Self::with_rng(prefs, StdRng::from_entropy())
    }

    /// Controller whose random placement is reproducible.
    pub fn with_seed(prefs: P, seed: u64) -> Self {
        Self::with_rng(prefs, StdRng::seed_from_u64(seed))
    }

    fn with_rng(prefs: P, rng: StdRng) -> Self {
        Self {
            model: CaptionModel::new(),
            prefs,
            drag: None,
            rng,
        }
    }

    pub fn model(&self) -> &CaptionModel {
        &self.model
    }

    pub fn prefs(&self) -> &P {
        &self.prefs
    }

    /// Caption currently being dragged, if any.
    pub fn dragging(&self) -> Option<CaptionId> {
        self.drag.map(|d| d.id)
    }

    /// Dispatch one UI event. `AddCaption` returns the new id.
    pub fn apply(
        &mut self,
        event: EditorEvent,
        surface: &dyn EditingSurface,
    ) -> Result<Option<CaptionId>, CaptionError> {
        match event {
            EditorEvent::AddCaption => return Ok(Some(self.add_caption(surface))),
            EditorEvent::Select(id) => self.select_caption(id)?,
            EditorEvent::DeselectAll => self.deselect_all(),
            EditorEvent::BeginDrag { id, pointer } => self.begin_drag(id, pointer)?,
            EditorEvent::UpdateDrag { pointer } => {
                self.update_drag(pointer, surface);
            }
            EditorEvent::EndDrag => self.end_drag(),
            EditorEvent::SetText { id, text } => {
                self.set_text(id, text)?;
                self.reclamp(id, surface)?;
            }
            EditorEvent::SetFont { id, font } => {
                self.set_font(id, font)?;
                self.reclamp(id, surface)?;
            }
            EditorEvent::SetColor { id, color } => self.set_color(id, color)?,
            EditorEvent::SetFontSize { id, size } => {
                self.set_font_size(id, size)?;
                self.reclamp(id, surface)?;
            }
            EditorEvent::AdjustFontSize { id, delta } => {
                self.adjust_font_size(id, delta)?;
                self.reclamp(id, surface)?;
            }
            EditorEvent::Delete(id) => self.delete_caption(id)?,
        }
        Ok(None)
    }

    /// Append a caption at a random spot that keeps it fully on the surface,
    /// and select it.
    pub fn add_caption(&mut self, surface: &dyn EditingSurface) -> CaptionId {
        let mut caption = Caption::new(Point::default(), self.prefs.last_color());
        let bounds = surface.size();
        let extent = surface.measure(&caption);
        let max_x = (bounds.width - extent.width).max(0.0);
        let max_y = (bounds.height - extent.height).max(0.0);
        caption.position = Point::new(
            self.rng.gen_range(0.0..=max_x),
            self.rng.gen_range(0.0..=max_y),
        );
        self.insert(caption)
    }

    /// Append a caption with explicit content, clamping its size and position.
    pub fn place_caption(
        &mut self,
        surface: &dyn EditingSurface,
        text: impl Into<String>,
        position: Point,
        font: FontChoice,
        color: Option<Rgb>,
        font_size: i32,
    ) -> CaptionId {
        let mut caption = Caption::new(position, color.unwrap_or(self.prefs.last_color()));
        caption.text = text.into();
        caption.font = font;
        caption.set_font_size(font_size);
        caption.position = clamp_origin(position, surface.measure(&caption), surface.size());
        self.insert(caption)
    }

    fn insert(&mut self, caption: Caption) -> CaptionId {
        let id = caption.id;
        self.model.push(caption);
        self.model.clear_selection();
        let _ = self.model.select(id);
        id
    }

    pub fn select_caption(&mut self, id: CaptionId) -> Result<(), CaptionError> {
        if self.model.is_selected(id) {
            return Ok(());
        }
        self.model.select(id)
    }

    pub fn deselect_all(&mut self) {
        self.model.clear_selection();
    }

    /// Start dragging `id`. A drag already in progress is dropped.
    pub fn begin_drag(&mut self, id: CaptionId, pointer: Point) -> Result<(), CaptionError> {
        let origin = self.model.get(id)?.position;
        self.select_caption(id)?;
        self.drag = Some(DragState { id, offset: pointer - origin });
        Ok(())
    }

    /// Move the dragged caption under the pointer, kept inside the live
    /// surface bounds. Returns the new position, or `None` with no drag.
    pub fn update_drag(&mut self, pointer: Point, surface: &dyn EditingSurface) -> Option<Point> {
        let drag = self.drag?;
        let bounds = surface.size();
        let Ok(caption) = self.model.get_mut(drag.id) else {
            self.drag = None;
            return None;
        };
        let extent = surface.measure(caption);
        caption.position = clamp_origin(pointer - drag.offset, extent, bounds);
        Some(caption.position)
    }

    /// Pull a caption back inside the surface after it changed size.
    pub fn reclamp(&mut self, id: CaptionId, surface: &dyn EditingSurface) -> Result<Point, CaptionError> {
        let bounds = surface.size();
        let caption = self.model.get_mut(id)?;
        let extent = surface.measure(caption);
        caption.position = clamp_origin(caption.position, extent, bounds);
        Ok(caption.position)
    }

    /// Finish the drag. The caption stays selected.
    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    pub fn set_text(&mut self, id: CaptionId, text: impl Into<String>) -> Result<(), CaptionError> {
        self.model.get_mut(id)?.text = text.into();
        Ok(())
    }

    pub fn set_font(&mut self, id: CaptionId, font: FontChoice) -> Result<(), CaptionError> {
        self.model.get_mut(id)?.font = font;
        log_info!("Caption {} font changed to {}", id, font.label());
        Ok(())
    }

    /// Set the font from a key such as `"display-a"` or `"font-anton"`.
    /// An unknown key leaves the caption untouched.
    pub fn set_font_by_name(&mut self, id: CaptionId, name: &str) -> Result<(), CaptionError> {
        self.model.get(id)?;
        let font = name.parse::<FontChoice>()?;
        self.set_font(id, font)
    }

    /// Recolor one caption and remember the color for the next new caption.
    pub fn set_color(&mut self, id: CaptionId, color: Rgb) -> Result<(), CaptionError> {
        self.model.get_mut(id)?.color = color;
        self.prefs.set_last_color(color);
        log_info!("Caption {} color changed to {}", id, color);
        Ok(())
    }

    pub fn set_font_size(&mut self, id: CaptionId, size: i32) -> Result<(), CaptionError> {
        self.model.get_mut(id)?.set_font_size(size);
        Ok(())
    }

    pub fn adjust_font_size(&mut self, id: CaptionId, delta: i32) -> Result<(), CaptionError> {
        let current = self.model.get(id)?.font_size();
        self.set_font_size(id, current.saturating_add(delta))
    }

    pub fn delete_caption(&mut self, id: CaptionId) -> Result<(), CaptionError> {
        self.model.remove(id)?;
        if self.dragging() == Some(id) {
            self.drag = None;
        }
        log_info!("Caption {} deleted", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::{MAX_FONT_SIZE, MIN_FONT_SIZE, SIZE_STEP, Size};
    use crate::settings::MemoryPreferences;
    use crate::surface::FixedSurface;

    fn controller() -> CaptionController<MemoryPreferences> {
        CaptionController::with_seed(MemoryPreferences::default(), 7)
    }

    fn selected_count(c: &CaptionController<MemoryPreferences>) -> usize {
        c.model().iter().filter(|cap| c.model().is_selected(cap.id)).count()
    }

    fn inside(surface: &FixedSurface, caption: &Caption) -> bool {
        let e = surface.measure(caption);
        let b = surface.size();
        caption.position.x >= 0.0
            && caption.position.y >= 0.0
            && caption.position.x + e.width <= b.width + 1e-3
            && caption.position.y + e.height <= b.height + 1e-3
    }

    #[test]
    fn new_captions_spawn_inside_and_selected() {
        let surface = FixedSurface::new(400.0, 300.0);
        let mut c = controller();
        for _ in 0..50 {
            let id = c.add_caption(&surface);
            let cap = c.model().get(id).unwrap();
            assert!(inside(&surface, cap), "spawned at {:?}", cap.position);
            assert_eq!(cap.font_size(), 24);
            assert_eq!(cap.font, FontChoice::Tinos);
            assert_eq!(cap.text, "Your text here");
            assert_eq!(c.model().selected(), Some(id));
            assert_eq!(selected_count(&c), 1);
        }
        assert_eq!(c.model().len(), 50);
    }

    #[test]
    fn spawning_on_a_tiny_surface_pins_to_origin() {
        let surface = FixedSurface::new(10.0, 10.0);
        let mut c = controller();
        let id = c.add_caption(&surface);
        assert_eq!(c.model().get(id).unwrap().position, Point::new(0.0, 0.0));
    }

    #[test]
    fn selection_stays_exclusive() {
        let surface = FixedSurface::new(400.0, 300.0);
        let mut c = controller();
        let a = c.add_caption(&surface);
        let b = c.add_caption(&surface);
        let d = c.add_caption(&surface);

        c.select_caption(a).unwrap();
        assert_eq!(selected_count(&c), 1);
        c.select_caption(a).unwrap();
        assert!(c.model().is_selected(a));
        c.select_caption(b).unwrap();
        assert!(!c.model().is_selected(a));
        c.deselect_all();
        assert_eq!(selected_count(&c), 0);
        c.select_caption(d).unwrap();
        c.delete_caption(b).unwrap();
        assert_eq!(selected_count(&c), 1);
        c.add_caption(&surface);
        assert_eq!(selected_count(&c), 1);
    }

    #[test]
    fn deleting_selected_caption_clears_selection() {
        let surface = FixedSurface::new(400.0, 300.0);
        let mut c = controller();
        let a = c.add_caption(&surface);
        let b = c.add_caption(&surface);
        assert_eq!(c.model().selected(), Some(b));

        c.delete_caption(a).unwrap();
        assert_eq!(c.model().selected(), Some(b));
        c.delete_caption(b).unwrap();
        assert_eq!(c.model().selected(), None);
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let mut c = controller();
        let ghost = CaptionId::new();
        assert!(matches!(c.select_caption(ghost), Err(CaptionError::NotFound(id)) if id == ghost));
        assert!(matches!(c.set_text(ghost, "x"), Err(CaptionError::NotFound(_))));
        assert!(matches!(c.set_font(ghost, FontChoice::Anton), Err(CaptionError::NotFound(_))));
        assert!(matches!(c.set_font_by_name(ghost, "bogus"), Err(CaptionError::NotFound(_))));
        assert!(matches!(c.set_color(ghost, Rgb::WHITE), Err(CaptionError::NotFound(_))));
        assert!(matches!(c.set_font_size(ghost, 20), Err(CaptionError::NotFound(_))));
        assert!(matches!(c.adjust_font_size(ghost, 2), Err(CaptionError::NotFound(_))));
        assert!(matches!(c.delete_caption(ghost), Err(CaptionError::NotFound(_))));
        assert!(matches!(c.begin_drag(ghost, Point::default()), Err(CaptionError::NotFound(_))));
    }

    #[test]
    fn font_size_clamps_at_both_ends() {
        let surface = FixedSurface::new(400.0, 300.0);
        let mut c = controller();
        let id = c.add_caption(&surface);

        c.adjust_font_size(id, -100).unwrap();
        assert_eq!(c.model().get(id).unwrap().font_size(), MIN_FONT_SIZE);
        c.adjust_font_size(id, 100).unwrap();
        assert_eq!(c.model().get(id).unwrap().font_size(), MAX_FONT_SIZE);
        c.adjust_font_size(id, -SIZE_STEP).unwrap();
        assert_eq!(c.model().get(id).unwrap().font_size(), 70);
        c.set_font_size(id, 3).unwrap();
        assert_eq!(c.model().get(id).unwrap().font_size(), 12);
        c.adjust_font_size(id, i32::MAX).unwrap();
        assert_eq!(c.model().get(id).unwrap().font_size(), 72);
    }

    #[test]
    fn color_change_seeds_next_caption() {
        let surface = FixedSurface::new(400.0, 300.0);
        let mut c = controller();
        let first = c.add_caption(&surface);
        assert_eq!(c.model().get(first).unwrap().color, Rgb::WHITE);

        let red = Rgb::from_hex("#ff0000").unwrap();
        c.set_color(first, red).unwrap();
        let second = c.add_caption(&surface);
        assert_eq!(c.model().get(second).unwrap().color.to_hex(), "#ff0000");

        // Existing captions keep their own color.
        c.set_color(second, Rgb::new(0, 0, 255)).unwrap();
        assert_eq!(c.model().get(first).unwrap().color, red);
    }

    #[test]
    fn invalid_font_leaves_caption_unchanged() {
        let surface = FixedSurface::new(400.0, 300.0);
        let mut c = controller();
        let id = c.add_caption(&surface);
        c.set_font_by_name(id, "font-bangers").unwrap();

        let err = c.set_font_by_name(id, "Papyrus").unwrap_err();
        assert!(matches!(err, CaptionError::InvalidFont(name) if name == "Papyrus"));
        assert_eq!(c.model().get(id).unwrap().font, FontChoice::Bangers);
    }

    #[test]
    fn text_is_stored_verbatim() {
        let surface = FixedSurface::new(400.0, 300.0);
        let mut c = controller();
        let id = c.add_caption(&surface);
        c.set_text(id, "  padded  ").unwrap();
        assert_eq!(c.model().get(id).unwrap().text, "  padded  ");
        c.set_text(id, "").unwrap();
        assert_eq!(c.model().get(id).unwrap().text, "");
        assert_eq!(c.model().len(), 1);
    }

    #[test]
    fn drag_follows_pointer_with_offset() {
        let surface = FixedSurface::new(400.0, 300.0);
        let mut c = controller();
        let id = c.place_caption(&surface, "Hi", Point::new(50.0, 60.0), FontChoice::Anton, None, 20);
        c.deselect_all();

        c.begin_drag(id, Point::new(55.0, 70.0)).unwrap();
        assert!(c.model().is_selected(id));
        assert_eq!(c.model().get(id).unwrap().position, Point::new(50.0, 60.0));

        let pos = c.update_drag(Point::new(105.0, 90.0), &surface);
        assert_eq!(pos, Some(Point::new(100.0, 80.0)));
        c.end_drag();
        assert!(c.model().is_selected(id));
        assert_eq!(c.update_drag(Point::new(0.0, 0.0), &surface), None);
        assert_eq!(c.model().get(id).unwrap().position, Point::new(100.0, 80.0));
    }

    #[test]
    fn drag_is_clamped_to_live_bounds() {
        let mut surface = FixedSurface::new(400.0, 300.0);
        let mut c = controller();
        let id = c.add_caption(&surface);
        let origin = c.model().get(id).unwrap().position;
        c.begin_drag(id, origin).unwrap();

        for p in [(-500.0, -500.0), (9000.0, 9000.0), (-1.0, 150.0), (200.0, 1e6)] {
            c.update_drag(Point::new(p.0, p.1), &surface);
            assert!(inside(&surface, c.model().get(id).unwrap()));
        }

        // Shrinking the surface mid-drag tightens the clamp immediately.
        surface.size = Size::new(300.0, 100.0);
        c.update_drag(Point::new(9000.0, 9000.0), &surface);
        let cap = c.model().get(id).unwrap();
        assert!(inside(&surface, cap));
        let extent = surface.measure(cap);
        assert!((cap.position.x - (300.0 - extent.width)).abs() < 1e-3);
    }

    #[test]
    fn new_drag_replaces_active_drag() {
        let surface = FixedSurface::new(400.0, 300.0);
        let mut c = controller();
        let a = c.place_caption(&surface, "A", Point::new(10.0, 10.0), FontChoice::Tinos, None, 12);
        let b = c.place_caption(&surface, "B", Point::new(100.0, 100.0), FontChoice::Tinos, None, 12);

        c.begin_drag(a, Point::new(10.0, 10.0)).unwrap();
        c.begin_drag(b, Point::new(100.0, 100.0)).unwrap();
        assert_eq!(c.dragging(), Some(b));
        c.update_drag(Point::new(120.0, 130.0), &surface);
        assert_eq!(c.model().get(a).unwrap().position, Point::new(10.0, 10.0));
        assert_eq!(c.model().get(b).unwrap().position, Point::new(120.0, 130.0));
    }

    #[test]
    fn deleting_dragged_caption_ends_drag() {
        let surface = FixedSurface::new(400.0, 300.0);
        let mut c = controller();
        let id = c.add_caption(&surface);
        c.begin_drag(id, Point::default()).unwrap();
        c.delete_caption(id).unwrap();
        assert_eq!(c.dragging(), None);
        assert_eq!(c.update_drag(Point::new(5.0, 5.0), &surface), None);
    }

    #[test]
    fn place_caption_clamps_position_and_size() {
        let surface = FixedSurface::new(400.0, 300.0);
        let mut c = controller();
        let id = c.place_caption(
            &surface,
            "Bottom",
            Point::new(390.0, 299.0),
            FontChoice::Anton,
            Some(Rgb::new(1, 2, 3)),
            200,
        );
        let cap = c.model().get(id).unwrap();
        assert_eq!(cap.font_size(), MAX_FONT_SIZE);
        assert_eq!(cap.color, Rgb::new(1, 2, 3));
        assert!(inside(&surface, cap));

        // Flush with the bottom-right corner.
        let extent = surface.measure(cap);
        assert!((cap.position.x + extent.width - 400.0).abs() < 1e-3);
        assert!((cap.position.y + extent.height - 300.0).abs() < 1e-3);
    }

    #[test]
    fn oversized_caption_pins_to_left_edge() {
        let surface = FixedSurface::new(400.0, 300.0);
        let mut c = controller();
        let id = c.place_caption(
            &surface,
            "Bottom text",
            Point::new(390.0, 299.0),
            FontChoice::Anton,
            None,
            MAX_FONT_SIZE,
        );
        let cap = c.model().get(id).unwrap();
        assert!(surface.measure(cap).width > 400.0);
        assert_eq!(cap.position.x, 0.0);
        let extent = surface.measure(cap);
        assert!((cap.position.y + extent.height - 300.0).abs() < 1e-3);
    }

    #[test]
    fn growing_a_caption_keeps_it_on_the_surface() {
        let surface = FixedSurface::new(400.0, 300.0);
        let mut c = controller();
        let id = c.place_caption(&surface, "Hi", Point::new(370.0, 280.0), FontChoice::Tinos, None, 12);
        assert_eq!(c.model().get(id).unwrap().position, Point::new(370.0, 280.0));

        c.apply(EditorEvent::SetFontSize { id, size: 48 }, &surface).unwrap();
        assert!(inside(&surface, c.model().get(id).unwrap()));

        c.apply(EditorEvent::AdjustFontSize { id, delta: SIZE_STEP }, &surface).unwrap();
        assert!(inside(&surface, c.model().get(id).unwrap()));

        c.apply(EditorEvent::SetText { id, text: "Longer".into() }, &surface).unwrap();
        let cap = c.model().get(id).unwrap();
        assert!(inside(&surface, cap));
        let extent = surface.measure(cap);
        assert!((cap.position.x + extent.width - 400.0).abs() < 1e-3);
    }

    #[test]
    fn events_dispatch_to_operations() {
        let surface = FixedSurface::new(400.0, 300.0);
        let mut c = controller();
        let id = c.apply(EditorEvent::AddCaption, &surface).unwrap().unwrap();
        let events = vec![
            EditorEvent::SetText { id, text: "Hello".into() },
            EditorEvent::SetFont { id, font: FontChoice::GreatVibes },
            EditorEvent::SetColor { id, color: Rgb::new(0, 128, 0) },
            EditorEvent::SetFontSize { id, size: 40 },
            EditorEvent::AdjustFontSize { id, delta: SIZE_STEP },
            EditorEvent::DeselectAll,
        ];
        for ev in events {
            assert_eq!(c.apply(ev, &surface).unwrap(), None);
        }
        let cap = c.model().get(id).unwrap();
        assert_eq!(cap.text, "Hello");
        assert_eq!(cap.font, FontChoice::GreatVibes);
        assert_eq!(cap.color, Rgb::new(0, 128, 0));
        assert_eq!(cap.font_size(), 42);
        assert_eq!(c.model().selected(), None);
        assert_eq!(c.prefs().last_color(), Rgb::new(0, 128, 0));

        c.apply(EditorEvent::Delete(id), &surface).unwrap();
        assert!(c.model().is_empty());
        assert!(matches!(
            c.apply(EditorEvent::Select(id), &surface),
            Err(CaptionError::NotFound(_))
        ));
    }
}
