use eframe::egui;
use image::RgbaImage;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::caption::{Caption, CaptionId, FontChoice, Point, Rgb, SIZE_STEP, Size};
use crate::controller::{CaptionController, EditorEvent};
use crate::error::CaptionError;
use crate::io::{DialogSaver, load_base_image, pick_base_image};
use crate::logger;
use crate::ops::compositor;
use crate::ops::text::FontBook;
use crate::settings::Settings;
use crate::surface::{EditingSurface, estimate_extent};

/// Glow preview drawn behind captions in the editor (premultiplied white).
const PREVIEW_GLOW: egui::Color32 = egui::Color32::from_rgba_premultiplied(204, 204, 204, 204);

/// A caption box as laid out by egui, with the styling it was laid out for.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasuredCaption {
    pub size: Size,
    text: String,
    font: FontChoice,
    font_size: i32,
}

impl MeasuredCaption {
    pub fn of(caption: &Caption, size: Size) -> Self {
        Self {
            size,
            text: caption.text.clone(),
            font: caption.font,
            font_size: caption.font_size(),
        }
    }

    fn matches(&self, caption: &Caption) -> bool {
        self.font_size == caption.font_size() && self.font == caption.font && self.text == caption.text
    }
}

/// Surface backed by the laid-out caption sizes of the previous frame.
/// A caption edited since then is estimated until it is laid out again.
pub struct ViewSurface<'a> {
    pub size: Size,
    pub extents: &'a HashMap<CaptionId, MeasuredCaption>,
}

impl EditingSurface for ViewSurface<'_> {
    fn size(&self) -> Size {
        self.size
    }

    fn measure(&self, caption: &Caption) -> Size {
        match self.extents.get(&caption.id) {
            Some(m) if m.matches(caption) => m.size,
            _ => estimate_extent(caption),
        }
    }
}

pub struct CaptionApp {
    controller: CaptionController<Settings>,
    fonts: FontBook,
    /// Caption fonts installed into egui under their family name.
    registered_fonts: HashSet<FontChoice>,

    base: Option<RgbaImage>,
    base_texture: Option<egui::TextureHandle>,
    base_name: String,

    /// Editing-surface size in points, as laid out last frame.
    surface_size: Size,
    /// Caption boxes measured last frame.
    extents: HashMap<CaptionId, MeasuredCaption>,

    status: String,
}

impl CaptionApp {
    pub fn new(cc: &eframe::CreationContext<'_>, startup_image: Option<PathBuf>) -> Self {
        let settings = Settings::load();
        let mut fonts = FontBook::new(settings.font_dir.clone());
        let registered_fonts = install_caption_fonts(&cc.egui_ctx, &mut fonts);

        let mut app = Self {
            controller: CaptionController::new(settings),
            fonts,
            registered_fonts,
            base: None,
            base_texture: None,
            base_name: String::new(),
            surface_size: Size::default(),
            extents: HashMap::new(),
            status: "Open an image to get started".to_string(),
        };
        if let Some(path) = startup_image {
            app.load_image(&cc.egui_ctx, &path);
        }
        app
    }

    fn family_for(&self, font: FontChoice) -> egui::FontFamily {
        if self.registered_fonts.contains(&font) {
            egui::FontFamily::Name(font.family().into())
        } else {
            egui::FontFamily::Proportional
        }
    }

    fn load_image(&mut self, ctx: &egui::Context, path: &Path) {
        match load_base_image(path) {
            Ok(img) => {
                let size = [img.width() as usize, img.height() as usize];
                let color_image = egui::ColorImage::from_rgba_unmultiplied(size, img.as_raw());
                self.base_texture =
                    Some(ctx.load_texture("base_image", color_image, egui::TextureOptions::LINEAR));
                self.base_name = path
                    .file_name()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| "Untitled".to_string());
                self.status = format!("{} ({}×{})", self.base_name, size[0], size[1]);
                log_info!("Opened base image {}", path.display());
                self.base = Some(img);
            }
            Err(e) => {
                log_err!("Failed to open {}: {}", path.display(), e);
                self.status = e.to_string();
            }
        }
    }

    fn dispatch(&mut self, events: Vec<EditorEvent>) {
        let surface = ViewSurface { size: self.surface_size, extents: &self.extents };
        for event in events {
            if let Err(e) = self.controller.apply(event, &surface) {
                log_warn!("Editor event failed: {}", e);
                self.status = e.to_string();
            }
        }
    }

    fn export(&mut self) {
        let Some(base) = &self.base else {
            self.status = CaptionError::ImageNotReady.to_string();
            return;
        };
        let filename = self.controller.prefs().export_filename.clone();
        match compositor::export(
            self.controller.model(),
            self.surface_size,
            base,
            &mut self.fonts,
            &DialogSaver,
            &filename,
        ) {
            Ok(summary) => {
                self.status = format!(
                    "Rendered {} caption(s) at {}×{}",
                    summary.drawn, summary.width, summary.height
                );
            }
            Err(e) => {
                log_err!("Export failed: {}", e);
                self.status = match logger::log_path() {
                    Some(log) => format!("Export failed: {} (see {})", e, log.display()),
                    None => format!("Export failed: {}", e),
                };
            }
        }
    }

    fn toolbar(&self, ui: &mut egui::Ui, events: &mut Vec<EditorEvent>) -> (bool, bool) {
        let mut open = false;
        let mut download = false;
        ui.horizontal(|ui| {
            if ui.button("Open Image…").clicked() {
                open = true;
            }
            let ready = self.base.is_some();
            if ui.add_enabled(ready, egui::Button::new("Add Text")).clicked() {
                events.push(EditorEvent::AddCaption);
            }
            if ui.add_enabled(ready, egui::Button::new("Download")).clicked() {
                download = true;
            }
            ui.separator();
            ui.label(&self.status);
        });
        (open, download)
    }

    fn caption_list(&self, ui: &mut egui::Ui, events: &mut Vec<EditorEvent>) {
        let model = self.controller.model();
        if model.is_empty() {
            ui.weak("No captions yet");
            return;
        }
        egui::ScrollArea::vertical().show(ui, |ui| {
            for caption in model.iter() {
                let id = caption.id;
                let mut frame = egui::Frame::group(ui.style());
                if model.is_selected(id) {
                    frame = frame.stroke(egui::Stroke::new(2.0, ui.visuals().selection.bg_fill));
                }
                frame.show(ui, |ui| {
                    ui.horizontal(|ui| {
                        let mut text = caption.text.clone();
                        let resp = ui.add(egui::TextEdit::singleline(&mut text).desired_width(150.0));
                        if resp.changed() {
                            events.push(EditorEvent::SetText { id, text });
                        }
                        if resp.gained_focus() {
                            events.push(EditorEvent::Select(id));
                        }
                        if ui.small_button("▲").clicked() {
                            events.push(EditorEvent::AdjustFontSize { id, delta: SIZE_STEP });
                        }
                        if ui.small_button("▼").clicked() {
                            events.push(EditorEvent::AdjustFontSize { id, delta: -SIZE_STEP });
                        }
                    });
                    ui.horizontal(|ui| {
                        let mut font = caption.font;
                        egui::ComboBox::from_id_source(("caption_font", id))
                            .selected_text(font.label())
                            .show_ui(ui, |ui| {
                                for choice in FontChoice::ALL {
                                    ui.selectable_value(&mut font, choice, choice.label());
                                }
                            });
                        if font != caption.font {
                            events.push(EditorEvent::SetFont { id, font });
                        }

                        let mut rgb = caption.color.to_array();
                        if ui.color_edit_button_srgb(&mut rgb).changed() {
                            let color = Rgb::new(rgb[0], rgb[1], rgb[2]);
                            events.push(EditorEvent::SetColor { id, color });
                        }
                        ui.label(format!("{} px", caption.font_size()));
                        if ui.small_button("×").on_hover_text("Delete caption").clicked() {
                            events.push(EditorEvent::Delete(id));
                        }
                    });
                });
            }
        });
    }

    fn editing_surface(&mut self, ui: &mut egui::Ui, events: &mut Vec<EditorEvent>) {
        let Some((texture_id, tex_size)) =
            self.base_texture.as_ref().map(|t| (t.id(), t.size_vec2()))
        else {
            ui.centered_and_justified(|ui| ui.label("Open an image to start captioning."));
            return;
        };

        let avail = ui.available_size();
        let fit = (avail.x / tex_size.x).min(avail.y / tex_size.y);
        let (rect, background) = ui.allocate_exact_size(tex_size * fit, egui::Sense::click());
        self.surface_size = Size::new(rect.width(), rect.height());

        let painter = ui.painter_at(rect);
        let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
        painter.image(texture_id, rect, uv, egui::Color32::WHITE);

        if background.clicked() {
            events.push(EditorEvent::DeselectAll);
        }

        let to_surface = |p: egui::Pos2| Point::new(p.x - rect.min.x, p.y - rect.min.y);
        let model = self.controller.model();
        let mut extents = HashMap::with_capacity(model.len());

        for caption in model.iter() {
            let id = caption.id;
            let px = caption.font_size() as f32;
            let font_id = egui::FontId::new(px, self.family_for(caption.font));
            let color = egui::Color32::from_rgb(caption.color.r, caption.color.g, caption.color.b);

            let galley = ui.fonts(|f| f.layout_no_wrap(caption.text.clone(), font_id.clone(), color));
            // Empty captions keep a grab handle so they can still be moved.
            let size = egui::vec2(galley.size().x.max(px * 0.5), galley.size().y.max(px));
            let min = rect.min + egui::vec2(caption.position.x, caption.position.y);
            let caption_rect = egui::Rect::from_min_size(min, size);

            painter.text(min + egui::vec2(1.0, 1.0), egui::Align2::LEFT_TOP, &caption.text, font_id.clone(), PREVIEW_GLOW);
            painter.text(min, egui::Align2::LEFT_TOP, &caption.text, font_id, color);
            if model.is_selected(id) {
                painter.rect_stroke(
                    caption_rect.expand(3.0),
                    2.0,
                    egui::Stroke::new(1.5, ui.visuals().selection.stroke.color),
                );
            }

            let resp = ui.interact(caption_rect, egui::Id::new(("caption", id)), egui::Sense::click_and_drag());
            if resp.drag_started() {
                if let Some(p) = resp.interact_pointer_pos() {
                    events.push(EditorEvent::BeginDrag { id, pointer: to_surface(p) });
                }
            } else if resp.clicked() {
                events.push(EditorEvent::Select(id));
            }
            if resp.dragged()
                && let Some(p) = resp.interact_pointer_pos()
            {
                events.push(EditorEvent::UpdateDrag { pointer: to_surface(p) });
            }
            if resp.drag_released() {
                events.push(EditorEvent::EndDrag);
            }

            extents.insert(id, MeasuredCaption::of(caption, Size::new(size.x, size.y)));
        }

        self.extents = extents;
    }
}

impl eframe::App for CaptionApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let mut events = Vec::new();
        let mut open_requested = false;
        let mut download_requested = false;

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            (open_requested, download_requested) = self.toolbar(ui, &mut events);
        });

        egui::SidePanel::right("captions")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| {
                ui.heading("Captions");
                ui.separator();
                self.caption_list(ui, &mut events);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.editing_surface(ui, &mut events);
        });

        self.dispatch(events);

        if open_requested && let Some(path) = pick_base_image() {
            self.load_image(ctx, &path);
        }
        if download_requested {
            self.export();
        }
    }
}

/// Register every caption font that can be loaded with egui so the editor
/// previews captions in the faces the export uses.
fn install_caption_fonts(ctx: &egui::Context, fonts: &mut FontBook) -> HashSet<FontChoice> {
    let mut defs = egui::FontDefinitions::default();
    let fallback = defs
        .families
        .get(&egui::FontFamily::Proportional)
        .cloned()
        .unwrap_or_default();
    let mut registered = HashSet::new();

    for choice in FontChoice::ALL {
        let bytes = match fonts.bytes(choice) {
            Ok(b) => b.to_vec(),
            Err(e) => {
                log_warn!("{}; previewing with the default font", e);
                continue;
            }
        };
        let name = choice.family().to_string();
        defs.font_data.insert(name.clone(), egui::FontData::from_owned(bytes));
        let mut chain = vec![name.clone()];
        chain.extend(fallback.iter().cloned());
        defs.families.insert(egui::FontFamily::Name(name.into()), chain);
        registered.insert(choice);
    }

    ctx.set_fonts(defs);
    registered
}
