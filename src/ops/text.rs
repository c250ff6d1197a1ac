use ab_glyph::{point, Font, FontArc, GlyphId, PxScale, ScaleFont};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::caption::{FontChoice, GenericFamily};
use crate::error::CaptionError;

/// Cache for rasterized glyph pixel data. Key: (GlyphId, scale_bits).
/// Value: (pixels as (x, y, coverage), bounds_min_x, bounds_min_y) at origin zero.
pub type GlyphPixelCache = HashMap<(GlyphId, u32), (Vec<(u32, u32, f32)>, f32, f32)>;

/// Single-channel coverage mask positioned on a canvas.
#[derive(Clone, Debug, Default)]
pub struct CoverageMask {
    pub buf: Vec<f32>,
    pub w: u32,
    pub h: u32,
    pub off_x: i32,
    pub off_y: i32,
}

impl CoverageMask {
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

/// Scale at which glyphs render `em_px` pixels per em (CSS `font-size`).
pub fn em_scale(font: &FontArc, em_px: f32) -> PxScale {
    let upem = font.units_per_em().unwrap_or(1000.0);
    PxScale::from(em_px * font.height_unscaled() / upem)
}

/// Lay out a single left-aligned line. Glyph y is the baseline, placed one
/// ascent below the top of the line box.
/// Returns `(glyphs, total_width, line_height)`.
pub fn layout_line(font: &FontArc, text: &str, scale: PxScale) -> (Vec<(GlyphId, f32, f32)>, f32, f32) {
    let scaled = font.as_scaled(scale);
    let ascent = scaled.ascent();

    let mut glyphs = Vec::new();
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x, ascent));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }

    (glyphs, cursor_x, scaled.height())
}

/// Rasterize one line of text into a coverage mask.
///
/// `(origin_x, origin_y)` is the top-left of the line box in canvas pixels.
/// The mask is padded by `pad` pixels on every side (for glow effects) and
/// clipped to the canvas.
pub fn rasterize_line(
    font: &FontArc,
    text: &str,
    em_px: f32,
    origin_x: f32,
    origin_y: f32,
    pad: f32,
    canvas_w: u32,
    canvas_h: u32,
    glyph_cache: &mut GlyphPixelCache,
) -> CoverageMask {
    let scale = em_scale(font, em_px);
    let (glyphs, _, _) = layout_line(font, text, scale);
    if glyphs.is_empty() {
        return CoverageMask::default();
    }

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;

    for &(glyph_id, gx, gy) in &glyphs {
        let glyph = glyph_id.with_scale_and_position(scale, point(gx, gy));
        let bounds = font.glyph_bounds(&glyph);
        min_x = min_x.min(bounds.min.x);
        min_y = min_y.min(bounds.min.y);
        max_x = max_x.max(bounds.max.x);
        max_y = max_y.max(bounds.max.y);
    }

    if min_x >= max_x || min_y >= max_y {
        return CoverageMask::default();
    }

    let x0 = ((origin_x + min_x - pad).floor() as i32).max(0);
    let y0 = ((origin_y + min_y - pad).floor() as i32).max(0);
    let x1 = ((origin_x + max_x + pad).ceil() as i32).min(canvas_w as i32);
    let y1 = ((origin_y + max_y + pad).ceil() as i32).min(canvas_h as i32);
    let buf_w = (x1 - x0).max(0) as u32;
    let buf_h = (y1 - y0).max(0) as u32;

    if buf_w == 0 || buf_h == 0 {
        return CoverageMask::default();
    }

    let mut buf = vec![0.0f32; buf_w as usize * buf_h as usize];

    // Glyphs are cached at (0,0) and replayed at their laid-out position.
    let scale_key = scale.y.to_bits();
    for &(glyph_id, gx, gy) in &glyphs {
        let cache_key = (glyph_id, scale_key);
        let (pixels, base_bx, base_by) = glyph_cache.entry(cache_key).or_insert_with(|| {
            let base_glyph = glyph_id.with_scale_and_position(scale, point(0.0, 0.0));
            let mut px_list = Vec::new();
            match font.outline_glyph(base_glyph) {
                Some(outlined) => {
                    let b = outlined.px_bounds();
                    outlined.draw(|px, py, cov| px_list.push((px, py, cov)));
                    (px_list, b.min.x, b.min.y)
                }
                None => (px_list, 0.0, 0.0),
            }
        });

        let bx = origin_x + *base_bx + gx.round();
        let by = origin_y + *base_by + gy.round();
        for &(px, py, cov) in pixels.iter() {
            let ix = (px as f32 + bx).round() as i32 - x0;
            let iy = (py as f32 + by).round() as i32 - y0;
            if ix >= 0 && iy >= 0 && (ix as u32) < buf_w && (iy as u32) < buf_h {
                let idx = iy as usize * buf_w as usize + ix as usize;
                buf[idx] = buf[idx].max(cov.min(1.0));
            }
        }
    }

    CoverageMask { buf, w: buf_w, h: buf_h, off_x: x0, off_y: y0 }
}

/// Resolves caption fonts to loaded faces and keeps them for reuse.
///
/// Lookup order per font: a file in the configured font directory, the named
/// system family, the generic family (sans-serif, cursive, serif), then the
/// face bundled with egui.
#[derive(Default)]
pub struct FontBook {
    font_dir: Option<PathBuf>,
    loaded: HashMap<FontChoice, (FontArc, Vec<u8>)>,
    glyph_cache: HashMap<FontChoice, GlyphPixelCache>,
}

impl FontBook {
    pub fn new(font_dir: Option<PathBuf>) -> Self {
        Self { font_dir, ..Default::default() }
    }

    /// Register font file bytes for a caption font, replacing any lookup.
    pub fn insert_bytes(&mut self, choice: FontChoice, bytes: Vec<u8>) -> Result<(), CaptionError> {
        let font = FontArc::try_from_vec(bytes.clone())
            .map_err(|_| CaptionError::FontUnavailable(choice))?;
        self.loaded.insert(choice, (font, bytes));
        self.glyph_cache.remove(&choice);
        Ok(())
    }

    /// The face for `choice`, loading it on first use.
    pub fn font(&mut self, choice: FontChoice) -> Result<FontArc, CaptionError> {
        self.ensure(choice)?;
        self.loaded
            .get(&choice)
            .map(|(f, _)| f.clone())
            .ok_or(CaptionError::FontUnavailable(choice))
    }

    /// Raw font file bytes for `choice` (for registering with the GUI).
    pub fn bytes(&mut self, choice: FontChoice) -> Result<&[u8], CaptionError> {
        self.ensure(choice)?;
        self.loaded
            .get(&choice)
            .map(|(_, b)| b.as_slice())
            .ok_or(CaptionError::FontUnavailable(choice))
    }

    pub fn glyph_cache(&mut self, choice: FontChoice) -> &mut GlyphPixelCache {
        self.glyph_cache.entry(choice).or_default()
    }

    fn ensure(&mut self, choice: FontChoice) -> Result<(), CaptionError> {
        if self.loaded.contains_key(&choice) {
            return Ok(());
        }
        if let Some(bytes) = self.font_dir.as_deref().and_then(|dir| load_font_file(dir, choice)) {
            match self.insert_bytes(choice, bytes) {
                Ok(()) => return Ok(()),
                Err(_) => {
                    log_warn!("Font file for {} is not a valid font", choice.label());
                }
            }
        }
        let bytes = match load_system_font(choice) {
            Some(bytes) => {
                log_info!("Loaded system font for {} ({} bytes)", choice.label(), bytes.len());
                bytes
            }
            None => {
                log_warn!("No system font for {}, using {}", choice.label(), BUILTIN_FONT);
                builtin_font().ok_or(CaptionError::FontUnavailable(choice))?
            }
        };
        self.insert_bytes(choice, bytes)
    }
}

/// Entry of egui's default font set used as the last resort.
const BUILTIN_FONT: &str = "Ubuntu-Light";

fn builtin_font() -> Option<Vec<u8>> {
    egui::FontDefinitions::default()
        .font_data
        .get(BUILTIN_FONT)
        .map(|data| data.font.to_vec())
}

/// Look for `<stem>.ttf` / `<stem>.otf` (or the bare family name) in `dir`.
fn load_font_file(dir: &Path, choice: FontChoice) -> Option<Vec<u8>> {
    let stems = [choice.file_stem().to_string(), choice.family().to_string()];
    for stem in &stems {
        for ext in ["ttf", "otf"] {
            let path = dir.join(format!("{}.{}", stem, ext));
            if let Ok(bytes) = std::fs::read(&path) {
                return Some(bytes);
            }
        }
    }
    log_warn!("No font file for {} in {}", choice.label(), dir.display());
    None
}

/// Load the named family from the system, falling back to its generic family.
fn load_system_font(choice: FontChoice) -> Option<Vec<u8>> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::Properties;
    use font_kit::source::SystemSource;

    let generic = match choice.fallback() {
        GenericFamily::SansSerif => FamilyName::SansSerif,
        GenericFamily::Cursive => FamilyName::Cursive,
        GenericFamily::Serif => FamilyName::Serif,
    };
    let families = [
        FamilyName::Title(choice.family().to_string()),
        generic,
        FamilyName::SansSerif,
    ];

    let source = SystemSource::new();
    let handle = source.select_best_match(&families, &Properties::new()).ok()?;
    let font_data = handle.load().ok()?;
    let bytes = font_data.copy_font_data()?;
    Some((*bytes).clone())
}
