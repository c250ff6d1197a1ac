// ============================================================================
// CAPTION COMPOSITOR: surface geometry → native-resolution raster → PNG
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

use crate::caption::{CaptionModel, FontChoice, Rgb, Size};
use crate::error::CaptionError;
use crate::io::{FileSaver, encode_png};
use crate::ops::text::{CoverageMask, FontBook, rasterize_line};

/// Glow drawn under every caption: white at 80 % alpha.
pub const GLOW_COLOR: [u8; 4] = [255, 255, 255, 204];
/// Glow offset in output pixels (both axes).
pub const GLOW_OFFSET: i32 = 1;
/// Box-blur radius of one glow pass; two passes give a 2 px soft edge.
const GLOW_BLUR_RADIUS: usize = 1;
const GLOW_BLUR_PASSES: usize = 2;
/// Mask padding so the blurred, offset glow is never clipped by the mask.
const MASK_PAD: f32 = (GLOW_BLUR_RADIUS * GLOW_BLUR_PASSES) as f32 + GLOW_OFFSET as f32 + 1.0;

/// One caption mapped into output-raster space.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptionDraw {
    pub text: String,
    /// Top-left of the line box in raster pixels.
    pub x: f32,
    pub y: f32,
    /// Font size (pixels per em) in raster pixels.
    pub font_px: f32,
    pub font: FontChoice,
    pub color: Rgb,
}

/// Outcome of a finished export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportSummary {
    pub drawn: usize,
    pub skipped: usize,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
}

/// Per-axis factors from surface coordinates to native pixels.
pub fn surface_scale(surface: Size, native_w: u32, native_h: u32) -> Result<(f32, f32), CaptionError> {
    if native_w == 0 || native_h == 0 || surface.is_empty() {
        return Err(CaptionError::ImageNotReady);
    }
    Ok((native_w as f32 / surface.width, native_h as f32 / surface.height))
}

/// Map every non-blank caption into raster space, in model order.
pub fn plan_captions(
    model: &CaptionModel,
    surface: Size,
    native_w: u32,
    native_h: u32,
) -> Result<Vec<CaptionDraw>, CaptionError> {
    let (sx, sy) = surface_scale(surface, native_w, native_h)?;
    Ok(model
        .iter()
        .filter(|c| !c.is_blank())
        .map(|c| CaptionDraw {
            text: c.text.clone(),
            x: c.position.x * sx,
            y: c.position.y * sy,
            font_px: c.font_size() as f32 * sx,
            font: c.font,
            color: c.color,
        })
        .collect())
}

/// Draw `plan` over a copy of `base`.
pub fn composite(
    base: &RgbaImage,
    plan: &[CaptionDraw],
    fonts: &mut FontBook,
) -> Result<RgbaImage, CaptionError> {
    let (w, h) = base.dimensions();
    if w == 0 || h == 0 {
        return Err(CaptionError::ImageNotReady);
    }
    let mut raster = base.clone();

    for draw in plan {
        let font = fonts.font(draw.font)?;
        let mask = rasterize_line(
            &font,
            &draw.text,
            draw.font_px,
            draw.x,
            draw.y,
            MASK_PAD,
            w,
            h,
            fonts.glyph_cache(draw.font),
        );
        render_caption(&mut raster, &mask, draw.color);
    }

    Ok(raster)
}

/// Paint the glow and then the fill for one rasterized caption.
pub fn render_caption(raster: &mut RgbaImage, mask: &CoverageMask, color: Rgb) {
    if mask.is_empty() {
        return;
    }
    let mut glow = mask.buf.clone();
    for _ in 0..GLOW_BLUR_PASSES {
        glow = box_blur(&glow, mask.w as usize, mask.h as usize, GLOW_BLUR_RADIUS);
    }
    blend_coverage(
        raster,
        &glow,
        mask.w,
        mask.h,
        mask.off_x + GLOW_OFFSET,
        mask.off_y + GLOW_OFFSET,
        GLOW_COLOR,
    );
    blend_coverage(
        raster,
        &mask.buf,
        mask.w,
        mask.h,
        mask.off_x,
        mask.off_y,
        [color.r, color.g, color.b, 255],
    );
}

/// Separable box blur of a coverage buffer (edges clamp to zero).
fn box_blur(src: &[f32], w: usize, h: usize, radius: usize) -> Vec<f32> {
    let norm = 1.0 / (2 * radius + 1) as f32;
    let mut tmp = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius).min(w - 1);
            let sum: f32 = src[y * w + lo..=y * w + hi].iter().sum();
            tmp[y * w + x] = sum * norm;
        }
    }
    let mut out = vec![0.0f32; w * h];
    for y in 0..h {
        let lo = y.saturating_sub(radius);
        let hi = (y + radius).min(h - 1);
        for x in 0..w {
            let sum: f32 = (lo..=hi).map(|yy| tmp[yy * w + x]).sum();
            out[y * w + x] = sum * norm;
        }
    }
    out
}

/// Source-over blend of `color` weighted by `coverage` into the raster.
/// Rows are processed in parallel; pixels outside the raster are clipped.
fn blend_coverage(
    raster: &mut RgbaImage,
    coverage: &[f32],
    mask_w: u32,
    mask_h: u32,
    off_x: i32,
    off_y: i32,
    color: [u8; 4],
) {
    let (rw, rh) = raster.dimensions();
    let y_start = off_y.max(0);
    let y_end = (off_y + mask_h as i32).min(rh as i32);
    if y_end <= y_start {
        return;
    }
    let x_start = off_x.max(0);
    let x_end = (off_x + mask_w as i32).min(rw as i32);
    if x_end <= x_start {
        return;
    }
    let stride = rw as usize * 4;
    let src_a = color[3] as f32 / 255.0;

    raster
        .par_chunks_mut(stride)
        .enumerate()
        .skip(y_start as usize)
        .take((y_end - y_start) as usize)
        .for_each(|(y, row)| {
            let my = (y as i32 - off_y) as usize;
            for x in x_start..x_end {
                let mx = (x - off_x) as usize;
                let cov = coverage[my * mask_w as usize + mx];
                if cov <= 0.001 {
                    continue;
                }
                let idx = x as usize * 4;
                blend_pixel(&mut row[idx..idx + 4], color, src_a * cov.min(1.0));
            }
        });
}

#[inline]
fn blend_pixel(dst: &mut [u8], color: [u8; 4], sa: f32) {
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return;
    }
    for c in 0..3 {
        let s = color[c] as f32;
        let d = dst[c] as f32;
        dst[c] = ((s * sa + d * da * (1.0 - sa)) / out_a).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Render the model at the base image's native resolution, encode it as PNG
/// and hand it to `saver` under `filename`.
pub fn export(
    model: &CaptionModel,
    surface: Size,
    base: &RgbaImage,
    fonts: &mut FontBook,
    saver: &dyn FileSaver,
    filename: &str,
) -> Result<ExportSummary, CaptionError> {
    let (w, h) = base.dimensions();
    let plan = plan_captions(model, surface, w, h)?;
    let raster = composite(base, &plan, fonts)?;
    let png = encode_png(&raster)?;
    saver.save(&png, filename)?;

    let summary = ExportSummary {
        drawn: plan.len(),
        skipped: model.len() - plan.len(),
        width: w,
        height: h,
        bytes: png.len(),
    };
    log_info!(
        "Exported {} ({}x{}, {} captions, {} blank skipped, {} bytes)",
        filename,
        w,
        h,
        summary.drawn,
        summary.skipped,
        summary.bytes
    );
    Ok(summary)
}
