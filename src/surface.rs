use crate::caption::{Caption, Size};

/// The rectangle captions are positioned on.
///
/// Queried on every caption creation and every drag update, so a resize in
/// the middle of a drag changes the clamp immediately.
pub trait EditingSurface {
    /// Current width/height of the surface.
    fn size(&self) -> Size;

    /// Rendered bounding box of `caption` on this surface.
    fn measure(&self, caption: &Caption) -> Size;
}

/// Average advance of a glyph relative to the font size.
const AVG_ADVANCE_EM: f32 = 0.6;
/// Line box height relative to the font size.
const LINE_HEIGHT_EM: f32 = 1.2;

/// Estimate a caption's box from its character count and font size.
///
/// Used where no text layout engine is at hand (headless placement, tests,
/// and the first GUI frame before a caption has been laid out).
pub fn estimate_extent(caption: &Caption) -> Size {
    let px = caption.font_size() as f32;
    let chars = caption.text.chars().count().max(1) as f32;
    Size::new(chars * px * AVG_ADVANCE_EM, px * LINE_HEIGHT_EM)
}

/// A surface with a fixed size and estimated caption extents.
#[derive(Clone, Copy, Debug)]
pub struct FixedSurface {
    pub size: Size,
}

impl FixedSurface {
    pub fn new(width: f32, height: f32) -> Self {
        Self { size: Size::new(width, height) }
    }
}

impl EditingSurface for FixedSurface {
    fn size(&self) -> Size {
        self.size
    }

    fn measure(&self, caption: &Caption) -> Size {
        estimate_extent(caption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::{Point, Rgb};

    #[test]
    fn extent_grows_with_text_and_size() {
        let mut c = Caption::new(Point::default(), Rgb::WHITE);
        c.text = "abcd".to_string();
        c.set_font_size(20);
        let e = estimate_extent(&c);
        assert!((e.width - 48.0).abs() < 1e-4);
        assert!((e.height - 24.0).abs() < 1e-4);

        c.text.clear();
        assert!(estimate_extent(&c).width > 0.0);
    }
}
