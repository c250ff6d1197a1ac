//! Caption model: the authoritative list of text overlays and the selection.
//!
//! Positions and sizes are in editing-surface coordinates (top-left origin).
//! The on-screen view and the exported raster are both derived from this
//! model; nothing else stores caption state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CaptionError;

/// Smallest caption font size in surface pixels.
pub const MIN_FONT_SIZE: i32 = 12;
/// Largest caption font size in surface pixels.
pub const MAX_FONT_SIZE: i32 = 72;
/// Font size given to new captions.
pub const DEFAULT_FONT_SIZE: i32 = 24;
/// Amount the ▲/▼ buttons change the size by.
pub const SIZE_STEP: i32 = 2;
/// Text given to new captions.
pub const DEFAULT_TEXT: &str = "Your text here";

/// Clamp a requested font size into the supported range.
pub fn clamp_font_size(size: i32) -> i32 {
    size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

/// Stable caption identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaptionId(Uuid);

impl CaptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CaptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CaptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of caption fonts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FontChoice {
    /// Display-A: condensed impact-style face.
    Anton,
    /// Display-B: comic display face.
    Bangers,
    /// Script face.
    GreatVibes,
    /// Serif-Default.
    #[default]
    Tinos,
}

/// Generic family used when the named face is not installed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenericFamily {
    SansSerif,
    Cursive,
    Serif,
}

impl FontChoice {
    pub const ALL: [FontChoice; 4] = [
        FontChoice::Anton,
        FontChoice::Bangers,
        FontChoice::GreatVibes,
        FontChoice::Tinos,
    ];

    /// Family name as installed on the system.
    pub fn family(&self) -> &'static str {
        match self {
            FontChoice::Anton => "Anton",
            FontChoice::Bangers => "Bangers",
            FontChoice::GreatVibes => "Great Vibes",
            FontChoice::Tinos => "Tinos",
        }
    }

    pub fn fallback(&self) -> GenericFamily {
        match self {
            FontChoice::Anton => GenericFamily::SansSerif,
            FontChoice::Bangers | FontChoice::GreatVibes => GenericFamily::Cursive,
            FontChoice::Tinos => GenericFamily::Serif,
        }
    }

    /// Menu label shown in the editor.
    pub fn label(&self) -> &'static str {
        self.family()
    }

    /// Canonical key, as written in layout files.
    pub fn key(&self) -> &'static str {
        match self {
            FontChoice::Anton => "display-a",
            FontChoice::Bangers => "display-b",
            FontChoice::GreatVibes => "script",
            FontChoice::Tinos => "serif-default",
        }
    }

    /// Expected file name inside a font directory.
    pub fn file_stem(&self) -> &'static str {
        match self {
            FontChoice::Anton => "Anton-Regular",
            FontChoice::Bangers => "Bangers-Regular",
            FontChoice::GreatVibes => "GreatVibes-Regular",
            FontChoice::Tinos => "Tinos-Regular",
        }
    }
}

impl std::str::FromStr for FontChoice {
    type Err = CaptionError;

    /// Accepts the canonical key, the family name, or the `font-*` class name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_lowercase().replace([' ', '_'], "-");
        let norm = norm.strip_prefix("font-").unwrap_or(&norm);
        match norm {
            "display-a" | "anton" => Ok(FontChoice::Anton),
            "display-b" | "bangers" => Ok(FontChoice::Bangers),
            "script" | "great-vibes" | "greatvibes" => Ok(FontChoice::GreatVibes),
            "serif-default" | "serif" | "tinos" => Ok(FontChoice::Tinos),
            _ => Err(CaptionError::InvalidFont(s.to_string())),
        }
    }
}

impl Serialize for FontChoice {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for FontChoice {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Opaque RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `#rgb` (the leading `#` is optional).
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        match hex.len() {
            6 => Some(Self::new(
                u8::from_str_radix(&hex[0..2], 16).ok()?,
                u8::from_str_radix(&hex[2..4], 16).ok()?,
                u8::from_str_radix(&hex[4..6], 16).ok()?,
            )),
            3 => {
                let nib = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
                Some(Self::new(nib(0)?, nib(1)?, nib(2)?))
            }
            _ => None,
        }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn to_array(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Rgb::WHITE
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Rgb {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Rgb::from_hex(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid color '{}'", s)))
    }
}

/// A point in surface coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// A width/height pair in surface coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Clamp a caption origin so a box of `extent` stays within `bounds`.
///
/// When the caption is larger than the surface it is pinned to the top-left.
pub fn clamp_origin(origin: Point, extent: Size, bounds: Size) -> Point {
    let max_x = (bounds.width - extent.width).max(0.0);
    let max_y = (bounds.height - extent.height).max(0.0);
    Point::new(origin.x.clamp(0.0, max_x), origin.y.clamp(0.0, max_y))
}

/// One movable text overlay.
#[derive(Clone, Debug, PartialEq)]
pub struct Caption {
    pub id: CaptionId,
    pub text: String,
    pub position: Point,
    pub font: FontChoice,
    pub color: Rgb,
    font_size: i32,
}

impl Caption {
    /// A caption with default text, font and size.
    pub fn new(position: Point, color: Rgb) -> Self {
        Self {
            id: CaptionId::new(),
            text: DEFAULT_TEXT.to_string(),
            position,
            font: FontChoice::default(),
            color,
            font_size: DEFAULT_FONT_SIZE,
        }
    }

    pub fn font_size(&self) -> i32 {
        self.font_size
    }

    /// Store a size, clamped into `[MIN_FONT_SIZE, MAX_FONT_SIZE]`.
    pub fn set_font_size(&mut self, size: i32) {
        self.font_size = clamp_font_size(size);
    }

    /// True when export would skip this caption.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Ordered caption list plus the (single) selection.
#[derive(Clone, Debug, Default)]
pub struct CaptionModel {
    captions: Vec<Caption>,
    selected: Option<CaptionId>,
}

impl CaptionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.captions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captions.is_empty()
    }

    /// Captions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Caption> {
        self.captions.iter()
    }

    pub fn get(&self, id: CaptionId) -> Result<&Caption, CaptionError> {
        self.captions
            .iter()
            .find(|c| c.id == id)
            .ok_or(CaptionError::NotFound(id))
    }

    pub fn get_mut(&mut self, id: CaptionId) -> Result<&mut Caption, CaptionError> {
        self.captions
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(CaptionError::NotFound(id))
    }

    pub fn contains(&self, id: CaptionId) -> bool {
        self.captions.iter().any(|c| c.id == id)
    }

    pub(crate) fn push(&mut self, caption: Caption) {
        self.captions.push(caption);
    }

    /// Remove a caption, clearing the selection if it pointed at it.
    pub(crate) fn remove(&mut self, id: CaptionId) -> Result<Caption, CaptionError> {
        let idx = self
            .captions
            .iter()
            .position(|c| c.id == id)
            .ok_or(CaptionError::NotFound(id))?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Ok(self.captions.remove(idx))
    }

    pub fn selected(&self) -> Option<CaptionId> {
        self.selected
    }

    pub fn is_selected(&self, id: CaptionId) -> bool {
        self.selected == Some(id)
    }

    pub(crate) fn select(&mut self, id: CaptionId) -> Result<(), CaptionError> {
        if !self.contains(id) {
            return Err(CaptionError::NotFound(id));
        }
        self.selected = Some(id);
        Ok(())
    }

    pub(crate) fn clear_selection(&mut self) {
        self.selected = None;
    }
}
