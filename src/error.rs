use crate::caption::{CaptionId, FontChoice};

/// Error type for caption editing and export.
#[derive(Debug)]
pub enum CaptionError {
    /// An operation referenced a caption id that is not in the model.
    NotFound(CaptionId),
    /// A font key outside the closed set of caption fonts.
    InvalidFont(String),
    /// Export was requested before the base image (or surface) had a size.
    ImageNotReady,
    /// Neither the requested family nor its generic fallback could be loaded.
    FontUnavailable(FontChoice),
    Encode(String),
    Io(std::io::Error),
}

impl std::fmt::Display for CaptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptionError::NotFound(id) => write!(f, "Caption {} not found", id),
            CaptionError::InvalidFont(name) => write!(f, "Invalid font: '{}'", name),
            CaptionError::ImageNotReady => write!(f, "Base image is not loaded yet"),
            CaptionError::FontUnavailable(font) => {
                write!(f, "No font face available for {}", font.label())
            }
            CaptionError::Encode(e) => write!(f, "Encoding error: {}", e),
            CaptionError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for CaptionError {}

impl From<std::io::Error> for CaptionError {
    fn from(e: std::io::Error) -> Self {
        CaptionError::Io(e)
    }
}

impl From<image::ImageError> for CaptionError {
    fn from(e: image::ImageError) -> Self {
        CaptionError::Encode(e.to_string())
    }
}
