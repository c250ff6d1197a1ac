use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbaImage};
use rfd::FileDialog;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::CaptionError;

/// Input formats offered by the open dialog.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp"];

/// Receives the encoded export and stores it somewhere.
pub trait FileSaver {
    fn save(&self, bytes: &[u8], filename: &str) -> Result<(), CaptionError>;
}

/// Writes exports into a fixed directory.
#[derive(Clone, Debug)]
pub struct DirectorySaver {
    pub dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl FileSaver for DirectorySaver {
    fn save(&self, bytes: &[u8], filename: &str) -> Result<(), CaptionError> {
        std::fs::create_dir_all(&self.dir)?;
        write_bytes(&self.dir.join(filename), bytes)
    }
}

/// Writes to one explicit path, ignoring the suggested filename.
#[derive(Clone, Debug)]
pub struct PathSaver {
    pub path: PathBuf,
}

impl FileSaver for PathSaver {
    fn save(&self, bytes: &[u8], _filename: &str) -> Result<(), CaptionError> {
        write_bytes(&self.path, bytes)
    }
}

/// Asks the user where to save via the native save dialog.
/// Cancelling the dialog is not an error; nothing is written.
#[derive(Clone, Debug, Default)]
pub struct DialogSaver;

impl FileSaver for DialogSaver {
    fn save(&self, bytes: &[u8], filename: &str) -> Result<(), CaptionError> {
        let Some(path) = FileDialog::new()
            .set_file_name(filename)
            .add_filter("PNG Image", &["png"])
            .save_file()
        else {
            log_info!("Save dialog cancelled");
            return Ok(());
        };
        write_bytes(&path, bytes)
    }
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), CaptionError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes)?;
    writer.flush()?;
    log_info!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Encode an RGBA raster as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, CaptionError> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(out)
}

/// Decode any supported image file to RGBA.
pub fn load_base_image(path: &Path) -> Result<RgbaImage, CaptionError> {
    let img = image::open(path).map_err(|e| {
        CaptionError::Io(std::io::Error::other(format!(
            "could not open '{}': {}",
            path.display(),
            e
        )))
    })?;
    Ok(img.to_rgba8())
}

/// Let the user pick a base image.
pub fn pick_base_image() -> Option<PathBuf> {
    FileDialog::new()
        .add_filter("Image", IMAGE_EXTENSIONS)
        .pick_file()
}
