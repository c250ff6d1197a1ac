// ============================================================================
// CaptionFE CLI: headless caption rendering via command-line arguments
// ============================================================================
//
// Usage examples:
//   CaptionFE --input cat.jpg --captions layout.json --output meme.png
//   CaptionFE -i shots/*.png -c layout.json --output-dir captioned/
//   CaptionFE -i cat.jpg -c layout.json --font-dir ~/fonts -v
//
// No window is opened in CLI mode. Captions are placed through the same
// controller the editor uses, so size and position clamping still apply.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use serde::Deserialize;

use crate::caption::{DEFAULT_FONT_SIZE, FontChoice, Point, Rgb, Size};
use crate::controller::CaptionController;
use crate::error::CaptionError;
use crate::io::{PathSaver, load_base_image};
use crate::ops::compositor::{ExportSummary, export};
use crate::ops::text::FontBook;
use crate::settings::{MemoryPreferences, PreferenceStore, Settings};
use crate::surface::FixedSurface;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// CaptionFE headless caption renderer.
#[derive(Parser, Debug)]
#[command(
    name = "CaptionFE",
    about = "CaptionFE headless caption renderer",
    long_about = "Draw the captions described in a JSON layout file onto one or more\n\
                  images and write the results as PNG, without opening the editor.\n\n\
                  Example:\n  \
                  CaptionFE --input cat.jpg --captions layout.json --output meme.png"
)]
pub struct CliArgs {
    /// Base image(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// JSON caption layout applied to every input image.
    #[arg(short, long, value_name = "LAYOUT.json")]
    pub captions: PathBuf,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Directory with caption font files (e.g. Anton-Regular.ttf).
    /// Defaults to the `font_dir` setting, then system fonts.
    #[arg(long, value_name = "DIR")]
    pub font_dir: Option<PathBuf>,

    /// Print per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when a CLI-mode flag is present in the process arguments.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

// ============================================================================
// Layout file
// ============================================================================

/// Captions to draw, in editing-surface coordinates.
#[derive(Debug, Deserialize)]
pub struct Layout {
    /// Surface the positions refer to. Defaults to each image's native size.
    #[serde(default)]
    pub surface: Option<Size>,
    pub captions: Vec<CaptionSpec>,
}

#[derive(Debug, Deserialize)]
pub struct CaptionSpec {
    pub text: String,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub font: FontChoice,
    /// Defaults to the last color used in the editor.
    #[serde(default)]
    pub color: Option<Rgb>,
    #[serde(default = "default_size")]
    pub size: i32,
}

fn default_size() -> i32 {
    DEFAULT_FONT_SIZE
}

pub fn parse_layout(json: &str) -> Result<Layout, String> {
    serde_json::from_str(json).map_err(|e| format!("invalid layout: {}", e))
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let layout = match std::fs::read_to_string(&args.captions)
        .map_err(|e| format!("could not read '{}': {}", args.captions.display(), e))
        .and_then(|src| parse_layout(&src))
    {
        Ok(l) => l,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let settings = Settings::load();
    let font_dir = args.font_dir.clone().or_else(|| settings.font_dir.clone());
    let mut fonts = FontBook::new(font_dir);

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) =
            build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref())
        else {
            eprintln!(
                "  error: cannot determine output path for '{}'.",
                input_path.display()
            );
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, &layout, settings.last_color(), &mut fonts) {
            Ok(summary) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({} captions, {:.0}ms)",
                        output_path.display(),
                        summary.drawn,
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(
    input: &Path,
    output: &Path,
    layout: &Layout,
    default_color: Rgb,
    fonts: &mut FontBook,
) -> Result<ExportSummary, CaptionError> {
    let base = load_base_image(input)?;
    let surface_size = layout
        .surface
        .unwrap_or_else(|| Size::new(base.width() as f32, base.height() as f32));
    let surface = FixedSurface { size: surface_size };

    let mut prefs = MemoryPreferences::default();
    prefs.set_last_color(default_color);
    let mut controller = CaptionController::new(prefs);
    for spec in &layout.captions {
        controller.place_caption(
            &surface,
            spec.text.clone(),
            Point::new(spec.x, spec.y),
            spec.font,
            spec.color,
            spec.size,
        );
    }

    let saver = PathSaver { path: output.to_path_buf() };
    let filename = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    export(controller.model(), surface_size, &base, fonts, &saver, &filename)
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, `<stem>.png`)
/// 3. Fallback: next to the input as `<stem>_captioned.png`
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.png", stem)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_captioned.png", stem)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::encode_png;
    use image::{Rgba, RgbaImage};

    #[test]
    fn layout_fields_default() {
        let layout = parse_layout(
            r##"{
                "surface": { "width": 400, "height": 300 },
                "captions": [
                    { "text": "Top", "x": 10, "y": 20, "font": "display-a", "color": "#ff0000", "size": 36 },
                    { "text": "Bottom" }
                ]
            }"##,
        )
        .unwrap();
        assert_eq!(layout.surface, Some(Size::new(400.0, 300.0)));
        let top = &layout.captions[0];
        assert_eq!(top.font, FontChoice::Anton);
        assert_eq!(top.color, Some(Rgb::new(255, 0, 0)));
        assert_eq!(top.size, 36);
        let bottom = &layout.captions[1];
        assert_eq!((bottom.x, bottom.y), (0.0, 0.0));
        assert_eq!(bottom.font, FontChoice::Tinos);
        assert_eq!(bottom.color, None);
        assert_eq!(bottom.size, DEFAULT_FONT_SIZE);
    }

    #[test]
    fn layout_rejects_unknown_fonts() {
        let err = parse_layout(r#"{ "captions": [ { "text": "x", "font": "wingdings" } ] }"#)
            .unwrap_err();
        assert!(err.contains("wingdings"), "{}", err);
    }

    #[test]
    fn output_path_priority() {
        let input = Path::new("shots/cat.jpg");
        assert_eq!(
            build_output_path(input, Some(Path::new("x.png")), Some(Path::new("out"))),
            Some(PathBuf::from("x.png"))
        );
        assert_eq!(
            build_output_path(input, None, Some(Path::new("out"))),
            Some(PathBuf::from("out/cat.png"))
        );
        assert_eq!(
            build_output_path(input, None, None),
            Some(PathBuf::from("shots/cat_captioned.png"))
        );
    }

    #[test]
    fn renders_a_layout_of_blank_captions() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("base.png");
        let base = RgbaImage::from_pixel(64, 32, Rgba([200, 100, 50, 255]));
        std::fs::write(&input, encode_png(&base).unwrap()).unwrap();

        let layout = parse_layout(r#"{ "captions": [ { "text": "   " } ] }"#).unwrap();
        let output = dir.path().join("out.png");
        let mut fonts = FontBook::new(None);
        let summary = run_one(&input, &output, &layout, Rgb::WHITE, &mut fonts).unwrap();
        assert_eq!(summary.drawn, 0);
        assert_eq!(summary.skipped, 1);

        let written = image::open(&output).unwrap().to_rgba8();
        assert_eq!(written, base);
    }

    #[test]
    fn resolves_literal_and_glob_inputs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.png", "c.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let literal = dir.path().join("a.png").to_string_lossy().into_owned();
        let pattern = dir.path().join("*.png").to_string_lossy().into_owned();
        let found = resolve_inputs(&[literal, pattern]);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.extension().unwrap() == "png"));
    }
}
