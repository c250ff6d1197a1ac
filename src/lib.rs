#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;
pub mod app;
pub mod caption;
pub mod cli;
pub mod controller;
pub mod error;
pub mod io;
pub mod ops;
pub mod settings;
pub mod surface;

pub use caption::{Caption, CaptionId, CaptionModel, FontChoice, Point, Rgb, Size};
pub use controller::{CaptionController, EditorEvent};
pub use error::CaptionError;
