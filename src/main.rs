// GUI-subsystem binary on Windows release builds; CLI output still reaches a
// terminal when the binary is launched from one in debug builds.
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::path::PathBuf;

use captionfe::app::CaptionApp;
use captionfe::cli;
use captionfe::logger;
use eframe::egui;

fn main() -> Result<(), eframe::Error> {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode -----------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    // An image path passed on the command line opens as the base image
    let startup_image = std::env::args().nth(1).map(PathBuf::from);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 720.0])
            .with_title("CaptionFE"),
        ..Default::default()
    };

    eframe::run_native(
        "CaptionFE",
        options,
        Box::new(move |cc| Box::new(CaptionApp::new(cc, startup_image))),
    )
}
