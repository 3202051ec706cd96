mod controller;
mod error;
mod ops;
mod renderer;
mod types;
mod ui;

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::controller::{Collaborators, Controller};
use crate::error::AppError;
use crate::ops::export::FileExporter;
use crate::ops::midi_parse::SmfParser;
use crate::ops::staging::Workspace;
use crate::renderer::piano_roll::PianoRollRenderer;
use crate::renderer::pipeline::GstPipeline;
use crate::types::config::{AppConfig, CONFIG_FILE};
use crate::ui::app::MidirollApp;
use crate::ui::dialogs::RfdPrompt;

fn main() -> Result<(), AppError> {
    let (config, config_error) = AppConfig::load_or_default(Path::new(CONFIG_FILE));

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.max_log_level())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Logging(e.to_string()))?;
    if let Some(err) = config_error {
        warn!("using default settings: {err}");
    }

    let workspace = Workspace::create(&config).map_err(AppError::Workspace)?;
    let pipeline = GstPipeline::new()?;
    let controller = Controller::new(
        Box::new(pipeline),
        Collaborators {
            parser: Arc::new(SmfParser),
            renderer: Arc::new(PianoRollRenderer::new(config.render.clone())),
            exporter: Box::new(FileExporter),
            prompt: Box::new(RfdPrompt),
        },
        workspace.paths().clone(),
        &config,
    );
    info!("starting");

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_title("MIDI Roll")
            .with_inner_size([960.0, 640.0]),
        ..Default::default()
    };
    eframe::run_native(
        "MIDI Roll",
        native_options,
        Box::new(|_cc| Ok(Box::new(MidirollApp::new(controller, workspace)))),
    )?;
    Ok(())
}
