mod app;
mod config;
mod error;
mod logging;
mod upload;
mod utils;

use app::LaunchpadUploader;
use config::AppConfig;
use error::UploaderError;
use tracing::{info, warn};

fn main() -> Result<(), UploaderError> {
    logging::init_logging();

    let config = config::load_config().unwrap_or_else(|e| {
        warn!("Falling back to default config: {}", e);
        AppConfig::default().with_env_overrides()
    });

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([config.window_width, config.window_height])
            .with_min_inner_size([420.0, 520.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    let app = LaunchpadUploader::new(config)?;
    info!("Starting launchpad uploader");

    eframe::run_native(
        "Launchpad File Uploader",
        options,
        Box::new(move |_cc: &eframe::CreationContext| Box::new(app)),
    )
    .map_err(|e| UploaderError::Other(e.to_string()))
}
