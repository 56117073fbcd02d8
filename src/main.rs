mod app;
mod config;
mod logging;
mod upload;
mod utils;

use anyhow::{Context, Result};
use app::BlurUploader;
use clap::Parser;
use eframe::CreationContext;
use std::path::PathBuf;
use upload::UploadClient;

#[derive(Parser, Debug)]
#[command(
    name = "video-blur-uploader",
    version,
    about = "Upload a video for blurring and download the processed copy"
)]
struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Processing server base URL, overriding the config file.
    #[arg(long, env = "VIDEO_BLUR_SERVER_URL")]
    server_url: Option<String>,
}

fn main() -> Result<()> {
    logging::init_logging();
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => config::config_path()?,
    };
    let mut cfg = config::load_or_init(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    if let Some(server_url) = cli.server_url {
        cfg.server_url = server_url;
    }

    let client = UploadClient::new(cfg.server_url()?, cfg.upload_url()?);
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    tracing::info!(
        config = %config_path.display(),
        server = %cfg.server_url,
        "starting video blur uploader"
    );

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([600.0, 640.0])
            .with_min_inner_size([420.0, 520.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "Video Blur Uploader",
        options,
        Box::new(move |cc: &CreationContext| {
            Box::new(BlurUploader::new(cc, cfg, client, runtime))
        }),
    )
    .map_err(|e| anyhow::anyhow!("failed to run window: {}", e))
}
