use clap::{Parser as ClapParser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{fs, process};
use timelens::config::Settings;
use timelens::driver::Driver;
use timelens::error::TimelensError;
use timelens::http::HttpSource;
use timelens::mosaic::Compositor;
use timelens::overlay::OverlayManager;
use timelens::page::Document;
use timelens::storage::{self, StripStore};
use timelens::storyboard::{InfoSource, Storyboard};
use timelens::{feed, video_id};
use tokio::sync::Notify;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

const DEFAULT_CONFIG: &str = "timelens.toml";

#[derive(ClapParser, Debug)]
#[command(version, about)]
struct Cli {
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the timeline strip of one video and write it as PNG
    Render {
        /// Video page URL or bare video id
        target: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Keep an overlay in sync with a player state fed line by line on stdin
    Watch,
}

fn main() {
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt::Layer::default()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_names(false)
                .with_ansi(true)
                .with_line_number(false)
                .with_file(false)
                .with_thread_ids(false),
        );
    tracing::subscriber::set_global_default(subscriber)
        .expect("Unable to set a global logger instance");

    let cli = Cli::parse();
    let settings = match build_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let runtime = match common::runtime::build(settings.runtime.threads) {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to create runtime: {}", e);
            process::exit(1);
        }
    };

    let result = runtime.block_on(async move {
        match cli.command {
            Command::Render { target, output } => render(&settings, &target, output).await,
            Command::Watch => watch(&settings).await,
        }
    });

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}

async fn render(
    settings: &Settings,
    target: &str,
    output: Option<PathBuf>,
) -> Result<(), TimelensError> {
    let video_id = video_id::extract(target).unwrap_or_else(|| target.to_string());
    let source = Arc::new(HttpSource::new(&settings.source));

    let payload = source.video_info(&video_id).await?;
    let storyboard = Storyboard::from_info(&payload)?;
    let level = storyboard
        .best_level()
        .ok_or_else(|| TimelensError::ParseError("storyboard has no levels".to_string()))?;
    info!(
        "{}: {}s, {} frames of {}x{}",
        video_id,
        storyboard.length_seconds,
        level.frame_count,
        level.tile_width,
        level.tile_height
    );

    let mosaic = Compositor::new(source).compose(level);
    let canvas = mosaic.canvas();
    let report = mosaic.finish().await;
    info!("{}/{} sheets loaded", report.loaded, report.sheets);

    let path = output
        .unwrap_or_else(|| Path::new(&settings.output.path).join(format!("{}.png", video_id)));
    storage::write_png(&path, &canvas.snapshot()).await?;
    info!("strip written to {}", path.display());
    Ok(())
}

async fn watch(settings: &Settings) -> Result<(), TimelensError> {
    let document = Arc::new(Document::new());
    let source = Arc::new(HttpSource::new(&settings.source));
    let manager = Arc::new(OverlayManager::new(source.clone(), Compositor::new(source)));

    let notifier = Arc::new(Notify::new());
    common::signals::listen(notifier.clone());

    let driver = Driver::new(document.clone(), manager, settings.driver.interval)
        .with_store(StripStore::new(settings.output.path.clone()))
        .with_style(&settings.style);

    tokio::spawn(feed::run(document, tokio::io::stdin()));
    driver.run(notifier).await;
    Ok(())
}

fn build_settings(config_path: Option<&str>) -> Result<Settings, TimelensError> {
    let (path, explicit) = match config_path {
        Some(path) => (path, true),
        None => (DEFAULT_CONFIG, false),
    };

    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(_) if !explicit => return Ok(Settings::default()),
        Err(_) => {
            return Err(TimelensError::ConfigError(format!(
                "Config file '{}' does not exist",
                path
            )))
        }
    };

    toml::from_str(&data)
        .map_err(|e| TimelensError::ConfigError(format!("Invalid configuration: {}", e)))
}
