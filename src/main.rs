//! Reading monitor: webcam pupil tracking, reading detection and engagement metrics.

use anyhow::Result;
use clap::Parser;
use log::info;
use reading_monitor::app::{AppConfig, GuiMode, InvertMode, MonitorApp, VideoSource};
use reading_monitor::config::{Config, EXAMPLE_CONFIG};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Camera index to use
    #[arg(long, default_value = "0")]
    cam: i32,

    /// Video file to process
    #[arg(short, long, conflicts_with = "cam")]
    video: Option<String>,

    /// GUI display mode (cam, none)
    #[arg(short, long)]
    gui: Option<String>,

    /// Invert image (none, x, y, xy)
    #[arg(short, long)]
    inv: Option<String>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<String>,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    info!("Reading Monitor");

    let settings = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {config_path}");
        match Config::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::warn!("Failed to load config file: {e}. Using defaults.");
                Config::default()
            }
        }
    } else {
        Config::default()
    };
    settings.validate()?;
    settings.validate_models()?;

    let gui_mode = match args.gui.as_deref() {
        Some("none") => GuiMode::None,
        Some(_) => GuiMode::Camera,
        None if settings.display.show_window => GuiMode::Camera,
        None => GuiMode::None,
    };

    let invert_mode = match args.inv.as_deref() {
        Some("x") => InvertMode::X,
        Some("y") => InvertMode::Y,
        Some("xy") => InvertMode::XY,
        Some(_) => InvertMode::None,
        None => InvertMode::from_flags(settings.display.flip_x, settings.display.flip_y),
    };

    let config = AppConfig {
        video_source: if let Some(video_path) = args.video {
            VideoSource::File(video_path)
        } else {
            VideoSource::Camera(args.cam)
        },
        gui_mode,
        invert_mode,
        settings,
    };

    let mut app = MonitorApp::new(config)?;
    app.run()?;

    Ok(())
}
