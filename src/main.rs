//! yomicam - point a camera at Japanese text and read it back as words
//!
//! Captures a live feed (or loads a still), crops the selected region,
//! binarizes it, recognizes the text with an orientation-tuned engine, and
//! segments each recognized line into words.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use yomicam::capture::frame::Frame;
use yomicam::config::{self, AppConfig, BinarizeStrategy};
use yomicam::segment::mecab::MecabAnalyzer;
use yomicam::segment::{surface_forms, Segmenter};
use yomicam::vision::preprocess::{preprocess, Applied};
use yomicam::vision::tesseract::TesseractFactory;
use yomicam::vision::{
    crop_frame, Orientation, RecognizerRegistry, RegionOfInterest, NO_CROP_SCALE,
};

/// yomicam - Japanese text scanner
#[derive(Parser, Debug)]
#[command(name = "yomicam")]
#[command(about = "Capture Japanese text with a camera and segment it into words")]
struct Args {
    /// Scan a still image instead of the live camera
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Text orientation of the material
    #[arg(short, long, value_enum, default_value_t)]
    orientation: Orientation,

    /// Binarization strategy (defaults to the configured one)
    #[arg(short, long, value_enum)]
    strategy: Option<BinarizeStrategy>,

    /// Region of interest as x,y,width,height in display pixels
    #[arg(short, long)]
    region: Option<String>,

    /// Display-to-native scale for the region (defaults to 1.0)
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Directory to write the raw, cropped, and processed stills into
    #[arg(long)]
    save_images: Option<PathBuf>,

    /// Configuration file (defaults to the per-user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Camera device index (live mode)
    #[arg(short, long)]
    device: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = load_or_create_config(args.config.as_deref());
    if let Some(strategy) = args.strategy {
        config.preprocess.strategy = strategy;
    }
    if let Some(device) = args.device {
        config.capture.device_index = device;
    }

    if let Some(input) = &args.input {
        scan_file(input, &args, config).await
    } else {
        run_live(&args, config).await
    }
}

/// Load configuration from file or create default
fn load_or_create_config(explicit: Option<&std::path::Path>) -> AppConfig {
    if let Some(path) = explicit {
        match config::load_config(path) {
            Ok(config) => {
                info!("Loaded configuration from {:?}", path);
                return config;
            }
            Err(e) => {
                tracing::warn!("Could not load {:?}: {}; using defaults", path, e);
                return AppConfig::default();
            }
        }
    }

    if let Some(proj_dirs) = directories::ProjectDirs::from("dev", "yomicam", "yomicam") {
        let config_path = proj_dirs.config_dir().join("config.toml");
        if config_path.exists() {
            if let Ok(config) = config::load_config(&config_path) {
                info!("Loaded configuration from {:?}", config_path);
                return config;
            }
        }
    }
    info!("Using default configuration");
    AppConfig::default()
}

/// Run the pipeline over a still image file
async fn scan_file(input: &std::path::Path, args: &Args, config: AppConfig) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("reading {input:?}"))?;
    let still = Frame::from_encoded(&bytes).context("decoding input image")?;
    info!("Loaded {:?} at {}x{}", input, still.width(), still.height());

    let (region, scale) = match &args.region {
        Some(spec) => (parse_region(spec)?, args.scale),
        None => (RegionOfInterest::default(), NO_CROP_SCALE),
    };
    let cropped = crop_frame(&still, &region, scale)?;

    let outcome = preprocess(&cropped, &config.preprocess);
    if let Applied::Fallback { reason } = &outcome.applied {
        tracing::warn!("Preprocessing fell back to the raw image: {}", reason);
    }

    if let Some(dir) = &args.save_images {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join("raw.png"), still.to_png()?)?;
        std::fs::write(dir.join("cropped.png"), cropped.to_png()?)?;
        std::fs::write(dir.join("processed.png"), outcome.frame.to_png()?)?;
        info!("Intermediate images written to {:?}", dir);
    }

    let registry = RecognizerRegistry::new(Arc::new(TesseractFactory::new(config.ocr.clone())));
    let segmenter = Segmenter::new(Arc::new(MecabAnalyzer::new(config.segmenter.clone())));
    segmenter.wait_ready().await?;

    let lines = registry
        .recognize_lines(&outcome.frame, args.orientation)
        .await?;
    if lines.is_empty() {
        println!("No text detected.");
        return Ok(());
    }

    for (line, morphemes) in lines.iter().zip(segmenter.segment_lines(&lines)?) {
        println!("{line}");
        println!("  {}", surface_forms(&morphemes).join(" / "));
    }

    Ok(())
}

/// Run an interactive live-camera session
#[cfg(feature = "camera")]
async fn run_live(args: &Args, config: AppConfig) -> Result<()> {
    use tokio::io::{AsyncBufReadExt, BufReader};
    use yomicam::capture::device::NokhwaSource;
    use yomicam::capture::CaptureSession;
    use yomicam::scanner::Scanner;

    let source = NokhwaSource::new(config.capture.device_index);
    let session = CaptureSession::new(Box::new(source), config.capture.clone());
    let registry = RecognizerRegistry::new(Arc::new(TesseractFactory::new(config.ocr.clone())));
    let segmenter = Segmenter::new(Arc::new(MecabAnalyzer::new(config.segmenter.clone())));

    let mut scanner = Scanner::new(session, registry, segmenter, config);
    scanner.set_orientation(args.orientation);
    if let Some(spec) = &args.region {
        scanner.set_region(Some(parse_region(spec)?));
    }

    // A CLI session has no real viewport; a nominal landscape one stands in,
    // and region coordinates are interpreted against it.
    scanner.start((1280.0, 720.0)).await?;
    scanner.warm_up().await?;

    if let Some(zoom) = scanner.controls().zoom {
        info!(
            "Zoom available: {} to {} (step {})",
            zoom.min, zoom.max, zoom.step
        );
    }

    println!("Camera running. Press Enter to capture, 'q' + Enter to quit.");
    let mut input_lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = input_lines.next_line().await? {
        if line.trim() == "q" {
            break;
        }
        match scanner.take_photo().await {
            Ok(words) if words.is_empty() => println!("No text detected."),
            Ok(words) => println!("{}", words.join(" / ")),
            Err(e) => tracing::error!("Capture failed: {}", e),
        }
        if let Some(dir) = &args.save_images {
            let last = scanner.last_capture();
            std::fs::create_dir_all(dir)?;
            std::fs::write(dir.join("raw.png"), &last.raw_png)?;
            std::fs::write(dir.join("cropped.png"), &last.cropped_png)?;
            std::fs::write(dir.join("processed.png"), &last.processed_png)?;
        }
    }

    scanner.stop();
    info!("yomicam shutdown complete");
    Ok(())
}

#[cfg(not(feature = "camera"))]
async fn run_live(_args: &Args, _config: AppConfig) -> Result<()> {
    bail!("built without the `camera` feature; pass --input to scan an image file")
}

/// Parse an `x,y,width,height` region specification
fn parse_region(spec: &str) -> Result<RegionOfInterest> {
    let parts: Vec<f64> = spec
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("invalid region {spec:?}, expected x,y,width,height"))?;
    if parts.len() != 4 {
        bail!("invalid region {spec:?}, expected x,y,width,height");
    }
    Ok(RegionOfInterest {
        x: parts[0],
        y: parts[1],
        width: parts[2],
        height: parts[3],
    })
}
