mod settings;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use serde::Serialize;

use moodcam_core::emotion::domain::emotion_state::{AdditionalData, EmotionState};
use moodcam_core::emotion::infrastructure::emotion_detector::EmotionDetector;
use moodcam_core::emotion::infrastructure::onnx_emotion_analyzer::OnnxAnalyzerLoader;
use moodcam_core::media::domain::media_device::{MediaConstraints, MediaDevice};
use moodcam_core::media::infrastructure::ffmpeg_capture_device::{
    default_input_format, CaptureLocator, FfmpegCaptureDevice,
};
use moodcam_core::media::infrastructure::still_image_device::StillImageDevice;
use moodcam_core::media::media_source_controller::MediaSourceController;
use moodcam_core::sampling::domain::frame_scheduler::FrameScheduler;
use moodcam_core::sampling::domain::sampler_config::SamplerConfig;
use moodcam_core::sampling::emotion_feed::EmotionSnapshot;
use moodcam_core::sampling::emotion_sampling_loop::EmotionSamplingLoop;
use moodcam_core::sampling::infrastructure::interval_frame_scheduler::IntervalFrameScheduler;
use moodcam_core::sampling::infrastructure::manual_frame_scheduler::ManualFrameScheduler;
use moodcam_core::sampling::infrastructure::sampling_worker::SamplingWorker;
use moodcam_core::sampling::sampling_logger::SummarySamplingLogger;
use moodcam_core::shared::clock::{Clock, ManualClock, SystemClock};
use moodcam_core::shared::constants::{DEFAULT_REFRESH_INTERVAL, IMAGE_EXTENSIONS};

use settings::{OutputFormat, Settings};

/// Live facial-emotion readings from a camera, a video file or an image.
#[derive(Parser)]
#[command(name = "moodcam")]
struct Cli {
    /// Capture device (e.g. /dev/video0, "0" on macOS). Defaults to the platform camera.
    #[arg(long, conflicts_with_all = ["file", "image"])]
    device: Option<String>,

    /// ffmpeg input format for --device (v4l2, avfoundation, dshow).
    #[arg(long)]
    input_format: Option<String>,

    /// Sample a recorded video instead of a camera, in stream time.
    #[arg(long, conflicts_with = "image")]
    file: Option<PathBuf>,

    /// Sample a single still image repeatedly.
    #[arg(long)]
    image: Option<PathBuf>,

    /// Minimum milliseconds between two detections.
    #[arg(long)]
    throttle_ms: Option<u64>,

    /// Stop after this many seconds.
    #[arg(long)]
    duration: Option<f64>,

    /// Print one JSON object per reading.
    #[arg(long)]
    json: bool,

    /// Directory holding pre-downloaded ONNX models.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    min_face_confidence: Option<f32>,
}

/// Effective options after merging flags over persisted settings.
struct Options {
    source: Source,
    throttle: Duration,
    duration: Option<Duration>,
    output: OutputFormat,
    model_dir: Option<PathBuf>,
    min_face_confidence: f32,
}

enum Source {
    Camera { input_format: String, name: String },
    File(PathBuf),
    Image(PathBuf),
}

#[derive(Serialize)]
struct Reading<'a> {
    sequence: u64,
    timestamp_ms: u128,
    emotion: &'a EmotionState,
    additional: &'a AdditionalData,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let options = resolve_options(cli, Settings::load())?;

    let loader = OnnxAnalyzerLoader::new(options.model_dir.clone(), options.min_face_confidence)
        .with_progress(download_progress);
    let detector = Arc::new(EmotionDetector::new(Arc::new(loader)));
    detector.begin_initialize()?;

    let mut source =
        MediaSourceController::new(open_device(&options.source), MediaConstraints::default());
    let info = source.enable()?.clone();

    let (scheduler, clock): (Box<dyn FrameScheduler>, Arc<dyn Clock>) = match options.source {
        Source::File(_) => {
            let clock = ManualClock::new();
            let interval = info.frame_interval().unwrap_or(DEFAULT_REFRESH_INTERVAL);
            (
                Box::new(ManualFrameScheduler::new(clock.clone(), interval)),
                Arc::new(clock),
            )
        }
        Source::Camera { .. } | Source::Image(_) => (
            Box::new(IntervalFrameScheduler::default()),
            Arc::new(SystemClock::new()),
        ),
    };

    let config = SamplerConfig::default().with_throttle(options.throttle);
    let sampler =
        EmotionSamplingLoop::new(detector.clone(), Box::new(source), scheduler, clock, config)
            .with_logger(Box::new(SummarySamplingLogger::new()));

    let worker = SamplingWorker::spawn(sampler);
    let readings = worker.feed().subscribe();
    worker.set_active(true);

    if let Err(e) = detector.initialize() {
        worker.shutdown();
        return Err(e.into());
    }
    log::info!("Sampling {}x{} @ {:.1} fps", info.width, info.height, info.fps);

    let started = Instant::now();
    let mut last_sequence = 0;
    let mut was_processing = false;
    loop {
        if options.duration.is_some_and(|d| started.elapsed() >= d) {
            break;
        }
        let Ok(snapshot) = readings.recv_timeout(Duration::from_millis(100)) else {
            continue;
        };
        if snapshot.sequence > last_sequence {
            last_sequence = snapshot.sequence;
            print_reading(&snapshot, options.output)?;
        }
        if was_processing && !snapshot.is_processing {
            log::info!("Source finished");
            break;
        }
        was_processing = snapshot.is_processing;
    }

    if let Some(summary) = worker.shutdown() {
        eprintln!("{summary}");
    }
    Ok(())
}

fn resolve_options(cli: Cli, settings: Settings) -> Result<Options, Box<dyn std::error::Error>> {
    validate(&cli)?;

    let source = if let Some(path) = cli.file {
        Source::File(path)
    } else if let Some(path) = cli.image {
        Source::Image(path)
    } else {
        Source::Camera {
            input_format: cli
                .input_format
                .or(settings.input_format)
                .unwrap_or_else(|| default_input_format().to_string()),
            name: cli.device.or(settings.device).unwrap_or_else(|| {
                match CaptureLocator::default_camera() {
                    CaptureLocator::Device { name, .. } => name,
                    CaptureLocator::File(path) => path.display().to_string(),
                }
            }),
        }
    };

    let min_face_confidence = cli.min_face_confidence.unwrap_or(settings.min_face_confidence);
    if !(0.0..=1.0).contains(&min_face_confidence) {
        return Err(format!(
            "Face confidence must be between 0.0 and 1.0, got {min_face_confidence}"
        )
        .into());
    }

    let throttle_ms = cli.throttle_ms.unwrap_or(settings.throttle_ms);
    if throttle_ms == 0 {
        return Err("Throttle must be at least 1 ms".into());
    }

    Ok(Options {
        source,
        throttle: Duration::from_millis(throttle_ms),
        duration: cli.duration.map(Duration::from_secs_f64),
        output: if cli.json { OutputFormat::Json } else { settings.output },
        model_dir: cli.model_dir.or(settings.model_dir),
        min_face_confidence,
    })
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(file) = &cli.file {
        if !file.exists() {
            return Err(format!("Input file not found: {}", file.display()).into());
        }
    }
    if let Some(image) = &cli.image {
        if !image.exists() {
            return Err(format!("Image not found: {}", image.display()).into());
        }
        if !is_image(image) {
            return Err(format!("Unsupported image type: {}", image.display()).into());
        }
    }
    if let Some(dir) = &cli.model_dir {
        if !dir.is_dir() {
            return Err(format!("Model directory not found: {}", dir.display()).into());
        }
    }
    if let Some(d) = cli.duration {
        if !d.is_finite() || d <= 0.0 {
            return Err(format!("Duration must be a positive number of seconds, got {d}").into());
        }
    }
    Ok(())
}

fn open_device(source: &Source) -> Box<dyn MediaDevice> {
    match source {
        Source::Camera { input_format, name } => {
            Box::new(FfmpegCaptureDevice::new(CaptureLocator::Device {
                input_format: input_format.clone(),
                name: name.clone(),
            }))
        }
        Source::File(path) => {
            Box::new(FfmpegCaptureDevice::new(CaptureLocator::File(path.clone())))
        }
        Source::Image(path) => Box::new(StillImageDevice::new(path.clone())),
    }
}

fn print_reading(
    snapshot: &EmotionSnapshot,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let emotion = snapshot.emotion.as_ref();
    match format {
        OutputFormat::Json => {
            let reading = Reading {
                sequence: snapshot.sequence,
                timestamp_ms: emotion.timestamp.as_millis(),
                emotion,
                additional: &snapshot.additional,
            };
            println!("{}", serde_json::to_string(&reading)?);
        }
        OutputFormat::Text => {
            let face = if snapshot.additional.face_detected { "face" } else { "no face" };
            println!(
                "[{:>8.2}s] {:<9} {:>5.1}%  {:<8} ({face})",
                emotion.timestamp.as_secs_f64(),
                emotion.dominant,
                emotion.confidence * 100.0,
                emotion.tone.label(),
            );
        }
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn download_progress(model: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {model}... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading {model}... {downloaded} bytes");
    }
}
