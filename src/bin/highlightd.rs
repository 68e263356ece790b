//! highlightd - court highlight processor
//!
//! Loads the models, plays the configured video source, runs detection on every
//! frame and prints key moments to stdout as JSON lines. Progress and logs go to
//! stderr. Ctrl-C stops the loop and prints the run summary.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;

use court_highlights::{
    Canvas, DetectionSession, DisplayList, FileSource, FrameLoop, JsonLinesObserver,
    ModelLoader, PlaybackController, ProcessorConfig, RasterCanvas, RunSummary, VideoSource,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "HIGHLIGHT_CONFIG")]
    config: Option<PathBuf>,
    /// Video source override (path, URL or stub://court).
    #[arg(long)]
    src: Option<String>,
    /// Skip drawing the overlay.
    #[arg(long)]
    no_overlay: bool,
    /// Restart the source when it ends.
    #[arg(long = "loop")]
    loop_playback: bool,
    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Write overlay snapshots into this directory.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
    /// Snapshot every n-th processed frame.
    #[arg(long)]
    snapshot_every: Option<u64>,
    /// Overlay canvas (raster|display-list).
    #[arg(long, default_value = "raster", value_name = "KIND")]
    canvas: String,
    /// Read play/pause/end commands from stdin.
    #[arg(long)]
    interactive: bool,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let cfg = {
        let _stage = ui.stage("Load config");
        let mut cfg = ProcessorConfig::load_from(args.config.as_deref())?;
        apply_args(&mut cfg, &args)?;
        cfg
    };
    log::info!(
        "source={} size={}x{} backend={} overlay={} target_fps={}",
        cfg.video.src,
        cfg.video.width,
        cfg.video.height,
        cfg.models.backend.as_str(),
        cfg.video.show_overlay,
        cfg.video.target_fps
    );

    let loader = ModelLoader::new(cfg.models.clone());
    let progress = loader.progress();
    let load_handle = std::thread::Builder::new()
        .name("model-loader".to_string())
        .spawn(move || loader.load())
        .context("spawn model loader")?;

    let source = {
        let _stage = ui.stage("Open video source");
        let mut source = FileSource::new(cfg.file_config())?;
        source.connect()?;
        source
    };

    ui.track_load(&progress, &load_handle);
    let models = load_handle
        .join()
        .map_err(|_| anyhow!("model loader thread panicked"))??;
    if !source.is_healthy() {
        return Err(anyhow!("video source {} is not healthy", cfg.video.src));
    }

    let session = DetectionSession::new(models);
    let summary = match args.canvas.as_str() {
        "raster" => {
            let canvas = match &cfg.overlay.font_path {
                Some(path) => RasterCanvas::with_font(cfg.video.width, cfg.video.height, path)?,
                None => RasterCanvas::new(cfg.video.width, cfg.video.height),
            };
            run_loop(&cfg, &args, source, session, canvas)?
        }
        "display-list" => {
            let canvas = DisplayList::new(cfg.video.width, cfg.video.height);
            run_loop(&cfg, &args, source, session, canvas)?
        }
        other => return Err(anyhow!("unknown canvas '{}'", other)),
    };

    log::info!(
        "processed {} frames, {} key moments, {} inference failures, {} snapshots",
        summary.frames_processed,
        summary.key_moments.len(),
        summary.inference_failures,
        summary.snapshots_written
    );
    println!(
        "{}",
        serde_json::json!({
            "event": "summary",
            "frames_processed": summary.frames_processed,
            "key_moments": summary.key_moments.len(),
            "inference_failures": summary.inference_failures,
            "snapshots_written": summary.snapshots_written,
        })
    );

    match summary.playback_error {
        Some(err) => Err(anyhow!(err)),
        None => Ok(()),
    }
}

fn apply_args(cfg: &mut ProcessorConfig, args: &Args) -> Result<()> {
    if let Some(src) = &args.src {
        cfg.video.src = src.clone();
    }
    if args.no_overlay {
        cfg.video.show_overlay = false;
    }
    if args.loop_playback {
        cfg.video.loop_playback = true;
    }
    if args.max_frames.is_some() {
        cfg.video.max_frames = args.max_frames;
    }
    if let Some(dir) = &args.snapshot_dir {
        cfg.overlay.snapshot_dir = Some(dir.clone());
    }
    if let Some(every) = args.snapshot_every {
        if every == 0 {
            return Err(anyhow!("--snapshot-every must be greater than zero"));
        }
        cfg.overlay.snapshot_every = every;
    }
    if cfg.video.src.trim().is_empty() {
        return Err(anyhow!("video source must not be empty"));
    }
    Ok(())
}

fn run_loop<C: Canvas>(
    cfg: &ProcessorConfig,
    args: &Args,
    source: FileSource,
    session: DetectionSession,
    canvas: C,
) -> Result<RunSummary> {
    let mut frame_loop = FrameLoop::new(source, session, canvas, cfg.loop_options())
        .with_observer(Box::new(JsonLinesObserver::new(std::io::stdout())));

    let token = frame_loop.cancellation_token();
    ctrlc::set_handler(move || {
        token.cancel();
    })
    .context("install Ctrl-C handler")?;

    let (controller, events) = PlaybackController::channel();
    let interactive = args.interactive || !cfg.video.autoplay;
    if cfg.video.autoplay {
        controller.play()?;
    }
    if interactive {
        log::info!("reading playback commands from stdin (play, pause, end)");
        spawn_stdin_controller(controller)?;
    } else {
        // Nothing else can resume playback; the loop returns once it goes idle.
        drop(controller);
    }

    Ok(frame_loop.run(&events))
}

fn spawn_stdin_controller(controller: PlaybackController) -> Result<()> {
    std::thread::Builder::new()
        .name("stdin-controller".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                let sent = match line.trim() {
                    "play" => controller.play(),
                    "pause" => controller.pause(),
                    "end" => controller.end(),
                    "" => continue,
                    other => {
                        log::warn!("unknown command '{}'", other);
                        continue;
                    }
                };
                if sent.is_err() {
                    break;
                }
            }
        })
        .context("spawn stdin controller")?;
    Ok(())
}
