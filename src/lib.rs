//! Court highlight processor
//!
//! Plays a video source frame by frame, runs an object detector and a pose
//! estimator on every frame, and flags key moments (probable shot or pass, jump
//! shot or dunk) from a short rolling history. An overlay with boxes, skeletons
//! and a stats panel is redrawn each frame.
//!
//! # Pipeline
//!
//! 1. `loader`: prepares the backend and both models, publishing progress.
//! 2. `playback`: the `Idle`/`Detecting` frame loop driven by playback events.
//! 3. `session`: per-frame inference, stats and key-moment tracking.
//! 4. `moments`: the ball-movement and jump heuristics.
//! 5. `overlay`: rendering onto a `Canvas` (display list or raster image).
//!
//! # Module Structure
//!
//! - `frame`: decoded RGB frames with media time
//! - `detect`: detection types and model backends (cpu, tract)
//! - `ingest`: video sources (synthetic court, local files)
//! - `history`: bounded FIFO of per-frame detections
//! - `observer`: detection and key-moment callbacks
//! - `config`: file + env configuration

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod history;
pub mod ingest;
pub mod loader;
pub mod moments;
pub mod observer;
pub mod overlay;
pub mod playback;
pub mod session;
pub mod stats;

pub use config::ProcessorConfig;
pub use detect::{
    BoundingBox, Detection, FrameDetections, Keypoint, KeypointName, ObjectClass,
    ObjectDetector, Pose, PoseEstimator,
};
pub use error::{LoadStage, PipelineError};
pub use frame::VideoFrame;
pub use history::{HistoryFrame, MovementHistory, MAX_HISTORY_FRAMES};
pub use ingest::{FileConfig, FileSource};
pub use loader::{LoadProgress, LoadedModels, ModelBackend, ModelLoader, ModelSettings};
pub use moments::{detect_key_moment, KeyMoment, KeyMomentKind, KeyMomentTracker};
pub use observer::{FrameObserver, JsonLinesObserver, MomentLog};
pub use overlay::{Canvas, DisplayList, OverlayRenderer, RasterCanvas};
pub use playback::{
    CancellationToken, FrameLoop, LoopOptions, LoopState, PlaybackController, PlaybackEvent,
    RunSummary, TickOutcome, VideoSource,
};
pub use session::{DetectionSession, FrameReport};
pub use stats::ProcessingStats;
