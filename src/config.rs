use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ingest::FileConfig;
use crate::loader::{ModelBackend, ModelSettings};
use crate::playback::{LoopOptions, SnapshotSettings};

const DEFAULT_VIDEO_SRC: &str = "stub://court";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 360;
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_SCENE_FPS: u32 = 30;
const DEFAULT_SNAPSHOT_EVERY: u64 = 30;

#[derive(Debug, Deserialize, Default)]
struct ProcessorConfigFile {
    video: Option<VideoConfigFile>,
    models: Option<ModelsConfigFile>,
    overlay: Option<OverlayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoConfigFile {
    src: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    show_overlay: Option<bool>,
    autoplay: Option<bool>,
    loop_playback: Option<bool>,
    target_fps: Option<u32>,
    scene_fps: Option<u32>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelsConfigFile {
    backend: Option<String>,
    object_model: Option<PathBuf>,
    pose_model: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    font_path: Option<PathBuf>,
    snapshot_dir: Option<PathBuf>,
    snapshot_every: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub video: VideoSettings,
    pub models: ModelSettings,
    pub overlay: OverlaySettings,
}

#[derive(Debug, Clone)]
pub struct VideoSettings {
    pub src: String,
    pub width: u32,
    pub height: u32,
    pub show_overlay: bool,
    pub autoplay: bool,
    pub loop_playback: bool,
    /// Loop pacing; 0 runs unpaced.
    pub target_fps: u32,
    /// Media clock of the synthetic `stub://` scene, independent of pacing.
    pub scene_fps: u32,
    pub max_frames: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct OverlaySettings {
    /// TrueType/OpenType font for raster text. Without one, raster output has no text.
    pub font_path: Option<PathBuf>,
    pub snapshot_dir: Option<PathBuf>,
    pub snapshot_every: u64,
}

impl ProcessorConfig {
    /// Read `HIGHLIGHT_CONFIG` (JSON, or TOML for `.toml`), apply env overrides, validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("HIGHLIGHT_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Like `load`, with an explicit config file instead of `HIGHLIGHT_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ProcessorConfigFile) -> Result<Self> {
        let video_file = file.video.unwrap_or_default();
        let video = VideoSettings {
            src: video_file
                .src
                .unwrap_or_else(|| DEFAULT_VIDEO_SRC.to_string()),
            width: video_file.width.unwrap_or(DEFAULT_WIDTH),
            height: video_file.height.unwrap_or(DEFAULT_HEIGHT),
            show_overlay: video_file.show_overlay.unwrap_or(true),
            autoplay: video_file.autoplay.unwrap_or(true),
            loop_playback: video_file.loop_playback.unwrap_or(false),
            target_fps: video_file.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
            scene_fps: video_file.scene_fps.unwrap_or(DEFAULT_SCENE_FPS),
            max_frames: video_file.max_frames,
        };

        let models_file = file.models.unwrap_or_default();
        let backend = match models_file.backend.as_deref() {
            Some(name) => ModelBackend::parse(name)?,
            None => ModelBackend::Cpu,
        };
        let models = ModelSettings {
            backend,
            object_model: models_file.object_model,
            pose_model: models_file.pose_model,
        };

        let overlay_file = file.overlay.unwrap_or_default();
        let overlay = OverlaySettings {
            font_path: overlay_file.font_path,
            snapshot_dir: overlay_file.snapshot_dir,
            snapshot_every: overlay_file
                .snapshot_every
                .unwrap_or(DEFAULT_SNAPSHOT_EVERY),
        };

        Ok(Self {
            video,
            models,
            overlay,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(src) = std::env::var("HIGHLIGHT_VIDEO_SRC") {
            if !src.trim().is_empty() {
                self.video.src = src;
            }
        }
        if let Ok(backend) = std::env::var("HIGHLIGHT_MODEL_BACKEND") {
            if !backend.trim().is_empty() {
                self.models.backend = ModelBackend::parse(&backend)?;
            }
        }
        if let Ok(show) = std::env::var("HIGHLIGHT_SHOW_OVERLAY") {
            self.video.show_overlay = parse_bool(&show)
                .ok_or_else(|| anyhow!("HIGHLIGHT_SHOW_OVERLAY must be true or false"))?;
        }
        if let Ok(fps) = std::env::var("HIGHLIGHT_TARGET_FPS") {
            self.video.target_fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("HIGHLIGHT_TARGET_FPS must be a non-negative integer"))?;
        }
        if let Ok(dir) = std::env::var("HIGHLIGHT_SNAPSHOT_DIR") {
            if !dir.trim().is_empty() {
                self.overlay.snapshot_dir = Some(PathBuf::from(dir));
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.video.src = self.video.src.trim().to_string();
        if self.video.src.is_empty() {
            return Err(anyhow!("video source must not be empty"));
        }
        if self.video.width == 0 || self.video.height == 0 {
            return Err(anyhow!("video width and height must be greater than zero"));
        }
        if self.video.scene_fps == 0 {
            return Err(anyhow!("scene_fps must be greater than zero"));
        }
        if self.overlay.snapshot_dir.is_some() && self.overlay.snapshot_every == 0 {
            return Err(anyhow!("snapshot_every must be greater than zero"));
        }
        if self.models.backend == ModelBackend::Tract {
            if self.models.object_model.is_none() {
                return Err(anyhow!("tract backend requires models.object_model"));
            }
            if self.models.pose_model.is_none() {
                return Err(anyhow!("tract backend requires models.pose_model"));
            }
        }
        Ok(())
    }

    pub fn file_config(&self) -> FileConfig {
        FileConfig {
            path: self.video.src.clone(),
            width: self.video.width,
            height: self.video.height,
            fps: self.video.scene_fps,
            max_frames: self.video.max_frames,
        }
    }

    pub fn loop_options(&self) -> LoopOptions {
        LoopOptions {
            show_overlay: self.video.show_overlay,
            loop_playback: self.video.loop_playback,
            target_fps: self.video.target_fps,
            snapshot: self.overlay.snapshot_dir.clone().map(|dir| SnapshotSettings {
                dir,
                every: self.overlay.snapshot_every,
            }),
        }
    }
}

fn read_config_file(path: &Path) -> Result<ProcessorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
