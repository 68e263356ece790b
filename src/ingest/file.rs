//! Video file and URL sources.
//!
//! `FileSource` plays either a video path or URL (opened and decoded by FFmpeg,
//! feature `ingest-file-ffmpeg`; any input FFmpeg understands, http/rtsp
//! included) or the synthetic `stub://` court scene used by demos and tests.
//! Both produce RGB frames at the configured display size with media time in
//! seconds, and both end with `Ok(None)`.

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use crate::detect::BlobPalette;
use crate::frame::{rgb_len, VideoFrame};
use crate::playback::VideoSource;

#[derive(Clone, Debug)]
pub struct FileConfig {
    /// File path or URL, or `stub://<name>` for the synthetic court.
    pub path: String,
    /// Display size frames are scaled to.
    pub width: u32,
    pub height: u32,
    /// Frame rate of the synthetic scene; file sources use their own timestamps.
    pub fps: u32,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            width: 640,
            height: 360,
            fps: 30,
            max_frames: None,
        }
    }
}

pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticCourtSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if config.path.trim().is_empty() {
            return Err(anyhow!("video source must not be empty"));
        }
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("video display size must be non-zero"));
        }
        if config.path.starts_with("stub://") {
            Ok(Self {
                backend: FileBackend::Synthetic(SyntheticCourtSource::new(config)),
            })
        } else {
            #[cfg(feature = "ingest-file-ffmpeg")]
            {
                Ok(Self {
                    backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)?),
                })
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            {
                Err(anyhow!(
                    "playing '{}' requires the ingest-file-ffmpeg feature",
                    config.path
                ))
            }
        }
    }

    pub fn stats(&self) -> FileStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

impl VideoSource for FileSource {
    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.connect(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    fn restart(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.restart(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.restart(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            FileBackend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.is_healthy(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FileStats {
    /// Frames produced since the last restart.
    pub frames_decoded: u64,
    pub restarts: u64,
    pub path: String,
}

// ----------------------------------------------------------------------------
// Synthetic court (stub://)
// ----------------------------------------------------------------------------

/// Frames in one run of the synthetic scene (10 s at 30 fps).
pub const SCENE_FRAMES: u64 = 300;

const SCENE_WIDTH: f32 = 640.0;
const SCENE_HEIGHT: f32 = 360.0;
const SCENE_SEED: u64 = 0x5eed_c0de;

const DRIBBLE_END: u64 = 90;
const PASS_END: u64 = 100;
const PASS_SPEED: f32 = 30.0;
const JUMP_START: u64 = 200;
const JUMP_FRAMES: u64 = 20;
const JUMP_LIFT: f32 = 45.0;

const COURT: [u8; 3] = [181, 137, 89];
const LINE: [u8; 3] = [245, 245, 240];

/// Scripted court scene painted in the CPU backend's palette.
///
/// One player dribbles in place, passes (ball travels fast, then rests), and later
/// jumps (head and shoulders rise while the hips stay put). Coordinates are laid
/// out for 640x360 and scaled to the configured size. Small seeded jitter keeps
/// ball tracks from being perfectly straight.
struct SyntheticCourtSource {
    config: FileConfig,
    palette: BlobPalette,
    rng: StdRng,
    frame_index: u64,
    restarts: u64,
}

impl SyntheticCourtSource {
    fn new(config: FileConfig) -> Self {
        Self {
            config,
            palette: BlobPalette::default(),
            rng: StdRng::seed_from_u64(SCENE_SEED),
            frame_index: 0,
            restarts: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("FileSource: connected to {} (synthetic)", self.config.path);
        Ok(())
    }

    fn frame_limit(&self) -> u64 {
        self.config.max_frames.unwrap_or(SCENE_FRAMES)
    }

    fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        if self.frame_index >= self.frame_limit() {
            return Ok(None);
        }
        let index = self.frame_index;
        self.frame_index += 1;

        let fps = self.config.fps.max(1) as f64;
        let media_time = index as f64 / fps;
        let pixels = self.paint(index % SCENE_FRAMES)?;
        VideoFrame::new(pixels, self.config.width, self.config.height, media_time).map(Some)
    }

    fn restart(&mut self) -> Result<()> {
        self.frame_index = 0;
        self.restarts += 1;
        self.rng = StdRng::seed_from_u64(SCENE_SEED);
        log::info!("FileSource: {} rewound", self.config.path);
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> FileStats {
        FileStats {
            frames_decoded: self.frame_index,
            restarts: self.restarts,
            path: self.config.path.clone(),
        }
    }

    fn paint(&mut self, index: u64) -> Result<Vec<u8>> {
        let mut canvas = Painter::new(self.config.width, self.config.height)?;
        canvas.fill_rect(0.0, 0.0, SCENE_WIDTH, SCENE_HEIGHT, COURT);
        canvas.fill_rect(0.0, 300.0, SCENE_WIDTH, 4.0, LINE);
        canvas.fill_rect(318.0, 0.0, 4.0, 300.0, LINE);

        let lift = jump_lift(index);
        canvas.fill_rect(150.0, 120.0 - lift, 16.0, 16.0, self.palette.skin);
        canvas.fill_rect(142.0, 136.0 - lift, 32.0, 70.0 + lift, self.palette.jersey);

        let (bx, by) = ball_position(index);
        let jx = self.rng.gen_range(-0.5..=0.5);
        let jy = self.rng.gen_range(-0.5..=0.5);
        canvas.fill_disc(bx + jx, by + jy, 8.0, self.palette.ball);

        Ok(canvas.into_pixels())
    }
}

/// Ball centre in scene coordinates.
fn ball_position(index: u64) -> (f32, f32) {
    const HOLD_X: f32 = 240.0;
    const HOLD_Y: f32 = 230.0;
    if index < DRIBBLE_END {
        let phase = index as f32 * std::f32::consts::PI / 15.0;
        (HOLD_X, HOLD_Y + 60.0 * phase.sin().abs())
    } else if index < PASS_END {
        (HOLD_X + PASS_SPEED * (index - DRIBBLE_END + 1) as f32, HOLD_Y)
    } else {
        (HOLD_X + PASS_SPEED * (PASS_END - DRIBBLE_END) as f32, HOLD_Y)
    }
}

/// How far head and shoulders rise above standing height.
fn jump_lift(index: u64) -> f32 {
    if !(JUMP_START..=JUMP_START + JUMP_FRAMES).contains(&index) {
        return 0.0;
    }
    let t = (index - JUMP_START) as f32 / JUMP_FRAMES as f32;
    JUMP_LIFT * (t * std::f32::consts::PI).sin()
}

/// RGB24 buffer with shape fills in scene coordinates.
struct Painter {
    data: Vec<u8>,
    width: u32,
    height: u32,
    sx: f32,
    sy: f32,
}

impl Painter {
    fn new(width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            data: vec![0u8; rgb_len(width, height)?],
            width,
            height,
            sx: width as f32 / SCENE_WIDTH,
            sy: height as f32 / SCENE_HEIGHT,
        })
    }

    fn put(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        self.data[idx..idx + 3].copy_from_slice(&rgb);
    }

    fn span(&self, start: f32, len: f32, scale: f32, max: u32) -> std::ops::Range<u32> {
        let lo = (start * scale).round().clamp(0.0, max as f32) as u32;
        let hi = ((start + len) * scale).round().clamp(0.0, max as f32) as u32;
        lo..hi
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, rgb: [u8; 3]) {
        let xs = self.span(x, w, self.sx, self.width);
        for py in self.span(y, h, self.sy, self.height) {
            for px in xs.clone() {
                self.put(px, py, rgb);
            }
        }
    }

    fn fill_disc(&mut self, cx: f32, cy: f32, r: f32, rgb: [u8; 3]) {
        let (pcx, pcy) = (cx * self.sx, cy * self.sy);
        let (rx, ry) = (r * self.sx, r * self.sy);
        for py in self.span(cy - r, 2.0 * r, self.sy, self.height) {
            for px in self.span(cx - r, 2.0 * r, self.sx, self.width) {
                let dx = (px as f32 + 0.5 - pcx) / rx;
                let dy = (py as f32 + 0.5 - pcy) / ry;
                if dx * dx + dy * dy <= 1.0 {
                    self.put(px, py, rgb);
                }
            }
        }
    }

    fn into_pixels(self) -> Vec<u8> {
        self.data
    }
}
