//! Detection overlay.
//!
//! - `Canvas`: drawing surface the renderer targets (2D-context style calls).
//! - `OverlayRenderer`: clears, redraws the frame, then boxes, skeletons and the
//!   stats panel. Pure and synchronous; redrawn every tick.
//! - `DisplayList`: records draw ops, exported as JSON.
//! - `RasterCanvas`: RGBA image, exported as PNG.

mod display_list;
mod raster;

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::detect::{BoundingBox, FrameDetections, KeypointName, Pose};
use crate::frame::VideoFrame;
use crate::stats::ProcessingStats;

pub use display_list::{DisplayList, DrawOp};
pub use raster::RasterCanvas;

/// 8-bit RGBA colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

pub const ACCENT: Color = Color::rgb(0x7A, 0x5C, 0xFA);
/// rgba(0, 0, 0, 0.7)
pub const PLATE: Color = Color::rgba(0, 0, 0, 179);
/// rgba(122, 92, 250, 0.7)
pub const SKELETON: Color = Color::rgba(122, 92, 250, 179);
pub const WHITE: Color = Color::rgb(255, 255, 255);

/// Keypoints at or below this score are not drawn.
pub const MIN_KEYPOINT_SCORE: f32 = 0.3;

const BOX_LINE_WIDTH: f32 = 2.0;
const LABEL_FONT_PX: f32 = 16.0;
const LABEL_HEIGHT: f32 = 20.0;
const LABEL_CHAR_WIDTH: f32 = 8.0;
const KEYPOINT_RADIUS: f32 = 4.0;
const STATS_FONT_PX: f32 = 14.0;

pub const SKELETON_EDGES: [(KeypointName, KeypointName); 18] = [
    (KeypointName::Nose, KeypointName::LeftEye),
    (KeypointName::Nose, KeypointName::RightEye),
    (KeypointName::LeftEye, KeypointName::LeftEar),
    (KeypointName::RightEye, KeypointName::RightEar),
    (KeypointName::Nose, KeypointName::LeftShoulder),
    (KeypointName::Nose, KeypointName::RightShoulder),
    (KeypointName::LeftShoulder, KeypointName::LeftElbow),
    (KeypointName::RightShoulder, KeypointName::RightElbow),
    (KeypointName::LeftElbow, KeypointName::LeftWrist),
    (KeypointName::RightElbow, KeypointName::RightWrist),
    (KeypointName::LeftShoulder, KeypointName::RightShoulder),
    (KeypointName::LeftShoulder, KeypointName::LeftHip),
    (KeypointName::RightShoulder, KeypointName::RightHip),
    (KeypointName::LeftHip, KeypointName::RightHip),
    (KeypointName::LeftHip, KeypointName::LeftKnee),
    (KeypointName::RightHip, KeypointName::RightKnee),
    (KeypointName::LeftKnee, KeypointName::LeftAnkle),
    (KeypointName::RightKnee, KeypointName::RightAnkle),
];

/// Drawing surface. Coordinates are canvas pixels; text `y` is the baseline.
pub trait Canvas {
    fn size(&self) -> (u32, u32);

    fn clear(&mut self);

    /// Draw the frame as a still covering the whole canvas.
    fn draw_frame(&mut self, frame: &VideoFrame);

    fn stroke_rect(&mut self, rect: BoundingBox, color: Color, line_width: f32);

    fn fill_rect(&mut self, rect: BoundingBox, color: Color);

    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Color);

    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, line_width: f32);

    fn fill_text(&mut self, text: &str, x: f32, y: f32, font_px: f32, color: Color);

    /// Write the current contents to `path`.
    fn export(&self, path: &Path) -> Result<()>;

    /// File extension used for exported snapshots.
    fn snapshot_extension(&self) -> &'static str;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct OverlayRenderer;

impl OverlayRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn draw<C: Canvas + ?Sized>(
        &self,
        canvas: &mut C,
        frame: &VideoFrame,
        detections: &FrameDetections,
        stats: &ProcessingStats,
    ) {
        canvas.clear();
        canvas.draw_frame(frame);

        for detection in &detections.objects {
            let bbox = detection.bbox;
            let text = format!(
                "{} {}%",
                detection.class,
                (detection.score * 100.0).round() as i32
            );
            canvas.stroke_rect(bbox, ACCENT, BOX_LINE_WIDTH);
            canvas.fill_rect(
                BoundingBox::new(
                    bbox.x,
                    bbox.y - LABEL_HEIGHT,
                    text.chars().count() as f32 * LABEL_CHAR_WIDTH,
                    LABEL_HEIGHT,
                ),
                PLATE,
            );
            canvas.fill_text(&text, bbox.x + 5.0, bbox.y - 5.0, LABEL_FONT_PX, ACCENT);
        }

        for pose in &detections.poses {
            draw_pose(canvas, pose);
        }

        draw_stats_panel(canvas, stats);
    }
}

fn draw_pose<C: Canvas + ?Sized>(canvas: &mut C, pose: &Pose) {
    for keypoint in pose
        .keypoints
        .iter()
        .filter(|kp| kp.score > MIN_KEYPOINT_SCORE)
    {
        canvas.fill_circle(keypoint.x, keypoint.y, KEYPOINT_RADIUS, ACCENT);
    }

    for (a, b) in SKELETON_EDGES {
        let (Some(p1), Some(p2)) = (pose.keypoint(a), pose.keypoint(b)) else {
            continue;
        };
        if p1.score > MIN_KEYPOINT_SCORE && p2.score > MIN_KEYPOINT_SCORE {
            canvas.line((p1.x, p1.y), (p2.x, p2.y), SKELETON, 2.0);
        }
    }
}

fn draw_stats_panel<C: Canvas + ?Sized>(canvas: &mut C, stats: &ProcessingStats) {
    canvas.fill_rect(BoundingBox::new(10.0, 10.0, 200.0, 80.0), PLATE);
    let lines = [
        format!("FPS: {}", stats.fps),
        format!("Objects: {}", stats.objects_detected),
        format!("Confidence: {}%", (stats.confidence * 100.0).round() as i32),
    ];
    for (i, line) in lines.iter().enumerate() {
        canvas.fill_text(line, 20.0, 30.0 + 20.0 * i as f32, STATS_FONT_PX, WHITE);
    }
}
