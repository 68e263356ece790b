use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use super::{Canvas, Color};
use crate::detect::BoundingBox;
use crate::frame::VideoFrame;

/// One recorded canvas call.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    Clear,
    DrawFrame {
        media_time: f64,
        width: u32,
        height: u32,
    },
    StrokeRect {
        rect: BoundingBox,
        color: Color,
        line_width: f32,
    },
    FillRect {
        rect: BoundingBox,
        color: Color,
    },
    FillCircle {
        x: f32,
        y: f32,
        radius: f32,
        color: Color,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        color: Color,
        line_width: f32,
    },
    FillText {
        text: String,
        x: f32,
        y: f32,
        font_px: f32,
        color: Color,
    },
}

/// Canvas that records draw calls instead of rasterising them.
///
/// `clear` drops everything recorded so far, so after a render the list holds
/// exactly one frame's overlay.
#[derive(Clone, Debug, Serialize)]
pub struct DisplayList {
    width: u32,
    height: u32,
    ops: Vec<DrawOp>,
}

impl DisplayList {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize display list")
    }
}

impl Canvas for DisplayList {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        self.ops.clear();
        self.ops.push(DrawOp::Clear);
    }

    fn draw_frame(&mut self, frame: &VideoFrame) {
        self.ops.push(DrawOp::DrawFrame {
            media_time: frame.media_time,
            width: frame.width,
            height: frame.height,
        });
    }

    fn stroke_rect(&mut self, rect: BoundingBox, color: Color, line_width: f32) {
        self.ops.push(DrawOp::StrokeRect {
            rect,
            color,
            line_width,
        });
    }

    fn fill_rect(&mut self, rect: BoundingBox, color: Color) {
        self.ops.push(DrawOp::FillRect { rect, color });
    }

    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Color) {
        self.ops.push(DrawOp::FillCircle {
            x,
            y,
            radius,
            color,
        });
    }

    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, line_width: f32) {
        self.ops.push(DrawOp::Line {
            from,
            to,
            color,
            line_width,
        });
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, font_px: f32, color: Color) {
        self.ops.push(DrawOp::FillText {
            text: text.to_string(),
            x,
            y,
            font_px,
            color,
        });
    }

    fn export(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json).with_context(|| format!("write {}", path.display()))
    }

    fn snapshot_extension(&self) -> &'static str {
        "json"
    }
}
