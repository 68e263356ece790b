use std::fs;
use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba, RgbImage, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
    draw_text_mut, Blend,
};
use imageproc::rect::Rect;

use super::{Canvas, Color};
use crate::detect::BoundingBox;
use crate::frame::VideoFrame;

/// Canvas backed by an RGBA image. Translucent colours are alpha-blended.
///
/// Text needs a font; without one `fill_text` is a no-op and a warning is logged
/// once at construction.
pub struct RasterCanvas {
    image: Blend<RgbaImage>,
    font: Option<FontArc>,
}

impl RasterCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        log::warn!("raster overlay has no font; labels and stats text are not drawn");
        Self {
            image: Blend(RgbaImage::new(width, height)),
            font: None,
        }
    }

    /// Canvas that renders text with the TrueType/OpenType font at `path`.
    pub fn with_font(width: u32, height: u32, path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("read font {}", path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .with_context(|| format!("parse font {}", path.display()))?;
        Ok(Self {
            image: Blend(RgbaImage::new(width, height)),
            font: Some(font),
        })
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image.0
    }
}

fn rgba(color: Color) -> Rgba<u8> {
    Rgba([color.r, color.g, color.b, color.a])
}

/// Pixel rect covering `rect`, `None` when it rounds to nothing.
fn pixel_rect(x: f32, y: f32, width: f32, height: f32) -> Option<Rect> {
    let w = width.round();
    let h = height.round();
    if w < 1.0 || h < 1.0 {
        return None;
    }
    Some(Rect::at(x.round() as i32, y.round() as i32).of_size(w as u32, h as u32))
}

impl Canvas for RasterCanvas {
    fn size(&self) -> (u32, u32) {
        self.image.0.dimensions()
    }

    fn clear(&mut self) {
        for pixel in self.image.0.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn draw_frame(&mut self, frame: &VideoFrame) {
        let Some(rgb) = RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
        else {
            log::warn!("frame buffer does not match {}x{}", frame.width, frame.height);
            return;
        };
        let (width, height) = self.size();
        let rgb = if rgb.dimensions() == (width, height) {
            rgb
        } else {
            imageops::resize(&rgb, width, height, FilterType::Triangle)
        };
        for (dst, src) in self.image.0.pixels_mut().zip(rgb.pixels()) {
            *dst = Rgba([src[0], src[1], src[2], 255]);
        }
    }

    fn stroke_rect(&mut self, rect: BoundingBox, color: Color, line_width: f32) {
        let strokes = line_width.round().max(1.0) as i32;
        let half = (strokes / 2) as f32;
        for i in 0..strokes {
            let inset = i as f32 - half;
            if let Some(r) = pixel_rect(
                rect.x + inset,
                rect.y + inset,
                rect.width - 2.0 * inset,
                rect.height - 2.0 * inset,
            ) {
                draw_hollow_rect_mut(&mut self.image, r, rgba(color));
            }
        }
    }

    fn fill_rect(&mut self, rect: BoundingBox, color: Color) {
        if let Some(r) = pixel_rect(rect.x, rect.y, rect.width, rect.height) {
            draw_filled_rect_mut(&mut self.image, r, rgba(color));
        }
    }

    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Color) {
        draw_filled_circle_mut(
            &mut self.image,
            (x.round() as i32, y.round() as i32),
            radius.round() as i32,
            rgba(color),
        );
    }

    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, line_width: f32) {
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let len = (dx * dx + dy * dy).sqrt();
        let (nx, ny) = if len > 0.0 {
            (-dy / len, dx / len)
        } else {
            (0.0, 0.0)
        };
        let strokes = line_width.round().max(1.0) as i32;
        let center = (strokes - 1) as f32 / 2.0;
        for i in 0..strokes {
            let off = i as f32 - center;
            draw_line_segment_mut(
                &mut self.image,
                (from.0 + nx * off, from.1 + ny * off),
                (to.0 + nx * off, to.1 + ny * off),
                rgba(color),
            );
        }
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, font_px: f32, color: Color) {
        let Some(font) = self.font.as_ref() else {
            return;
        };
        // baseline to top edge
        let top = y - font_px;
        draw_text_mut(
            &mut self.image,
            rgba(color),
            x.round() as i32,
            top.round() as i32,
            PxScale::from(font_px),
            font,
            text,
        );
    }

    fn export(&self, path: &Path) -> Result<()> {
        self.image
            .0
            .save_with_format(path, ImageFormat::Png)
            .with_context(|| format!("write {}", path.display()))
    }

    fn snapshot_extension(&self) -> &'static str {
        "png"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> VideoFrame {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        VideoFrame::new(data, width, height, 0.0).unwrap()
    }

    #[test]
    fn frame_is_scaled_to_canvas() {
        let mut canvas = RasterCanvas::new(8, 8);
        canvas.draw_frame(&solid_frame(4, 4, [10, 20, 30]));
        assert_eq!(canvas.image().get_pixel(7, 7), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn translucent_fill_blends_over_frame() {
        let mut canvas = RasterCanvas::new(16, 16);
        canvas.draw_frame(&solid_frame(16, 16, [200, 200, 200]));
        canvas.fill_rect(
            BoundingBox::new(0.0, 0.0, 8.0, 8.0),
            super::super::PLATE,
        );
        let blended = canvas.image().get_pixel(2, 2);
        assert!(blended[0] < 100, "plate should darken: {:?}", blended);
        assert_eq!(canvas.image().get_pixel(12, 12), &Rgba([200, 200, 200, 255]));
    }

    #[test]
    fn stroke_stays_on_the_outline() {
        let mut canvas = RasterCanvas::new(32, 32);
        canvas.stroke_rect(
            BoundingBox::new(8.0, 8.0, 16.0, 16.0),
            super::super::ACCENT,
            2.0,
        );
        assert_eq!(canvas.image().get_pixel(8, 16)[3], 255);
        assert_eq!(canvas.image().get_pixel(16, 16)[3], 0);
    }

    #[test]
    fn exports_png() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("frame.png");
        let mut canvas = RasterCanvas::new(4, 4);
        canvas.fill_circle(2.0, 2.0, 1.0, Color::rgb(255, 0, 0));
        canvas.export(&path)?;
        let decoded = image::open(&path)?.to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 4));
        Ok(())
    }
}
