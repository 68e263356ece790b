//! Decoded video frames.
//!
//! - `VideoFrame`: RGB24 pixels plus the media time the frame was presented at.
//!
//! Sources produce frames, the session hands them to detectors by reference and the
//! overlay redraws them as the background still. Frames are never retained beyond
//! the tick that produced them; the rolling history keeps detections only.

use anyhow::{anyhow, Result};

/// One decoded frame. Pixels are tightly packed RGB24, row-major.
pub struct VideoFrame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Presentation time in seconds from the start of the source.
    pub media_time: f64,
}

impl VideoFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, media_time: f64) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            media_time,
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// RGB value at `(x, y)`, `None` outside the frame.
    pub fn rgb_at(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }
}

pub(crate) fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(VideoFrame::new(vec![0u8; 10], 4, 4, 0.0).is_err());
    }

    #[test]
    fn reads_rgb_at_position() -> Result<()> {
        let mut data = vec![0u8; 2 * 2 * 3];
        data[9..12].copy_from_slice(&[1, 2, 3]);
        let frame = VideoFrame::new(data, 2, 2, 0.5)?;
        assert_eq!(frame.rgb_at(1, 1), Some([1, 2, 3]));
        assert_eq!(frame.rgb_at(2, 0), None);
        assert_eq!(frame.media_time, 0.5);
        Ok(())
    }
}
