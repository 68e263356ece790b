use std::time::{Duration, Instant};

use serde::Serialize;

const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Stats shown in the overlay panel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ProcessingStats {
    pub fps: u32,
    pub objects_detected: usize,
    /// Mean of every detection and keypoint score of the last frame.
    pub confidence: f32,
}

/// Frames-per-second estimate over a 1-second window.
///
/// Counts ticks until at least a second has elapsed, then publishes
/// `round(frames * 1000 / elapsed_ms)` and starts a new window.
#[derive(Debug)]
pub struct FpsMeter {
    window_start: Instant,
    frames: u32,
    fps: u32,
}

impl FpsMeter {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
            fps: 0,
        }
    }

    /// Count one frame. Returns the new estimate when a window closes.
    pub fn tick(&mut self, now: Instant) -> Option<u32> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < FPS_WINDOW {
            return None;
        }
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        self.fps = (self.frames as f64 * 1000.0 / elapsed_ms).round() as u32;
        self.window_start = now;
        self.frames = 0;
        Some(self.fps)
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishes_after_one_second() {
        let start = Instant::now();
        let mut meter = FpsMeter::new(start);
        for i in 1..30 {
            assert_eq!(meter.tick(start + Duration::from_millis(i * 33)), None);
        }
        assert_eq!(meter.tick(start + Duration::from_millis(1000)), Some(30));
        assert_eq!(meter.fps(), 30);
    }

    #[test]
    fn window_resets_after_publish() {
        let start = Instant::now();
        let mut meter = FpsMeter::new(start);
        assert_eq!(meter.tick(start + Duration::from_millis(2000)), Some(1));
        let next = start + Duration::from_millis(2000);
        for i in 1..10 {
            meter.tick(next + Duration::from_millis(i * 50));
        }
        assert_eq!(meter.tick(next + Duration::from_millis(1000)), Some(10));
    }
}
