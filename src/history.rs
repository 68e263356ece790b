//! Rolling movement history.
//!
//! Fixed-capacity FIFO of per-frame detection snapshots used by the temporal
//! heuristics in `moments`. Pushing onto a full history evicts the oldest frame.

use std::collections::VecDeque;

use serde::Serialize;

use crate::detect::{Detection, FrameDetections, Pose};

/// Maximum frames retained (about one second at 30 fps).
pub const MAX_HISTORY_FRAMES: usize = 30;

/// Detections and poses for one processed frame.
#[derive(Clone, Debug, Serialize)]
pub struct HistoryFrame {
    /// Media time in seconds.
    pub time: f64,
    pub objects: Vec<Detection>,
    pub poses: Vec<Pose>,
}

impl HistoryFrame {
    pub fn new(time: f64, detections: &FrameDetections) -> Self {
        Self {
            time,
            objects: detections.objects.clone(),
            poses: detections.poses.clone(),
        }
    }
}

#[derive(Debug)]
pub struct MovementHistory {
    frames: VecDeque<HistoryFrame>,
    max_frames: usize,
}

impl MovementHistory {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::with_capacity(MAX_HISTORY_FRAMES),
            max_frames: MAX_HISTORY_FRAMES,
        }
    }

    /// Push a frame, evicting the oldest while at capacity.
    pub fn push(&mut self, frame: HistoryFrame) {
        while self.frames.len() >= self.max_frames {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    pub fn latest(&self) -> Option<&HistoryFrame> {
        self.frames.back()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &HistoryFrame> + ExactSizeIterator {
        self.frames.iter()
    }

    /// The newest `n` frames, oldest first.
    pub fn last_n(&self, n: usize) -> impl Iterator<Item = &HistoryFrame> {
        self.frames.iter().skip(self.frames.len().saturating_sub(n))
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl Default for MovementHistory {
    fn default() -> Self {
        Self::new()
    }
}
