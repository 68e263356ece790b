//! Key-moment heuristics.
//!
//! Two detectors look at the rolling history:
//!
//! - **Ball movement**: fast ball travel followed by the ball coming to rest
//!   (shot or pass completion).
//! - **Jump**: the nose-to-hip distance of the tracked player varies by more than a
//!   threshold over the last frames (jump shot or dunk).
//!
//! Both require a confident ball and a confident person in the current frame.
//! Evaluation is throttled to every 15th frame and to one moment per 3 s of media
//! time; ball movement wins when both would fire.

use serde::{Deserialize, Serialize};

use crate::detect::{FrameDetections, ObjectClass};
use crate::history::{HistoryFrame, MovementHistory};

/// Evaluate only on frames whose number is a multiple of this.
pub const EVALUATION_INTERVAL_FRAMES: u64 = 15;
/// Minimum media time between two emitted moments, in seconds.
pub const KEY_MOMENT_COOLDOWN_SECS: f64 = 3.0;
/// Histories shorter than this are never evaluated.
pub const MIN_HISTORY_FRAMES: usize = 10;

const BALL_MIN_SCORE: f32 = 0.7;
const PERSON_MIN_SCORE: f32 = 0.8;

const MIN_BALL_SAMPLES: usize = 5;
/// Pixels per frame.
const FAST_BALL_VELOCITY: f32 = 20.0;
const SLOW_BALL_VELOCITY: f32 = 5.0;
const RECENT_VELOCITIES: usize = 3;

const JUMP_WINDOW_FRAMES: usize = 10;
const MIN_POSE_SAMPLES: usize = 5;
/// Pixels of nose-to-hip variation.
const MIN_JUMP_HEIGHT: f32 = 30.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMomentKind {
    ShotOrPass,
    Jump,
}

impl KeyMomentKind {
    pub fn description(&self) -> &'static str {
        match self {
            KeyMomentKind::ShotOrPass => "Possible shot or pass detected",
            KeyMomentKind::Jump => "Jump shot or dunk detected",
        }
    }
}

/// A heuristically flagged event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyMoment {
    /// Media time in seconds.
    pub time: f64,
    pub description: String,
    pub confidence: f32,
    pub kind: KeyMomentKind,
}

impl KeyMoment {
    fn new(kind: KeyMomentKind, time: f64, confidence: f32) -> Self {
        Self {
            time,
            description: kind.description().to_string(),
            confidence,
            kind,
        }
    }
}

/// Run both detectors against the history, ball movement first.
///
/// `current` is the frame just pushed onto `history`.
pub fn detect_key_moment(
    history: &MovementHistory,
    current: &FrameDetections,
) -> Option<KeyMoment> {
    if history.len() < MIN_HISTORY_FRAMES {
        return None;
    }
    let ball_seen = current.has_object(&ObjectClass::SportsBall, BALL_MIN_SCORE);
    let person_seen = current.has_object(&ObjectClass::Person, PERSON_MIN_SCORE);
    if !(ball_seen && person_seen) {
        return None;
    }
    let time = history.latest()?.time;

    detect_ball_movement(history)
        .map(|confidence| KeyMoment::new(KeyMomentKind::ShotOrPass, time, confidence))
        .or_else(|| {
            detect_jump(history, current)
                .map(|confidence| KeyMoment::new(KeyMomentKind::Jump, time, confidence))
        })
}

/// Frame-to-frame ball displacement over history frames that contain a ball.
pub fn ball_velocities(history: &MovementHistory) -> Vec<f32> {
    let centers: Vec<(f32, f32)> = history
        .iter()
        .filter_map(|frame| {
            frame
                .objects
                .iter()
                .find(|d| d.class == ObjectClass::SportsBall)
        })
        .map(|ball| ball.bbox.center())
        .collect();
    centers
        .windows(2)
        .map(|pair| {
            let dx = pair[1].0 - pair[0].0;
            let dy = pair[1].1 - pair[0].1;
            (dx * dx + dy * dy).sqrt()
        })
        .collect()
}

fn detect_ball_movement(history: &MovementHistory) -> Option<f32> {
    let velocities = ball_velocities(history);
    // n positions give n - 1 velocities
    if velocities.len() + 1 < MIN_BALL_SAMPLES {
        return None;
    }
    let mean = velocities.iter().sum::<f32>() / velocities.len() as f32;
    let fast = velocities.iter().any(|&v| v > FAST_BALL_VELOCITY);
    let settled = velocities
        .iter()
        .rev()
        .take(RECENT_VELOCITIES)
        .any(|&v| v < SLOW_BALL_VELOCITY);
    (fast && settled).then(|| (0.5 + mean / 100.0).min(0.9))
}

fn detect_jump(history: &MovementHistory, current: &FrameDetections) -> Option<f32> {
    current.poses.first()?.torso_extension()?;

    let extensions: Vec<f32> = history
        .last_n(JUMP_WINDOW_FRAMES)
        .filter_map(|frame: &HistoryFrame| frame.poses.first()?.torso_extension())
        .filter(|&extension| extension != 0.0)
        .collect();
    if extensions.len() < MIN_POSE_SAMPLES {
        return None;
    }
    let min = extensions.iter().copied().fold(f32::INFINITY, f32::min);
    let max = extensions.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let height = max - min;
    (height > MIN_JUMP_HEIGHT).then(|| (0.7 + height / 200.0).min(0.95))
}

/// Feeds the rolling history and applies cadence and cooldown.
#[derive(Debug)]
pub struct KeyMomentTracker {
    history: MovementHistory,
    last_moment_time: f64,
}

impl KeyMomentTracker {
    pub fn new() -> Self {
        Self {
            history: MovementHistory::new(),
            last_moment_time: 0.0,
        }
    }

    /// Record a processed frame and evaluate the heuristics when due.
    ///
    /// `frame_number` counts processed frames from 1.
    pub fn observe(
        &mut self,
        frame_number: u64,
        time: f64,
        detections: &FrameDetections,
    ) -> Option<KeyMoment> {
        self.history.push(HistoryFrame::new(time, detections));

        if frame_number % EVALUATION_INTERVAL_FRAMES != 0 {
            return None;
        }
        if time - self.last_moment_time < KEY_MOMENT_COOLDOWN_SECS {
            return None;
        }

        let moment = detect_key_moment(&self.history, detections)?;
        log::info!(
            "key moment at {:.2}s: {} (conf={:.2})",
            moment.time,
            moment.description,
            moment.confidence
        );
        self.last_moment_time = time;
        Some(moment)
    }

    pub fn history(&self) -> &MovementHistory {
        &self.history
    }

    /// Forget history and cooldown, e.g. when playback restarts.
    pub fn reset(&mut self) {
        self.history.clear();
        self.last_moment_time = 0.0;
    }
}

impl Default for KeyMomentTracker {
    fn default() -> Self {
        Self::new()
    }
}
