//! Per-playback detection state.
//!
//! `DetectionSession` owns everything one playback session mutates: the models, the
//! processed-frame counter, the FPS meter, the key-moment tracker and the stats shown
//! in the overlay. The frame loop owns the session and hands it each frame in order.

use std::time::Instant;

use crate::detect::FrameDetections;
use crate::error::PipelineError;
use crate::frame::VideoFrame;
use crate::loader::LoadedModels;
use crate::moments::{KeyMoment, KeyMomentTracker};
use crate::stats::{FpsMeter, ProcessingStats};

/// Result of processing one frame.
#[derive(Clone, Debug)]
pub struct FrameReport {
    /// Processed-frame number, from 1.
    pub frame_number: u64,
    pub media_time: f64,
    pub detections: FrameDetections,
    pub key_moment: Option<KeyMoment>,
    pub stats: ProcessingStats,
}

pub struct DetectionSession {
    models: LoadedModels,
    frames_processed: u64,
    fps: FpsMeter,
    tracker: KeyMomentTracker,
    stats: ProcessingStats,
}

impl DetectionSession {
    pub fn new(models: LoadedModels) -> Self {
        Self {
            models,
            frames_processed: 0,
            fps: FpsMeter::new(Instant::now()),
            tracker: KeyMomentTracker::new(),
            stats: ProcessingStats::default(),
        }
    }

    /// Run both models on `frame`, object detection first, and feed the tracker.
    ///
    /// The frame is counted even when inference fails.
    pub fn process_frame(
        &mut self,
        frame: &VideoFrame,
        now: Instant,
    ) -> Result<FrameReport, PipelineError> {
        self.frames_processed += 1;
        let frame_number = self.frames_processed;
        if let Some(fps) = self.fps.tick(now) {
            self.stats.fps = fps;
        }

        let objects = self
            .models
            .object_detector
            .detect(frame)
            .map_err(|e| PipelineError::inference(frame_number, e))?;
        let poses = self
            .models
            .pose_estimator
            .estimate_poses(frame)
            .map_err(|e| PipelineError::inference(frame_number, e))?;
        let detections = FrameDetections { objects, poses };

        self.stats.objects_detected = detections.objects.len();
        self.stats.confidence = detections.mean_confidence();

        let key_moment = self
            .tracker
            .observe(frame_number, frame.media_time, &detections);

        Ok(FrameReport {
            frame_number,
            media_time: frame.media_time,
            detections,
            key_moment,
            stats: self.stats,
        })
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn stats(&self) -> ProcessingStats {
        self.stats
    }

    pub fn tracker(&self) -> &KeyMomentTracker {
        &self.tracker
    }

    /// Start a fresh playback session with the same models.
    pub fn reset(&mut self, now: Instant) {
        self.frames_processed = 0;
        self.fps = FpsMeter::new(now);
        self.tracker.reset();
        self.stats = ProcessingStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Detection, ObjectDetector, Pose, PoseEstimator};
    use anyhow::{anyhow, Result};

    struct FailingDetector;

    impl ObjectDetector for FailingDetector {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(&mut self, _frame: &VideoFrame) -> Result<Vec<Detection>> {
            Err(anyhow!("device lost"))
        }
    }

    struct NoPoses;

    impl PoseEstimator for NoPoses {
        fn name(&self) -> &'static str {
            "none"
        }

        fn estimate_poses(&mut self, _frame: &VideoFrame) -> Result<Vec<Pose>> {
            Ok(Vec::new())
        }
    }

    fn blank_frame(time: f64) -> VideoFrame {
        VideoFrame::new(vec![0u8; 8 * 8 * 3], 8, 8, time).unwrap()
    }

    #[test]
    fn inference_failure_is_typed_and_counted() {
        let models = LoadedModels::new(Box::new(FailingDetector), Box::new(NoPoses));
        let mut session = DetectionSession::new(models);

        let err = session
            .process_frame(&blank_frame(0.0), Instant::now())
            .err()
            .expect("inference must fail");
        assert!(matches!(err, PipelineError::Inference { frame: 1, .. }));
        assert_eq!(session.frames_processed(), 1);
    }

    #[test]
    fn reports_stats_for_each_frame() {
        let models = LoadedModels::new(
            Box::new(crate::detect::CpuObjectDetector::new()),
            Box::new(NoPoses),
        );
        let mut session = DetectionSession::new(models);
        let report = session
            .process_frame(&blank_frame(0.25), Instant::now())
            .expect("process");
        assert_eq!(report.frame_number, 1);
        assert_eq!(report.media_time, 0.25);
        assert_eq!(report.stats.objects_detected, 0);
        assert_eq!(report.stats.confidence, 0.0);
        assert!(report.key_moment.is_none());

        session.reset(Instant::now());
        assert_eq!(session.frames_processed(), 0);
        assert!(session.tracker().history().is_empty());
    }
}
