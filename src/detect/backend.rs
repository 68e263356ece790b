use anyhow::Result;

use crate::detect::result::{Detection, Pose};
use crate::frame::VideoFrame;

/// Generic object detector.
///
/// Implementations receive the frame by reference and must not keep the pixel data
/// past the call. Detections are reported in frame pixel coordinates.
pub trait ObjectDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, called once by the loader.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Single-person pose estimator.
pub trait PoseEstimator: Send {
    fn name(&self) -> &'static str;

    /// Estimate poses on a frame. Single-person models return at most one pose.
    fn estimate_poses(&mut self, frame: &VideoFrame) -> Result<Vec<Pose>>;

    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
