mod backend;
pub mod backends;
mod result;

pub use backend::{ObjectDetector, PoseEstimator};
pub use backends::{BlobPalette, CpuObjectDetector, CpuPoseEstimator};
pub use result::{
    BoundingBox, Detection, FrameDetections, Keypoint, KeypointName, ObjectClass, Pose,
};
