pub mod cpu;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use cpu::{BlobPalette, CpuObjectDetector, CpuPoseEstimator};

#[cfg(feature = "backend-tract")]
pub use tract::{TractObjectDetector, TractPoseEstimator};
