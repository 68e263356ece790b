use anyhow::Result;

use crate::detect::backend::{ObjectDetector, PoseEstimator};
use crate::detect::result::{BoundingBox, Detection, Keypoint, KeypointName, ObjectClass, Pose};
use crate::frame::VideoFrame;

/// Sampling stride in pixels for blob scans.
const SCAN_STEP: u32 = 2;
/// Minimum sampled pixels before a colour region counts as a blob.
const MIN_BLOB_SAMPLES: u32 = 12;

/// Reference colours the CPU backend looks for.
///
/// The defaults match what the synthetic court source paints.
#[derive(Clone, Copy, Debug)]
pub struct BlobPalette {
    pub ball: [u8; 3],
    pub jersey: [u8; 3],
    pub skin: [u8; 3],
    /// Per-channel tolerance.
    pub tolerance: u8,
}

impl Default for BlobPalette {
    fn default() -> Self {
        Self {
            ball: [255, 120, 0],
            jersey: [20, 80, 220],
            skin: [240, 200, 160],
            tolerance: 40,
        }
    }
}

impl BlobPalette {
    fn matches(&self, pixel: [u8; 3], key: [u8; 3]) -> bool {
        pixel
            .iter()
            .zip(key.iter())
            .all(|(p, k)| p.abs_diff(*k) <= self.tolerance)
    }
}

/// Bounding region of every sampled pixel matching one colour.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Blob {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    samples: u32,
}

impl Blob {
    fn bbox(&self) -> BoundingBox {
        BoundingBox::new(
            self.min_x as f32,
            self.min_y as f32,
            (self.max_x - self.min_x + SCAN_STEP) as f32,
            (self.max_y - self.min_y + SCAN_STEP) as f32,
        )
    }

    /// Share of the bounding box covered by matching pixels, in `[0, 1]`.
    fn fill_ratio(&self) -> f32 {
        let bbox = self.bbox();
        let area = bbox.width * bbox.height;
        if area <= 0.0 {
            return 0.0;
        }
        ((self.samples * SCAN_STEP * SCAN_STEP) as f32 / area).min(1.0)
    }

    fn score(&self) -> f32 {
        (0.5 + 0.5 * self.fill_ratio()).min(0.99)
    }
}

fn find_blob(frame: &VideoFrame, palette: &BlobPalette, key: [u8; 3]) -> Option<Blob> {
    let mut blob: Option<Blob> = None;
    for y in (0..frame.height).step_by(SCAN_STEP as usize) {
        for x in (0..frame.width).step_by(SCAN_STEP as usize) {
            let Some(pixel) = frame.rgb_at(x, y) else {
                continue;
            };
            if !palette.matches(pixel, key) {
                continue;
            }
            blob = Some(match blob {
                None => Blob {
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                    samples: 1,
                },
                Some(b) => Blob {
                    min_x: b.min_x.min(x),
                    min_y: b.min_y.min(y),
                    max_x: b.max_x.max(x),
                    max_y: b.max_y.max(y),
                    samples: b.samples + 1,
                },
            });
        }
    }
    blob.filter(|b| b.samples >= MIN_BLOB_SAMPLES)
}

/// CPU object detector: finds the ball and the player by colour.
#[derive(Default)]
pub struct CpuObjectDetector {
    palette: BlobPalette,
}

impl CpuObjectDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_palette(palette: BlobPalette) -> Self {
        Self { palette }
    }
}

impl ObjectDetector for CpuObjectDetector {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<Detection>> {
        let mut detections = Vec::new();

        let jersey = find_blob(frame, &self.palette, self.palette.jersey);
        let head = find_blob(frame, &self.palette, self.palette.skin);
        if let Some(torso) = jersey {
            let mut bbox = torso.bbox();
            if let Some(head) = head {
                let head_box = head.bbox();
                let top = bbox.y.min(head_box.y);
                let left = bbox.x.min(head_box.x);
                let right = (bbox.x + bbox.width).max(head_box.x + head_box.width);
                let bottom = bbox.y + bbox.height;
                bbox = BoundingBox::new(left, top, right - left, bottom - top);
            }
            detections.push(Detection {
                bbox,
                class: ObjectClass::Person,
                score: torso.score(),
            });
        }

        if let Some(ball) = find_blob(frame, &self.palette, self.palette.ball) {
            detections.push(Detection {
                bbox: ball.bbox(),
                class: ObjectClass::SportsBall,
                score: ball.score(),
            });
        }

        Ok(detections)
    }
}

/// CPU pose estimator: places keypoints on the head and torso blobs.
///
/// Limb joints below the hips are extrapolated from torso proportions and carry a
/// low score.
#[derive(Default)]
pub struct CpuPoseEstimator {
    palette: BlobPalette,
}

impl CpuPoseEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_palette(palette: BlobPalette) -> Self {
        Self { palette }
    }
}

impl PoseEstimator for CpuPoseEstimator {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn estimate_poses(&mut self, frame: &VideoFrame) -> Result<Vec<Pose>> {
        let (Some(head), Some(torso)) = (
            find_blob(frame, &self.palette, self.palette.skin),
            find_blob(frame, &self.palette, self.palette.jersey),
        ) else {
            return Ok(Vec::new());
        };
        Ok(vec![pose_from_blobs(head.bbox(), torso.bbox())])
    }
}

fn pose_from_blobs(head: BoundingBox, torso: BoundingBox) -> Pose {
    const HEAD_SCORE: f32 = 0.9;
    const TORSO_SCORE: f32 = 0.85;
    const LIMB_SCORE: f32 = 0.35;

    let (nose_x, nose_y) = head.center();
    let left = torso.x;
    let right = torso.x + torso.width;
    let top = torso.y + torso.height * 0.05;
    let bottom = torso.y + torso.height;
    let leg = torso.height * 0.5;

    // Image left is the subject's right.
    let points = [
        (KeypointName::Nose, nose_x, nose_y, HEAD_SCORE),
        (KeypointName::LeftEye, nose_x + head.width * 0.2, nose_y - head.height * 0.15, HEAD_SCORE),
        (KeypointName::RightEye, nose_x - head.width * 0.2, nose_y - head.height * 0.15, HEAD_SCORE),
        (KeypointName::LeftEar, head.x + head.width, nose_y, HEAD_SCORE),
        (KeypointName::RightEar, head.x, nose_y, HEAD_SCORE),
        (KeypointName::LeftShoulder, right, top, TORSO_SCORE),
        (KeypointName::RightShoulder, left, top, TORSO_SCORE),
        (KeypointName::LeftElbow, right, top + torso.height * 0.35, TORSO_SCORE),
        (KeypointName::RightElbow, left, top + torso.height * 0.35, TORSO_SCORE),
        (KeypointName::LeftWrist, right, top + torso.height * 0.65, TORSO_SCORE),
        (KeypointName::RightWrist, left, top + torso.height * 0.65, TORSO_SCORE),
        (KeypointName::LeftHip, right - torso.width * 0.2, bottom, TORSO_SCORE),
        (KeypointName::RightHip, left + torso.width * 0.2, bottom, TORSO_SCORE),
        (KeypointName::LeftKnee, right - torso.width * 0.2, bottom + leg * 0.5, LIMB_SCORE),
        (KeypointName::RightKnee, left + torso.width * 0.2, bottom + leg * 0.5, LIMB_SCORE),
        (KeypointName::LeftAnkle, right - torso.width * 0.2, bottom + leg, LIMB_SCORE),
        (KeypointName::RightAnkle, left + torso.width * 0.2, bottom + leg, LIMB_SCORE),
    ];

    let keypoints = points
        .into_iter()
        .map(|(name, x, y, score)| Keypoint { name, x, y, score })
        .collect::<Vec<_>>();
    let score = keypoints.iter().map(|k| k.score).sum::<f32>() / keypoints.len() as f32;
    Pose {
        keypoints,
        score: Some(score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u32 = 64;
    const H: u32 = 64;

    fn paint(data: &mut [u8], x0: u32, y0: u32, w: u32, h: u32, rgb: [u8; 3]) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                let idx = ((y * W + x) * 3) as usize;
                data[idx..idx + 3].copy_from_slice(&rgb);
            }
        }
    }

    fn scene() -> VideoFrame {
        let palette = BlobPalette::default();
        let mut data = vec![30u8; (W * H * 3) as usize];
        paint(&mut data, 20, 8, 8, 8, palette.skin);
        paint(&mut data, 16, 16, 16, 24, palette.jersey);
        paint(&mut data, 44, 44, 8, 8, palette.ball);
        VideoFrame::new(data, W, H, 0.0).unwrap()
    }

    #[test]
    fn finds_ball_and_person() -> Result<()> {
        let mut detector = CpuObjectDetector::new();
        let detections = detector.detect(&scene())?;

        let person = detections
            .iter()
            .find(|d| d.class == ObjectClass::Person)
            .expect("person");
        assert!(person.score > 0.8);
        assert_eq!(person.bbox.y, 8.0);

        let ball = detections
            .iter()
            .find(|d| d.class == ObjectClass::SportsBall)
            .expect("ball");
        assert!(ball.score > 0.7);
        let (cx, cy) = ball.bbox.center();
        assert!((cx - 48.0).abs() <= 2.0 && (cy - 48.0).abs() <= 2.0);
        Ok(())
    }

    #[test]
    fn empty_frame_has_no_detections() -> Result<()> {
        let frame = VideoFrame::new(vec![30u8; (W * H * 3) as usize], W, H, 0.0)?;
        assert!(CpuObjectDetector::new().detect(&frame)?.is_empty());
        assert!(CpuPoseEstimator::new().estimate_poses(&frame)?.is_empty());
        Ok(())
    }

    #[test]
    fn pose_hips_sit_at_torso_bottom() -> Result<()> {
        let poses = CpuPoseEstimator::new().estimate_poses(&scene())?;
        assert_eq!(poses.len(), 1);
        let pose = &poses[0];
        let nose = pose.keypoint(KeypointName::Nose).expect("nose");
        let hip = pose.keypoint(KeypointName::LeftHip).expect("hip");
        assert!((nose.y - 12.0).abs() <= 2.0);
        assert!((hip.y - 40.0).abs() <= 2.0);
        assert_eq!(pose.keypoints.len(), 17);
        Ok(())
    }
}
