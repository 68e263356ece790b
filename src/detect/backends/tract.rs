#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{imageops::FilterType, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::backend::{ObjectDetector, PoseEstimator};
use crate::detect::result::{BoundingBox, Detection, Keypoint, KeypointName, ObjectClass, Pose};
use crate::frame::VideoFrame;

type Plan = TypedRunnableModel<TypedModel>;

/// COCO-80 labels, indexed by the class output of SSD exports.
const COCO_LABELS: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

/// MoveNet single-pose input edge.
const MOVENET_INPUT: u32 = 192;
/// SSD object detector input edge.
const SSD_INPUT: u32 = 300;

fn load_plan(model_path: &Path, fact: InferenceFact) -> Result<Plan> {
    tract_onnx::onnx()
        .model_for_path(model_path)
        .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
        .with_input_fact(0, fact)
        .context("failed to set input fact")?
        .into_optimized()
        .context("failed to optimize ONNX model")?
        .into_runnable()
        .context("failed to build runnable ONNX model")
}

fn resized(frame: &VideoFrame, edge: u32) -> Result<RgbImage> {
    let image = RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
        .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", frame.width, frame.height))?;
    Ok(image::imageops::resize(&image, edge, edge, FilterType::Triangle))
}

/// SSD-style ONNX object detector (boxes, scores, classes outputs).
pub struct TractObjectDetector {
    model: Plan,
    score_threshold: f32,
}

impl TractObjectDetector {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let fact = InferenceFact::dt_shape(
            f32::datum_type(),
            tvec!(1, 3, SSD_INPUT as usize, SSD_INPUT as usize),
        );
        Ok(Self {
            model: load_plan(model_path.as_ref(), fact)?,
            score_threshold: 0.5,
        })
    }

    /// Override the default score threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold;
        self
    }

    fn build_input(&self, frame: &VideoFrame) -> Result<Tensor> {
        let image = resized(frame, SSD_INPUT)?;
        let edge = SSD_INPUT as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, edge, edge), |(_, c, y, x)| {
            image.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        Ok(input.into_tensor())
    }

    fn decode(&self, outputs: TVec<TValue>, frame: &VideoFrame) -> Result<Vec<Detection>> {
        if outputs.len() < 3 {
            return Err(anyhow!(
                "expected boxes, scores and classes outputs, model produced {}",
                outputs.len()
            ));
        }
        let boxes = outputs[0]
            .to_array_view::<f32>()
            .context("boxes output was not f32")?;
        let scores = outputs[1]
            .to_array_view::<f32>()
            .context("scores output was not f32")?;
        let classes = outputs[2]
            .to_array_view::<f32>()
            .context("classes output was not f32")?;

        let boxes = boxes.as_slice().ok_or_else(|| anyhow!("boxes not contiguous"))?;
        let scores = scores.as_slice().ok_or_else(|| anyhow!("scores not contiguous"))?;
        let classes = classes.as_slice().ok_or_else(|| anyhow!("classes not contiguous"))?;

        let (w, h) = (frame.width as f32, frame.height as f32);
        let mut detections = Vec::new();
        for (i, (&score, &class)) in scores.iter().zip(classes.iter()).enumerate() {
            if score < self.score_threshold {
                continue;
            }
            let Some(coords) = boxes.get(i * 4..i * 4 + 4) else {
                break;
            };
            // [ymin, xmin, ymax, xmax], normalized
            let (y0, x0, y1, x1) = (coords[0], coords[1], coords[2], coords[3]);
            let label = COCO_LABELS
                .get(class.max(0.0) as usize)
                .copied()
                .unwrap_or("unknown");
            detections.push(Detection {
                bbox: BoundingBox::new(x0 * w, y0 * h, (x1 - x0) * w, (y1 - y0) * h),
                class: ObjectClass::from(label),
                score,
            });
        }
        Ok(detections)
    }
}

impl ObjectDetector for TractObjectDetector {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX object inference failed")?;
        self.decode(outputs, frame)
    }
}

/// MoveNet single-pose ONNX estimator (`[1, 1, 17, 3]` output of y, x, score).
pub struct TractPoseEstimator {
    model: Plan,
}

impl TractPoseEstimator {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let edge = MOVENET_INPUT as usize;
        let fact = InferenceFact::dt_shape(i32::datum_type(), tvec!(1, edge, edge, 3));
        Ok(Self {
            model: load_plan(model_path.as_ref(), fact)?,
        })
    }

    fn build_input(&self, frame: &VideoFrame) -> Result<Tensor> {
        let image = resized(frame, MOVENET_INPUT)?;
        let edge = MOVENET_INPUT as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, edge, edge, 3), |(_, y, x, c)| {
            image.get_pixel(x as u32, y as u32)[c] as i32
        });
        Ok(input.into_tensor())
    }
}

impl PoseEstimator for TractPoseEstimator {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn estimate_poses(&mut self, frame: &VideoFrame) -> Result<Vec<Pose>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX pose inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let values = output
            .to_array_view::<f32>()
            .context("pose output tensor was not f32")?;
        let values = values
            .as_slice()
            .ok_or_else(|| anyhow!("pose output not contiguous"))?;
        if values.len() < KeypointName::ALL.len() * 3 {
            return Err(anyhow!("pose output has {} values, expected 51", values.len()));
        }

        let (w, h) = (frame.width as f32, frame.height as f32);
        let keypoints: Vec<Keypoint> = KeypointName::ALL
            .iter()
            .zip(values.chunks_exact(3))
            .map(|(&name, v)| Keypoint {
                name,
                x: v[1] * w,
                y: v[0] * h,
                score: v[2],
            })
            .collect();
        let score = keypoints.iter().map(|k| k.score).sum::<f32>() / keypoints.len() as f32;
        Ok(vec![Pose {
            keypoints,
            score: Some(score),
        }])
    }
}
