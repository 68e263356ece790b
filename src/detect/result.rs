use std::fmt;

use serde::{Deserialize, Serialize};

/// Axis-aligned box in frame pixel units, top-left origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Object class label. The string form follows the COCO label set.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ObjectClass {
    Person,
    SportsBall,
    Other(String),
}

impl ObjectClass {
    pub fn label(&self) -> &str {
        match self {
            ObjectClass::Person => "person",
            ObjectClass::SportsBall => "sports ball",
            ObjectClass::Other(label) => label,
        }
    }
}

impl From<&str> for ObjectClass {
    fn from(label: &str) -> Self {
        match label {
            "person" => ObjectClass::Person,
            "sports ball" => ObjectClass::SportsBall,
            other => ObjectClass::Other(other.to_string()),
        }
    }
}

impl From<String> for ObjectClass {
    fn from(label: String) -> Self {
        ObjectClass::from(label.as_str())
    }
}

impl From<ObjectClass> for String {
    fn from(class: ObjectClass) -> Self {
        class.label().to_string()
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A located, classified, scored object found in one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class: ObjectClass,
    /// Confidence in `[0, 1]`.
    pub score: f32,
}

impl Detection {
    pub fn is(&self, class: &ObjectClass) -> bool {
        &self.class == class
    }
}

/// COCO keypoint names in MoveNet output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeypointName {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl KeypointName {
    pub const ALL: [KeypointName; 17] = [
        KeypointName::Nose,
        KeypointName::LeftEye,
        KeypointName::RightEye,
        KeypointName::LeftEar,
        KeypointName::RightEar,
        KeypointName::LeftShoulder,
        KeypointName::RightShoulder,
        KeypointName::LeftElbow,
        KeypointName::RightElbow,
        KeypointName::LeftWrist,
        KeypointName::RightWrist,
        KeypointName::LeftHip,
        KeypointName::RightHip,
        KeypointName::LeftKnee,
        KeypointName::RightKnee,
        KeypointName::LeftAnkle,
        KeypointName::RightAnkle,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub name: KeypointName,
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

/// Skeleton of named keypoints for one detected person.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub keypoints: Vec<Keypoint>,
    /// Overall pose score, when the estimator reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Pose {
    pub fn keypoint(&self, name: KeypointName) -> Option<&Keypoint> {
        self.keypoints.iter().find(|kp| kp.name == name)
    }

    /// Vertical nose-to-hip distance (`hip.y - nose.y`), left hip preferred.
    pub fn torso_extension(&self) -> Option<f32> {
        let nose = self.keypoint(KeypointName::Nose)?;
        let hip = self
            .keypoint(KeypointName::LeftHip)
            .or_else(|| self.keypoint(KeypointName::RightHip))?;
        Some(hip.y - nose.y)
    }
}

/// Everything the models produced for one frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameDetections {
    pub objects: Vec<Detection>,
    pub poses: Vec<Pose>,
}

impl FrameDetections {
    /// Mean over every detection score and keypoint score, 0 when empty.
    pub fn mean_confidence(&self) -> f32 {
        let scores = self
            .objects
            .iter()
            .map(|d| d.score)
            .chain(self.poses.iter().flat_map(|p| p.keypoints.iter().map(|k| k.score)));
        let (sum, count) = scores.fold((0.0f32, 0usize), |(sum, n), s| (sum + s, n + 1));
        if count == 0 {
            0.0
        } else {
            sum / count as f32
        }
    }

    pub fn has_object(&self, class: &ObjectClass, min_score: f32) -> bool {
        self.objects
            .iter()
            .any(|d| d.is(class) && d.score > min_score)
    }

    /// First object of `class`, regardless of score.
    pub fn first_of(&self, class: &ObjectClass) -> Option<&Detection> {
        self.objects.iter().find(|d| d.is(class))
    }
}
