//! Pipeline error taxonomy.
//!
//! Backends, sources and config use `anyhow` internally. Errors crossing the
//! session/loop boundary are classified here so callers can tell a dead model from a
//! bad frame from a broken source.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Model loading stage, reported with load failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadStage {
    Runtime,
    ObjectDetector,
    PoseEstimator,
}

impl std::fmt::Display for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LoadStage::Runtime => "runtime",
            LoadStage::ObjectDetector => "object detector",
            LoadStage::PoseEstimator => "pose estimator",
        })
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("model load failed at {stage}")]
    ModelLoad {
        stage: LoadStage,
        #[source]
        source: BoxError,
    },

    #[error("inference failed on frame {frame}")]
    Inference {
        frame: u64,
        #[source]
        source: BoxError,
    },

    #[error("playback failed")]
    Playback {
        #[source]
        source: BoxError,
    },
}

impl PipelineError {
    pub fn model_load(stage: LoadStage, err: anyhow::Error) -> Self {
        PipelineError::ModelLoad {
            stage,
            source: err.into(),
        }
    }

    pub fn inference(frame: u64, err: anyhow::Error) -> Self {
        PipelineError::Inference {
            frame,
            source: err.into(),
        }
    }

    pub fn playback(err: anyhow::Error) -> Self {
        PipelineError::Playback { source: err.into() }
    }
}
