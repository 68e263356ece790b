//! Model loading.
//!
//! Prepares the inference runtime, then the object detector, then the pose
//! estimator, publishing coarse progress (0/20/40/70/100) through a `LoadProgress`
//! handle that other threads can poll.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::detect::{CpuObjectDetector, CpuPoseEstimator, ObjectDetector, PoseEstimator};
use crate::error::{LoadStage, PipelineError};

pub const PROGRESS_RUNTIME_READY: u8 = 20;
pub const PROGRESS_OBJECT_LOADING: u8 = 40;
pub const PROGRESS_OBJECT_LOADED: u8 = 70;
pub const PROGRESS_COMPLETE: u8 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelBackend {
    /// Colour-blob models, no files needed.
    Cpu,
    /// ONNX models through tract (feature `backend-tract`).
    Tract,
}

impl ModelBackend {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(ModelBackend::Cpu),
            "tract" => Ok(ModelBackend::Tract),
            other => Err(anyhow!("unknown model backend '{}'", other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelBackend::Cpu => "cpu",
            ModelBackend::Tract => "tract",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ModelSettings {
    pub backend: ModelBackend,
    pub object_model: Option<PathBuf>,
    pub pose_model: Option<PathBuf>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            backend: ModelBackend::Cpu,
            object_model: None,
            pose_model: None,
        }
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    percent: AtomicU8,
    ready: AtomicBool,
    failure: Mutex<Option<String>>,
}

/// Shared, monotonically increasing load progress.
#[derive(Clone, Debug, Default)]
pub struct LoadProgress {
    state: Arc<ProgressState>,
}

impl LoadProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn percent(&self) -> u8 {
        self.state.percent.load(Ordering::Acquire)
    }

    pub fn is_ready(&self) -> bool {
        self.state.ready.load(Ordering::Acquire)
    }

    /// Failure reason, once loading has failed.
    pub fn failure(&self) -> Option<String> {
        self.state
            .failure
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn is_failed(&self) -> bool {
        self.failure().is_some()
    }

    /// Finished one way or the other.
    pub fn is_settled(&self) -> bool {
        self.is_ready() || self.is_failed()
    }

    fn advance(&self, percent: u8) {
        self.state.percent.fetch_max(percent, Ordering::AcqRel);
    }

    fn mark_ready(&self) {
        self.advance(PROGRESS_COMPLETE);
        self.state.ready.store(true, Ordering::Release);
    }

    fn mark_failed(&self, reason: String) {
        let mut guard = self
            .state
            .failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(reason);
    }
}

/// Both models, ready to run.
pub struct LoadedModels {
    pub object_detector: Box<dyn ObjectDetector>,
    pub pose_estimator: Box<dyn PoseEstimator>,
}

impl LoadedModels {
    pub fn new(
        object_detector: Box<dyn ObjectDetector>,
        pose_estimator: Box<dyn PoseEstimator>,
    ) -> Self {
        Self {
            object_detector,
            pose_estimator,
        }
    }
}

pub struct ModelLoader {
    settings: ModelSettings,
    progress: LoadProgress,
}

impl ModelLoader {
    pub fn new(settings: ModelSettings) -> Self {
        Self {
            settings,
            progress: LoadProgress::new(),
        }
    }

    pub fn progress(&self) -> LoadProgress {
        self.progress.clone()
    }

    /// Load both models. No retry; a failure is logged, recorded on the progress
    /// handle and returned.
    pub fn load(&self) -> Result<LoadedModels, PipelineError> {
        match self.load_stages() {
            Ok(models) => {
                self.progress.mark_ready();
                log::info!(
                    "models ready: objects={} poses={}",
                    models.object_detector.name(),
                    models.pose_estimator.name()
                );
                Ok(models)
            }
            Err((stage, err)) => {
                log::error!("error loading models at {}: {:#}", stage, err);
                self.progress.mark_failed(format!("{}: {:#}", stage, err));
                Err(PipelineError::model_load(stage, err))
            }
        }
    }

    fn load_stages(&self) -> Result<LoadedModels, (LoadStage, anyhow::Error)> {
        self.prepare_runtime()
            .map_err(|e| (LoadStage::Runtime, e))?;
        self.progress.advance(PROGRESS_RUNTIME_READY);
        log::info!("inference runtime ready ({})", self.settings.backend.as_str());

        self.progress.advance(PROGRESS_OBJECT_LOADING);
        let mut object_detector = self
            .object_detector()
            .map_err(|e| (LoadStage::ObjectDetector, e))?;
        object_detector
            .warm_up()
            .map_err(|e| (LoadStage::ObjectDetector, e))?;
        self.progress.advance(PROGRESS_OBJECT_LOADED);
        log::info!("object detection model loaded");

        let mut pose_estimator = self
            .pose_estimator()
            .map_err(|e| (LoadStage::PoseEstimator, e))?;
        pose_estimator
            .warm_up()
            .map_err(|e| (LoadStage::PoseEstimator, e))?;
        log::info!("pose detection model loaded");

        Ok(LoadedModels::new(object_detector, pose_estimator))
    }

    fn prepare_runtime(&self) -> Result<()> {
        match self.settings.backend {
            ModelBackend::Cpu => Ok(()),
            ModelBackend::Tract => {
                if cfg!(feature = "backend-tract") {
                    Ok(())
                } else {
                    Err(anyhow!("tract backend requires the backend-tract feature"))
                }
            }
        }
    }

    fn object_detector(&self) -> Result<Box<dyn ObjectDetector>> {
        match self.settings.backend {
            ModelBackend::Cpu => Ok(Box::new(CpuObjectDetector::new())),
            ModelBackend::Tract => self.tract_object_detector(),
        }
    }

    fn pose_estimator(&self) -> Result<Box<dyn PoseEstimator>> {
        match self.settings.backend {
            ModelBackend::Cpu => Ok(Box::new(CpuPoseEstimator::new())),
            ModelBackend::Tract => self.tract_pose_estimator(),
        }
    }

    #[cfg(feature = "backend-tract")]
    fn tract_object_detector(&self) -> Result<Box<dyn ObjectDetector>> {
        let path = self
            .settings
            .object_model
            .as_ref()
            .ok_or_else(|| anyhow!("tract backend needs an object model path"))?;
        Ok(Box::new(crate::detect::backends::TractObjectDetector::new(
            path,
        )?))
    }

    #[cfg(not(feature = "backend-tract"))]
    fn tract_object_detector(&self) -> Result<Box<dyn ObjectDetector>> {
        Err(anyhow!("tract backend requires the backend-tract feature"))
    }

    #[cfg(feature = "backend-tract")]
    fn tract_pose_estimator(&self) -> Result<Box<dyn PoseEstimator>> {
        let path = self
            .settings
            .pose_model
            .as_ref()
            .ok_or_else(|| anyhow!("tract backend needs a pose model path"))?;
        Ok(Box::new(crate::detect::backends::TractPoseEstimator::new(
            path,
        )?))
    }

    #[cfg(not(feature = "backend-tract"))]
    fn tract_pose_estimator(&self) -> Result<Box<dyn PoseEstimator>> {
        Err(anyhow!("tract backend requires the backend-tract feature"))
    }
}
