// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Loads a trained checkpoint and measures it on freshly
// generated hands, or prints predicted keypoints.
//
// The evaluation set uses its own seed, so none of its samples
// were seen during training.

use anyhow::Result;
use burn::prelude::Backend;

use crate::data::synthetic::SyntheticHands;
use crate::domain::keypoint::{HandPose, HandSample};
use crate::domain::traits::{PoseEstimator, SampleSource};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::backend::{ndarray_device, wgpu_device, BackendKind, NdArrayBackend, WgpuBackend};
use crate::ml::inferencer::{EvalReport, Inferencer};

#[derive(Debug, Clone)]
pub struct EvaluateConfig {
    pub checkpoint_dir: String,
    pub weights:        Option<String>,
    pub backend:        BackendKind,
    pub num_samples:    usize,
    pub seed:           u64,
    pub pck_threshold:  f32,
}

/// Ground truth next to prediction for one sample.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub truth:     HandPose,
    pub predicted: HandPose,
}

pub struct EvaluateUseCase {
    config: EvaluateConfig,
}

impl EvaluateUseCase {
    pub fn new(config: EvaluateConfig) -> Self {
        Self { config }
    }

    /// Loss, mean keypoint error and PCK on a held-out synthetic set.
    pub fn evaluate(&self) -> Result<EvalReport> {
        match self.config.backend {
            BackendKind::Wgpu    => self.evaluate_on::<WgpuBackend>(wgpu_device()),
            BackendKind::NdArray => self.evaluate_on::<NdArrayBackend>(ndarray_device()),
        }
    }

    /// Predicted poses for `num_samples` synthetic hands.
    pub fn predict(&self) -> Result<Vec<Prediction>> {
        match self.config.backend {
            BackendKind::Wgpu    => self.predict_on::<WgpuBackend>(wgpu_device()),
            BackendKind::NdArray => self.predict_on::<NdArrayBackend>(ndarray_device()),
        }
    }

    fn evaluate_on<B: Backend>(&self, device: B::Device) -> Result<EvalReport> {
        let (inferencer, samples) = self.load::<B>(device)?;
        let report = inferencer.evaluate(&samples, self.config.pck_threshold)?;
        tracing::info!(
            "Evaluated {} samples: loss={:.6}, mean error={:.4}, PCK@{}={:.1}%",
            report.samples, report.loss, report.mean_error,
            report.pck_threshold, report.pck * 100.0,
        );
        Ok(report)
    }

    fn predict_on<B: Backend>(&self, device: B::Device) -> Result<Vec<Prediction>> {
        let (inferencer, samples) = self.load::<B>(device)?;
        let predicted = inferencer.estimate(&samples)?;
        Ok(samples
            .into_iter()
            .zip(predicted)
            .map(|(s, predicted)| Prediction { truth: s.pose, predicted })
            .collect())
    }

    fn load<B: Backend>(&self, device: B::Device) -> Result<(Inferencer<B>, Vec<HandSample>)> {
        let cfg = &self.config;
        let ckpt_manager = CheckpointManager::open(&cfg.checkpoint_dir)?;
        let (inferencer, train_cfg) =
            Inferencer::<B>::from_checkpoint(&ckpt_manager, cfg.weights.as_deref(), device)?;

        let samples = SyntheticHands::new(
            cfg.num_samples,
            train_cfg.img_size,
            train_cfg.heatmap_size,
            train_cfg.heatmap_sigma,
            cfg.seed,
        )
        .load_all()?;
        Ok((inferencer, samples))
    }
}
