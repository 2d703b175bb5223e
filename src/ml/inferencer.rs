// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Rebuilds the model from a checkpoint directory, predicts
// heatmaps and decodes them into hand poses.

use anyhow::{anyhow, bail, Result};
use burn::{data::dataloader::batcher::Batcher, prelude::*};
use serde::{Deserialize, Serialize};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::HandBatcher, heatmap};
use crate::domain::keypoint::{HandPose, HandSample};
use crate::domain::{metrics, traits::PoseEstimator};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::loss::IouLoss;
use crate::ml::model::HandPoseVit;

/// Default PCK threshold, as a fraction of the image side.
pub const DEFAULT_PCK_THRESHOLD: f32 = 0.1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    pub samples:       usize,
    pub loss:          f64,
    pub mean_error:    f32,
    pub pck:           f32,
    pub pck_threshold: f32,
}

pub struct Inferencer<B: Backend> {
    model:      HandPoseVit<B>,
    batch_size: usize,
    device:     B::Device,
}

impl<B: Backend> Inferencer<B> {
    pub fn new(model: HandPoseVit<B>, batch_size: usize, device: B::Device) -> Self {
        Self { model, batch_size: batch_size.max(1), device }
    }

    /// Rebuild the trained model from `train_config.json` and load weights:
    /// an explicit `weights` path, or the latest checkpoint.
    pub fn from_checkpoint(
        ckpt_manager: &CheckpointManager,
        weights:      Option<&str>,
        device:       B::Device,
    ) -> Result<(Self, TrainConfig)> {
        let cfg   = ckpt_manager.load_config()?;
        let model = cfg.model_config().init::<B>(&device);
        let model = match weights {
            Some(path) => ckpt_manager.load_from_path(model, path, &device)?,
            None       => ckpt_manager.load_model(model, None, &device)?,
        };
        tracing::info!("Model loaded from '{}'", ckpt_manager.dir().display());
        Ok((Self::new(model, cfg.batch_size, device), cfg))
    }

    /// images of `samples` → heatmaps [n, K, h, w]; at least one sample is required.
    pub fn predict_heatmaps(&self, samples: &[HandSample]) -> Result<Tensor<B, 4>> {
        if samples.is_empty() {
            bail!("Cannot predict heatmaps for an empty set of samples");
        }
        let batcher = HandBatcher::<B>::new(self.device.clone());
        Ok(self.model.forward(batcher.batch(samples.to_vec()).images))
    }

    /// Decode one pose per sample from the predicted heatmaps.
    pub fn predict_poses(&self, samples: &[HandSample]) -> Result<Vec<HandPose>> {
        let mut poses = Vec::with_capacity(samples.len());
        for chunk in samples.chunks(self.batch_size) {
            poses.extend(decode_batch(self.predict_heatmaps(chunk)?)?);
        }
        Ok(poses)
    }

    /// IoU loss, mean keypoint error and PCK over `samples`.
    pub fn evaluate(&self, samples: &[HandSample], pck_threshold: f32) -> Result<EvalReport> {
        let criterion = IouLoss::new();
        let batcher   = HandBatcher::<B>::new(self.device.clone());
        let mut loss_sum  = 0.0f64;
        let mut batches   = 0usize;
        let mut predicted = Vec::with_capacity(samples.len());

        for chunk in samples.chunks(self.batch_size) {
            let batch  = batcher.batch(chunk.to_vec());
            let output = self.model.forward(batch.images);
            loss_sum += criterion
                .forward(output.clone(), batch.heatmaps)
                .into_scalar()
                .elem::<f64>();
            batches += 1;
            predicted.extend(decode_batch(output)?);
        }

        let truth: Vec<HandPose> = samples.iter().map(|s| s.pose.clone()).collect();
        let report = EvalReport {
            samples:       samples.len(),
            loss:          if batches > 0 { loss_sum / batches as f64 } else { f64::NAN },
            mean_error:    metrics::mean_keypoint_error(&predicted, &truth).unwrap_or(f32::NAN),
            pck:           metrics::pck(&predicted, &truth, pck_threshold).unwrap_or(0.0),
            pck_threshold,
        };
        tracing::debug!("Evaluation: {:?}", report);
        Ok(report)
    }
}

impl<B: Backend> PoseEstimator for Inferencer<B> {
    fn estimate(&self, samples: &[HandSample]) -> Result<Vec<HandPose>> {
        self.predict_poses(samples)
    }
}

fn decode_batch<B: Backend>(heatmaps: Tensor<B, 4>) -> Result<Vec<HandPose>> {
    let [batch, keypoints, size, _] = heatmaps.dims();
    let values: Vec<f32> = heatmaps
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("Cannot read heatmaps: {e:?}"))?;

    let per_sample = keypoints * size * size;
    Ok((0..batch)
        .map(|i| heatmap::decode(&values[i * per_sample..(i + 1) * per_sample], keypoints, size))
        .collect())
}
