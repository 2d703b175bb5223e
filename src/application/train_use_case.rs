// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate configuration
//   Step 2: Generate labelled hands       (Layer 4 - data)
//   Step 3: Split train/validation        (Layer 4 - data)
//   Step 4: Build datasets                (Layer 4 - data)
//   Step 5: Save config, open metrics log (Layer 6 - infra)
//   Step 6: Run training loop             (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::HandDataset,
    splitter::split_train_val,
    synthetic::SyntheticHands,
};
use crate::domain::keypoint::{NUM_HAND_KEYPOINTS, NUM_IMG_CHANNELS};
use crate::domain::traits::SampleSource;
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::backend::{
    ndarray_device, wgpu_device, BackendKind, NdArrayBackend, NdArrayTrainBackend,
    WgpuTrainBackend,
};
use crate::ml::early_stopping::EarlyStoppingConfig;
use crate::ml::model::{HandPoseVitConfig, ModelSummary};
use crate::ml::scheduler::PlateauConfig;
use crate::ml::trainer::{run_training, TrainOutcome};

// ─── Training Configuration ──────────────────────────────────────────────────
// All settings for a training run. Saved next to the checkpoints
// so evaluation can rebuild the same model. Fields missing from a
// JSON config file take their default values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub checkpoint_dir: String,
    pub backend:        BackendKind,

    // data
    pub num_samples:    usize,
    pub train_fraction: f64,
    pub img_size:       usize,
    pub heatmap_size:   usize,
    pub heatmap_sigma:  f32,
    pub seed:           u64,
    pub num_workers:    usize,

    // model
    pub patch_size:        usize,
    pub emb_size:          usize,
    pub depth:             usize,
    pub num_heads:         usize,
    pub forward_expansion: usize,
    pub dropout:           f64,

    // optimisation
    pub epochs:                usize,
    pub batch_size:            usize,
    pub batches_per_epoch:     usize,
    pub batches_per_epoch_val: usize,
    pub lr:                    f64,
    pub momentum:              Option<f64>,
    pub plateau:               PlateauConfig,
    pub early_stopping:        EarlyStoppingConfig,

    // checkpoints
    pub checkpoint_frequency: usize,
    /// Initial weights to start from
    pub weights:              Option<String>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir:        "checkpoints".to_string(),
            backend:               BackendKind::Wgpu,
            num_samples:           4000,
            train_fraction:        0.8,
            img_size:              128,
            heatmap_size:          32,
            heatmap_sigma:         1.5,
            seed:                  42,
            num_workers:           1,
            patch_size:            32,
            emb_size:              768,
            depth:                 12,
            num_heads:             8,
            forward_expansion:     4,
            dropout:               0.0,
            epochs:                1000,
            batch_size:            64,
            batches_per_epoch:     50,
            batches_per_epoch_val: 20,
            lr:                    0.01,
            momentum:              None,
            plateau:               PlateauConfig::default(),
            early_stopping:        EarlyStoppingConfig::default(),
            checkpoint_frequency:  100,
            weights:               None,
        }
    }
}

impl TrainConfig {
    pub fn model_config(&self) -> HandPoseVitConfig {
        HandPoseVitConfig::new(NUM_HAND_KEYPOINTS, self.img_size, self.heatmap_size)
            .with_in_channels(NUM_IMG_CHANNELS)
            .with_patch_size(self.patch_size)
            .with_emb_size(self.emb_size)
            .with_depth(self.depth)
            .with_num_heads(self.num_heads)
            .with_forward_expansion(self.forward_expansion)
            .with_dropout(self.dropout)
    }

    pub fn validate(&self) -> Result<()> {
        self.model_config().validate()?;

        if self.batch_size == 0 || self.batches_per_epoch == 0 || self.batches_per_epoch_val == 0 {
            bail!("batch_size and batches per epoch must be positive");
        }
        if self.checkpoint_frequency == 0 {
            bail!("checkpoint_frequency must be positive");
        }
        if !(self.lr > 0.0) {
            bail!("lr must be positive, got {}", self.lr);
        }
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            bail!("train_fraction must be in (0, 1), got {}", self.train_fraction);
        }
        if !(self.heatmap_sigma > 0.0) {
            bail!("heatmap_sigma must be positive");
        }
        if !(self.plateau.factor > 0.0 && self.plateau.factor < 1.0) {
            bail!("plateau factor must be in (0, 1), got {}", self.plateau.factor);
        }
        if self.early_stopping.window == 0 {
            bail!("early stopping window must be positive");
        }
        if let Some(m) = self.momentum {
            if !(0.0..1.0).contains(&m) {
                bail!("momentum must be in [0, 1), got {m}");
            }
        }
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainOutcome> {
        let cfg = &self.config;

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate()?;

        // ── Step 2: Generate samples ──────────────────────────────────────────
        tracing::info!("Loading data...");
        let source = SyntheticHands::new(
            cfg.num_samples,
            cfg.img_size,
            cfg.heatmap_size,
            cfg.heatmap_sigma,
            cfg.seed,
        );
        let samples = source.load_all()?;
        tracing::info!("Loaded {} samples", samples.len());

        // ── Step 3: Train / validation split ──────────────────────────────────
        let (train_samples, val_samples) = split_train_val(samples, cfg.train_fraction, cfg.seed);
        tracing::info!(
            "Split: {} train, {} validation",
            train_samples.len(),
            val_samples.len()
        );
        if train_samples.is_empty() || val_samples.is_empty() {
            bail!(
                "num_samples = {} with train_fraction = {} leaves an empty split \
                 ({} train, {} validation)",
                cfg.num_samples, cfg.train_fraction, train_samples.len(), val_samples.len(),
            );
        }

        // ── Step 4: Build Burn datasets ───────────────────────────────────────
        let train_dataset = HandDataset::new(train_samples);
        let val_dataset   = HandDataset::new(val_samples);

        // ── Step 5: Persistence ───────────────────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt_manager.save_config(cfg)?;
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;

        // ── Step 6: Run training loop (Layer 5) ───────────────────────────────
        tracing::info!("Training on backend '{}'", cfg.backend.name());
        let outcome = match cfg.backend {
            BackendKind::Wgpu => run_training::<WgpuTrainBackend>(
                cfg, train_dataset, val_dataset, &ckpt_manager, &metrics, wgpu_device(),
            )?,
            BackendKind::NdArray => run_training::<NdArrayTrainBackend>(
                cfg, train_dataset, val_dataset, &ckpt_manager, &metrics, ndarray_device(),
            )?,
        };

        tracing::info!(
            "Ran {} epochs{}; final lr {:.3e}",
            outcome.epochs_run,
            if outcome.stopped_early { " (stopped early)" } else { "" },
            outcome.final_lr,
        );
        Ok(outcome)
    }

    /// Layer-by-layer parameter counts, computed on the CPU.
    pub fn summary(&self) -> Result<ModelSummary> {
        let cfg = &self.config;
        let model_cfg = cfg.model_config();
        model_cfg.validate()?;
        let model = model_cfg.init::<NdArrayBackend>(&ndarray_device());
        Ok(model.summary([1, model_cfg.in_channels, cfg.img_size, cfg.img_size]))
    }
}
