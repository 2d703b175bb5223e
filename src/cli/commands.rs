// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Subcommands: `train`, `evaluate`, `predict`, `summary`.
// Scheduler and early-stopping settings are only reachable
// through a JSON config file (`train --config`).

use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};

use crate::application::evaluate_use_case::EvaluateConfig;
use crate::application::train_use_case::TrainConfig;
use crate::infra::checkpoint::read_config;
use crate::ml::backend::BackendKind;
use crate::ml::inferencer::DEFAULT_PCK_THRESHOLD;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the ViT on hand keypoint heatmaps
    Train(TrainArgs),

    /// Measure a trained checkpoint on held-out hands
    Evaluate(EvaluateArgs),

    /// Print predicted keypoints for a few hands
    Predict(PredictArgs),

    /// Print layer-by-layer parameter counts
    Summary(ModelArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum BackendArg {
    /// GPU through wgpu
    Wgpu,
    /// CPU through ndarray
    Ndarray,
}

impl From<BackendArg> for BackendKind {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Wgpu    => BackendKind::Wgpu,
            BackendArg::Ndarray => BackendKind::NdArray,
        }
    }
}

/// Model geometry, shared by `train` and `summary`.
#[derive(Args, Debug)]
pub struct ModelArgs {
    /// Input image side length in pixels
    #[arg(long, default_value_t = 128)]
    pub img_size: usize,

    /// Output heatmap side length in pixels
    #[arg(long, default_value_t = 32)]
    pub heatmap_size: usize,

    /// Patch side length; must divide img_size
    #[arg(long, default_value_t = 32)]
    pub patch_size: usize,

    /// Token embedding width; must be divisible by num_heads
    #[arg(long, default_value_t = 768)]
    pub emb_size: usize,

    /// Number of encoder blocks
    #[arg(long, default_value_t = 12)]
    pub depth: usize,

    #[arg(long, default_value_t = 8)]
    pub num_heads: usize,

    /// Feed-forward width as a multiple of emb_size
    #[arg(long, default_value_t = 4)]
    pub forward_expansion: usize,

    #[arg(long, default_value_t = 0.0)]
    pub dropout: f64,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// JSON config file; when given, it replaces every other training flag
    #[arg(long)]
    pub config: Option<String>,

    /// Directory for checkpoints, config and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long, value_enum, default_value_t = BackendArg::Wgpu)]
    pub backend: BackendArg,

    #[command(flatten)]
    pub model: ModelArgs,

    #[arg(long, default_value_t = 1000)]
    pub epochs: usize,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    /// Training batches drawn per epoch
    #[arg(long, default_value_t = 50)]
    pub batches_per_epoch: usize,

    /// Validation batches drawn per epoch
    #[arg(long, default_value_t = 20)]
    pub batches_per_epoch_val: usize,

    #[arg(long, default_value_t = 0.01)]
    pub lr: f64,

    /// SGD momentum (plain SGD when omitted)
    #[arg(long)]
    pub momentum: Option<f64>,

    /// Number of synthetic hands to generate
    #[arg(long, default_value_t = 4000)]
    pub num_samples: usize,

    #[arg(long, default_value_t = 0.8)]
    pub train_fraction: f64,

    /// Gaussian sigma of target heatmaps, in heatmap pixels
    #[arg(long, default_value_t = 1.5)]
    pub heatmap_sigma: f32,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Save weights every N epochs
    #[arg(long, default_value_t = 100)]
    pub checkpoint_frequency: usize,

    /// Initial weights to continue training from
    #[arg(long)]
    pub weights: Option<String>,
}

impl TrainArgs {
    /// Build the application config, from `--config` when given.
    pub fn into_config(self) -> Result<TrainConfig> {
        if let Some(path) = &self.config {
            tracing::info!("Reading training config from '{}'", path);
            return read_config(path);
        }
        Ok(self.into())
    }
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            checkpoint_dir:        a.checkpoint_dir,
            backend:               a.backend.into(),
            num_samples:           a.num_samples,
            train_fraction:        a.train_fraction,
            img_size:              a.model.img_size,
            heatmap_size:          a.model.heatmap_size,
            heatmap_sigma:         a.heatmap_sigma,
            seed:                  a.seed,
            patch_size:            a.model.patch_size,
            emb_size:              a.model.emb_size,
            depth:                 a.model.depth,
            num_heads:             a.model.num_heads,
            forward_expansion:     a.model.forward_expansion,
            dropout:               a.model.dropout,
            epochs:                a.epochs,
            batch_size:            a.batch_size,
            batches_per_epoch:     a.batches_per_epoch,
            batches_per_epoch_val: a.batches_per_epoch_val,
            lr:                    a.lr,
            momentum:              a.momentum,
            checkpoint_frequency:  a.checkpoint_frequency,
            weights:               a.weights,
            ..TrainConfig::default()
        }
    }
}

impl From<ModelArgs> for TrainConfig {
    fn from(m: ModelArgs) -> Self {
        TrainConfig {
            img_size:          m.img_size,
            heatmap_size:      m.heatmap_size,
            patch_size:        m.patch_size,
            emb_size:          m.emb_size,
            depth:             m.depth,
            num_heads:         m.num_heads,
            forward_expansion: m.forward_expansion,
            dropout:           m.dropout,
            ..TrainConfig::default()
        }
    }
}

/// Checkpoint selection shared by `evaluate` and `predict`.
#[derive(Args, Debug)]
pub struct CheckpointArgs {
    /// Directory where training saved its checkpoints
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Weights file to load instead of the latest checkpoint
    #[arg(long)]
    pub weights: Option<String>,

    #[arg(long, value_enum, default_value_t = BackendArg::Wgpu)]
    pub backend: BackendArg,

    /// Seed for the generated evaluation hands
    #[arg(long, default_value_t = 7)]
    pub seed: u64,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub checkpoint: CheckpointArgs,

    #[arg(long, default_value_t = 256)]
    pub num_samples: usize,

    /// PCK distance threshold as a fraction of the image side
    #[arg(long, default_value_t = DEFAULT_PCK_THRESHOLD)]
    pub pck_threshold: f32,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    #[command(flatten)]
    pub checkpoint: CheckpointArgs,

    /// Number of hands to predict
    #[arg(long, default_value_t = 3)]
    pub count: usize,
}

impl From<EvaluateArgs> for EvaluateConfig {
    fn from(a: EvaluateArgs) -> Self {
        EvaluateConfig {
            checkpoint_dir: a.checkpoint.checkpoint_dir,
            weights:        a.checkpoint.weights,
            backend:        a.checkpoint.backend.into(),
            num_samples:    a.num_samples,
            seed:           a.checkpoint.seed,
            pck_threshold:  a.pck_threshold,
        }
    }
}

impl From<PredictArgs> for EvaluateConfig {
    fn from(a: PredictArgs) -> Self {
        EvaluateConfig {
            checkpoint_dir: a.checkpoint.checkpoint_dir,
            weights:        a.checkpoint.weights,
            backend:        a.checkpoint.backend.into(),
            num_samples:    a.count,
            seed:           a.checkpoint.seed,
            pck_threshold:  DEFAULT_PCK_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use crate::cli::Cli;

    #[test]
    fn train_flags_map_onto_config() {
        let cli = Cli::try_parse_from([
            "hand-pose-vit", "train", "--backend", "ndarray",
            "--epochs", "3", "--emb-size", "64", "--momentum", "0.9",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = args.into_config().unwrap();
        assert_eq!(cfg.backend, BackendKind::NdArray);
        assert_eq!(cfg.epochs, 3);
        assert_eq!(cfg.emb_size, 64);
        assert_eq!(cfg.momentum, Some(0.9));
        assert_eq!(cfg.batch_size, 64);
    }

    #[test]
    fn predict_count_becomes_sample_count() {
        let cli = Cli::try_parse_from(["hand-pose-vit", "predict", "--count", "5"]).unwrap();
        let Commands::Predict(args) = cli.command else { panic!("expected predict") };
        let cfg: EvaluateConfig = args.into();
        assert_eq!(cfg.num_samples, 5);
        assert_eq!(cfg.backend, BackendKind::Wgpu);
    }
}
