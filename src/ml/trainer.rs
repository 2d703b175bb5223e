// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epoch loop over Burn's DataLoader with SGD and the IoU loss.
//
// Per epoch:
//   1. up to `batches_per_epoch` shuffled training batches
//   2. up to `batches_per_epoch_val` validation batches on
//      model.valid() (inner backend, no autodiff, no dropout)
//   3. log + CSV row
//   4. plateau scheduler stepped with the train loss
//   5. periodic checkpoint
//   6. early stopping on the validation history
//
// The final weights and the loss history are always saved.

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{momentum::MomentumConfig, GradientsParams, Optimizer, SgdConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::{HandBatch, HandBatcher}, dataset::HandDataset};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::early_stopping::EarlyStopping;
use crate::ml::loss::IouLoss;
use crate::ml::model::HandPoseVit;
use crate::ml::scheduler::ReduceLrOnPlateau;

/// Mean loss per epoch for both splits.
///
/// Epochs without batches hold NaN, written to JSON as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LossHistory {
    #[serde(with = "nan_as_null")]
    pub train: Vec<f64>,
    #[serde(with = "nan_as_null")]
    pub val:   Vec<f64>,
}

// JSON has no NaN; non-finite losses become `null` and read back as NaN.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        values
            .iter()
            .map(|v| v.is_finite().then_some(*v))
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let values = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

impl LossHistory {
    pub fn push(&mut self, train: f64, val: f64) {
        self.train.push(train);
        self.val.push(val);
    }

    pub fn len(&self) -> usize {
        self.train.len()
    }

    pub fn is_empty(&self) -> bool {
        self.train.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub history:       LossHistory,
    pub epochs_run:    usize,
    pub stopped_early: bool,
    pub final_lr:      f64,
}

pub fn run_training<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    train_dataset: HandDataset,
    val_dataset:   HandDataset,
    ckpt_manager:  &CheckpointManager,
    metrics:       &MetricsLogger,
    device:        B::Device,
) -> Result<TrainOutcome> {

    // ── Build model ───────────────────────────────────────────────────────────
    let model_cfg = cfg.model_config();
    let mut model: HandPoseVit<B> = model_cfg.init(&device);
    if let Some(weights) = &cfg.weights {
        model = ckpt_manager.load_from_path(model, weights, &device)?;
    }
    let summary = model.summary([cfg.batch_size, model_cfg.in_channels, cfg.img_size, cfg.img_size]);
    tracing::info!("Model ready:\n{summary}");

    // ── SGD optimiser ─────────────────────────────────────────────────────────
    // θ = θ - lr * g   (optionally with momentum)
    let optim_cfg = SgdConfig::new()
        .with_momentum(cfg.momentum.map(|m| MomentumConfig::new().with_momentum(m)));
    let mut optim = optim_cfg.init::<B, HandPoseVit<B>>();

    let criterion          = IouLoss::new();
    let mut scheduler      = ReduceLrOnPlateau::new(cfg.lr, cfg.plateau);
    let mut early_stopping = EarlyStopping::new(cfg.early_stopping);

    // ── Data loaders ──────────────────────────────────────────────────────────
    let train_loader = DataLoaderBuilder::new(HandBatcher::<B>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(cfg.num_workers)
        .build(train_dataset);

    // validation runs on the inner backend, so no autodiff overhead
    let val_loader = DataLoaderBuilder::new(HandBatcher::<B::InnerBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .num_workers(cfg.num_workers)
        .build(val_dataset);

    // ── Epoch loop ────────────────────────────────────────────────────────────
    tracing::info!("Starting training...");
    let mut history       = LossHistory::default();
    let mut lr            = cfg.lr;
    let mut stopped_early = false;

    for epoch in 0..cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter().take(cfg.batches_per_epoch) {
            let output = model.forward(batch.images);
            let loss   = criterion.forward(output, batch.heatmaps);

            train_loss_sum += loss.clone().into_scalar().elem::<f64>();
            train_batches  += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(lr, model, grads);
        }
        let train_loss = average(train_loss_sum, train_batches);

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();
        let val_loss = mean_loss(
            &model_valid,
            val_loader.iter().take(cfg.batches_per_epoch_val),
            &criterion,
        );

        history.push(train_loss, val_loss);
        tracing::info!(
            "Epoch: {}/{}, Train Loss={:.10}, Val Loss={:.10}, LR={:.3e}",
            epoch + 1, cfg.epochs, train_loss, val_loss, lr,
        );
        metrics.log(&EpochMetrics::new(epoch + 1, train_loss, val_loss, lr))?;

        // reduce LR if the train loss plateaus
        lr = scheduler.step(train_loss);

        if (epoch + 1) % cfg.checkpoint_frequency == 0 {
            ckpt_manager.save_epoch(&model, epoch + 1)?;
        }

        if early_stopping.should_stop(epoch, &history.val) {
            tracing::info!("Stopping early after epoch {}", epoch + 1);
            stopped_early = true;
            break;
        }
    }

    ckpt_manager.save_final(&model)?;
    ckpt_manager.save_history(&history)?;
    tracing::info!("Training complete!");

    Ok(TrainOutcome {
        epochs_run: history.len(),
        history,
        stopped_early,
        final_lr: lr,
    })
}

/// Mean IoU loss of `model` over `batches`; NaN when there are none.
pub fn mean_loss<B: Backend>(
    model:     &HandPoseVit<B>,
    batches:   impl Iterator<Item = HandBatch<B>>,
    criterion: &IouLoss,
) -> f64 {
    let (sum, count) = batches.fold((0.0f64, 0usize), |(sum, count), batch| {
        let output = model.forward(batch.images);
        let loss   = criterion.forward(output, batch.heatmaps).into_scalar().elem::<f64>();
        (sum + loss, count + 1)
    });
    average(sum, count)
}

fn average(sum: f64, count: usize) -> f64 {
    if count > 0 { sum / count as f64 } else { f64::NAN }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::SyntheticHands;
    use crate::domain::traits::SampleSource;
    use crate::ml::backend::{NdArrayTrainBackend, ndarray_device};
    use crate::ml::early_stopping::EarlyStoppingConfig;

    fn tiny_config(dir: &str) -> TrainConfig {
        TrainConfig {
            checkpoint_dir:        dir.to_string(),
            num_samples:           12,
            img_size:              16,
            heatmap_size:          4,
            patch_size:            8,
            emb_size:              8,
            depth:                 1,
            num_heads:             2,
            forward_expansion:     2,
            epochs:                4,
            batch_size:            4,
            batches_per_epoch:     2,
            batches_per_epoch_val: 1,
            checkpoint_frequency:  2,
            num_workers:           1,
            ..TrainConfig::default()
        }
    }

    fn datasets(cfg: &TrainConfig) -> (HandDataset, HandDataset) {
        let source = SyntheticHands::new(
            cfg.num_samples, cfg.img_size, cfg.heatmap_size, cfg.heatmap_sigma, cfg.seed,
        );
        let samples = source.load_all().unwrap();
        let (train, val) = crate::data::splitter::split_train_val(samples, 0.75, cfg.seed);
        (HandDataset::new(train), HandDataset::new(val))
    }

    #[test]
    fn training_runs_and_saves_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_config(dir.path().to_str().unwrap());
        let ckpt    = CheckpointManager::new(&cfg.checkpoint_dir).unwrap();
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir).unwrap();
        let (train, val) = datasets(&cfg);

        let outcome = run_training::<NdArrayTrainBackend>(
            &cfg, train, val, &ckpt, &metrics, ndarray_device(),
        ).unwrap();

        assert_eq!(outcome.epochs_run, 4);
        assert!(!outcome.stopped_early);
        assert_eq!(outcome.history.train.len(), 4);
        assert!(outcome.history.train.iter().all(|l| l.is_finite()));
        assert!(outcome.history.val.iter().all(|l| l.is_finite()));

        assert!(dir.path().join("vit_model_002.mpk.gz").exists());
        assert!(dir.path().join("vit_model_004.mpk.gz").exists());
        assert!(dir.path().join("vit_model_final.mpk.gz").exists());
        let saved = ckpt.load_history().unwrap();
        assert_eq!(saved.len(), outcome.history.len());
        for (a, b) in saved.val.iter().zip(&outcome.history.val) {
            assert!((a - b).abs() < 1e-12);
        }

        let csv = std::fs::read_to_string(metrics.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 5);
    }

    #[test]
    fn early_stopping_ends_training() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = tiny_config(dir.path().to_str().unwrap());
        cfg.epochs = 50;
        cfg.lr = 0.0; // frozen weights → flat validation loss
        cfg.early_stopping = EarlyStoppingConfig { window: 1, precision: 5, patience: 1 };
        let ckpt    = CheckpointManager::new(&cfg.checkpoint_dir).unwrap();
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir).unwrap();
        let (train, val) = datasets(&cfg);

        let outcome = run_training::<NdArrayTrainBackend>(
            &cfg, train, val, &ckpt, &metrics, ndarray_device(),
        ).unwrap();

        assert!(outcome.stopped_early);
        assert_eq!(outcome.epochs_run, 3);
        assert!(dir.path().join("vit_model_final.mpk.gz").exists());
    }

    #[test]
    fn training_resumes_from_saved_weights() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_config(dir.path().to_str().unwrap());
        let ckpt    = CheckpointManager::new(&cfg.checkpoint_dir).unwrap();
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir).unwrap();
        let (train, val) = datasets(&cfg);
        let first = run_training::<NdArrayTrainBackend>(
            &cfg, train, val, &ckpt, &metrics, ndarray_device(),
        ).unwrap();
        let trained_val = *first.history.val.last().unwrap();

        // frozen weights: the first validation loss is the saved model's loss
        let resume_dir = tempfile::tempdir().unwrap();
        let mut resumed_cfg = tiny_config(resume_dir.path().to_str().unwrap());
        resumed_cfg.epochs = 1;
        resumed_cfg.lr = 0.0;
        let resume_ckpt    = CheckpointManager::new(&resumed_cfg.checkpoint_dir).unwrap();
        let resume_metrics = MetricsLogger::new(&resumed_cfg.checkpoint_dir).unwrap();

        for weights in ["vit_model_final", "vit_model_final.mpk.gz"] {
            resumed_cfg.weights = Some(dir.path().join(weights).to_string_lossy().into_owned());
            let (train, val) = datasets(&resumed_cfg);
            let resumed = run_training::<NdArrayTrainBackend>(
                &resumed_cfg, train, val, &resume_ckpt, &resume_metrics, ndarray_device(),
            ).unwrap();
            let resumed_val = resumed.history.val[0];
            // CompactRecorder stores half precision
            assert!(
                (resumed_val - trained_val).abs() < 1e-2,
                "{weights}: {resumed_val} vs {trained_val}",
            );
        }

        resumed_cfg.weights = Some(dir.path().join("missing").to_string_lossy().into_owned());
        let (train, val) = datasets(&resumed_cfg);
        assert!(run_training::<NdArrayTrainBackend>(
            &resumed_cfg, train, val, &resume_ckpt, &resume_metrics, ndarray_device(),
        ).is_err());
    }

    #[test]
    fn history_keeps_empty_epochs_as_nan() {
        let mut history = LossHistory::default();
        history.push(0.5, f64::NAN);
        let json = serde_json::to_string(&history).unwrap();
        assert_eq!(json, r#"{"train":[0.5],"val":[null]}"#);

        let loaded: LossHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.train, vec![0.5]);
        assert!(loaded.val[0].is_nan());
    }

    #[test]
    fn average_of_nothing_is_nan() {
        assert!(average(0.0, 0).is_nan());
        assert_eq!(average(3.0, 2), 1.5);
    }
}
