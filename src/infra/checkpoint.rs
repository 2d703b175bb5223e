// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// File naming convention:
//   checkpoints/
//     vit_model_100.mpk.gz    ← weights after epoch 100
//     vit_model_200.mpk.gz
//     ...
//     vit_model_final.mpk.gz  ← weights when training ended
//     latest.json             ← name of the newest weights file
//     train_config.json       ← configuration of the run
//     loss_history.json       ← per-epoch train / val losses
//
// The config is stored next to the weights because the model
// must be rebuilt with the same geometry before a record can be
// loaded into it.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::HandPoseVit;
use crate::ml::trainer::LossHistory;

const MODEL_PREFIX: &str = "vit_model";
const RECORD_EXTENSION: &str = ".mpk.gz";

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open an existing checkpoint directory without creating it.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            bail!(
                "Checkpoint directory '{}' does not exist. Have you run 'train' first?",
                dir.display()
            );
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save weights after `epoch` as `vit_model_{epoch:03}`.
    pub fn save_epoch<B: Backend>(&self, model: &HandPoseVit<B>, epoch: usize) -> Result<PathBuf> {
        self.save_model(model, &format!("{MODEL_PREFIX}_{epoch:03}"))
    }

    /// Save the end-of-training weights as `vit_model_final`.
    pub fn save_final<B: Backend>(&self, model: &HandPoseVit<B>) -> Result<PathBuf> {
        self.save_model(model, &format!("{MODEL_PREFIX}_final"))
    }

    /// Save weights under `name` and point `latest.json` at them.
    pub fn save_model<B: Backend>(&self, model: &HandPoseVit<B>, name: &str) -> Result<PathBuf> {
        // the recorder appends the extension itself
        let path = self.dir.join(name);

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let latest_path = self.dir.join("latest.json");
        fs::write(&latest_path, serde_json::to_string(name)?)
            .with_context(|| "Failed to write latest.json")?;

        tracing::info!("Saved checkpoint '{}'", name);
        Ok(path)
    }

    /// Load weights `name`, or the latest saved weights when `name` is None.
    pub fn load_model<B: Backend>(
        &self,
        model:  HandPoseVit<B>,
        name:   Option<&str>,
        device: &B::Device,
    ) -> Result<HandPoseVit<B>> {
        let name = match name {
            Some(name) => name.to_string(),
            None       => self.latest_name()?,
        };
        tracing::info!("Loading checkpoint '{}'", name);
        self.load_from_path(model, self.dir.join(name), device)
    }

    /// Load weights from an explicit file path, with or without the `.mpk.gz` extension.
    pub fn load_from_path<B: Backend>(
        &self,
        model:  HandPoseVit<B>,
        path:   impl AsRef<Path>,
        device: &B::Device,
    ) -> Result<HandPoseVit<B>> {
        let path = strip_record_extension(path.as_ref());

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load weights '{}'. Have you trained the model first?",
                    path.display())
            })?;

        Ok(model.load_record(record))
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// Load the configuration saved by the training run.
    pub fn load_config(&self) -> Result<TrainConfig> {
        read_config(self.dir.join("train_config.json"))
            .context("Make sure you have run 'train' before evaluating")
    }

    pub fn save_history(&self, history: &LossHistory) -> Result<()> {
        let path = self.dir.join("loss_history.json");
        fs::write(&path, serde_json::to_string_pretty(history)?)
            .with_context(|| format!("Cannot write loss history to '{}'", path.display()))?;
        Ok(())
    }

    pub fn load_history(&self) -> Result<LossHistory> {
        let path = self.dir.join("loss_history.json");
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read loss history from '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Name of the most recently saved weights.
    pub fn latest_name(&self) -> Result<String> {
        let path = self.dir.join("latest.json");
        let s = fs::read_to_string(&path)
            .with_context(|| "Cannot find 'latest.json'. Have you run 'train' first?")?;
        Ok(serde_json::from_str::<String>(&s)?)
    }
}

/// Read a `TrainConfig` from a JSON file. Missing fields take their defaults.
pub fn read_config(path: impl AsRef<Path>) -> Result<TrainConfig> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Invalid config in '{}'", path.display()))
}

fn strip_record_extension(path: &Path) -> PathBuf {
    match path.to_str().and_then(|s| s.strip_suffix(RECORD_EXTENSION)) {
        Some(stem) => PathBuf::from(stem),
        None       => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    fn tiny_model(device: &<TestBackend as Backend>::Device) -> HandPoseVit<TestBackend> {
        crate::ml::model::HandPoseVitConfig::new(2, 8, 4)
            .with_patch_size(4)
            .with_emb_size(8)
            .with_depth(1)
            .with_num_heads(2)
            .init(device)
    }

    #[test]
    fn saved_weights_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let device = Default::default();

        let model = tiny_model(&device);
        let images = Tensor::<TestBackend, 4>::random([1, 3, 8, 8], Distribution::Default, &device);
        let expected = model.forward(images.clone()).into_data().to_vec::<f32>().unwrap();

        ckpt.save_epoch(&model, 7).unwrap();
        assert_eq!(ckpt.latest_name().unwrap(), "vit_model_007");

        // fresh random weights, then overwrite from disk
        let restored = ckpt.load_model(tiny_model(&device), None, &device).unwrap();
        let actual = restored.forward(images).into_data().to_vec::<f32>().unwrap();

        // CompactRecorder stores half precision
        for (a, b) in actual.iter().zip(&expected) {
            assert!((a - b).abs() < 0.05 * (1.0 + b.abs()), "{a} vs {b}");
        }
    }

    #[test]
    fn explicit_path_accepts_extension() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let device = Default::default();
        ckpt.save_final(&tiny_model(&device)).unwrap();

        let path = dir.path().join("vit_model_final.mpk.gz");
        assert!(ckpt.load_from_path(tiny_model(&device), &path, &device).is_ok());
        assert!(ckpt.load_from_path(tiny_model(&device), dir.path().join("missing"), &device).is_err());
    }

    #[test]
    fn config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let cfg = TrainConfig { epochs: 3, emb_size: 64, ..TrainConfig::default() };
        ckpt.save_config(&cfg).unwrap();
        let loaded = ckpt.load_config().unwrap();
        assert_eq!(loaded.epochs, 3);
        assert_eq!(loaded.emb_size, 64);
    }

    #[test]
    fn partial_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, r#"{ "epochs": 5, "backend": "ndarray" }"#).unwrap();
        let cfg = read_config(&path).unwrap();
        assert_eq!(cfg.epochs, 5);
        assert_eq!(cfg.batch_size, TrainConfig::default().batch_size);
    }

    #[test]
    fn history_with_empty_epochs_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let history = LossHistory { train: vec![0.9, 0.8], val: vec![f64::NAN, 0.7] };
        ckpt.save_history(&history).unwrap();

        let loaded = ckpt.load_history().unwrap();
        assert_eq!(loaded.train, history.train);
        assert!(loaded.val[0].is_nan());
        assert_eq!(loaded.val[1], 0.7);
    }

    #[test]
    fn open_requires_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nowhere");
        assert!(CheckpointManager::open(&missing).is_err());
        assert!(!missing.exists());
        assert!(CheckpointManager::open(dir.path()).is_ok());
    }

    #[test]
    fn missing_latest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        assert!(ckpt.latest_name().is_err());
    }
}
