// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training pipeline only sees these traits, so a real
// dataset reader can replace the synthetic generator without
// touching the application layer.

use anyhow::Result;
use crate::domain::keypoint::{HandPose, HandSample};

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// Any component that can produce labelled hand samples.
///
/// Implementations:
///   - SyntheticHands → procedurally drawn hands
pub trait SampleSource {
    /// Load all available samples from this source.
    fn load_all(&self) -> Result<Vec<HandSample>>;
}

// ─── PoseEstimator ────────────────────────────────────────────────────────────
/// Any component that can turn images into hand poses.
///
/// Implementations:
///   - Inferencer → runs the trained ViT and decodes its heatmaps
pub trait PoseEstimator {
    /// Estimate one pose per sample image.
    fn estimate(&self, samples: &[HandSample]) -> Result<Vec<HandPose>>;
}
