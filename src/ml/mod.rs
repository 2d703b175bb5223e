// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn model and training code lives here.
//
//   model.rs          — Vision Transformer: patch embedding,
//                       multi-head self-attention, encoder
//                       blocks, heatmap head
//   loss.rs           — IoU loss for heatmaps
//   scheduler.rs      — reduce-on-plateau learning rate
//   early_stopping.rs — moving-average early stopping
//   trainer.rs        — epoch loop, validation, checkpoints
//   inferencer.rs     — checkpoint loading, pose decoding,
//                       evaluation metrics
//   backend.rs        — Wgpu / NdArray backend aliases
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)

pub mod backend;

/// Vision Transformer architecture
pub mod model;

pub mod loss;

pub mod scheduler;

pub mod early_stopping;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Inference engine — loads a checkpoint and predicts poses
pub mod inferencer;
