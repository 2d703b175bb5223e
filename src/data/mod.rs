// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from labelled hands to tensor batches:
//
//   SampleSource (SyntheticHands)
//       │   images + keypoints
//       ▼
//   heatmap::render   → Gaussian target heatmaps
//       │
//       ▼
//   split_train_val   → seeded train / validation split
//       │
//       ▼
//   HandDataset       → implements Burn's Dataset trait
//       │
//       ▼
//   HandBatcher       → stacks samples into tensor batches
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Keypoint ↔ heatmap conversion
pub mod heatmap;

/// Procedural hand samples
pub mod synthetic;

/// Implements Burn's Dataset trait for hand samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Shuffles and splits data into train/validation sets
pub mod splitter;
