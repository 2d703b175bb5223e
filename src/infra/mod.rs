// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence shared by the training and evaluation workflows:
//
//   checkpoint.rs — model weights (Burn CompactRecorder), the
//                   run configuration and loss history (JSON)
//
//   metrics.rs    — per-epoch metrics appended to a CSV file

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
