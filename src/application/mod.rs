// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: no model math here, no printing
// (Layer 1), no direct file access (Layer 6).

// The training workflow and its configuration
pub mod train_use_case;

// Checkpoint evaluation and prediction
pub mod evaluate_use_case;
