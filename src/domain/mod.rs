// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types describing hands and keypoints.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only structs, enums, traits and pure functions
//
// Coordinates are always normalised to [0, 1] relative to the
// image (x to the right, y downwards) so the same pose can be
// compared at image resolution and at heatmap resolution.

// Keypoints, hand poses and labelled samples
pub mod keypoint;

// Pose accuracy metrics (mean error, PCK)
pub mod metrics;

// Core abstractions (traits) that other layers implement
pub mod traits;
