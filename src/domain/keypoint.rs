// ============================================================
// Layer 3 — Keypoint / HandPose / HandSample
// ============================================================
// A hand is described by 21 keypoints in FreiHAND order:
//
//   0        wrist
//   1..=4    thumb  (CMC, MCP, IP, tip)
//   5..=8    index  (MCP, PIP, DIP, tip)
//   9..=12   middle
//   13..=16  ring
//   17..=20  little
//
// Reference: Zimmermann et al. (2019) FreiHAND

use serde::{Deserialize, Serialize};

/// Number of keypoints in a full hand skeleton.
pub const NUM_HAND_KEYPOINTS: usize = 21;

/// Number of joints per finger (excluding the wrist).
pub const JOINTS_PER_FINGER: usize = 4;

/// Number of image channels (RGB).
pub const NUM_IMG_CHANNELS: usize = 3;

/// One 2D keypoint in normalised image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Peak heatmap value for predictions, 1.0 for ground truth
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, confidence: 1.0 }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Euclidean distance in normalised coordinates
    pub fn distance(&self, other: &Keypoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Clamp both coordinates into the unit square
    pub fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
            confidence: self.confidence,
        }
    }
}

/// An ordered set of keypoints for a single hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandPose {
    pub keypoints: Vec<Keypoint>,
}

impl HandPose {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self { keypoints }
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn wrist(&self) -> Option<&Keypoint> {
        self.keypoints.first()
    }

    /// Keypoints of finger `finger` (0 = thumb .. 4 = little), base to tip.
    pub fn finger(&self, finger: usize) -> &[Keypoint] {
        let start = 1 + finger * JOINTS_PER_FINGER;
        let end = (start + JOINTS_PER_FINGER).min(self.keypoints.len());
        if start >= end {
            return &[];
        }
        &self.keypoints[start..end]
    }

    /// Mean confidence across keypoints, 0 for an empty pose
    pub fn mean_confidence(&self) -> f32 {
        if self.keypoints.is_empty() {
            return 0.0;
        }
        self.keypoints.iter().map(|k| k.confidence).sum::<f32>() / self.keypoints.len() as f32
    }
}

/// One labelled training sample: an image and its target heatmaps.
///
/// `image` is row-major `[channels, img_size, img_size]` and
/// `heatmaps` is row-major `[keypoints, heatmap_size, heatmap_size]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandSample {
    pub image:        Vec<f32>,
    pub heatmaps:     Vec<f32>,
    pub pose:         HandPose,
    pub img_size:     usize,
    pub heatmap_size: usize,
}

impl HandSample {
    pub fn channels(&self) -> usize {
        self.image.len() / (self.img_size * self.img_size).max(1)
    }

    pub fn num_keypoints(&self) -> usize {
        self.heatmaps.len() / (self.heatmap_size * self.heatmap_size).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = Keypoint::new(0.0, 0.0);
        let b = Keypoint::new(0.3, 0.4);
        assert!((a.distance(&b) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn finger_slices_follow_freihand_order() {
        let kps = (0..NUM_HAND_KEYPOINTS)
            .map(|i| Keypoint::new(i as f32, 0.0))
            .collect();
        let pose = HandPose::new(kps);
        assert_eq!(pose.wrist().map(|k| k.x), Some(0.0));
        let thumb: Vec<f32> = pose.finger(0).iter().map(|k| k.x).collect();
        assert_eq!(thumb, vec![1.0, 2.0, 3.0, 4.0]);
        let little: Vec<f32> = pose.finger(4).iter().map(|k| k.x).collect();
        assert_eq!(little, vec![17.0, 18.0, 19.0, 20.0]);
        assert!(pose.finger(5).is_empty());
    }

    #[test]
    fn sample_dimensions_are_derived_from_buffers() {
        let sample = HandSample {
            image:        vec![0.0; 3 * 8 * 8],
            heatmaps:     vec![0.0; 21 * 4 * 4],
            pose:         HandPose::new(Vec::new()),
            img_size:     8,
            heatmap_size: 4,
        };
        assert_eq!(sample.channels(), 3);
        assert_eq!(sample.num_keypoints(), 21);
    }
}
