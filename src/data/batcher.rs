// ============================================================
// Layer 4 — Hand Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<HandSample>
// into image and heatmap tensors.
//
//   Input:  N samples, images [C·H·W], heatmaps [K·h·w]
//   Output: images [N, C, H, W], heatmaps [N, K, h, w]
//
// All samples in a batch must share image and heatmap sizes,
// which holds for any single SampleSource.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::HandSample;

// ─── HandBatch ────────────────────────────────────────────────────────────────
/// A batch of samples ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct HandBatch<B: Backend> {
    /// Input images — shape: [batch_size, channels, img_size, img_size]
    pub images: Tensor<B, 4>,

    /// Target heatmaps — shape: [batch_size, keypoints, heatmap_size, heatmap_size]
    pub heatmaps: Tensor<B, 4>,
}

impl<B: Backend> HandBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.images.dims()[0]
    }
}

// ─── HandBatcher ──────────────────────────────────────────────────────────────
/// Holds the target device so tensors are created on the right GPU/CPU.
#[derive(Clone, Debug)]
pub struct HandBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> HandBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<HandSample, HandBatch<B>> for HandBatcher<B> {
    fn batch(&self, items: Vec<HandSample>) -> HandBatch<B> {
        let batch_size   = items.len();
        let img_size     = items[0].img_size;
        let heatmap_size = items[0].heatmap_size;
        let channels     = items[0].channels();
        let keypoints    = items[0].num_keypoints();

        let image_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.image.iter().copied())
            .collect();

        let heatmap_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.heatmaps.iter().copied())
            .collect();

        let images = Tensor::<B, 1>::from_floats(image_flat.as_slice(), &self.device)
            .reshape([batch_size, channels, img_size, img_size]);

        let heatmaps = Tensor::<B, 1>::from_floats(heatmap_flat.as_slice(), &self.device)
            .reshape([batch_size, keypoints, heatmap_size, heatmap_size]);

        HandBatch { images, heatmaps }
    }
}
