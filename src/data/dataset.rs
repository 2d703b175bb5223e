use burn::data::dataset::Dataset;

pub use crate::domain::keypoint::HandSample;

/// In-memory collection of hand samples, served to Burn's DataLoader.
pub struct HandDataset {
    samples: Vec<HandSample>,
}

impl HandDataset {
    pub fn new(samples: Vec<HandSample>) -> Self { Self { samples } }

    pub fn sample_count(&self) -> usize { self.samples.len() }

    pub fn samples(&self) -> &[HandSample] { &self.samples }
}

impl Dataset<HandSample> for HandDataset {
    fn get(&self, index: usize) -> Option<HandSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
