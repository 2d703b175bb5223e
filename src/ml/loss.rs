// ============================================================
// Layer 5 — IoU Heatmap Loss
// ============================================================
// Intersection over Union adapted to soft heatmaps:
//
//   inter = Σ(t·p)
//   union = Σ(t²) + Σ(p²) − Σ(t·p)
//   iou   = (inter + ε) / (union + ε)    per (sample, keypoint)
//   loss  = 1 − mean(iou)
//
// Sums run over the two spatial axes. ε keeps empty maps finite:
// two all-zero heatmaps count as a perfect match.

use burn::prelude::*;

pub const IOU_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
pub struct IouLoss {
    pub epsilon: f64,
}

impl Default for IouLoss {
    fn default() -> Self {
        Self { epsilon: IOU_EPSILON }
    }
}

impl IouLoss {
    pub fn new() -> Self {
        Self::default()
    }

    /// pred, target: [b, K, h, w] → scalar loss [1]
    pub fn forward<B: Backend>(&self, pred: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1> {
        self.iou(pred, target).mean().neg().add_scalar(1.0)
    }

    /// Per-keypoint IoU: [b, K, 1, 1]
    pub fn iou<B: Backend>(&self, pred: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 4> {
        let overlap = spatial_sum(target.clone() * pred.clone());
        let union = spatial_sum(target.powf_scalar(2.0))
            + spatial_sum(pred.powf_scalar(2.0))
            - overlap.clone();

        overlap
            .add_scalar(self.epsilon)
            .div(union.add_scalar(self.epsilon))
    }
}

fn spatial_sum<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    x.sum_dim(3).sum_dim(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::{Distribution, ElementConversion};

    type TestBackend = NdArray;

    fn scalar(t: Tensor<TestBackend, 1>) -> f64 {
        t.into_scalar().elem::<f64>()
    }

    #[test]
    fn identical_heatmaps_have_zero_loss() {
        let device = Default::default();
        let maps = Tensor::<TestBackend, 4>::random([2, 3, 4, 4], Distribution::Uniform(0.1, 1.0), &device);
        let loss = scalar(IouLoss::new().forward(maps.clone(), maps));
        assert!(loss.abs() < 1e-5, "loss = {loss}");
    }

    #[test]
    fn disjoint_heatmaps_have_unit_loss() {
        let device = Default::default();
        let left = Tensor::<TestBackend, 1>::from_floats([1.0, 0.0, 0.0, 0.0], &device)
            .reshape([1, 1, 2, 2]);
        let right = Tensor::<TestBackend, 1>::from_floats([0.0, 0.0, 0.0, 1.0], &device)
            .reshape([1, 1, 2, 2]);
        let loss = scalar(IouLoss::new().forward(left, right));
        assert!((loss - 1.0).abs() < 1e-5, "loss = {loss}");
    }

    #[test]
    fn empty_heatmaps_count_as_match() {
        let device = Default::default();
        let zeros = Tensor::<TestBackend, 4>::zeros([1, 2, 3, 3], &device);
        let loss = scalar(IouLoss::new().forward(zeros.clone(), zeros));
        assert!(loss.abs() < 1e-9);
    }

    #[test]
    fn partial_overlap_matches_formula() {
        let device = Default::default();
        // t = [1, 1, 0, 0], p = [1, 0, 1, 0]
        // inter = 1, union = 2 + 2 - 1 = 3 → iou = 1/3
        let t = Tensor::<TestBackend, 1>::from_floats([1.0, 1.0, 0.0, 0.0], &device).reshape([1, 1, 2, 2]);
        let p = Tensor::<TestBackend, 1>::from_floats([1.0, 0.0, 1.0, 0.0], &device).reshape([1, 1, 2, 2]);
        let loss = scalar(IouLoss::new().forward(p, t));
        assert!((loss - 2.0 / 3.0).abs() < 1e-5, "loss = {loss}");
    }

    #[test]
    fn loss_is_differentiable() {
        let device = Default::default();
        let pred = Tensor::<Autodiff<TestBackend>, 4>::random([1, 1, 3, 3], Distribution::Default, &device)
            .require_grad();
        let target = Tensor::<Autodiff<TestBackend>, 4>::ones([1, 1, 3, 3], &device);
        let grads = IouLoss::new().forward(pred.clone(), target).backward();
        let grad = pred.grad(&grads).expect("gradient for prediction");
        assert_eq!(grad.dims(), [1, 1, 3, 3]);
    }
}
