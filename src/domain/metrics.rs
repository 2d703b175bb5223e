// ============================================================
// Layer 3 — Pose Metrics
// ============================================================
// Framework-free accuracy measures on decoded poses:
//
//   mean_keypoint_error — average normalised distance between
//                         predicted and true keypoints
//   pck                 — Percentage of Correct Keypoints: the
//                         fraction of keypoints closer than a
//                         threshold to the ground truth
//
// Poses are compared keypoint by keypoint; extra keypoints on
// either side are ignored.

use crate::domain::keypoint::HandPose;

/// Mean distance between matching keypoints over all poses.
/// Returns `None` when there is nothing to compare.
pub fn mean_keypoint_error(pred: &[HandPose], truth: &[HandPose]) -> Option<f32> {
    let (sum, count) = pred
        .iter()
        .zip(truth)
        .flat_map(|(p, t)| p.keypoints.iter().zip(&t.keypoints))
        .fold((0.0f32, 0usize), |(s, n), (a, b)| (s + a.distance(b), n + 1));

    (count > 0).then(|| sum / count as f32)
}

/// Fraction of keypoints within `threshold` of their ground truth.
pub fn pck(pred: &[HandPose], truth: &[HandPose], threshold: f32) -> Option<f32> {
    let (hits, count) = pred
        .iter()
        .zip(truth)
        .flat_map(|(p, t)| p.keypoints.iter().zip(&t.keypoints))
        .fold((0usize, 0usize), |(h, n), (a, b)| {
            (h + usize::from(a.distance(b) <= threshold), n + 1)
        });

    (count > 0).then(|| hits as f32 / count as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::keypoint::Keypoint;

    fn pose(points: &[(f32, f32)]) -> HandPose {
        HandPose::new(points.iter().map(|&(x, y)| Keypoint::new(x, y)).collect())
    }

    #[test]
    fn perfect_prediction_has_zero_error() {
        let t = vec![pose(&[(0.1, 0.2), (0.5, 0.5)])];
        assert_eq!(mean_keypoint_error(&t, &t), Some(0.0));
        assert_eq!(pck(&t, &t, 0.05), Some(1.0));
    }

    #[test]
    fn pck_counts_only_close_keypoints() {
        let truth = vec![pose(&[(0.0, 0.0), (0.5, 0.5)])];
        let pred  = vec![pose(&[(0.05, 0.0), (0.9, 0.5)])];
        assert_eq!(pck(&pred, &truth, 0.1), Some(0.5));
        let err = mean_keypoint_error(&pred, &truth).unwrap();
        assert!((err - 0.225).abs() < 1e-6);
    }

    #[test]
    fn empty_inputs_have_no_metric() {
        assert_eq!(mean_keypoint_error(&[], &[]), None);
        assert_eq!(pck(&[], &[], 0.1), None);
    }
}
