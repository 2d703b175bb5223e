// ============================================================
// Layer 4 — Heatmap Rendering and Decoding
// ============================================================
// Converts between keypoint coordinates and per-keypoint
// heatmaps, the representation the model regresses.
//
//   render: one Gaussian bump per keypoint, peak value 1.0
//   decode: argmax per heatmap, back to normalised coordinates
//
// Layout is row-major [keypoints, size, size]. Pixel (row, col)
// covers the normalised square starting at (col/size, row/size),
// its centre sits at ((col + 0.5)/size, (row + 0.5)/size).

use crate::domain::keypoint::{HandPose, Keypoint};

/// Render a pose into `[K, size, size]` Gaussian heatmaps.
pub fn render(pose: &HandPose, size: usize, sigma: f32) -> Vec<f32> {
    let plane = size * size;
    let mut out = vec![0.0f32; pose.len() * plane];
    let sigma = sigma.max(1e-3);
    let denom = 2.0 * sigma * sigma;

    for (k, kp) in pose.keypoints.iter().enumerate() {
        let cx = kp.x * size as f32;
        let cy = kp.y * size as f32;
        let map = &mut out[k * plane..(k + 1) * plane];
        for row in 0..size {
            let dy = row as f32 + 0.5 - cy;
            for col in 0..size {
                let dx = col as f32 + 0.5 - cx;
                map[row * size + col] = (-(dx * dx + dy * dy) / denom).exp();
            }
        }
    }
    out
}

/// Decode `[K, size, size]` heatmaps into a pose.
///
/// Each keypoint lands on the centre of its hottest pixel; its
/// confidence is that pixel's value. Ties resolve to the first pixel.
pub fn decode(heatmaps: &[f32], num_keypoints: usize, size: usize) -> HandPose {
    let plane = size * size;
    let keypoints = (0..num_keypoints)
        .map(|k| {
            let map = heatmaps.get(k * plane..(k + 1) * plane).unwrap_or(&[]);
            let (best, peak) = map
                .iter()
                .copied()
                .enumerate()
                .fold((0usize, f32::NEG_INFINITY), |(bi, bv), (i, v)| {
                    if v > bv { (i, v) } else { (bi, bv) }
                });
            let row = best / size.max(1);
            let col = best % size.max(1);
            Keypoint::new(
                (col as f32 + 0.5) / size as f32,
                (row as f32 + 0.5) / size as f32,
            )
            .with_confidence(if peak.is_finite() { peak } else { 0.0 })
        })
        .collect();
    HandPose::new(keypoints)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_peak_is_one_at_pixel_centre() {
        // (0.5 + 0.5)/8 → centre of pixel (row 2, col 4) on an 8×8 map
        let pose = HandPose::new(vec![Keypoint::new(4.5 / 8.0, 2.5 / 8.0)]);
        let maps = render(&pose, 8, 1.0);
        assert_eq!(maps.len(), 64);
        assert!((maps[2 * 8 + 4] - 1.0).abs() < 1e-6);
        assert!(maps.iter().all(|&v| v <= 1.0 && v >= 0.0));
    }

    #[test]
    fn decode_recovers_rendered_keypoints() {
        let pose = HandPose::new(vec![
            Keypoint::new(0.1, 0.9),
            Keypoint::new(0.52, 0.33),
            Keypoint::new(0.97, 0.02),
        ]);
        let size = 32;
        let decoded = decode(&render(&pose, size, 1.5), 3, size);
        for (a, b) in decoded.keypoints.iter().zip(&pose.keypoints) {
            // within half a pixel on each axis
            assert!((a.x - b.x).abs() <= 0.5 / size as f32 + 1e-6);
            assert!((a.y - b.y).abs() <= 0.5 / size as f32 + 1e-6);
            assert!(a.confidence > 0.5);
        }
    }

    #[test]
    fn decode_of_flat_map_picks_first_pixel() {
        let decoded = decode(&vec![0.0; 2 * 4 * 4], 2, 4);
        assert_eq!(decoded.len(), 2);
        assert!((decoded.keypoints[0].x - 0.125).abs() < 1e-6);
        assert!((decoded.keypoints[0].y - 0.125).abs() < 1e-6);
        assert_eq!(decoded.keypoints[1].confidence, 0.0);
    }
}
