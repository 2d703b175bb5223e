// ============================================================
// Layer 4 — Synthetic Hand Generator
// ============================================================
// Stands in for a real dataset reader. Each sample is a randomly
// posed 21-point hand skeleton (wrist + 5 fingers × 4 joints)
// drawn onto a noisy RGB canvas, with Gaussian heatmaps rendered
// at the model's output resolution.
//
// Generation is fully determined by `seed`, so reruns are
// reproducible. Training splits one seeded set into train and
// validation; evaluation generates its own set from a separate
// seed.

use anyhow::{bail, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f32::consts::FRAC_PI_2;

use crate::data::heatmap;
use crate::domain::keypoint::{
    HandPose, HandSample, Keypoint, JOINTS_PER_FINGER, NUM_HAND_KEYPOINTS, NUM_IMG_CHANNELS,
};
use crate::domain::traits::SampleSource;

// Angular offset of each finger from the palm axis (thumb → little)
const FINGER_SPREAD: [f32; 5] = [-0.95, -0.35, 0.0, 0.3, 0.6];
// Palm-relative distance of each finger base, as a fraction of hand length
const FINGER_BASE: [f32; 5] = [0.2, 0.45, 0.47, 0.45, 0.4];
// Colour of each finger on the canvas
const FINGER_COLOUR: [[f32; 3]; 5] = [
    [1.0, 0.2, 0.2],
    [0.2, 1.0, 0.2],
    [0.2, 0.2, 1.0],
    [1.0, 1.0, 0.2],
    [1.0, 0.2, 1.0],
];
const BACKGROUND_NOISE: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct SyntheticHands {
    pub count:        usize,
    pub img_size:     usize,
    pub heatmap_size: usize,
    pub sigma:        f32,
    pub seed:         u64,
}

impl SyntheticHands {
    pub fn new(count: usize, img_size: usize, heatmap_size: usize, sigma: f32, seed: u64) -> Self {
        Self { count, img_size, heatmap_size, sigma, seed }
    }

    fn sample(&self, rng: &mut StdRng) -> HandSample {
        let pose  = random_pose(rng);
        let image = draw(&pose, self.img_size, rng);
        let heatmaps = heatmap::render(&pose, self.heatmap_size, self.sigma);
        HandSample {
            image,
            heatmaps,
            pose,
            img_size: self.img_size,
            heatmap_size: self.heatmap_size,
        }
    }
}

impl SampleSource for SyntheticHands {
    fn load_all(&self) -> Result<Vec<HandSample>> {
        if self.img_size == 0 || self.heatmap_size == 0 {
            bail!("image and heatmap sizes must be positive");
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        let samples: Vec<HandSample> = (0..self.count).map(|_| self.sample(&mut rng)).collect();
        tracing::debug!(
            "Generated {} synthetic hands ({}px image, {}px heatmaps, seed {})",
            samples.len(), self.img_size, self.heatmap_size, self.seed,
        );
        Ok(samples)
    }
}

/// A plausible open hand: wrist low in the frame, fingers fanning upwards.
fn random_pose(rng: &mut StdRng) -> HandPose {
    let wrist = Keypoint::new(rng.gen_range(0.35..0.65), rng.gen_range(0.7..0.85));
    let axis   = -FRAC_PI_2 + rng.gen_range(-0.4..0.4);
    let length = rng.gen_range(0.45..0.6);
    let mirror = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };

    let mut keypoints = Vec::with_capacity(NUM_HAND_KEYPOINTS);
    keypoints.push(wrist);

    for finger in 0..FINGER_SPREAD.len() {
        let mut angle = axis + mirror * (FINGER_SPREAD[finger] + rng.gen_range(-0.08..0.08));
        let base  = FINGER_BASE[finger] * length;
        let mut x = wrist.x + base * angle.cos();
        let mut y = wrist.y + base * angle.sin();
        let segment = length * if finger == 0 { 0.12 } else { 0.14 };
        let curl    = rng.gen_range(-0.25..0.25);

        for _ in 0..JOINTS_PER_FINGER {
            keypoints.push(Keypoint::new(x, y).clamped());
            angle += curl;
            x += segment * angle.cos();
            y += segment * angle.sin();
        }
    }

    HandPose::new(keypoints)
}

/// Draw bones and joints onto a `[3, size, size]` noisy canvas.
fn draw(pose: &HandPose, size: usize, rng: &mut StdRng) -> Vec<f32> {
    let plane = size * size;
    let mut image: Vec<f32> = (0..NUM_IMG_CHANNELS * plane)
        .map(|_| rng.gen::<f32>() * BACKGROUND_NOISE)
        .collect();
    let radius = (size as f32 / 48.0).max(0.75);

    let Some(wrist) = pose.wrist().copied() else {
        return image;
    };
    stamp(&mut image, size, wrist, radius * 1.5, [1.0, 1.0, 1.0]);

    for (finger, colour) in FINGER_COLOUR.iter().enumerate() {
        let joints = pose.finger(finger);
        let mut prev = wrist;
        for &joint in joints {
            // bone as a row of faint dots
            for step in 1..8 {
                let t = step as f32 / 8.0;
                let p = Keypoint::new(prev.x + t * (joint.x - prev.x), prev.y + t * (joint.y - prev.y));
                stamp(&mut image, size, p, radius * 0.6, colour.map(|c| c * 0.5));
            }
            stamp(&mut image, size, joint, radius, *colour);
            prev = joint;
        }
    }
    image
}

/// Add a Gaussian dot at `kp`, clamping every channel to 1.0.
fn stamp(image: &mut [f32], size: usize, kp: Keypoint, radius: f32, colour: [f32; 3]) {
    let plane = size * size;
    let cx = kp.x * size as f32;
    let cy = kp.y * size as f32;
    let reach = (3.0 * radius).ceil() as isize;
    let (px, py) = (cx.floor() as isize, cy.floor() as isize);

    for row in (py - reach).max(0)..(py + reach + 1).min(size as isize) {
        for col in (px - reach).max(0)..(px + reach + 1).min(size as isize) {
            let dx = col as f32 + 0.5 - cx;
            let dy = row as f32 + 0.5 - cy;
            let w = (-(dx * dx + dy * dy) / (2.0 * radius * radius)).exp();
            let idx = row as usize * size + col as usize;
            for (c, intensity) in colour.iter().enumerate() {
                let v = &mut image[c * plane + idx];
                *v = (*v + w * intensity).min(1.0);
            }
        }
    }
}
