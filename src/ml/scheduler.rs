// ============================================================
// Layer 5 — Reduce-on-Plateau LR Scheduler
// ============================================================
// Halves (by default) the learning rate when the monitored loss
// stops improving:
//
//   improvement  ⇔  metric < best · (1 − threshold)
//   bad epochs   >  patience  ⇒  lr = max(lr · factor, min_lr)
//
// The bad-epoch counter resets after each reduction. Changes
// smaller than MIN_LR_DELTA are ignored.

use serde::{Deserialize, Serialize};

const MIN_LR_DELTA: f64 = 1e-8;

/// Scheduler hyperparameters, part of the training config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlateauConfig {
    pub factor:    f64,
    pub patience:  usize,
    pub threshold: f64,
    pub min_lr:    f64,
}

impl Default for PlateauConfig {
    fn default() -> Self {
        Self { factor: 0.5, patience: 20, threshold: 1e-5, min_lr: 0.0 }
    }
}

#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
    config:         PlateauConfig,
    lr:             f64,
    best:           f64,
    num_bad_epochs: usize,
}

impl ReduceLrOnPlateau {
    pub fn new(initial_lr: f64, config: PlateauConfig) -> Self {
        Self { config, lr: initial_lr, best: f64::INFINITY, num_bad_epochs: 0 }
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    /// Record one epoch's metric and return the learning rate for the next epoch.
    pub fn step(&mut self, metric: f64) -> f64 {
        if metric < self.best * (1.0 - self.config.threshold) {
            self.best = metric;
            self.num_bad_epochs = 0;
        } else {
            self.num_bad_epochs += 1;
        }

        if self.num_bad_epochs > self.config.patience {
            let reduced = (self.lr * self.config.factor).max(self.config.min_lr);
            if self.lr - reduced > MIN_LR_DELTA {
                tracing::info!("Reducing learning rate: {:.3e} → {:.3e}", self.lr, reduced);
                self.lr = reduced;
            }
            self.num_bad_epochs = 0;
        }

        self.lr
    }
}
