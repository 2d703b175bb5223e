// ============================================================
// Layer 5 — Early Stopping
// ============================================================
// Watches a rounded moving average of the validation loss.
//
//   epoch < window : min = round(mean(all val losses))
//   otherwise      : avg = round(mean(last `window` val losses))
//                    avg >= min → one more stale epoch
//                    avg <  min → new minimum, counter reset
//
// Training stops once the stale counter exceeds `patience`.
// Rounding to `precision` decimals ignores tiny improvements.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarlyStoppingConfig {
    pub window:    usize,
    pub precision: u32,
    pub patience:  usize,
}

impl Default for EarlyStoppingConfig {
    fn default() -> Self {
        Self { window: 10, precision: 5, patience: 10 }
    }
}

#[derive(Debug, Clone)]
pub struct EarlyStopping {
    config:       EarlyStoppingConfig,
    min_val_loss: f64,
    stale_epochs: usize,
}

impl EarlyStopping {
    pub fn new(config: EarlyStoppingConfig) -> Self {
        Self { config, min_val_loss: f64::INFINITY, stale_epochs: 0 }
    }

    pub fn min_val_loss(&self) -> f64 {
        self.min_val_loss
    }

    pub fn stale_epochs(&self) -> usize {
        self.stale_epochs
    }

    /// Update with the full validation history after 0-indexed `epoch`.
    /// Returns true when training should stop.
    pub fn should_stop(&mut self, epoch: usize, val_history: &[f64]) -> bool {
        if epoch < self.config.window {
            self.min_val_loss = round_to(mean(val_history), self.config.precision);
            self.stale_epochs = 0;
        } else {
            let start  = val_history.len().saturating_sub(self.config.window);
            let recent = round_to(mean(&val_history[start..]), self.config.precision);
            if recent >= self.min_val_loss {
                self.stale_epochs += 1;
            } else {
                self.min_val_loss = recent;
                self.stale_epochs = 0;
            }
        }
        self.stale_epochs > self.config.patience
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}
