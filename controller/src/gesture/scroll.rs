//! Vertical displacement to scroll ticks.

use tracing::debug;

/// Reference height carried between scroll frames.
#[derive(Debug, Clone, Default)]
pub struct ScrollIntegrator {
    prev_y: Option<f64>,
}

impl ScrollIntegrator {
    /// Feed the current anchor height.  Returns a non-zero scroll amount
    /// (positive = up) when the hand moved more than `threshold` pixels
    /// since the previous frame.
    pub fn update(&mut self, current_y: f64, threshold: f64, sensitivity: f64) -> Option<i32> {
        let prev = self.prev_y.replace(current_y)?;
        let delta = prev - current_y;
        if delta.abs() <= threshold || threshold <= 0.0 {
            return None;
        }
        let amount = (delta / threshold * sensitivity).trunc() as i32;
        if amount == 0 {
            return None;
        }
        debug!(delta, amount, "scroll");
        Some(amount)
    }

    /// Drop the reference; called whenever scrolling is inactive.
    pub fn clear(&mut self) {
        self.prev_y = None;
    }

    #[cfg(test)]
    pub fn prev_y(&self) -> Option<f64> {
        self.prev_y
    }
}
