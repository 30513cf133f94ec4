//! Bounded rolling history for per-signal statistics.

use std::collections::VecDeque;

/// Summary statistics over a tracker's recent samples.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowStats {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Fixed-capacity sliding window of scalar samples.
///
/// Pushing past capacity evicts the oldest sample.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Mean of the `n` most recent samples (all of them if fewer).
    pub fn recent_mean(&self, n: usize) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let take = n.min(self.samples.len());
        let sum: f64 = self.samples.iter().rev().take(take).sum();
        Some(sum / take as f64)
    }

    /// Full-window summary statistics.
    pub fn stats(&self) -> WindowStats {
        if self.samples.is_empty() {
            return WindowStats::default();
        }

        let count = self.samples.len();
        let mean = self.samples.iter().sum::<f64>() / count as f64;
        let variance =
            self.samples.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;
        let min = self.samples.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = self
            .samples
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);

        WindowStats {
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut window = RollingWindow::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            window.push(v);
        }
        assert_eq!(window.len(), 3);
        let stats = window.stats();
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 4.0);
        assert!((stats.mean - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_recent_mean_takes_newest() {
        let mut window = RollingWindow::new(10);
        for v in [0.1, 0.2, 0.3, 0.6] {
            window.push(v);
        }
        let mean = window.recent_mean(2).unwrap();
        assert!((mean - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_empty_window() {
        let window = RollingWindow::new(5);
        assert!(window.recent_mean(3).is_none());
        assert_eq!(window.stats().count, 0);
    }

    #[test]
    fn test_std_dev() {
        let mut window = RollingWindow::new(4);
        for v in [2.0, 4.0, 4.0, 6.0] {
            window.push(v);
        }
        let stats = window.stats();
        assert!((stats.mean - 4.0).abs() < 1e-12);
        assert!((stats.std_dev - 2.0_f64.sqrt()).abs() < 1e-12);
    }
}
