use std::collections::VecDeque;

use serde::Serialize;

const WINDOW_CAPACITY: usize = 64;

/// Accumulated per-run metrics, exportable as JSON by the driver.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DiagnosticLog {
    pub total_steps: usize,
    pub step_metrics: StepMetricsCollection,
}

impl DiagnosticLog {
    pub fn push(&mut self, metrics: StepMetrics) {
        self.step_metrics.push(metrics);
        self.total_steps += 1;
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct StepMetricsCollection {
    pub active_ped_count: Vec<usize>,
    pub time_step: Vec<f64>,
}

impl StepMetricsCollection {
    pub fn push(&mut self, metrics: StepMetrics) {
        self.active_ped_count.push(metrics.active_ped_count);
        self.time_step.push(metrics.time_step);
    }
}

/// Wall-clock cost of one tick.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct StepMetrics {
    pub active_ped_count: usize,
    pub time_step: f64,
}

/// Sliding window over recent step intervals.
#[derive(Debug, Default, Clone)]
pub struct IntervalWindow {
    samples: VecDeque<f64>,
}

impl IntervalWindow {
    pub fn push(&mut self, seconds: f64) {
        if self.samples.len() == WINDOW_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(seconds);
    }

    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use assert_float_eq::*;

    use super::*;

    #[test]
    fn test_window_mean_slides() {
        let mut window = IntervalWindow::default();
        assert_float_absolute_eq!(window.mean(), 0.0);

        for _ in 0..WINDOW_CAPACITY {
            window.push(0.1);
        }
        assert_float_absolute_eq!(window.mean(), 0.1, 1e-9);

        // Old samples fall out of the window.
        for _ in 0..WINDOW_CAPACITY {
            window.push(0.3);
        }
        assert_float_absolute_eq!(window.mean(), 0.3, 1e-9);
    }
}
