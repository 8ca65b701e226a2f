//! Stopwatch recording multiple running times

use std::time::Instant;

/// Records the elapsed time of repeated runs, in seconds
#[derive(Debug, Clone)]
pub struct Timer {
    times: Vec<f64>,
    tik: Instant,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Creates a timer which is already started
    pub fn new() -> Self {
        Self {
            times: Vec::new(),
            tik: Instant::now(),
        }
    }

    /// Starts (or restarts) the timer
    pub fn start(&mut self) {
        self.tik = Instant::now();
    }

    /// Stops the timer, records the elapsed time and returns it
    pub fn stop(&mut self) -> f64 {
        let elapsed = self.tik.elapsed().as_secs_f64();
        self.times.push(elapsed);
        elapsed
    }

    /// Average recorded time, `None` until at least one run was stopped
    pub fn avg(&self) -> Option<f64> {
        if self.times.is_empty() {
            return None;
        }
        Some(self.sum() / self.times.len() as f64)
    }

    pub fn sum(&self) -> f64 {
        self.times.iter().sum()
    }

    /// Running totals of the recorded times
    pub fn cumsum(&self) -> Vec<f64> {
        self.times
            .iter()
            .scan(0.0, |acc, t| {
                *acc += t;
                Some(*acc)
            })
            .collect()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }
}
