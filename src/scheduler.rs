//! Learning rate schedule(s)

/// Common interface for learning rate schedules, stepped once per epoch
/// Analogous to torch.optim.lr_scheduler.LRScheduler
/// <https://pytorch.org/docs/stable/optim.html#how-to-adjust-learning-rate>
pub trait LrSchedule {
    /// Learning rate for the current epoch
    fn lr(&self) -> f64;
    /// Moves to the next epoch
    fn step(&mut self);
}

/// Decays the learning rate by `decay` every `period` epochs
#[derive(Debug, Clone)]
pub struct StepLr {
    initial: f64,
    period: usize,
    decay: f64,
    epoch: usize,
}

impl StepLr {
    /// A `period` of zero is treated as one
    pub fn new(initial: f64, period: usize, decay: f64) -> Self {
        Self {
            initial,
            period: period.max(1),
            decay,
            epoch: 0,
        }
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }
}

impl LrSchedule for StepLr {
    fn lr(&self) -> f64 {
        let decays = (self.epoch / self.period) as i32;
        self.initial * self.decay.powi(decays)
    }

    fn step(&mut self) {
        self.epoch += 1;
    }
}
