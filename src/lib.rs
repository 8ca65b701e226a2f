//! Helpers for deep learning tutorials built on burn: device lookup, timing, running metrics,
//! live loss plots, train/validation folder splitting, evaluation and a generic training loop.

pub mod accumulator;
pub mod dataloader;
pub mod datasets;
pub mod device;
pub mod evaluate;
pub mod loss;
pub mod plot;
pub mod reorganize;
pub mod scheduler;
pub mod timer;
pub mod train;
