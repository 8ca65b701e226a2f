//! Generates two-class 2-D classification datasets for demos and tests
//!
//! Points of class 0 come first, followed by points of class 1 (except for `Line` and `Xor`
//! where the class follows from the sampled position).

use std::{
    f32::consts::PI,
    fmt::{self, Display},
};

use clap::ValueEnum;
use rand::Rng;

use crate::dataloader::{DataLoader, DataLoaderError};

/// Toggles between dataset types
#[derive(Debug, ValueEnum, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Line,
    Circle,
    Xor,
    Moon,
}

impl Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dataset::Line => write!(f, "line"),
            Dataset::Circle => write!(f, "circle"),
            Dataset::Xor => write!(f, "xor"),
            Dataset::Moon => write!(f, "moon"),
        }
    }
}

/// Points and their class index
#[derive(Debug, Clone, Default)]
pub struct Samples {
    pub points: Vec<[f32; 2]>,
    pub labels: Vec<usize>,
}

impl Samples {
    fn push(&mut self, point: [f32; 2], label: usize) {
        self.points.push(point);
        self.labels.push(label);
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.labels.iter().max().map_or(0, |&max| max + 1)
    }

    pub fn into_loader(
        self,
        batch_size: usize,
        shuffle: bool,
    ) -> Result<DataLoader, DataLoaderError> {
        DataLoader::from_points(&self.points, &self.labels, batch_size, shuffle)
    }
}

impl Dataset {
    /// Samples a dataset with roughly `class_size` points per class
    pub fn generate(self, class_size: usize, rng: &mut impl Rng) -> Samples {
        match self {
            Dataset::Line => gen_linear_data(class_size, rng),
            Dataset::Circle => gen_circle_data(class_size, rng),
            Dataset::Xor => gen_xor_data(class_size, rng),
            Dataset::Moon => gen_moon_data(class_size, rng),
        }
    }
}

/// Linearly separable points on either side of `y = x`
pub fn gen_linear_data(class_size: usize, rng: &mut impl Rng) -> Samples {
    let mut samples = Samples::default();
    for _ in 0..2 * class_size {
        let x = rng.random_range(-5.0..5.0);
        let y = rng.random_range(-5.0..5.0);
        samples.push([x, y], if x > y { 0 } else { 1 });
    }
    samples
}

/// Two concentric noisy rings
pub fn gen_circle_data(class_size: usize, rng: &mut impl Rng) -> Samples {
    let mut samples = Samples::default();
    for (label, radius) in [3.0f32, 5.0].into_iter().enumerate() {
        for _ in 0..class_size {
            let angle = rng.random_range(0.0..2.0 * PI);
            let r = radius + radius * rng.random_range(-0.25..0.25);
            samples.push([r * angle.cos(), r * angle.sin()], label);
        }
    }
    samples
}

/// Class 0 in the first and third quadrants, class 1 elsewhere
pub fn gen_xor_data(class_size: usize, rng: &mut impl Rng) -> Samples {
    let mut samples = Samples::default();
    for _ in 0..2 * class_size {
        let x: f32 = rng.random_range(-5.0..5.0);
        let y: f32 = rng.random_range(-5.0..5.0);
        let label = if x * y > 0.0 { 0 } else { 1 };
        samples.push([x, y], label);
    }
    samples
}

/// Two interleaving half circles
pub fn gen_moon_data(class_size: usize, rng: &mut impl Rng) -> Samples {
    let radius = 3.0;
    let mut samples = Samples::default();
    for label in 0..2 {
        for _ in 0..class_size {
            let theta = rng.random_range(-PI / 4.0..PI * 5.0 / 4.0);
            let (x, y) = if label == 0 {
                (radius * theta.cos(), radius * theta.sin())
            } else {
                (radius * theta.cos() + 2.0, -radius * theta.sin() - 0.2)
            };
            let noise_x = rng.random_range(-0.1..0.1);
            let noise_y = rng.random_range(-0.1..0.1);
            samples.push([x + noise_x, y + noise_y], label);
        }
    }
    samples
}
