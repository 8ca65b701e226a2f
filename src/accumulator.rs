//! Running sums over a fixed number of variables

use std::ops::Index;

/// Accumulates sums over `n` variables, e.g. total loss and number of examples
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    data: Vec<f64>,
}

impl Accumulator {
    pub fn new(n: usize) -> Self {
        Self { data: vec![0.0; n] }
    }

    /// Adds `values` slot by slot. Values past the accumulator width are ignored
    /// and slots without a matching value are left untouched.
    pub fn add(&mut self, values: &[f64]) {
        for (slot, value) in self.data.iter_mut().zip(values) {
            *slot += value;
        }
    }

    pub fn reset(&mut self) {
        self.data.iter_mut().for_each(|slot| *slot = 0.0);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Index<usize> for Accumulator {
    type Output = f64;

    fn index(&self, idx: usize) -> &f64 {
        &self.data[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_reset() {
        let mut metric = Accumulator::new(2);
        metric.add(&[1.5, 4.0]);
        metric.add(&[0.5, 4.0]);
        assert_eq!(metric[0], 2.0);
        assert_eq!(metric[1], 8.0);

        metric.reset();
        assert_eq!(metric, Accumulator::new(2));
        assert_eq!(metric.len(), 2);
    }

    #[test]
    fn test_mismatched_widths() {
        let mut metric = Accumulator::new(3);
        metric.add(&[1.0]);
        metric.add(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(metric[0], 2.0);
        assert_eq!(metric[1], 2.0);
        assert_eq!(metric[2], 3.0);
    }
}
