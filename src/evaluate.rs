//! Loss and accuracy of a classifier over a whole data source

use burn::prelude::*;
use burn::tensor::ElementConversion;
use thiserror::Error;

use crate::{
    dataloader::{BatchSource, DataLoaderError},
    loss::cross_entropy,
};

/// Errors for the evaluation loops
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("No device to evaluate on")]
    NoDevice,
    #[error("Data source yielded no examples")]
    Empty,
    #[error(transparent)]
    Data(#[from] DataLoaderError),
}

/// A model mapping a batch of features to class logits `[batch_size, num_classes]`
pub trait Classifier<B: Backend, const D: usize> {
    fn forward(&self, features: Tensor<B, D>) -> Tensor<B, 2>;
}

/// Mean cross entropy over every example of `data`. Batches are moved to the first device,
/// where `net` is expected to live.
pub fn evaluate_loss<B, M, S, const D: usize>(
    data: &S,
    net: &M,
    devices: &[B::Device],
) -> Result<f64, EvalError>
where
    B: Backend,
    M: Classifier<B, D>,
    S: BatchSource<B, D> + ?Sized,
{
    let device = devices.first().ok_or(EvalError::NoDevice)?;
    // total loss, number of examples
    let (mut l_sum, mut n) = (0.0, 0usize);
    for batch in data.batches(device)? {
        let batch = batch.to_device(device);
        n += batch.len();
        let outputs = net.forward(batch.features);
        let l = cross_entropy(outputs, batch.labels);
        l_sum += l.sum().into_scalar().elem::<f64>();
    }
    if n == 0 {
        return Err(EvalError::Empty);
    }
    Ok(l_sum / n as f64)
}

/// Fraction of examples of `data` whose highest logit is the true class
pub fn evaluate_accuracy<B, M, S, const D: usize>(
    data: &S,
    net: &M,
    devices: &[B::Device],
) -> Result<f64, EvalError>
where
    B: Backend,
    M: Classifier<B, D>,
    S: BatchSource<B, D> + ?Sized,
{
    let device = devices.first().ok_or(EvalError::NoDevice)?;
    let (mut correct, mut n) = (0i64, 0usize);
    for batch in data.batches(device)? {
        let batch = batch.to_device(device);
        let batch_size = batch.len();
        n += batch_size;
        // softmax keeps the order of the logits, the argmax is the same
        let prediction = net.forward(batch.features).argmax(1).reshape([batch_size]);
        correct += prediction
            .equal(batch.labels)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();
    }
    if n == 0 {
        return Err(EvalError::Empty);
    }
    let accuracy = correct as f64 / n as f64;
    log::info!("accuracy rate: {accuracy:.3}");
    Ok(accuracy)
}

#[cfg(test)]
mod tests {
    use super::*;

    use burn::backend::{NdArray, ndarray::NdArrayDevice};

    use crate::dataloader::DataLoader;

    type TestBackend = NdArray;

    /// Predicts class 1 exactly when the first feature is positive
    struct SignClassifier;

    impl<B: Backend> Classifier<B, 2> for SignClassifier {
        fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
            let [batch_size, _] = features.dims();
            let x = features.slice([0..batch_size, 0..1]);
            Tensor::cat(vec![x.clone().neg(), x], 1)
        }
    }

    /// Same logits for every example of a rank 3 batch
    struct FlatClassifier;

    impl<B: Backend> Classifier<B, 3> for FlatClassifier {
        fn forward(&self, features: Tensor<B, 3>) -> Tensor<B, 2> {
            let [batch_size, _, _] = features.dims();
            Tensor::zeros([batch_size, 2], &features.device())
        }
    }

    fn loader() -> DataLoader {
        let points = [[1.0, 0.0], [-2.0, 0.0], [3.0, 0.0], [-1.0, 0.0], [0.5, 0.0]];
        // the last example is mislabelled
        DataLoader::from_points(&points, &[1, 0, 1, 0, 0], 2, false).unwrap()
    }

    #[test]
    fn test_evaluate_accuracy() {
        let devices = [NdArrayDevice::Cpu];
        let accuracy =
            evaluate_accuracy::<TestBackend, _, _, 2>(&loader(), &SignClassifier, &devices)
                .unwrap();
        assert!((accuracy - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_loss() {
        let devices = [NdArrayDevice::Cpu];
        let loss =
            evaluate_loss::<TestBackend, _, _, 2>(&loader(), &SignClassifier, &devices).unwrap();
        // logits (-x, x): loss is ln(1 + e^{-2x}) when right and ln(1 + e^{2x}) when wrong
        let expected = [2.0f64, 4.0, 6.0, 2.0]
            .iter()
            .map(|z| (1.0 + (-z).exp()).ln())
            .sum::<f64>()
            + (1.0 + 1.0f64.exp()).ln();
        assert!((loss - expected / 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_errors() {
        let empty = DataLoader::from_points(&[], &[], 2, false).unwrap();
        let devices = [NdArrayDevice::Cpu];
        assert!(matches!(
            evaluate_loss::<TestBackend, _, _, 2>(&empty, &SignClassifier, &devices),
            Err(EvalError::Empty)
        ));
        assert!(matches!(
            evaluate_accuracy::<TestBackend, _, _, 2>(&loader(), &SignClassifier, &[]),
            Err(EvalError::NoDevice)
        ));
        assert!(matches!(
            evaluate_loss::<TestBackend, _, _, 3>(&loader(), &FlatClassifier, &devices),
            Err(EvalError::Data(DataLoaderError::RankMismatch { .. }))
        ));
    }
}
