//! Loss function(s)

use burn::prelude::*;
use burn::tensor::activation::log_softmax;

/// Cross entropy between the logits `[batch_size, num_classes]` and the class indices
/// `[batch_size]`, one loss per example (no reduction)
pub fn cross_entropy<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
) -> Tensor<B, 1> {
    let [batch_size, _num_classes] = logits.dims();
    let log_probs = log_softmax(logits, 1);
    log_probs
        .gather(1, targets.reshape([batch_size, 1]))
        .reshape([batch_size])
        .neg()
}

#[cfg(test)]
mod tests {
    use super::*;

    use burn::backend::{Autodiff, NdArray, ndarray::NdArrayDevice};

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_cross_entropy() {
        let device = NdArrayDevice::Cpu;
        let logits = Tensor::<TestBackend, 2>::from_data([[0.0f32, 0.0], [2.0, 0.0]], &device);
        let targets = Tensor::<TestBackend, 1, Int>::from_data([1i64, 0], &device);
        let loss = cross_entropy(logits, targets)
            .into_data()
            .to_vec::<f32>()
            .unwrap();

        // uniform prediction: -ln(1/2)
        assert!((loss[0] - std::f32::consts::LN_2).abs() < 1e-6);
        // -ln(e^2 / (e^2 + 1))
        let expected = (1.0 + (-2.0f32).exp()).ln();
        assert!((loss[1] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_cross_entropy_backward() {
        let device = NdArrayDevice::Cpu;
        let logits =
            Tensor::<TestBackend, 2>::from_data([[1.0f32, 2.0, 3.0]], &device).require_grad();
        let targets = Tensor::<TestBackend, 1, Int>::from_data([2i64], &device);
        let grads = cross_entropy(logits.clone(), targets).sum().backward();
        let grad = logits
            .grad(&grads)
            .unwrap()
            .into_data()
            .to_vec::<f32>()
            .unwrap();

        // d loss / d logits = softmax(logits) - one_hot(target)
        let denom = 1.0f32.exp() + 2.0f32.exp() + 3.0f32.exp();
        let expected = [
            1.0f32.exp() / denom,
            2.0f32.exp() / denom,
            3.0f32.exp() / denom - 1.0,
        ];
        for (g, e) in grad.iter().zip(expected) {
            assert!((g - e).abs() < 1e-5);
        }
    }
}
