//! Device enumeration
//!
//! Mirrors the tutorial's `try_gpu`/`try_all_gpus` helpers on top of burn backends.
//! Backends without accelerators fall back to their cpu device, so callers always
//! receive at least one device.

use burn::backend::{Autodiff, NdArray, ndarray::NdArrayDevice};
use burn::prelude::*;

/// Backends which can list the devices they are able to run on
pub trait DeviceCatalog: Backend {
    /// Accelerator devices visible to this backend, in index order
    fn gpus() -> Vec<Self::Device> {
        Vec::new()
    }

    /// The host device
    fn cpu() -> Self::Device;
}

impl DeviceCatalog for NdArray {
    fn cpu() -> Self::Device {
        NdArrayDevice::Cpu
    }
}

impl<B: DeviceCatalog> DeviceCatalog for Autodiff<B> {
    fn gpus() -> Vec<Self::Device> {
        B::gpus()
    }

    fn cpu() -> Self::Device {
        B::cpu()
    }
}

/// Returns all available GPUs, or `[cpu]` if there are none
pub fn try_all_gpus<B: DeviceCatalog>() -> Vec<B::Device> {
    let gpus = B::gpus();
    if gpus.is_empty() {
        log::debug!("no gpu found, falling back to cpu");
        vec![B::cpu()]
    } else {
        gpus
    }
}

/// Returns GPU `i` if it exists, otherwise the cpu
pub fn try_gpu<B: DeviceCatalog>(i: usize) -> B::Device {
    B::gpus().into_iter().nth(i).unwrap_or_else(B::cpu)
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_cpu_fallback() {
        let devices = try_all_gpus::<TestBackend>();
        assert_eq!(devices, vec![NdArrayDevice::Cpu]);
    }

    #[test]
    fn test_try_gpu_out_of_range() {
        assert_eq!(try_gpu::<NdArray>(3), NdArrayDevice::Cpu);
    }
}
