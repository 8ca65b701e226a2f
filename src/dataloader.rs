//! Data loader

use burn::prelude::*;
use rand::{Rng, seq::SliceRandom};
use thiserror::Error;

/// Errors for the dataloader
#[derive(Debug, Error)]
pub enum DataLoaderError {
    #[error("Features of length {len} do not split into items of shape {item_shape:?}")]
    FeatureShapeMismatch { len: usize, item_shape: Vec<usize> },
    #[error("Labels must have the same length as the data")]
    LabelLengthMismatch { label_len: usize, data_len: usize },
    #[error("Batch size must be positive")]
    ZeroBatchSize,
    #[error("Items of rank {item_rank} cannot be batched into tensors of rank {batch_rank}")]
    RankMismatch { item_rank: usize, batch_rank: usize },
}

/// A mini batch of examples: `features` has the batch as its leading dimension, `labels` holds
/// one class index per example
#[derive(Debug, Clone)]
pub struct Batch<B: Backend, const D: usize> {
    pub features: Tensor<B, D>,
    pub labels: Tensor<B, 1, Int>,
}

impl<B: Backend, const D: usize> Batch<B, D> {
    pub fn len(&self) -> usize {
        self.labels.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_device(self, device: &B::Device) -> Self {
        Self {
            features: self.features.to_device(device),
            labels: self.labels.to_device(device),
        }
    }
}

/// Anything that can be iterated over as mini batches on a given device, once per epoch
pub trait BatchSource<B: Backend, const D: usize> {
    /// Number of batches in one pass over the data
    fn num_batches(&self) -> usize;

    fn batches(
        &self,
        device: &B::Device,
    ) -> Result<Box<dyn Iterator<Item = Batch<B, D>> + '_>, DataLoaderError>;
}

/// In-memory data loader, returns batches of data and labels optionally shuffled
/// Takes inspiration from the PyTorch DataLoader
/// <https://pytorch.org/docs/stable/data.html#torch.utils.data.DataLoader>
#[derive(Debug, Clone)]
pub struct DataLoader {
    // row major, `item_shape` values per example
    features: Vec<f32>,
    item_shape: Vec<usize>,
    labels: Vec<i64>,
    batch_size: usize,
    shuffle: bool,
}

impl DataLoader {
    pub fn new(
        features: Vec<f32>,
        item_shape: Vec<usize>,
        labels: Vec<i64>,
        batch_size: usize,
        shuffle: bool,
    ) -> Result<Self, DataLoaderError> {
        if batch_size == 0 {
            return Err(DataLoaderError::ZeroBatchSize);
        }
        let item_len = item_shape.iter().product::<usize>();
        if item_len == 0 || features.len() % item_len != 0 {
            return Err(DataLoaderError::FeatureShapeMismatch {
                len: features.len(),
                item_shape,
            });
        }
        let data_len = features.len() / item_len;
        if data_len != labels.len() {
            return Err(DataLoaderError::LabelLengthMismatch {
                label_len: labels.len(),
                data_len,
            });
        }
        Ok(Self {
            features,
            item_shape,
            labels,
            batch_size,
            shuffle,
        })
    }

    /// Builds a loader from 2-D points, e.g. the synthetic datasets
    pub fn from_points(
        points: &[[f32; 2]],
        labels: &[usize],
        batch_size: usize,
        shuffle: bool,
    ) -> Result<Self, DataLoaderError> {
        let features = points.iter().flatten().copied().collect();
        let labels = labels.iter().map(|&l| l as i64).collect();
        Self::new(features, vec![2], labels, batch_size, shuffle)
    }

    /// Number of examples
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn indices(&self, rng: &mut impl Rng) -> Vec<usize> {
        let mut indices = (0..self.len()).collect::<Vec<_>>();
        if self.shuffle {
            indices.shuffle(rng);
        }
        indices
    }

    #[cfg(test)]
    fn seeded_iter<B: Backend, const D: usize>(
        &self,
        seed: u64,
        device: &B::Device,
    ) -> Result<DataLoaderIterator<'_, B, D>, DataLoaderError> {
        use rand::SeedableRng;
        use rand_pcg::Pcg64Mcg;

        let indices = self.indices(&mut Pcg64Mcg::seed_from_u64(seed));
        DataLoaderIterator::new(self, indices, device)
    }

    /// Iterates over mini batches on `device`. `D` is the rank of the feature batch, one more
    /// than the rank of a single item. The last batch is smaller when the batch size does not
    /// divide the number of examples.
    pub fn iter<B: Backend, const D: usize>(
        &self,
        device: &B::Device,
    ) -> Result<DataLoaderIterator<'_, B, D>, DataLoaderError> {
        let indices = self.indices(&mut rand::rng());
        DataLoaderIterator::new(self, indices, device)
    }
}

impl<B: Backend, const D: usize> BatchSource<B, D> for DataLoader {
    fn num_batches(&self) -> usize {
        self.len().div_ceil(self.batch_size)
    }

    fn batches(
        &self,
        device: &B::Device,
    ) -> Result<Box<dyn Iterator<Item = Batch<B, D>> + '_>, DataLoaderError> {
        Ok(Box::new(self.iter(device)?))
    }
}

/// An iterator which returns mini batches of data and labels until the end of the dataset
pub struct DataLoaderIterator<'a, B: Backend, const D: usize> {
    loader: &'a DataLoader,
    // optionally shuffled indices
    indices: Vec<usize>,
    curr_iter: usize,
    device: B::Device,
}

impl<'a, B: Backend, const D: usize> DataLoaderIterator<'a, B, D> {
    fn new(
        loader: &'a DataLoader,
        indices: Vec<usize>,
        device: &B::Device,
    ) -> Result<Self, DataLoaderError> {
        let item_rank = loader.item_shape.len();
        if item_rank + 1 != D {
            return Err(DataLoaderError::RankMismatch {
                item_rank,
                batch_rank: D,
            });
        }
        Ok(Self {
            loader,
            indices,
            curr_iter: 0,
            device: device.clone(),
        })
    }
}

impl<B: Backend, const D: usize> Iterator for DataLoaderIterator<'_, B, D> {
    type Item = Batch<B, D>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.curr_iter >= self.indices.len() {
            return None;
        }
        let end = (self.curr_iter + self.loader.batch_size).min(self.indices.len());
        let batch_indices = &self.indices[self.curr_iter..end];
        self.curr_iter = end;

        let item_len = self.loader.item_shape.iter().product::<usize>();
        let features = batch_indices
            .iter()
            .flat_map(|&i| &self.loader.features[i * item_len..(i + 1) * item_len])
            .copied()
            .collect::<Vec<_>>();
        let labels = batch_indices
            .iter()
            .map(|&i| self.loader.labels[i])
            .collect::<Vec<_>>();

        let mut shape = vec![batch_indices.len()];
        shape.extend_from_slice(&self.loader.item_shape);
        let features = Tensor::from_data(
            TensorData::new(features, shape).convert::<B::FloatElem>(),
            &self.device,
        );
        let labels = Tensor::from_data(
            TensorData::new(labels, [batch_indices.len()]).convert::<B::IntElem>(),
            &self.device,
        );
        Some(Batch { features, labels })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.indices.len() - self.curr_iter).div_ceil(self.loader.batch_size);
        (remaining, Some(remaining))
    }
}
