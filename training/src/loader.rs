use std::fmt;
use std::panic::Location;
use std::path::PathBuf;

use burn::tensor::{backend::Backend, Tensor, TensorData};
use data_contracts::preprocess::{Rescale, SampleTransform};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::dataset::TamperDataset;

/// Uniform wrapper for data-access failures, carrying the original message
/// plus the source location where it was wrapped.
#[derive(Debug, thiserror::Error)]
#[error("{message} ({file}:{line})")]
pub struct PipelineError {
    message: String,
    file: &'static str,
    line: u32,
}

impl PipelineError {
    #[track_caller]
    pub fn wrap(err: impl fmt::Display) -> Self {
        let location = Location::caller();
        Self {
            message: err.to_string(),
            file: location.file(),
            line: location.line(),
        }
    }
}

/// Paths and settings for the train/test data pipelines.
#[derive(Debug, Clone)]
pub struct DataLoaderConfig {
    pub train_image_dir: PathBuf,
    pub test_image_dir: PathBuf,
    pub train_label_table: PathBuf,
    pub test_label_table: PathBuf,
    /// Square resize target applied to every sample.
    pub resize: u32,
    pub batch_size: usize,
}

impl Default for DataLoaderConfig {
    fn default() -> Self {
        Self {
            train_image_dir: "artifacts/train_data/T1-train/img".into(),
            test_image_dir: "artifacts/test_data/FindIt-Dataset-Test/T1-test/img".into(),
            train_label_table: "artifacts/train_data/T1-train/GT/T1-GT.xml".into(),
            test_label_table: "artifacts/test_data/FindIt-Dataset-Test/T1-Test-GT.xml".into(),
            resize: 299,
            batch_size: 128,
        }
    }
}

/// Builds shuffled batch loaders over the train and test splits.
#[derive(Debug, Clone)]
pub struct DataLoadFactory {
    config: DataLoaderConfig,
}

impl DataLoadFactory {
    pub fn new(config: DataLoaderConfig) -> Self {
        Self { config }
    }

    fn transform(&self) -> SampleTransform {
        SampleTransform::new(Rescale::exact(self.config.resize, self.config.resize))
    }

    pub fn get_train_loader(&self) -> Result<BatchLoader, PipelineError> {
        tracing::info!("building training data loader");
        let dataset = TamperDataset::from_paths(
            &self.config.train_label_table,
            &self.config.train_image_dir,
            self.transform(),
        )
        .map_err(PipelineError::wrap)?;
        Ok(BatchLoader::new(dataset, self.config.batch_size))
    }

    pub fn get_test_loader(&self) -> Result<BatchLoader, PipelineError> {
        tracing::info!("building test data loader");
        let dataset = TamperDataset::from_paths(
            &self.config.test_label_table,
            &self.config.test_image_dir,
            self.transform(),
        )
        .map_err(PipelineError::wrap)?;
        Ok(BatchLoader::new(dataset, self.config.batch_size))
    }
}

/// One collated batch: images `[N, 3, H, W]`, labels `[N, 1]`.
#[derive(Debug, Clone)]
pub struct Batch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub labels: Tensor<B, 2>,
}

/// Wraps a dataset in shuffled fixed-size batches.
#[derive(Debug, Clone)]
pub struct BatchLoader {
    dataset: TamperDataset,
    batch_size: usize,
}

impl BatchLoader {
    pub fn new(dataset: TamperDataset, batch_size: usize) -> Self {
        Self {
            dataset,
            batch_size: batch_size.max(1),
        }
    }

    pub fn dataset(&self) -> &TamperDataset {
        &self.dataset
    }

    pub fn num_samples(&self) -> usize {
        self.dataset.len()
    }

    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Shuffled sample indices grouped into batches for one epoch.
    pub fn batch_indices(&self, rng: &mut impl Rng) -> Vec<Vec<usize>> {
        let mut indices: Vec<usize> = (0..self.dataset.len()).collect();
        indices.shuffle(rng);
        indices
            .chunks(self.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    /// Fetch, transform, and stack the given samples into tensors.
    pub fn collate<B: Backend>(
        &self,
        indices: &[usize],
        device: &B::Device,
    ) -> anyhow::Result<Batch<B>> {
        if indices.is_empty() {
            anyhow::bail!("cannot collate empty batch");
        }
        let first = self.dataset.get(indices[0])?;
        let (height, width) = (first.height, first.width);

        let n = indices.len();
        let mut image_buf: Vec<f32> = Vec::with_capacity(n * 3 * height * width);
        let mut label_buf: Vec<f32> = Vec::with_capacity(n);

        image_buf.extend_from_slice(&first.pixels);
        label_buf.push(first.label[0]);

        for &idx in &indices[1..] {
            let sample = self.dataset.get(idx)?;
            if sample.height != height || sample.width != width {
                anyhow::bail!(
                    "sample dimensions differ within batch: index {idx} is {}x{}, expected {}x{}",
                    sample.height,
                    sample.width,
                    height,
                    width
                );
            }
            image_buf.extend_from_slice(&sample.pixels);
            label_buf.push(sample.label[0]);
        }

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(image_buf, [n, 3, height, width]),
            device,
        );
        let labels = Tensor::<B, 2>::from_data(TensorData::new(label_buf, [n, 1]), device);
        Ok(Batch { images, labels })
    }
}
