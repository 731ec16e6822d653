//! Training pipeline for the document tamper classifier: labeled dataset,
//! batch loaders, the epoch loop with best-checkpoint selection, and the
//! SFTP/zip data-ingestion step.

pub mod dataset;
pub mod ingest;
pub mod loader;
pub mod util;

pub use dataset::TamperDataset;
pub use loader::{Batch, BatchLoader, DataLoadFactory, DataLoaderConfig, PipelineError};
pub use util::{run_train, CheckpointWriter, EpochReport, TrainArgs};

/// Backend alias for training (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn_ndarray::NdArray<f32>;
