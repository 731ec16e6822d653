//! Inference service: loads the latest best checkpoint and serves predictions
//! over a minimal HTTP API.

pub mod checkpoint;
pub mod context;
pub mod http;
pub mod multipart;

/// Backend alias for inference (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type InferenceBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type InferenceBackend = burn_ndarray::NdArray<f32>;

pub use checkpoint::{latest_best_checkpoint, load_classifier};
pub use context::ServiceContext;
