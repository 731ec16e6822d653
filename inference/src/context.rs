use std::path::Path;

use burn::tensor::{backend::Backend, Tensor, TensorData};
use data_contracts::preprocess::{Rescale, ToTensor};
use image::RgbImage;
use models::{ClassifierConfig, TamperClassifier, IMAGE_SIZE};

use crate::checkpoint::{latest_best_checkpoint, load_classifier};
use crate::InferenceBackend;

type Device = <InferenceBackend as Backend>::Device;

/// Everything a request handler needs, built once at startup and shared
/// read-only across requests.
///
/// Preprocessing matches training: resize plus `[0, 1]` scaling, with no
/// channel normalization. Whether the pretrained backbone expects
/// normalization statistics here is an open question inherited from the
/// original pipeline.
pub struct ServiceContext {
    model: TamperClassifier<InferenceBackend>,
    device: Device,
    rescale: Rescale,
    to_tensor: ToTensor,
}

impl ServiceContext {
    pub fn new(model: TamperClassifier<InferenceBackend>, device: Device) -> Self {
        Self {
            model,
            device,
            rescale: Rescale::exact(IMAGE_SIZE as u32, IMAGE_SIZE as u32),
            to_tensor: ToTensor,
        }
    }

    /// Load the latest best checkpoint from `dir` and build the context.
    /// The non-autodiff inference backend keeps dropout inactive, so the
    /// model behaves as in evaluation mode.
    pub fn from_checkpoint_dir(dir: &Path) -> anyhow::Result<Self> {
        let path = latest_best_checkpoint(dir)?;
        tracing::info!(checkpoint = %path.display(), "loading model");
        let device = Device::default();
        let model = load_classifier(&ClassifierConfig::default(), &path, &device)?;
        Ok(Self::new(model, device))
    }

    /// Preprocess one image, add the batch dimension, and run a forward pass.
    /// Returns the raw probability; no thresholding is applied here.
    pub fn predict(&self, image: &RgbImage) -> anyhow::Result<f32> {
        let resized = self.rescale.apply(image);
        let sample = self.to_tensor.apply(&resized, 0.0);
        let [c, h, w] = sample.shape();
        let input = Tensor::<InferenceBackend, 3>::from_data(
            TensorData::new(sample.pixels, [c, h, w]),
            &self.device,
        )
        .unsqueeze::<4>();

        let output = self.model.forward(input);
        output
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("failed to read prediction tensor: {e:?}"))?
            .first()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("empty prediction tensor"))
    }
}
