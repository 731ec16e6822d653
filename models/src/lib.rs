//! Tamper classifier: a frozen convolutional backbone with a small trainable
//! binary-classification head.

use std::path::Path;

use burn::module::Module;
use burn::nn;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{
    AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig,
};
use burn::nn::PaddingConfig2d;
use burn::record::{BinFileRecorder, FullPrecisionSettings, RecorderError};
use burn::tensor::activation::{relu, sigmoid};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Input resolution the pretrained backbone expects.
pub const IMAGE_SIZE: usize = 299;

#[derive(Debug, Clone)]
pub struct BackboneConfig {
    pub stem_channels: usize,
    pub feature_dim: usize,
}

impl Default for BackboneConfig {
    fn default() -> Self {
        Self {
            stem_channels: 32,
            feature_dim: 2048,
        }
    }
}

/// Feature-extracting portion of the network. Weights are expected to come
/// from a pretrained record; all parameters are frozen for training.
#[derive(Module, Debug)]
pub struct Backbone<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    pool1: MaxPool2d,
    conv3: Conv2d<B>,
    conv4: Conv2d<B>,
    pool2: MaxPool2d,
    avg: AdaptiveAvgPool2d,
}

impl<B: Backend> Backbone<B> {
    pub fn new(config: &BackboneConfig, device: &B::Device) -> Self {
        let stem = config.stem_channels;
        let conv1 = Conv2dConfig::new([3, stem], [3, 3])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv2 = Conv2dConfig::new([stem, stem * 2], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let pool1 = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let conv3 = Conv2dConfig::new([stem * 2, stem * 4], [3, 3])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv4 = Conv2dConfig::new([stem * 4, config.feature_dim], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let pool2 = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let avg = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        Self {
            conv1,
            conv2,
            pool1,
            conv3,
            conv4,
            pool2,
            avg,
        }
    }

    /// `[N, 3, H, W]` -> `[N, feature_dim]`.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.conv1.forward(images));
        let x = relu(self.conv2.forward(x));
        let x = self.pool1.forward(x);
        let x = relu(self.conv3.forward(x));
        let x = relu(self.conv4.forward(x));
        let x = self.pool2.forward(x);
        let x = self.avg.forward(x);
        x.flatten::<2>(1, 3)
    }
}

/// Load backbone weights from a pretrained record file and freeze them.
pub fn load_pretrained_backbone<B: Backend, P: AsRef<Path>>(
    config: &BackboneConfig,
    path: P,
    device: &B::Device,
) -> Result<Backbone<B>, RecorderError> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    Backbone::<B>::new(config, device)
        .load_file(path.as_ref().to_path_buf(), &recorder, device)
        .map(|backbone| backbone.no_grad())
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub backbone: BackboneConfig,
    pub hidden: usize,
    pub bottleneck: usize,
    pub dropout: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backbone: BackboneConfig::default(),
            hidden: 1024,
            bottleneck: 32,
            dropout: 0.2,
        }
    }
}

/// Backbone plus the trainable head:
/// linear -> relu -> dropout -> linear -> relu -> dropout -> linear -> sigmoid.
#[derive(Module, Debug)]
pub struct TamperClassifier<B: Backend> {
    backbone: Backbone<B>,
    fc1: nn::Linear<B>,
    dropout1: nn::Dropout,
    fc2: nn::Linear<B>,
    dropout2: nn::Dropout,
    fc3: nn::Linear<B>,
}

impl<B: Backend> TamperClassifier<B> {
    /// Build a classifier with a freshly-initialized (frozen) backbone.
    pub fn new(config: &ClassifierConfig, device: &B::Device) -> Self {
        let backbone = Backbone::new(&config.backbone, device).no_grad();
        Self::with_backbone(backbone, config, device)
    }

    /// Build a classifier around an existing backbone (e.g. pretrained).
    pub fn with_backbone(
        backbone: Backbone<B>,
        config: &ClassifierConfig,
        device: &B::Device,
    ) -> Self {
        let fc1 = nn::LinearConfig::new(config.backbone.feature_dim, config.hidden).init(device);
        let dropout1 = nn::DropoutConfig::new(config.dropout).init();
        let fc2 = nn::LinearConfig::new(config.hidden, config.bottleneck).init(device);
        let dropout2 = nn::DropoutConfig::new(config.dropout).init();
        let fc3 = nn::LinearConfig::new(config.bottleneck, 1).init(device);
        Self {
            backbone,
            fc1,
            dropout1,
            fc2,
            dropout2,
            fc3,
        }
    }

    /// `[N, 3, H, W]` -> `[N, 1]` probability in `[0, 1]`.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self.backbone.forward(images);
        let x = self.dropout1.forward(relu(self.fc1.forward(features)));
        let x = self.dropout2.forward(relu(self.fc2.forward(x)));
        sigmoid(self.fc3.forward(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    fn tiny_config() -> ClassifierConfig {
        ClassifierConfig {
            backbone: BackboneConfig {
                stem_channels: 2,
                feature_dim: 8,
            },
            hidden: 4,
            bottleneck: 2,
            dropout: 0.2,
        }
    }

    #[test]
    fn forward_yields_one_probability_per_sample() {
        let device = <B as Backend>::Device::default();
        let model = TamperClassifier::<B>::new(&tiny_config(), &device);
        let images = Tensor::<B, 4>::from_data(
            TensorData::new(vec![0.5f32; 2 * 3 * 32 * 32], [2, 3, 32, 32]),
            &device,
        );
        let out = model.forward(images);
        assert_eq!(out.dims(), [2, 1]);
        let values = out.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
