use image::imageops::{self, FilterType};
use image::RgbImage;

/// Resize policy for [`Rescale`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeTarget {
    /// Preserve aspect ratio, scaling the longer side to the given size.
    Fit(u32),
    /// Resize to exactly (height, width).
    Exact(u32, u32),
}

/// Resizes a sample image, leaving its label untouched.
#[derive(Debug, Clone, Copy)]
pub struct Rescale {
    target: ResizeTarget,
}

impl Rescale {
    pub fn fit(size: u32) -> Self {
        Self {
            target: ResizeTarget::Fit(size),
        }
    }

    pub fn exact(height: u32, width: u32) -> Self {
        Self {
            target: ResizeTarget::Exact(height, width),
        }
    }

    /// Output (height, width) for an input of the given dimensions.
    pub fn output_size(&self, height: u32, width: u32) -> (u32, u32) {
        match self.target {
            ResizeTarget::Exact(h, w) => (h, w),
            ResizeTarget::Fit(size) => {
                if height > width {
                    let w = (size as f64 * width as f64 / height as f64) as u32;
                    (size, w.max(1))
                } else {
                    let h = (size as f64 * height as f64 / width as f64) as u32;
                    (h.max(1), size)
                }
            }
        }
    }

    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        let (h, w) = self.output_size(image.height(), image.width());
        imageops::resize(image, w, h, FilterType::Triangle)
    }
}

/// A sample converted to channel-first floating-point form.
#[derive(Debug, Clone)]
pub struct TensorSample {
    /// CHW pixel values in `[0, 1]`.
    pub pixels: Vec<f32>,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    /// One-element label vector.
    pub label: [f32; 1],
}

impl TensorSample {
    pub fn shape(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }
}

/// Reorders image axes from HWC to CHW and converts image and label to f32.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToTensor;

impl ToTensor {
    pub fn apply(&self, image: &RgbImage, label: f32) -> TensorSample {
        let (width, height) = image.dimensions();
        let (w, h) = (width as usize, height as usize);
        let raw = image.as_raw();
        let mut pixels = vec![0.0f32; 3 * h * w];
        for y in 0..h {
            for x in 0..w {
                let base = (y * w + x) * 3;
                for c in 0..3 {
                    pixels[c * h * w + y * w + x] = raw[base + c] as f32 / 255.0;
                }
            }
        }
        TensorSample {
            pixels,
            channels: 3,
            height: h,
            width: w,
            label: [label],
        }
    }
}

/// Per-sample pipeline applied at fetch time: rescale, then tensor conversion.
#[derive(Debug, Clone, Copy)]
pub struct SampleTransform {
    pub rescale: Rescale,
    pub to_tensor: ToTensor,
}

impl SampleTransform {
    pub fn new(rescale: Rescale) -> Self {
        Self {
            rescale,
            to_tensor: ToTensor,
        }
    }

    pub fn apply(&self, image: &RgbImage, label: f32) -> TensorSample {
        let resized = self.rescale.apply(image);
        self.to_tensor.apply(&resized, label)
    }
}
