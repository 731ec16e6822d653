//! Shared data contracts for label tables and sample preprocessing.

pub mod labels;
pub mod preprocess;

pub use labels::{parse_label_table, read_label_table, LabelRecord, LabelTableError};
pub use preprocess::{Rescale, ResizeTarget, SampleTransform, TensorSample, ToTensor};
