use std::path::{Path, PathBuf};

use data_contracts::labels::{read_label_table, LabelRecord};
use data_contracts::preprocess::{SampleTransform, TensorSample};

/// Labeled dataset over an XML ground-truth table and a directory of JPEGs
/// named `{id}.jpg`.
#[derive(Debug, Clone)]
pub struct TamperDataset {
    records: Vec<LabelRecord>,
    image_dir: PathBuf,
    transform: SampleTransform,
}

impl TamperDataset {
    pub fn from_paths(
        label_table: &Path,
        image_dir: impl Into<PathBuf>,
        transform: SampleTransform,
    ) -> anyhow::Result<Self> {
        let records = read_label_table(label_table)
            .map_err(|e| anyhow::anyhow!("failed to read label table {:?}: {e}", label_table))?;
        Ok(Self {
            records,
            image_dir: image_dir.into(),
            transform,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[LabelRecord] {
        &self.records
    }

    fn image_path(&self, idx: usize) -> PathBuf {
        self.image_dir.join(format!("{}.jpg", self.records[idx].id))
    }

    /// Resolve the image for `idx`, applying the off-by-one fallback for gaps
    /// in the source label table: a missing file falls back to `idx - 1`, or
    /// to `idx + 1` when `idx` is the first record.
    fn resolve(&self, idx: usize) -> (usize, PathBuf) {
        let expected = self.image_path(idx);
        if expected.exists() {
            return (idx, expected);
        }
        let fallback = if idx == 0 { idx + 1 } else { idx - 1 };
        if fallback < self.records.len() {
            (fallback, self.image_path(fallback))
        } else {
            (idx, expected)
        }
    }

    /// Fetch and transform the sample at `idx`. The label comes from the
    /// resolved row so it always matches the image actually loaded.
    pub fn get(&self, idx: usize) -> anyhow::Result<TensorSample> {
        if idx >= self.records.len() {
            anyhow::bail!("index {idx} out of bounds for dataset of length {}", self.records.len());
        }
        let (resolved, path) = self.resolve(idx);
        let image = image::open(&path)
            .map_err(|e| anyhow::anyhow!("failed to open image {:?}: {e}", path))?
            .to_rgb8();
        Ok(self.transform.apply(&image, self.records[resolved].modified))
    }
}
