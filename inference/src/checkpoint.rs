use std::fs;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use models::{ClassifierConfig, TamperClassifier};

use crate::InferenceBackend;

/// Pick the "latest best" checkpoint in `dir`: report files are skipped and
/// the lexicographically-last remaining filename wins, so the newest
/// `model_{timestamp}_{epoch}` entry is selected.
pub fn latest_best_checkpoint(dir: &Path) -> anyhow::Result<PathBuf> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map_err(|e| anyhow::anyhow!("failed to read checkpoint dir {:?}: {e}", dir))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.starts_with("report"))
        .collect();
    names.sort();
    match names.pop() {
        Some(name) => Ok(dir.join(name)),
        None => anyhow::bail!("no checkpoint found in {:?}", dir),
    }
}

/// Load a classifier record into a freshly-built model.
pub fn load_classifier(
    config: &ClassifierConfig,
    path: &Path,
    device: &<InferenceBackend as Backend>::Device,
) -> anyhow::Result<TamperClassifier<InferenceBackend>> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    // The recorder appends its own extension; strip one if present.
    let stem = if path.extension().is_some() {
        path.with_extension("")
    } else {
        path.to_path_buf()
    };
    TamperClassifier::<InferenceBackend>::new(config, device)
        .load_file(stem, &recorder, device)
        .map_err(|e| anyhow::anyhow!("failed to load checkpoint {:?}: {e}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_latest_model_and_skips_reports() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "model_20240101_000000_1",
            "model_20240102_000000_3",
            "report_20240102_000000_3.txt",
        ] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let best = latest_best_checkpoint(dir.path()).unwrap();
        assert_eq!(
            best.file_name().unwrap().to_str().unwrap(),
            "model_20240102_000000_3"
        );
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(latest_best_checkpoint(dir.path()).is_err());
    }
}
