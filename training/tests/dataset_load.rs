use std::fs;
use std::path::PathBuf;

use data_contracts::preprocess::{Rescale, SampleTransform};
use image::{Rgb, RgbImage};
use training::TamperDataset;

/// Write a label table plus images, skipping the ids listed in `missing`.
fn synthetic_dataset(
    tmp: &tempfile::TempDir,
    rows: &[(&str, f32)],
    missing: &[&str],
) -> (PathBuf, PathBuf) {
    let img_dir = tmp.path().join("img");
    fs::create_dir_all(&img_dir).unwrap();

    let mut xml = String::from("<GT>");
    for (id, modified) in rows {
        xml.push_str(&format!(r#"<doc id="{id}" modified="{modified}"/>"#));
        if !missing.contains(id) {
            let img = RgbImage::from_pixel(6, 9, Rgb([200, 30, 30]));
            img.save(img_dir.join(format!("{id}.jpg"))).unwrap();
        }
    }
    xml.push_str("</GT>");

    let table = tmp.path().join("labels.xml");
    fs::write(&table, xml).unwrap();
    (table, img_dir)
}

fn transform(target: u32) -> SampleTransform {
    SampleTransform::new(Rescale::exact(target, target))
}

#[test]
fn length_matches_label_rows_and_samples_are_square() {
    let tmp = tempfile::tempdir().unwrap();
    let rows = [("a", 1.0), ("b", 0.0), ("c", 1.0)];
    let (table, img_dir) = synthetic_dataset(&tmp, &rows, &[]);

    let dataset = TamperDataset::from_paths(&table, &img_dir, transform(16)).unwrap();
    assert_eq!(dataset.len(), 3);

    for (idx, (_, modified)) in rows.iter().enumerate() {
        let sample = dataset.get(idx).unwrap();
        assert_eq!(sample.shape(), [3, 16, 16]);
        assert_eq!(sample.label, [*modified]);
    }
}

#[test]
fn missing_file_falls_back_to_previous_index() {
    let tmp = tempfile::tempdir().unwrap();
    let rows = [("a", 0.0), ("b", 1.0), ("c", 0.0)];
    let (table, img_dir) = synthetic_dataset(&tmp, &rows, &["c"]);

    let dataset = TamperDataset::from_paths(&table, &img_dir, transform(8)).unwrap();
    // Index 2 has no image; it resolves to index 1 and takes its label.
    let sample = dataset.get(2).unwrap();
    assert_eq!(sample.label, [1.0]);
}

#[test]
fn missing_file_at_index_zero_falls_back_to_next_index() {
    let tmp = tempfile::tempdir().unwrap();
    let rows = [("a", 0.0), ("b", 1.0)];
    let (table, img_dir) = synthetic_dataset(&tmp, &rows, &["a"]);

    let dataset = TamperDataset::from_paths(&table, &img_dir, transform(8)).unwrap();
    let sample = dataset.get(0).unwrap();
    assert_eq!(sample.label, [1.0]);
}

#[test]
fn unresolvable_file_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let rows = [("a", 0.0), ("b", 1.0), ("c", 0.0)];
    let (table, img_dir) = synthetic_dataset(&tmp, &rows, &["b", "c"]);

    let dataset = TamperDataset::from_paths(&table, &img_dir, transform(8)).unwrap();
    // Both index 2 and its fallback index 1 are absent.
    assert!(dataset.get(2).is_err());
}

#[test]
fn out_of_bounds_index_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let (table, img_dir) = synthetic_dataset(&tmp, &[("a", 0.0)], &[]);
    let dataset = TamperDataset::from_paths(&table, &img_dir, transform(8)).unwrap();
    assert!(dataset.get(1).is_err());
}
