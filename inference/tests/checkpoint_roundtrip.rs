use burn::tensor::backend::Backend;
use chrono::{Local, TimeZone};
use inference::checkpoint::{latest_best_checkpoint, load_classifier};
use models::{BackboneConfig, ClassifierConfig, TamperClassifier};
use training::{CheckpointWriter, EpochReport, TrainBackend};

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
fn training_checkpoint_is_discovered_and_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let config = tiny_config();
    let device = <TrainBackend as Backend>::Device::default();
    let model = TamperClassifier::<TrainBackend>::new(&config, &device);

    // Two improving epochs from the same run: both leave checkpoints and
    // reports behind, and the later epoch must win discovery.
    let now = Local.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
    let mut writer = CheckpointWriter::new(dir.path(), now);
    for (epoch, loss) in [(0usize, 0.9f32), (1, 0.7)] {
        let report = EpochReport {
            epoch,
            train_loss: loss + 0.1,
            test_loss: loss,
            train_accuracy: 60.0,
            test_accuracy: 55.0,
        };
        assert!(writer.consider(loss));
        writer.save(&model, &report).unwrap();
    }

    let best = latest_best_checkpoint(dir.path()).unwrap();
    let name = best.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("model_20240601_100000_1"));

    assert!(load_classifier(&config, &best, &Default::default()).is_ok());
}
