use std::fs;

use burn::backend::Autodiff;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::Backend;
use data_contracts::preprocess::{Rescale, SampleTransform};
use image::{Rgb, RgbImage};
use models::{BackboneConfig, ClassifierConfig, TamperClassifier};
use rand::rngs::StdRng;
use rand::SeedableRng;
use training::util::bce_loss;
use training::{BatchLoader, TamperDataset, TrainBackend};

type ADBackend = Autodiff<TrainBackend>;

fn synthetic_loader(tmp: &tempfile::TempDir) -> BatchLoader {
    let img_dir = tmp.path().join("img");
    fs::create_dir_all(&img_dir).unwrap();

    let mut xml = String::from("<GT>");
    for (i, modified) in [0.0f32, 1.0, 1.0, 0.0].iter().enumerate() {
        xml.push_str(&format!(r#"<doc id="doc{i}" modified="{modified}"/>"#));
        let shade = (40 * i) as u8;
        let img = RgbImage::from_pixel(12, 10, Rgb([shade, 255 - shade, 128]));
        img.save(img_dir.join(format!("doc{i}.jpg"))).unwrap();
    }
    xml.push_str("</GT>");
    let table = tmp.path().join("labels.xml");
    fs::write(&table, xml).unwrap();

    let transform = SampleTransform::new(Rescale::exact(16, 16));
    let dataset = TamperDataset::from_paths(&table, &img_dir, transform).unwrap();
    BatchLoader::new(dataset, 2)
}

#[test]
fn one_optimizer_step_on_synthetic_batch() {
    let tmp = tempfile::tempdir().unwrap();
    let loader = synthetic_loader(&tmp);
    assert_eq!(loader.num_samples(), 4);
    assert_eq!(loader.num_batches(), 2);

    let device = <ADBackend as Backend>::Device::default();
    let config = ClassifierConfig {
        backbone: BackboneConfig {
            stem_channels: 2,
            feature_dim: 8,
        },
        hidden: 4,
        bottleneck: 2,
        dropout: 0.2,
    };
    let mut model = TamperClassifier::<ADBackend>::new(&config, &device);
    let mut optim = AdamConfig::new().init();

    let mut rng = StdRng::seed_from_u64(7);
    for indices in loader.batch_indices(&mut rng) {
        let batch = loader.collate::<ADBackend>(&indices, &device).unwrap();
        assert_eq!(batch.images.dims(), [indices.len(), 3, 16, 16]);

        let preds = model.forward(batch.images);
        let loss = bce_loss(preds, batch.labels);
        let loss_val: f32 = loss.clone().into_scalar();
        assert!(loss_val.is_finite());

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optim.step(1e-3, model, grads);
    }
}

#[test]
fn collate_rejects_empty_batch() {
    let tmp = tempfile::tempdir().unwrap();
    let loader = synthetic_loader(&tmp);
    let device = <TrainBackend as Backend>::Device::default();
    assert!(loader.collate::<TrainBackend>(&[], &device).is_err());
}
