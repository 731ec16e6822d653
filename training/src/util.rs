use std::fs;
use std::path::{Path, PathBuf};

use burn::backend::Autodiff;
use burn::module::{AutodiffModule, Module};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::{backend::Backend, ElementConversion, Tensor};
use chrono::{DateTime, Local};
use clap::Parser;
use models::{load_pretrained_backbone, ClassifierConfig, TamperClassifier};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::loader::{BatchLoader, DataLoadFactory, DataLoaderConfig};
use crate::TrainBackend;

pub type ADBackend = Autodiff<TrainBackend>;

#[derive(Parser, Debug)]
#[command(name = "train", about = "Train the document tamper classifier")]
pub struct TrainArgs {
    /// Number of epochs.
    #[arg(long, default_value_t = 5)]
    pub epochs: usize,
    /// Batch size.
    #[arg(long, default_value_t = 128)]
    pub batch_size: usize,
    /// Learning rate.
    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,
    /// Square resize target applied to every sample.
    #[arg(long, default_value_t = 299)]
    pub resize: u32,
    /// Training image directory.
    #[arg(long, default_value = "artifacts/train_data/T1-train/img")]
    pub train_image_dir: String,
    /// Test image directory.
    #[arg(long, default_value = "artifacts/test_data/FindIt-Dataset-Test/T1-test/img")]
    pub test_image_dir: String,
    /// Training label table (XML).
    #[arg(long, default_value = "artifacts/train_data/T1-train/GT/T1-GT.xml")]
    pub train_label_table: String,
    /// Test label table (XML).
    #[arg(long, default_value = "artifacts/test_data/FindIt-Dataset-Test/T1-Test-GT.xml")]
    pub test_label_table: String,
    /// Directory where checkpoints and reports are written.
    #[arg(long, default_value = "artifacts/model")]
    pub save_model_dir: String,
    /// Pretrained backbone record to load (fresh random backbone if omitted).
    #[arg(long)]
    pub pretrained_backbone: Option<String>,
    /// Shuffle seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl TrainArgs {
    fn loader_config(&self) -> DataLoaderConfig {
        DataLoaderConfig {
            train_image_dir: self.train_image_dir.clone().into(),
            test_image_dir: self.test_image_dir.clone().into(),
            train_label_table: self.train_label_table.clone().into(),
            test_label_table: self.test_label_table.clone().into(),
            resize: self.resize,
            batch_size: self.batch_size,
        }
    }
}

pub fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    let factory = DataLoadFactory::new(args.loader_config());
    let train_loader = factory.get_train_loader()?;
    let test_loader = factory.get_test_loader()?;
    tracing::info!(
        train_samples = train_loader.num_samples(),
        test_samples = test_loader.num_samples(),
        "data loaders ready"
    );

    let device = <ADBackend as Backend>::Device::default();
    let config = ClassifierConfig::default();
    let model = match &args.pretrained_backbone {
        Some(path) => {
            let backbone = load_pretrained_backbone::<ADBackend, _>(
                &config.backbone,
                path,
                &device,
            )
            .map_err(|e| anyhow::anyhow!("failed to load pretrained backbone {path}: {e}"))?;
            TamperClassifier::with_backbone(backbone, &config, &device)
        }
        None => {
            tracing::warn!("no pretrained backbone given; training against random features");
            TamperClassifier::new(&config, &device)
        }
    };

    train_classifier(&args, model, &train_loader, &test_loader)
}

/// Epoch loop: one training pass, one gradient-free test pass, then the
/// strict-improvement checkpoint decision.
pub fn train_classifier(
    args: &TrainArgs,
    mut model: TamperClassifier<ADBackend>,
    train_loader: &BatchLoader,
    test_loader: &BatchLoader,
) -> anyhow::Result<()> {
    let device = <ADBackend as Backend>::Device::default();
    let mut optim = AdamConfig::new().init();
    let mut writer = CheckpointWriter::new(&args.save_model_dir, Local::now());
    let mut rng = StdRng::seed_from_u64(args.seed);

    for epoch in 0..args.epochs {
        tracing::info!("EPOCH {}/{}", epoch + 1, args.epochs);

        let mut running_loss = 0.0f32;
        let mut last_loss = 0.0f32;
        let mut correct = 0usize;
        let batches = train_loader.batch_indices(&mut rng);
        let total_batches = batches.len();

        for (i, indices) in batches.iter().enumerate() {
            let batch = train_loader.collate::<ADBackend>(indices, &device)?;
            let preds = model.forward(batch.images);
            let loss = bce_loss(preds.clone(), batch.labels.clone());

            let grads = GradientsParams::from_grads(loss.clone().backward(), &model);
            model = optim.step(args.lr, model, grads);

            running_loss += scalar(loss.detach());
            correct += count_correct(&preds.detach(), &batch.labels);
            last_loss = running_loss;
            println!("batch {}/{} loss: {last_loss}", i + 1, total_batches);
            running_loss = 0.0;
        }

        let train_loss = last_loss;
        let train_accuracy = 100.0 * correct as f32 / train_loader.num_samples().max(1) as f32;

        // Evaluation pass on the inner backend: no gradients, dropout off.
        let model_valid = model.valid();
        let mut test_loss_sum = 0.0f32;
        let mut test_batches = 0usize;
        let mut correct_test = 0usize;
        let mut seen = 0usize;
        for indices in test_loader.batch_indices(&mut rng) {
            let batch = test_loader.collate::<TrainBackend>(&indices, &device)?;
            let preds = model_valid.forward(batch.images);
            let loss = bce_loss(preds.clone(), batch.labels.clone());
            test_loss_sum += scalar(loss);
            test_batches += 1;
            correct_test += count_correct(&preds, &batch.labels);
            seen += indices.len();
        }
        let test_loss = test_loss_sum / test_batches.max(1) as f32;
        let test_accuracy = 100.0 * correct_test as f32 / seen.max(1) as f32;

        tracing::info!("LOSS train {train_loss} test {test_loss}");
        tracing::info!("Accuracy train {train_accuracy} test {test_accuracy}");

        let report = EpochReport {
            epoch,
            train_loss,
            test_loss,
            train_accuracy,
            test_accuracy,
        };
        if writer.consider(test_loss) {
            writer.save(&model, &report)?;
            tracing::info!(epoch, test_loss, "checkpoint saved");
        }
    }

    Ok(())
}

/// Binary cross-entropy over sigmoid outputs, clamped away from 0 and 1.
pub fn bce_loss<B: Backend>(preds: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    let eps = 1e-7;
    let preds = preds.clamp(eps, 1.0 - eps);
    let ones = Tensor::<B, 2>::ones(preds.dims(), &preds.device());
    let targets_inv = ones.clone() - targets.clone();
    let preds_inv = ones - preds.clone();
    -((targets * preds.log()) + (targets_inv * preds_inv.log())).mean()
}

/// Count predictions matching their label under the 0.5-threshold rule.
fn count_correct<B: Backend>(preds: &Tensor<B, 2>, labels: &Tensor<B, 2>) -> usize {
    let preds = preds.clone().into_data().to_vec::<f32>().unwrap_or_default();
    let labels = labels.clone().into_data().to_vec::<f32>().unwrap_or_default();
    preds
        .iter()
        .zip(labels.iter())
        .filter(|(p, l)| {
            let thresholded = if **p > 0.5 { 1.0f32 } else { 0.0f32 };
            thresholded == **l
        })
        .count()
}

fn scalar<B: Backend>(loss: Tensor<B, 1>) -> f32 {
    loss.into_scalar().elem::<f32>()
}

/// Loss/accuracy summary for one epoch, persisted next to its checkpoint.
#[derive(Debug, Clone, Copy)]
pub struct EpochReport {
    pub epoch: usize,
    pub train_loss: f32,
    pub test_loss: f32,
    pub train_accuracy: f32,
    pub test_accuracy: f32,
}

/// Writes `model_{timestamp}_{epoch}` checkpoints and their
/// `report_{timestamp}_{epoch}.txt` summaries whenever the test loss strictly
/// improves on the best seen this run.
#[derive(Debug)]
pub struct CheckpointWriter {
    dir: PathBuf,
    timestamp: String,
    best_test_loss: f32,
}

impl CheckpointWriter {
    pub fn new(dir: impl Into<PathBuf>, now: DateTime<Local>) -> Self {
        Self {
            dir: dir.into(),
            timestamp: now.format("%Y%m%d_%H%M%S").to_string(),
            best_test_loss: f32::INFINITY,
        }
    }

    pub fn best_test_loss(&self) -> f32 {
        self.best_test_loss
    }

    /// Strict-improvement rule: updates the best loss and returns true only
    /// when `test_loss` beats every previous epoch of this run.
    pub fn consider(&mut self, test_loss: f32) -> bool {
        if test_loss < self.best_test_loss {
            self.best_test_loss = test_loss;
            true
        } else {
            false
        }
    }

    pub fn checkpoint_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("model_{}_{}", self.timestamp, epoch))
    }

    pub fn report_path(&self, epoch: usize) -> PathBuf {
        self.dir
            .join(format!("report_{}_{}.txt", self.timestamp, epoch))
    }

    pub fn save<B: Backend>(
        &self,
        model: &TamperClassifier<B>,
        report: &EpochReport,
    ) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let text = format!(
            "LOSS train {} test {}\nAccuracy train {} test {}\n",
            report.train_loss, report.test_loss, report.train_accuracy, report.test_accuracy
        );
        fs::write(self.report_path(report.epoch), text)?;

        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        model
            .clone()
            .save_file(self.checkpoint_path(report.epoch), &recorder)
            .map_err(|e| anyhow::anyhow!("failed to save checkpoint: {e}"))?;
        Ok(())
    }
}

/// Reload a classifier checkpoint on the training backend.
pub fn load_classifier_from_checkpoint<P: AsRef<Path>>(
    config: &ClassifierConfig,
    path: P,
    device: &<TrainBackend as Backend>::Device,
) -> anyhow::Result<TamperClassifier<TrainBackend>> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    let path = path.as_ref();
    // The recorder appends its own extension; strip one if present.
    let stem = if path.extension().is_some() {
        path.with_extension("")
    } else {
        path.to_path_buf()
    };
    TamperClassifier::<TrainBackend>::new(config, device)
        .load_file(stem, &recorder, device)
        .map_err(|e| anyhow::anyhow!("failed to load checkpoint {:?}: {e}", path))
}
