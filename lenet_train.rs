// lenet_train.rs
// Train LeNet-5 on a synthetic two-class dataset (horizontal vs vertical
// stripes) generated in memory, so the full pipeline runs without any
// downloads.
//
// Usage:
//   cargo run --release --bin lenet_train -- \
//       --config config/training_default.json \
//       --architecture config/architectures/lenet5.json \
//       --checkpoint checkpoints/lenet5_best.json
//
// Set RUST_LOG=debug to see per-step losses.

use anyhow::{ensure, Context, Result};
use clap::Parser;
use cnn_from_scratch::architecture::load_architecture;
use cnn_from_scratch::config::load_config;
use cnn_from_scratch::utils::SimpleRng;
use cnn_from_scratch::{Batch, LeNet5, LeNet5Config, Trainer, TrainingConfig};
use ndarray::{s, Array2, Array4};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lenet_train", about = "Train LeNet-5 with hand-written backprop")]
struct Args {
    /// Training configuration JSON (defaults apply when omitted).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Architecture JSON (classic 32x32 LeNet-5 with 2 classes when omitted).
    #[arg(long)]
    architecture: Option<PathBuf>,
    /// Override the number of epochs from the config.
    #[arg(long)]
    epochs: Option<usize>,
    /// Override the batch size from the config.
    #[arg(long)]
    batch_size: Option<usize>,
    /// Number of synthetic training samples.
    #[arg(long, default_value_t = 200)]
    samples: usize,
    /// Number of synthetic validation samples.
    #[arg(long, default_value_t = 50)]
    val_samples: usize,
    /// Where to save the best parameters (overrides the config).
    #[arg(long)]
    checkpoint: Option<PathBuf>,
    /// Start from a previously saved checkpoint.
    #[arg(long)]
    resume: Option<PathBuf>,
}

/// Stripe image for `class` 0 (horizontal) or 1 (vertical) with a random
/// phase and a little noise, values in [0, 1].
fn stripe_image(class: usize, config: &LeNet5Config, rng: &mut SimpleRng) -> Array4<f64> {
    let period = 4;
    let phase = rng.gen_usize(period);
    Array4::from_shape_fn(
        (1, config.in_channels, config.input_height, config.input_width),
        |(_, _, y, x)| {
            let coord = if class == 0 { y } else { x };
            let on = (coord + phase) % period < period / 2;
            let base = if on { 0.8 } else { 0.2 };
            (base + rng.gen_range_f64(-0.1, 0.1)).clamp(0.0, 1.0)
        },
    )
}

fn synthetic_batches(
    samples: usize,
    batch_size: usize,
    config: &LeNet5Config,
    rng: &mut SimpleRng,
) -> Result<Vec<Batch>> {
    let mut order: Vec<usize> = (0..samples).collect();
    rng.shuffle_usize(&mut order);

    let mut batches = Vec::new();
    for chunk in order.chunks(batch_size) {
        let mut images = Array4::zeros((
            chunk.len(),
            config.in_channels,
            config.input_height,
            config.input_width,
        ));
        let mut labels = Array2::zeros((chunk.len(), config.num_classes));
        for (row, &sample) in chunk.iter().enumerate() {
            let class = sample % 2;
            let image = stripe_image(class, config, rng);
            images.slice_mut(s![row..row + 1, .., .., ..]).assign(&image);
            labels[[row, class]] = 1.0;
        }
        batches.push(Batch::new(images, labels)?);
    }
    Ok(batches)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut training = match &args.config {
        Some(path) => load_config(path)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("loading training config {}", path.display()))?,
        None => TrainingConfig::default(),
    };
    if let Some(epochs) = args.epochs {
        training.epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        training.batch_size = batch_size;
    }
    if let Some(path) = &args.checkpoint {
        training.checkpoint_path = Some(path.clone());
    }
    ensure!(training.epochs > 0, "epochs must be greater than 0");
    ensure!(training.batch_size > 0, "batch_size must be greater than 0");

    let architecture = match &args.architecture {
        Some(path) => load_architecture(path)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("loading architecture {}", path.display()))?,
        None => LeNet5Config {
            num_classes: 2,
            ..LeNet5Config::default()
        },
    };
    ensure!(
        architecture.num_classes >= 2,
        "the stripe dataset needs at least 2 classes, architecture has {}",
        architecture.num_classes
    );

    let mut rng = SimpleRng::new(training.seed);
    let model = LeNet5::new(&architecture, &mut rng)?;
    info!(
        parameters = model.parameter_count(),
        optimizer = ?training.optimizer,
        learning_rate = training.learning_rate,
        "model initialized"
    );

    let train = synthetic_batches(args.samples, training.batch_size, &architecture, &mut rng)?;
    let validation =
        synthetic_batches(args.val_samples, training.batch_size, &architecture, &mut rng)?;
    ensure!(!train.is_empty(), "no training samples");
    ensure!(!validation.is_empty(), "no validation samples");

    let mut trainer = Trainer::from_config(model, &training);
    if let Some(path) = &args.resume {
        trainer
            .resume_from(path)
            .with_context(|| format!("resuming from {}", path.display()))?;
        info!(path = %path.display(), "resumed from checkpoint");
    }

    let start = Instant::now();
    let history = trainer.fit(
        &train,
        &validation,
        training.epochs,
        training.checkpoint_path.as_deref(),
    )?;

    if let Some(last) = history.last() {
        info!(
            epochs = history.len(),
            seconds = start.elapsed().as_secs_f64(),
            best_val_loss = trainer.best_validation_loss(),
            final_val_accuracy = last.validation.accuracy,
            "training finished"
        );
    }
    Ok(())
}
