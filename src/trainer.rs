//! Training loop: forward, loss, backward, optimizer update, write-back.
//!
//! Batching and dataset preparation happen upstream; the trainer consumes
//! ready [`Batch`]es of normalized images with one-hot labels.

use crate::checkpoint::save_model;
use crate::config::TrainingConfig;
use crate::error::{NetError, Result};
use crate::loss::CrossEntropyLoss;
use crate::model::LeNet5;
use crate::optimizers::{self, Optimizer};
use ndarray::{Array2, Array4, ArrayD, Axis, Ix2};
use std::path::Path;
use tracing::{debug, info};

/// One minibatch: `[N, C, H, W]` images and `[N, classes]` one-hot labels.
#[derive(Debug, Clone)]
pub struct Batch {
    pub images: Array4<f64>,
    pub labels: Array2<f64>,
}

impl Batch {
    /// Pair images with labels, checking they describe the same samples.
    pub fn new(images: Array4<f64>, labels: Array2<f64>) -> Result<Self> {
        if images.shape()[0] != labels.nrows() || labels.nrows() == 0 {
            return Err(NetError::shape(
                "batch labels",
                format!("[{}, classes]", images.shape()[0]),
                labels.shape(),
            ));
        }
        Ok(Self { images, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of a single optimization step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMetrics {
    /// Mean loss over the batch, measured before the update
    pub loss: f64,
    pub correct: usize,
    pub samples: usize,
}

/// Loss and accuracy aggregated over several batches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    /// Mean per-sample loss
    pub loss: f64,
    pub accuracy: f64,
    pub samples: usize,
}

#[derive(Debug, Default)]
struct Accumulator {
    loss_sum: f64,
    correct: usize,
    samples: usize,
}

impl Accumulator {
    fn add(&mut self, loss: f64, correct: usize, samples: usize) {
        self.loss_sum += loss * samples as f64;
        self.correct += correct;
        self.samples += samples;
    }

    fn finish(self) -> Result<EpochMetrics> {
        if self.samples == 0 {
            return Err(NetError::InvalidConfig("no samples to aggregate".to_string()));
        }
        Ok(EpochMetrics {
            loss: self.loss_sum / self.samples as f64,
            accuracy: self.correct as f64 / self.samples as f64,
            samples: self.samples,
        })
    }
}

/// Per-epoch history entry returned by [`Trainer::fit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train: EpochMetrics,
    pub validation: EpochMetrics,
    /// Validation loss beat every previous epoch (a checkpoint was written
    /// if a path was given)
    pub improved: bool,
}

/// Number of rows whose largest logit sits on the labelled class.
pub fn count_correct(logits: &ArrayD<f64>, labels: &Array2<f64>) -> Result<usize> {
    let logits = logits
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| NetError::shape("accuracy logits", "[N, classes]", logits.shape()))?;
    if logits.shape() != labels.shape() {
        return Err(NetError::shape(
            "accuracy labels",
            format!("{:?}", logits.shape()),
            labels.shape(),
        ));
    }

    let correct = logits
        .axis_iter(Axis(0))
        .zip(labels.axis_iter(Axis(0)))
        .filter(|(scores, truth)| argmax(scores.iter()) == argmax(truth.iter()))
        .count();
    Ok(correct)
}

// First index wins on ties.
fn argmax<'a>(values: impl Iterator<Item = &'a f64>) -> Option<usize> {
    values
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Owns a model and an optimizer and drives them over batches.
pub struct Trainer {
    model: LeNet5,
    optimizer: Box<dyn Optimizer>,
    loss: CrossEntropyLoss,
    best_validation_loss: f64,
}

impl Trainer {
    /// The optimizer must track the model's current parameters.
    pub fn new(model: LeNet5, optimizer: Box<dyn Optimizer>) -> Self {
        Self {
            model,
            optimizer,
            loss: CrossEntropyLoss::new(),
            best_validation_loss: f64::INFINITY,
        }
    }

    /// Build the optimizer named in `config` around the model's parameters.
    pub fn from_config(model: LeNet5, config: &TrainingConfig) -> Self {
        let optimizer = optimizers::build(config, &model.get_params());
        Self::new(model, optimizer)
    }

    pub fn model(&self) -> &LeNet5 {
        &self.model
    }

    pub fn optimizer(&self) -> &dyn Optimizer {
        self.optimizer.as_ref()
    }

    pub fn into_model(self) -> LeNet5 {
        self.model
    }

    /// Lowest validation loss seen by [`Trainer::fit`], `+∞` before the first epoch.
    pub fn best_validation_loss(&self) -> f64 {
        self.best_validation_loss
    }

    /// Load a checkpoint into both the model and the optimizer's tracked copy.
    pub fn resume_from(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let params = crate::checkpoint::load_params(path)?;
        self.optimizer.load_params(&params)?;
        self.model.set_params(&params)?;
        Ok(())
    }

    /// One optimization step on `batch`.
    pub fn train_step(&mut self, batch: &Batch) -> Result<StepMetrics> {
        let logits = self.model.forward(&batch.images.clone().into_dyn())?;
        let (loss, seed) = self.loss.get(&logits, &batch.labels.clone().into_dyn())?;
        let correct = count_correct(&logits, &batch.labels)?;

        let grads = self.model.backward(&seed)?;
        let params = self.optimizer.update_params(&grads)?;
        self.model.set_params(&params)?;

        debug!(
            step = self.optimizer.step_count(),
            loss,
            correct,
            samples = batch.len(),
            "train step"
        );
        Ok(StepMetrics {
            loss,
            correct,
            samples: batch.len(),
        })
    }

    /// Loss and accuracy over `batches` without touching any parameter.
    pub fn evaluate(&mut self, batches: &[Batch]) -> Result<EpochMetrics> {
        let mut acc = Accumulator::default();
        for batch in batches {
            let logits = self.model.forward(&batch.images.clone().into_dyn())?;
            let (loss, _) = self.loss.get(&logits, &batch.labels.clone().into_dyn())?;
            acc.add(loss, count_correct(&logits, &batch.labels)?, batch.len());
        }
        acc.finish()
    }

    /// Train for `epochs` passes over `train`, evaluating on `validation`
    /// after each one.
    ///
    /// Whenever validation loss improves on the best so far the model is
    /// saved to `checkpoint` (if given).
    pub fn fit(
        &mut self,
        train: &[Batch],
        validation: &[Batch],
        epochs: usize,
        checkpoint: Option<&Path>,
    ) -> Result<Vec<EpochRecord>> {
        let mut history = Vec::with_capacity(epochs);

        for epoch in 1..=epochs {
            let mut acc = Accumulator::default();
            for batch in train {
                let step = self.train_step(batch)?;
                acc.add(step.loss, step.correct, step.samples);
            }
            let train_metrics = acc.finish()?;
            let validation_metrics = self.evaluate(validation)?;

            info!(
                epoch,
                epochs,
                train_loss = train_metrics.loss,
                train_accuracy = train_metrics.accuracy,
                val_loss = validation_metrics.loss,
                val_accuracy = validation_metrics.accuracy,
                "epoch complete"
            );

            let improved = validation_metrics.loss < self.best_validation_loss;
            if improved {
                self.best_validation_loss = validation_metrics.loss;
                if let Some(path) = checkpoint {
                    save_model(path, &self.model)?;
                    info!(
                        path = %path.display(),
                        val_loss = validation_metrics.loss,
                        "validation loss improved, checkpoint saved"
                    );
                }
            }

            history.push(EpochRecord {
                epoch,
                train: train_metrics,
                validation: validation_metrics,
                improved,
            });
        }

        Ok(history)
    }
}
