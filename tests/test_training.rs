//! End-to-end training tests
//!
//! This file covers:
//! - One Adam step at lr 0.001 lowers the loss on a fixed batch
//! - Evaluation never changes parameters
//! - fit() history, best-validation tracking and checkpoint writes

use cnn_from_scratch::checkpoint::load_params;
use cnn_from_scratch::config::OptimizerKind;
use cnn_from_scratch::layers::Activation;
use cnn_from_scratch::optimizers::{Adam, AdamConfig};
use cnn_from_scratch::utils::SimpleRng;
use cnn_from_scratch::{Batch, CrossEntropyLoss, LeNet5, LeNet5Config, Trainer, TrainingConfig};
use ndarray::{Array2, Array4};
use tempfile::tempdir;

fn config() -> LeNet5Config {
    LeNet5Config {
        input_height: 16,
        input_width: 16,
        num_classes: 2,
        kernel_size: 3,
        conv1_filters: 4,
        conv2_filters: 8,
        fc1_units: 32,
        fc2_units: 16,
        activation: Activation::Tanh,
        ..LeNet5Config::default()
    }
}

// Class 0: horizontal stripes, class 1: vertical stripes.
fn stripes_batch(classes: &[usize], rng: &mut SimpleRng) -> Batch {
    let n = classes.len();
    let mut images = Array4::zeros((n, 1, 16, 16));
    let mut labels = Array2::zeros((n, 2));
    for (i, &class) in classes.iter().enumerate() {
        let phase = rng.gen_usize(4);
        for y in 0..16 {
            for x in 0..16 {
                let coord = if class == 0 { y } else { x };
                let base = if (coord + phase) % 4 < 2 { 0.9 } else { 0.1 };
                images[[i, 0, y, x]] = base + rng.gen_range_f64(-0.05, 0.05);
            }
        }
        labels[[i, class]] = 1.0;
    }
    Batch::new(images, labels).unwrap()
}

fn batch_loss(model: &mut LeNet5, batch: &Batch) -> f64 {
    let logits = model.forward(&batch.images.clone().into_dyn()).unwrap();
    CrossEntropyLoss::new()
        .get(&logits, &batch.labels.clone().into_dyn())
        .unwrap()
        .0
}

mod step_tests {
    use super::*;

    #[test]
    fn test_single_adam_step_reduces_loss() {
        let mut rng = SimpleRng::new(2024);
        let model = LeNet5::new(&config(), &mut rng).unwrap();
        let batch = stripes_batch(&[0, 1, 0, 1], &mut rng);

        let optimizer = Adam::new(AdamConfig::default(), &model.get_params());
        let mut trainer = Trainer::new(model, Box::new(optimizer));

        let step = trainer.train_step(&batch).unwrap();
        let mut model = trainer.into_model();
        let after = batch_loss(&mut model, &batch);

        assert!(step.loss.is_finite());
        assert!(
            after < step.loss,
            "loss did not decrease: before {} after {}",
            step.loss,
            after
        );
        assert_eq!(step.samples, 4);
    }

    #[test]
    fn test_train_step_updates_model_and_optimizer_together() {
        let mut rng = SimpleRng::new(7);
        let model = LeNet5::new(&config(), &mut rng).unwrap();
        let before = model.get_params();
        let batch = stripes_batch(&[1, 0, 0], &mut rng);

        let mut trainer = Trainer::from_config(model, &TrainingConfig::default());
        trainer.train_step(&batch).unwrap();

        assert_ne!(trainer.model().get_params(), before);
        assert_eq!(&trainer.model().get_params(), trainer.optimizer().params());
        assert_eq!(trainer.optimizer().step_count(), 1);
    }

    #[test]
    fn test_evaluate_leaves_parameters_untouched() {
        let mut rng = SimpleRng::new(8);
        let model = LeNet5::new(&config(), &mut rng).unwrap();
        let before = model.get_params();
        let batches = vec![
            stripes_batch(&[0, 1], &mut rng),
            stripes_batch(&[1, 1, 0], &mut rng),
        ];

        let mut trainer = Trainer::from_config(model, &TrainingConfig::default());
        let metrics = trainer.evaluate(&batches).unwrap();

        assert_eq!(metrics.samples, 5);
        assert!((0.0..=1.0).contains(&metrics.accuracy));
        assert_eq!(trainer.model().get_params(), before);
        assert_eq!(trainer.optimizer().step_count(), 0);
    }
}

mod fit_tests {
    use super::*;

    #[test]
    fn test_fit_saves_best_checkpoint() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoints/best.json");

        let mut rng = SimpleRng::new(99);
        let model = LeNet5::new(&config(), &mut rng).unwrap();
        let train: Vec<Batch> = (0..4)
            .map(|_| stripes_batch(&[0, 1, 1, 0], &mut rng))
            .collect();
        let validation = vec![stripes_batch(&[0, 1, 0, 1, 1, 0], &mut rng)];

        let training = TrainingConfig {
            learning_rate: 0.01,
            ..TrainingConfig::default()
        };
        let mut trainer = Trainer::from_config(model, &training);
        let history = trainer.fit(&train, &validation, 3, Some(path.as_path())).unwrap();

        assert_eq!(history.len(), 3);
        assert!(history[0].improved);
        assert_eq!(trainer.optimizer().step_count(), 12);

        let best = history
            .iter()
            .map(|record| record.validation.loss)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(trainer.best_validation_loss(), best);

        // The checkpoint holds the parameters from the best epoch.
        let mut restored = LeNet5::new(&config(), &mut SimpleRng::new(1)).unwrap();
        restored.set_params(&load_params(&path).unwrap()).unwrap();
        let metrics = Trainer::from_config(restored, &training)
            .evaluate(&validation)
            .unwrap();
        assert_eq!(metrics.loss, best);
    }

    #[test]
    fn test_fit_with_sgd_and_no_checkpoint() {
        let mut rng = SimpleRng::new(5);
        let model = LeNet5::new(&config(), &mut rng).unwrap();
        let train = vec![stripes_batch(&[0, 1], &mut rng)];
        let validation = vec![stripes_batch(&[1, 0], &mut rng)];

        let training = TrainingConfig {
            optimizer: OptimizerKind::Sgd,
            learning_rate: 0.05,
            ..TrainingConfig::default()
        };
        let mut trainer = Trainer::from_config(model, &training);
        let history = trainer.fit(&train, &validation, 2, None).unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[1].epoch, 2);
        assert_eq!(trainer.optimizer().step_count(), 2);
    }

    #[test]
    fn test_fit_requires_validation_data() {
        let mut rng = SimpleRng::new(5);
        let model = LeNet5::new(&config(), &mut rng).unwrap();
        let train = vec![stripes_batch(&[0, 1], &mut rng)];

        let mut trainer = Trainer::from_config(model, &TrainingConfig::default());
        assert!(trainer.fit(&train, &[], 1, None).is_err());
    }

    #[test]
    fn test_resume_restores_checkpoint() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("resume.json");

        let mut rng = SimpleRng::new(31);
        let model = LeNet5::new(&config(), &mut rng).unwrap();
        let train = vec![stripes_batch(&[0, 1, 0, 1], &mut rng)];
        let validation = vec![stripes_batch(&[1, 0], &mut rng)];

        let mut trainer = Trainer::from_config(model, &TrainingConfig::default());
        trainer.fit(&train, &validation, 1, Some(path.as_path())).unwrap();
        let trained = trainer.model().get_params();

        let fresh = LeNet5::new(&config(), &mut SimpleRng::new(77)).unwrap();
        let mut resumed = Trainer::from_config(fresh, &TrainingConfig::default());
        resumed.resume_from(&path).unwrap();

        assert_eq!(resumed.model().get_params(), trained);
        assert_eq!(resumed.optimizer().params(), &trained);
    }
}
