// Tests for numerical gradient checking using finite differences.
// Analytical gradients from every backward pass are compared with centered
// differences of a scalar objective computed through forward passes only.

use cnn_from_scratch::layers::{
    Activation, ActivationLayer, Conv2DLayer, DenseLayer, FlattenLayer, Layer, MaxPoolLayer,
};
use cnn_from_scratch::utils::SimpleRng;
use cnn_from_scratch::{CrossEntropyLoss, LeNet5, LeNet5Config};
use ndarray::{Array2, ArrayD, IxDyn};

const EPSILON: f64 = 1e-6;
const TOLERANCE: f64 = 1e-4;

fn random_array(shape: &[usize], rng: &mut SimpleRng) -> ArrayD<f64> {
    ArrayD::from_shape_simple_fn(IxDyn(shape), || rng.gen_range_f64(-1.0, 1.0))
}

// Values in [0.05, 1.0) with random sign, so ReLU never sits on its kink.
fn away_from_zero(shape: &[usize], rng: &mut SimpleRng) -> ArrayD<f64> {
    ArrayD::from_shape_simple_fn(IxDyn(shape), || {
        let magnitude = rng.gen_range_f64(0.05, 1.0);
        if rng.next_f64() < 0.5 {
            -magnitude
        } else {
            magnitude
        }
    })
}

fn relative_error(analytic: f64, numeric: f64) -> f64 {
    (analytic - numeric).abs() / (analytic.abs() + numeric.abs()).max(1e-6)
}

// Objective used for single layers: L = Σ output ⊙ upstream, so dL/doutput = upstream.
fn objective(layer: &mut dyn Layer, input: &ArrayD<f64>, upstream: &ArrayD<f64>) -> f64 {
    let output = layer.forward(input).unwrap();
    (&output * upstream).sum()
}

/// Check input and parameter gradients of one layer; returns the worst relative error.
fn check_layer(layer: &mut dyn Layer, input: &ArrayD<f64>, rng: &mut SimpleRng) -> f64 {
    let output = layer.forward(input).unwrap();
    let upstream = random_array(output.shape(), rng);
    let grads = layer.backward(&upstream).unwrap();
    assert_eq!(grads.input.shape(), input.shape());

    let mut worst: f64 = 0.0;

    for (idx, &analytic) in grads.input.indexed_iter() {
        let mut plus = input.clone();
        plus[idx.clone()] += EPSILON;
        let mut minus = input.clone();
        minus[idx] -= EPSILON;

        let numeric = (objective(layer, &plus, &upstream) - objective(layer, &minus, &upstream))
            / (2.0 * EPSILON);
        worst = worst.max(relative_error(analytic, numeric));
    }

    for (name, grad) in &grads.params {
        let original = layer
            .params()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.to_owned())
            .unwrap();
        assert_eq!(grad.shape(), original.shape());

        for (idx, &analytic) in grad.indexed_iter() {
            let mut perturbed = original.clone();
            perturbed[idx.clone()] += EPSILON;
            layer.set_param(name, &perturbed).unwrap();
            let loss_plus = objective(layer, input, &upstream);

            perturbed[idx] -= 2.0 * EPSILON;
            layer.set_param(name, &perturbed).unwrap();
            let loss_minus = objective(layer, input, &upstream);

            layer.set_param(name, &original).unwrap();
            let numeric = (loss_plus - loss_minus) / (2.0 * EPSILON);
            worst = worst.max(relative_error(analytic, numeric));
        }
    }

    worst
}

// ============================================================================
// Single layer gradients
// ============================================================================

mod layer_gradient_tests {
    use super::*;

    #[test]
    fn test_conv2d_gradients() {
        let mut rng = SimpleRng::new(11);
        let mut conv = Conv2DLayer::new("conv", 2, 3, 3, 0, 1, &mut rng);
        let input = random_array(&[2, 2, 6, 6], &mut rng);

        let worst = check_layer(&mut conv, &input, &mut rng);
        assert!(worst < TOLERANCE, "conv2d relative error {}", worst);
    }

    #[test]
    fn test_conv2d_gradients_with_stride_and_padding() {
        let mut rng = SimpleRng::new(12);
        let mut conv = Conv2DLayer::new("conv", 2, 3, 3, 1, 2, &mut rng);
        let input = random_array(&[2, 2, 7, 7], &mut rng);

        let worst = check_layer(&mut conv, &input, &mut rng);
        assert!(worst < TOLERANCE, "strided conv2d relative error {}", worst);
    }

    #[test]
    fn test_conv2d_gradients_even_kernel_uneven_stride() {
        let mut rng = SimpleRng::new(13);
        let mut conv = Conv2DLayer::new("conv", 1, 2, 2, 2, 3, &mut rng);
        let input = random_array(&[1, 1, 8, 5], &mut rng);

        let worst = check_layer(&mut conv, &input, &mut rng);
        assert!(worst < TOLERANCE, "padded conv2d relative error {}", worst);
    }

    #[test]
    fn test_dense_gradients() {
        let mut rng = SimpleRng::new(21);
        let mut dense = DenseLayer::new("fc", 5, 4, &mut rng);
        let input = random_array(&[3, 5], &mut rng);

        let worst = check_layer(&mut dense, &input, &mut rng);
        assert!(worst < TOLERANCE, "dense relative error {}", worst);
    }

    #[test]
    fn test_activation_gradients() {
        for activation in [Activation::Relu, Activation::Sigmoid, Activation::Tanh] {
            let mut rng = SimpleRng::new(31);
            let mut layer = ActivationLayer::new("act", activation);
            let input = away_from_zero(&[3, 2, 4], &mut rng);

            let worst = check_layer(&mut layer, &input, &mut rng);
            assert!(worst < TOLERANCE, "{} relative error {}", activation, worst);
        }
    }

    #[test]
    fn test_maxpool_gradients() {
        let mut rng = SimpleRng::new(41);
        let mut pool = MaxPoolLayer::new("pool", 2, 2);
        // Distinct random values keep every window's maximum unambiguous.
        let input = random_array(&[2, 3, 6, 6], &mut rng);

        let worst = check_layer(&mut pool, &input, &mut rng);
        assert!(worst < TOLERANCE, "maxpool relative error {}", worst);
    }

    #[test]
    fn test_overlapping_maxpool_gradients() {
        let mut rng = SimpleRng::new(42);
        let mut pool = MaxPoolLayer::new("pool", 3, 1);
        let input = random_array(&[1, 2, 5, 5], &mut rng);

        let worst = check_layer(&mut pool, &input, &mut rng);
        assert!(worst < TOLERANCE, "overlapping maxpool relative error {}", worst);
    }

    #[test]
    fn test_flatten_gradients() {
        let mut rng = SimpleRng::new(51);
        let mut flatten = FlattenLayer::new("flatten");
        let input = random_array(&[2, 3, 2, 2], &mut rng);

        let worst = check_layer(&mut flatten, &input, &mut rng);
        assert!(worst < TOLERANCE, "flatten relative error {}", worst);
    }
}

// ============================================================================
// Whole model gradients
// ============================================================================

mod model_gradient_tests {
    use super::*;

    fn tiny_config(activation: Activation) -> LeNet5Config {
        // 12x12 -> conv 10x10 -> pool 5x5 -> conv 3x3 -> pool 1x1
        LeNet5Config {
            input_height: 12,
            input_width: 12,
            num_classes: 3,
            kernel_size: 3,
            conv1_filters: 2,
            conv2_filters: 3,
            fc1_units: 6,
            fc2_units: 4,
            activation,
            ..LeNet5Config::default()
        }
    }

    fn one_hot(classes: &[usize], num_classes: usize) -> ArrayD<f64> {
        let mut labels = Array2::zeros((classes.len(), num_classes));
        for (row, &class) in classes.iter().enumerate() {
            labels[[row, class]] = 1.0;
        }
        labels.into_dyn()
    }

    fn model_loss(model: &mut LeNet5, input: &ArrayD<f64>, labels: &ArrayD<f64>) -> f64 {
        let logits = model.forward(input).unwrap();
        CrossEntropyLoss::new().get(&logits, labels).unwrap().0
    }

    #[test]
    fn test_model_parameter_gradients() {
        for activation in [Activation::Tanh, Activation::Sigmoid] {
            let mut rng = SimpleRng::new(61);
            let mut model = LeNet5::new(&tiny_config(activation), &mut rng).unwrap();
            let input = random_array(&[2, 1, 12, 12], &mut rng);
            let labels = one_hot(&[0, 2], 3);

            let logits = model.forward(&input).unwrap();
            let (_, seed) = CrossEntropyLoss::new().get(&logits, &labels).unwrap();
            let grads = model.backward(&seed).unwrap();

            let params = model.get_params();
            let mut worst: f64 = 0.0;
            for (name, grad) in grads.iter() {
                for (idx, &analytic) in grad.indexed_iter() {
                    let mut perturbed = params.clone();
                    perturbed.get_mut(name).unwrap()[idx.clone()] += EPSILON;
                    model.set_params(&perturbed).unwrap();
                    let loss_plus = model_loss(&mut model, &input, &labels);

                    perturbed.get_mut(name).unwrap()[idx] -= 2.0 * EPSILON;
                    model.set_params(&perturbed).unwrap();
                    let loss_minus = model_loss(&mut model, &input, &labels);

                    let numeric = (loss_plus - loss_minus) / (2.0 * EPSILON);
                    let err = relative_error(analytic, numeric);
                    assert!(
                        err < TOLERANCE,
                        "{} {}: analytic {} numeric {}",
                        activation,
                        name,
                        analytic,
                        numeric
                    );
                    worst = worst.max(err);
                }
            }
            model.set_params(&params).unwrap();
            assert!(worst < TOLERANCE);
        }
    }

    #[test]
    fn test_model_input_gradient() {
        let mut rng = SimpleRng::new(71);
        let mut model = LeNet5::new(&tiny_config(Activation::Tanh), &mut rng).unwrap();
        let input = random_array(&[2, 1, 12, 12], &mut rng);
        let labels = one_hot(&[1, 0], 3);

        let logits = model.forward(&input).unwrap();
        let (_, seed) = CrossEntropyLoss::new().get(&logits, &labels).unwrap();
        let (_, grad_input) = model.backward_with_input(&seed).unwrap();
        assert_eq!(grad_input.shape(), input.shape());

        for (idx, &analytic) in grad_input.indexed_iter() {
            let mut plus = input.clone();
            plus[idx.clone()] += EPSILON;
            let mut minus = input.clone();
            minus[idx] -= EPSILON;

            let numeric = (model_loss(&mut model, &plus, &labels)
                - model_loss(&mut model, &minus, &labels))
                / (2.0 * EPSILON);
            assert!(
                relative_error(analytic, numeric) < TOLERANCE,
                "input gradient: analytic {} numeric {}",
                analytic,
                numeric
            );
        }
    }
}
