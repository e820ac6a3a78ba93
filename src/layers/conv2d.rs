//! 2D Convolutional layer implementation
//!
//! This module provides a Conv2DLayer that performs 2D convolution operations,
//! commonly used in computer vision tasks like image classification.
//!
//! The forward pass unrolls each padded input image into columns (one column
//! per output position) and multiplies by the kernel matrix. The backward pass
//! reuses those columns for the kernel gradient and scatters the column
//! gradient back into image space for the input gradient, which is the same
//! result as a full convolution of the output gradient with the flipped
//! kernels.

use crate::error::{NetError, Result};
use crate::layers::{Layer, LayerGradients};
use crate::utils::rng::{xavier_limit, SimpleRng};
use ndarray::{s, Array1, Array2, Array4, ArrayD, ArrayViewD, Axis, Ix1, Ix4};

/// 2D Convolutional layer with learnable filters.
///
/// Input is `[batch, in_channels, height, width]`, output is
/// `[batch, out_channels, out_height, out_width]` where
///
/// ```text
/// out = floor((in + 2 * padding - kernel_size) / stride) + 1
/// ```
///
/// # Fields
///
/// * `weights` - Convolutional filters `[out_channels, in_channels, k, k]`
/// * `biases` - One bias per output channel `[out_channels]`
/// * `cache` - Unrolled input columns from the last forward call
///
/// # Example
///
/// ```ignore
/// let mut rng = SimpleRng::new(42);
/// // 1 input channel, 6 filters of 5x5, no padding, stride 1
/// let layer = Conv2DLayer::new("conv1", 1, 6, 5, 0, 1, &mut rng);
/// assert_eq!(layer.output_shape(&[8, 1, 32, 32])?, vec![8, 6, 28, 28]);
/// ```
pub struct Conv2DLayer {
    name: String,
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    padding: usize,
    stride: usize,
    weights: Array4<f64>,
    biases: Array1<f64>,
    cache: Option<ConvCache>,
}

struct ConvCache {
    input_dim: (usize, usize, usize, usize),
    out_hw: (usize, usize),
    // One [in_channels * k * k, out_h * out_w] matrix per batch element.
    columns: Vec<Array2<f64>>,
}

impl Conv2DLayer {
    /// Create a new Conv2DLayer with Xavier initialization.
    ///
    /// `fan_in = in_channels × k²`, `fan_out = out_channels × k²`; weights are
    /// drawn from U[-limit, limit) with `limit = sqrt(6 / (fan_in + fan_out))`.
    /// Biases start at zero.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        padding: usize,
        stride: usize,
        rng: &mut SimpleRng,
    ) -> Self {
        let area = kernel_size * kernel_size;
        let limit = xavier_limit(in_channels * area, out_channels * area);
        let weights = Array4::from_shape_simple_fn(
            (out_channels, in_channels, kernel_size, kernel_size),
            || rng.gen_range_f64(-limit, limit),
        );

        Self {
            name: name.into(),
            in_channels,
            out_channels,
            kernel_size,
            padding,
            stride,
            weights,
            biases: Array1::zeros(out_channels),
            cache: None,
        }
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn weights(&self) -> &Array4<f64> {
        &self.weights
    }

    pub fn biases(&self) -> &Array1<f64> {
        &self.biases
    }

    /// Output spatial size along one axis, or `None` if the kernel does not fit.
    pub fn output_extent(&self, input: usize) -> Option<usize> {
        let padded = input + 2 * self.padding;
        if self.stride == 0 || self.kernel_size == 0 || padded < self.kernel_size {
            return None;
        }
        Some((padded - self.kernel_size) / self.stride + 1)
    }

    fn check_geometry(&self) -> Result<()> {
        if self.kernel_size == 0 || self.stride == 0 {
            return Err(NetError::InvalidConfig(format!(
                "{}: kernel_size and stride must be positive, got {} and {}",
                self.name, self.kernel_size, self.stride
            )));
        }
        Ok(())
    }

    fn expected_input(&self) -> String {
        format!("[N, {}, H, W]", self.in_channels)
    }

    fn kernel_matrix(&self) -> Result<Array2<f64>> {
        let rows = self.in_channels * self.kernel_size * self.kernel_size;
        Ok(self
            .weights
            .as_standard_layout()
            .into_owned()
            .into_shape((self.out_channels, rows))?)
    }

    fn unroll(&self, padded: &Array4<f64>, b: usize, out_h: usize, out_w: usize) -> Array2<f64> {
        let k = self.kernel_size;
        let mut columns = Array2::<f64>::zeros((self.in_channels * k * k, out_h * out_w));
        for ci in 0..self.in_channels {
            for ky in 0..k {
                for kx in 0..k {
                    let row = (ci * k + ky) * k + kx;
                    for oy in 0..out_h {
                        for ox in 0..out_w {
                            columns[[row, oy * out_w + ox]] =
                                padded[[b, ci, oy * self.stride + ky, ox * self.stride + kx]];
                        }
                    }
                }
            }
        }
        columns
    }
}

impl Layer for Conv2DLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&mut self, input: &ArrayD<f64>) -> Result<ArrayD<f64>> {
        self.cache = None;
        self.check_geometry()?;

        let x = input
            .view()
            .into_dimensionality::<Ix4>()
            .map_err(|_| NetError::shape(&self.name, self.expected_input(), input.shape()))?;
        let (batch, channels, height, width) = x.dim();
        if channels != self.in_channels {
            return Err(NetError::shape(&self.name, self.expected_input(), input.shape()));
        }
        let (out_h, out_w) = match (self.output_extent(height), self.output_extent(width)) {
            (Some(h), Some(w)) => (h, w),
            _ => {
                return Err(NetError::shape(
                    &self.name,
                    format!("spatial size >= {} after padding", self.kernel_size),
                    input.shape(),
                ))
            }
        };

        let p = self.padding;
        let mut padded = Array4::<f64>::zeros((batch, channels, height + 2 * p, width + 2 * p));
        padded
            .slice_mut(s![.., .., p..p + height, p..p + width])
            .assign(&x);

        let kernels = self.kernel_matrix()?;
        let bias_column = self.biases.view().insert_axis(Axis(1));
        let mut output = Array4::<f64>::zeros((batch, self.out_channels, out_h, out_w));
        let mut columns = Vec::with_capacity(batch);

        for b in 0..batch {
            let cols = self.unroll(&padded, b, out_h, out_w);
            let out_b = kernels.dot(&cols) + &bias_column;
            output
                .slice_mut(s![b, .., .., ..])
                .assign(&out_b.as_standard_layout().into_owned().into_shape((self.out_channels, out_h, out_w))?);
            columns.push(cols);
        }

        self.cache = Some(ConvCache {
            input_dim: (batch, channels, height, width),
            out_hw: (out_h, out_w),
            columns,
        });
        Ok(output.into_dyn())
    }

    fn backward(&mut self, grad_output: &ArrayD<f64>) -> Result<LayerGradients> {
        let cache = self.cache.take().ok_or_else(|| NetError::stale(&self.name))?;
        let (batch, channels, height, width) = cache.input_dim;
        let (out_h, out_w) = cache.out_hw;

        let expected = [batch, self.out_channels, out_h, out_w];
        if grad_output.shape() != expected {
            return Err(NetError::shape(
                &self.name,
                format!("{:?}", expected),
                grad_output.shape(),
            ));
        }
        let grad = grad_output.view().into_dimensionality::<Ix4>()?;

        let k = self.kernel_size;
        let p = self.padding;
        let kernels = self.kernel_matrix()?;
        let mut grad_kernels = Array2::<f64>::zeros(kernels.dim());
        let mut grad_padded = Array4::<f64>::zeros((batch, channels, height + 2 * p, width + 2 * p));

        for (b, cols) in cache.columns.iter().enumerate() {
            // Reshape in logical order whatever the caller's memory layout.
            let g_b = grad
                .slice(s![b, .., .., ..])
                .as_standard_layout()
                .into_owned()
                .into_shape((self.out_channels, out_h * out_w))?;

            grad_kernels += &g_b.dot(&cols.t());

            // Scatter column gradients back onto the padded input grid.
            let grad_cols = kernels.t().dot(&g_b);
            for ci in 0..channels {
                for ky in 0..k {
                    for kx in 0..k {
                        let row = (ci * k + ky) * k + kx;
                        for oy in 0..out_h {
                            for ox in 0..out_w {
                                grad_padded[[b, ci, oy * self.stride + ky, ox * self.stride + kx]] +=
                                    grad_cols[[row, oy * out_w + ox]];
                            }
                        }
                    }
                }
            }
        }

        let grad_input = grad_padded
            .slice(s![.., .., p..p + height, p..p + width])
            .to_owned();
        let grad_weights = grad_kernels.into_shape((self.out_channels, channels, k, k))?;
        let grad_biases = grad.sum_axis(Axis(3)).sum_axis(Axis(2)).sum_axis(Axis(0));

        Ok(LayerGradients {
            input: grad_input.into_dyn(),
            params: vec![
                ("weight", grad_weights.into_dyn()),
                ("bias", grad_biases.into_dyn()),
            ],
        })
    }

    fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        self.check_geometry()?;
        match input_shape {
            &[batch, channels, height, width] if channels == self.in_channels => {
                match (self.output_extent(height), self.output_extent(width)) {
                    (Some(h), Some(w)) => Ok(vec![batch, self.out_channels, h, w]),
                    _ => Err(NetError::shape(
                        &self.name,
                        format!("spatial size >= {} after padding", self.kernel_size),
                        input_shape,
                    )),
                }
            }
            _ => Err(NetError::shape(&self.name, self.expected_input(), input_shape)),
        }
    }

    fn params(&self) -> Vec<(&'static str, ArrayViewD<'_, f64>)> {
        vec![
            ("weight", self.weights.view().into_dyn()),
            ("bias", self.biases.view().into_dyn()),
        ]
    }

    fn set_param(&mut self, name: &str, value: &ArrayD<f64>) -> Result<()> {
        match name {
            "weight" if value.shape() == self.weights.shape() => {
                self.weights.assign(&value.view().into_dimensionality::<Ix4>()?);
                Ok(())
            }
            "bias" if value.shape() == self.biases.shape() => {
                self.biases.assign(&value.view().into_dimensionality::<Ix1>()?);
                Ok(())
            }
            "weight" | "bias" => Err(NetError::ParameterMismatch(format!(
                "{}.{} cannot take shape {:?}",
                self.name,
                name,
                value.shape()
            ))),
            _ => Err(NetError::ParameterMismatch(format!(
                "{} has no parameter '{}'",
                self.name, name
            ))),
        }
    }
}
