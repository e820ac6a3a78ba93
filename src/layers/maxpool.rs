//! 2D max pooling with argmax routing
//!
//! Forward keeps the maximum of every window and remembers where it came
//! from; backward sends each output gradient to that single position.

use crate::error::{NetError, Result};
use crate::layers::{Layer, LayerGradients};
use ndarray::{Array4, ArrayD, Ix4};

/// Max pooling layer over `[batch, channels, height, width]` inputs.
///
/// Windows are `pool_size × pool_size` and move by `stride`. When a window
/// contains several equal maxima the first one in row-major scan order wins,
/// so gradient routing is deterministic.
pub struct MaxPoolLayer {
    name: String,
    pool_size: usize,
    stride: usize,
    cache: Option<PoolCache>,
}

struct PoolCache {
    input_dim: (usize, usize, usize, usize),
    // Row-major (y * width + x) position of each window's maximum.
    argmax: Array4<usize>,
}

impl MaxPoolLayer {
    pub fn new(name: impl Into<String>, pool_size: usize, stride: usize) -> Self {
        Self {
            name: name.into(),
            pool_size,
            stride,
            cache: None,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Output size along one axis, or `None` if no window fits.
    pub fn output_extent(&self, input: usize) -> Option<usize> {
        if self.pool_size == 0 || self.stride == 0 || input < self.pool_size {
            return None;
        }
        Some((input - self.pool_size) / self.stride + 1)
    }

    fn check_geometry(&self) -> Result<()> {
        if self.pool_size == 0 || self.stride == 0 {
            return Err(NetError::InvalidConfig(format!(
                "{}: pool_size and stride must be positive, got {} and {}",
                self.name, self.pool_size, self.stride
            )));
        }
        Ok(())
    }

    fn spatial_error(&self, shape: &[usize]) -> NetError {
        NetError::shape(
            &self.name,
            format!("[N, C, H, W] with H, W >= {}", self.pool_size),
            shape,
        )
    }
}

impl Layer for MaxPoolLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&mut self, input: &ArrayD<f64>) -> Result<ArrayD<f64>> {
        self.cache = None;
        self.check_geometry()?;

        let x = input
            .view()
            .into_dimensionality::<Ix4>()
            .map_err(|_| self.spatial_error(input.shape()))?;
        let (batch, channels, height, width) = x.dim();
        let (out_h, out_w) = match (self.output_extent(height), self.output_extent(width)) {
            (Some(h), Some(w)) => (h, w),
            _ => return Err(self.spatial_error(input.shape())),
        };

        let mut output = Array4::<f64>::zeros((batch, channels, out_h, out_w));
        let mut argmax = Array4::<usize>::zeros((batch, channels, out_h, out_w));

        for b in 0..batch {
            for c in 0..channels {
                for oy in 0..out_h {
                    for ox in 0..out_w {
                        let y0 = oy * self.stride;
                        let x0 = ox * self.stride;

                        let mut best = x[[b, c, y0, x0]];
                        let mut best_pos = y0 * width + x0;
                        for dy in 0..self.pool_size {
                            for dx in 0..self.pool_size {
                                let v = x[[b, c, y0 + dy, x0 + dx]];
                                // strict: ties keep the earlier position
                                if v > best {
                                    best = v;
                                    best_pos = (y0 + dy) * width + x0 + dx;
                                }
                            }
                        }

                        output[[b, c, oy, ox]] = best;
                        argmax[[b, c, oy, ox]] = best_pos;
                    }
                }
            }
        }

        self.cache = Some(PoolCache {
            input_dim: (batch, channels, height, width),
            argmax,
        });
        Ok(output.into_dyn())
    }

    fn backward(&mut self, grad_output: &ArrayD<f64>) -> Result<LayerGradients> {
        let cache = self.cache.take().ok_or_else(|| NetError::stale(&self.name))?;
        let (batch, channels, height, width) = cache.input_dim;

        if grad_output.shape() != cache.argmax.shape() {
            return Err(NetError::shape(
                &self.name,
                format!("{:?}", cache.argmax.shape()),
                grad_output.shape(),
            ));
        }
        let grad = grad_output.view().into_dimensionality::<Ix4>()?;

        let mut grad_input = Array4::<f64>::zeros((batch, channels, height, width));
        for ((b, c, oy, ox), &pos) in cache.argmax.indexed_iter() {
            grad_input[[b, c, pos / width, pos % width]] += grad[[b, c, oy, ox]];
        }

        Ok(LayerGradients {
            input: grad_input.into_dyn(),
            params: Vec::new(),
        })
    }

    fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        self.check_geometry()?;
        match input_shape {
            &[batch, channels, height, width] => {
                match (self.output_extent(height), self.output_extent(width)) {
                    (Some(h), Some(w)) => Ok(vec![batch, channels, h, w]),
                    _ => Err(self.spatial_error(input_shape)),
                }
            }
            _ => Err(self.spatial_error(input_shape)),
        }
    }
}
