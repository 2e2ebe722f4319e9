use crate::activation::Activation;
use crate::error::{Error, Result};
use ndarray::{Array, Array2};
use ndarray_rand::RandomExt;
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::StandardNormal;

/// One fully-connected layer: a `[units x fan_in]` weight matrix and a
/// `[units x 1]` bias column.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub weights: Array2<f64>,
    pub bias: Array2<f64>,
}

/// The parameter store: an ordered sequence of layers, index 0 being the
/// layer fed directly by the input. Created once per run (or loaded from a
/// checkpoint), mutated in place by the optimizer on every batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    pub layers: Vec<Layer>,
}

impl Parameters {
    /// Concatenate `[input] + hidden + [output]` into per-layer unit counts,
    /// rejecting any non-positive size.
    pub fn layer_units(hidden: &[usize], input: usize, output: usize) -> Result<Vec<usize>> {
        let units: Vec<usize> = std::iter::once(input)
            .chain(hidden.iter().copied())
            .chain(std::iter::once(output))
            .collect();
        if units.iter().any(|&u| u == 0) {
            return Err(Error::InvalidConfig(format!(
                "every layer needs at least one unit, got {units:?}"
            )));
        }
        Ok(units)
    }

    /// Allocate and initialize parameters for the given unit counts.
    ///
    /// Relu layers get the scaled-down Kaiming-style scheme
    /// `N(0,1) * 0.01 * sqrt(2 / (fan_in + fan_out))` with zero biases; every
    /// other activation draws both weights and biases from a standard normal.
    /// Deterministic for a fixed `rng` state.
    pub fn init<R: Rng + ?Sized>(
        units: &[usize],
        activation: Activation,
        rng: &mut R,
    ) -> Result<Parameters> {
        if units.len() < 2 {
            return Err(Error::InvalidConfig(
                "a network needs an input and an output layer".to_owned(),
            ));
        }
        if units.iter().any(|&u| u == 0) {
            return Err(Error::InvalidConfig(format!(
                "every layer needs at least one unit, got {units:?}"
            )));
        }

        let layers = units
            .windows(2)
            .map(|pair| {
                let (fan_in, fan_out) = (pair[0], pair[1]);
                match activation {
                    Activation::Relu => {
                        let scale = 0.01 * (2.0 / (fan_in + fan_out) as f64).sqrt();
                        Layer {
                            weights: Array::random_using((fan_out, fan_in), StandardNormal, rng)
                                * scale,
                            bias: Array2::zeros((fan_out, 1)),
                        }
                    }
                    _ => Layer {
                        weights: Array::random_using((fan_out, fan_in), StandardNormal, rng),
                        bias: Array::random_using((fan_out, 1), StandardNormal, rng),
                    },
                }
            })
            .collect();

        Ok(Parameters { layers })
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Input dimensionality expected by the first layer.
    pub fn input_units(&self) -> usize {
        self.layers[0].weights.ncols()
    }

    /// Output dimensionality produced by the last layer.
    pub fn output_units(&self) -> usize {
        self.layers[self.layers.len() - 1].weights.nrows()
    }
}

/// Gradient accumulator mirroring the parameter shapes. Owned exclusively by
/// the training loop: zeroed at every batch boundary, summed (not averaged)
/// across the examples of a batch in between.
#[derive(Debug, Clone)]
pub struct Gradients {
    pub layers: Vec<Layer>,
}

impl Gradients {
    pub fn zeros_like(params: &Parameters) -> Gradients {
        Gradients {
            layers: params
                .layers
                .iter()
                .map(|layer| Layer {
                    weights: Array2::zeros(layer.weights.raw_dim()),
                    bias: Array2::zeros(layer.bias.raw_dim()),
                })
                .collect(),
        }
    }

    /// Elementwise sum of another gradient of the same shape into this one.
    pub fn accumulate(&mut self, delta: &Gradients) {
        assert_eq!(
            self.layers.len(),
            delta.layers.len(),
            "gradient accumulator does not match the network depth"
        );
        for (acc, d) in self.layers.iter_mut().zip(&delta.layers) {
            acc.weights += &d.weights;
            acc.bias += &d.bias;
        }
    }

    pub fn reset(&mut self) {
        for layer in &mut self.layers {
            layer.weights.fill(0.0);
            layer.bias.fill(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand::rngs::StdRng;

    #[test]
    fn layer_units_concatenates_and_rejects_zero_sizes() {
        let units = Parameters::layer_units(&[50, 100, 150], 784, 10).unwrap();
        assert_eq!(units, vec![784, 50, 100, 150, 10]);
        assert!(Parameters::layer_units(&[50, 0], 784, 10).is_err());
    }

    #[test]
    fn init_shapes_follow_adjacent_unit_counts() {
        let mut rng = StdRng::seed_from_u64(1234);
        let params = Parameters::init(&[3, 4, 2], Activation::Sigmoid, &mut rng).unwrap();
        assert_eq!(params.num_layers(), 2);
        assert_eq!(params.layers[0].weights.dim(), (4, 3));
        assert_eq!(params.layers[0].bias.dim(), (4, 1));
        assert_eq!(params.layers[1].weights.dim(), (2, 4));
        assert_eq!(params.input_units(), 3);
        assert_eq!(params.output_units(), 2);
    }

    #[test]
    fn relu_init_zeroes_biases_and_scales_weights_down() {
        let mut rng = StdRng::seed_from_u64(1234);
        let params = Parameters::init(&[100, 50, 10], Activation::Relu, &mut rng).unwrap();
        for layer in &params.layers {
            assert!(layer.bias.iter().all(|&b| b == 0.0));
            // 0.01 * sqrt(2 / 150) bounds the magnitude well below a unit.
            assert!(layer.weights.iter().all(|&w| w.abs() < 0.1));
        }
    }

    #[test]
    fn init_is_deterministic_for_a_fixed_seed() {
        let mut rng_a = StdRng::seed_from_u64(1234);
        let mut rng_b = StdRng::seed_from_u64(1234);
        let a = Parameters::init(&[5, 4, 3], Activation::Tanh, &mut rng_a).unwrap();
        let b = Parameters::init(&[5, 4, 3], Activation::Tanh, &mut rng_b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn gradients_accumulate_by_summation_and_reset_to_zero() {
        let mut rng = StdRng::seed_from_u64(7);
        let params = Parameters::init(&[2, 3], Activation::Sigmoid, &mut rng).unwrap();
        let mut acc = Gradients::zeros_like(&params);
        let mut delta = Gradients::zeros_like(&params);
        delta.layers[0].weights.fill(1.5);
        delta.layers[0].bias.fill(-2.0);

        acc.accumulate(&delta);
        acc.accumulate(&delta);
        assert!(acc.layers[0].weights.iter().all(|&g| g == 3.0));
        assert!(acc.layers[0].bias.iter().all(|&g| g == -4.0));

        acc.reset();
        assert!(acc.layers[0].weights.iter().all(|&g| g == 0.0));
        assert!(acc.layers[0].bias.iter().all(|&g| g == 0.0));
    }
}
