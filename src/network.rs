use crate::activation::{Activation, softmax};
use crate::error::{Error, Result};
use crate::loss::Loss;
use crate::params::{Gradients, Parameters};
use itertools::Itertools;
use ndarray::{Array1, Array2, Axis};
use ndarray_rand::rand::Rng;

/// A fully-connected feedforward classifier: the parameter store plus the
/// activation choice shared by every hidden layer. The output layer is always
/// a softmax over the class logits.
#[derive(Debug, Clone)]
pub struct Network {
    pub params: Parameters,
    pub activation: Activation,
}

/// Everything one forward pass leaves behind for backpropagation.
///
/// `activations[0]` is the input itself (`h_0`), `activations[l]` the output
/// of layer `l`; `pre_activations[l - 1]` is `a_l = W_l h_{l-1} + b_l`. The
/// cache belongs to exactly one forward/backward pair and is dropped after
/// the gradient is computed.
#[derive(Debug, Clone)]
pub struct ForwardCache {
    pub activations: Vec<Array2<f64>>,
    pub pre_activations: Vec<Array2<f64>>,
}

impl Network {
    /// Build a freshly initialized network for `[input] + hidden + [output]`
    /// unit counts.
    pub fn new<R: Rng + ?Sized>(
        hidden: &[usize],
        input: usize,
        output: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Result<Network> {
        let units = Parameters::layer_units(hidden, input, output)?;
        let params = Parameters::init(&units, activation, rng)?;
        Ok(Network { params, activation })
    }

    /// Wrap parameters loaded from a checkpoint.
    pub fn from_parameters(params: Parameters, activation: Activation) -> Network {
        Network { params, activation }
    }

    /// Check that a data matrix pair is compatible with the first and last
    /// layers before any training step runs.
    pub fn check_data_shape(&self, inputs: &Array2<f64>, targets: &Array2<f64>) -> Result<()> {
        if inputs.nrows() != self.params.input_units() {
            return Err(Error::ShapeMismatch(format!(
                "input has {} features but the first layer expects {}",
                inputs.nrows(),
                self.params.input_units()
            )));
        }
        if targets.nrows() != self.params.output_units() {
            return Err(Error::ShapeMismatch(format!(
                "target has {} classes but the last layer produces {}",
                targets.nrows(),
                self.params.output_units()
            )));
        }
        if inputs.ncols() != targets.ncols() {
            return Err(Error::ShapeMismatch(format!(
                "{} input columns but {} target columns",
                inputs.ncols(),
                targets.ncols()
            )));
        }
        Ok(())
    }

    /// Run the network layer by layer, caching every intermediate value
    /// backpropagation needs. Each input column is one example; a batch runs
    /// column-parallel through the same matrix products.
    pub fn forward(&self, input: &Array2<f64>) -> (Array2<f64>, ForwardCache) {
        let layer_count = self.params.num_layers();
        let mut activations = Vec::with_capacity(layer_count + 1);
        let mut pre_activations = Vec::with_capacity(layer_count);

        activations.push(input.clone());
        for (l, layer) in self.params.layers.iter().enumerate() {
            let a = layer.weights.dot(&activations[l]) + &layer.bias;
            let h = if l + 1 == layer_count {
                softmax(&a)
            } else {
                self.activation.apply(&a)
            };
            pre_activations.push(a);
            activations.push(h);
        }

        let prediction = activations[layer_count].clone();
        (
            prediction,
            ForwardCache {
                activations,
                pre_activations,
            },
        )
    }

    /// Forward pass for a single flat example, treated as a one-column matrix.
    pub fn forward_single(&self, input: &Array1<f64>) -> (Array2<f64>, ForwardCache) {
        let column = input.view().insert_axis(Axis(1)).to_owned();
        self.forward(&column)
    }

    /// Reverse-mode gradient for a single example.
    ///
    /// Starting from the output-layer delta of the chosen loss, walk the
    /// layers backwards: `dW_l = da_l h_{l-1}^T`, `db_l = da_l`,
    /// `dh_{l-1} = W_l^T da_l`, `da_{l-1} = dh_{l-1} ⊙ activation'(a_{l-1})`.
    pub fn backward(
        &self,
        cache: &ForwardCache,
        target: &Array2<f64>,
        prediction: &Array2<f64>,
        loss: Loss,
    ) -> Gradients {
        let layer_count = self.params.num_layers();
        assert_eq!(
            cache.activations.len(),
            layer_count + 1,
            "forward cache is missing activation layers"
        );
        assert_eq!(
            cache.pre_activations.len(),
            layer_count,
            "forward cache is missing pre-activation layers"
        );
        assert_eq!(
            prediction.ncols(),
            1,
            "backward consumes one example at a time"
        );

        let mut grads = Gradients::zeros_like(&self.params);
        let mut da = loss.output_delta(prediction, target);

        for l in (1..=layer_count).rev() {
            grads.layers[l - 1].weights = da.dot(&cache.activations[l - 1].t());
            grads.layers[l - 1].bias = da.clone();
            if l > 1 {
                let dh = self.params.layers[l - 1].weights.t().dot(&da);
                da = dh * self.activation.derivative(&cache.pre_activations[l - 2]);
            }
        }

        grads
    }

    /// Predicted class index for every column of `inputs`.
    pub fn predict(&self, inputs: &Array2<f64>) -> Vec<usize> {
        let (prediction, _) = self.forward(inputs);
        prediction
            .columns()
            .into_iter()
            .map(|column| {
                column
                    .iter()
                    .position_max_by(|a, b| a.total_cmp(b))
                    .expect("the output layer has at least one unit")
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand::rngs::StdRng;

    #[test]
    fn forward_output_columns_sum_to_one_for_any_topology() {
        let mut rng = StdRng::seed_from_u64(1234);
        for hidden in [vec![], vec![4], vec![7, 5, 3]] {
            let net = Network::new(&hidden, 6, 10, Activation::Tanh, &mut rng).unwrap();
            let input = array![
                [0.1, -0.3],
                [0.9, 0.0],
                [0.4, 2.5],
                [-1.2, 0.8],
                [0.0, 0.0],
                [0.7, -0.7]
            ];
            let (prediction, cache) = net.forward(&input);
            assert_eq!(prediction.dim(), (10, 2));
            for column in prediction.columns() {
                assert!((column.sum() - 1.0).abs() < 1e-9);
            }
            assert_eq!(cache.activations.len(), net.params.num_layers() + 1);
            assert_eq!(cache.pre_activations.len(), net.params.num_layers());
        }
    }

    #[test]
    fn single_input_behaves_like_a_one_column_matrix() {
        let mut rng = StdRng::seed_from_u64(5);
        let net = Network::new(&[4], 3, 2, Activation::Sigmoid, &mut rng).unwrap();
        let flat = Array1::from_vec(vec![0.3, -0.1, 0.8]);
        let column = array![[0.3], [-0.1], [0.8]];
        let (from_flat, _) = net.forward_single(&flat);
        let (from_column, _) = net.forward(&column);
        assert_eq!(from_flat, from_column);
    }

    #[test]
    fn check_data_shape_fails_fast_on_mismatches() {
        let mut rng = StdRng::seed_from_u64(5);
        let net = Network::new(&[4], 3, 2, Activation::Sigmoid, &mut rng).unwrap();
        let good_x = Array2::zeros((3, 5));
        let good_y = Array2::zeros((2, 5));
        assert!(net.check_data_shape(&good_x, &good_y).is_ok());
        assert!(
            net.check_data_shape(&Array2::zeros((4, 5)), &good_y)
                .is_err()
        );
        assert!(
            net.check_data_shape(&good_x, &Array2::zeros((3, 5)))
                .is_err()
        );
        assert!(
            net.check_data_shape(&good_x, &Array2::zeros((2, 4)))
                .is_err()
        );
    }

    /// Compares every backpropagated gradient entry against a central finite
    /// difference of the loss.
    #[test]
    fn cross_entropy_gradient_matches_finite_differences() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut net = Network::new(&[4], 3, 2, Activation::Sigmoid, &mut rng).unwrap();
        let x = array![[0.2], [-0.4], [0.7]];
        let y = array![[1.0], [0.0]];

        let (yhat, cache) = net.forward(&x);
        let grads = net.backward(&cache, &y, &yhat, Loss::CrossEntropy);

        let eps = 1e-6;
        for l in 0..net.params.num_layers() {
            let weight_dim = net.params.layers[l].weights.raw_dim();
            for i in 0..weight_dim[0] {
                for j in 0..weight_dim[1] {
                    net.params.layers[l].weights[[i, j]] += eps;
                    let (plus, _) = net.forward(&x);
                    net.params.layers[l].weights[[i, j]] -= 2.0 * eps;
                    let (minus, _) = net.forward(&x);
                    net.params.layers[l].weights[[i, j]] += eps;

                    let numeric = (Loss::CrossEntropy.value(&plus, &y)
                        - Loss::CrossEntropy.value(&minus, &y))
                        / (2.0 * eps);
                    let analytic = grads.layers[l].weights[[i, j]];
                    assert!(
                        (numeric - analytic).abs() < 1e-4,
                        "dW{l}[{i},{j}]: numeric {numeric} vs analytic {analytic}"
                    );
                }
            }

            for i in 0..net.params.layers[l].bias.nrows() {
                net.params.layers[l].bias[[i, 0]] += eps;
                let (plus, _) = net.forward(&x);
                net.params.layers[l].bias[[i, 0]] -= 2.0 * eps;
                let (minus, _) = net.forward(&x);
                net.params.layers[l].bias[[i, 0]] += eps;

                let numeric = (Loss::CrossEntropy.value(&plus, &y)
                    - Loss::CrossEntropy.value(&minus, &y))
                    / (2.0 * eps);
                let analytic = grads.layers[l].bias[[i, 0]];
                assert!(
                    (numeric - analytic).abs() < 1e-4,
                    "db{l}[{i}]: numeric {numeric} vs analytic {analytic}"
                );
            }
        }
    }

    #[test]
    fn predict_returns_the_argmax_class_per_column() {
        let params = Parameters {
            layers: vec![crate::params::Layer {
                weights: array![[1.0, 0.0], [0.0, 1.0], [0.0, 0.0]],
                bias: Array2::zeros((3, 1)),
            }],
        };
        let net = Network::from_parameters(params, Activation::Sigmoid);
        let classes = net.predict(&array![[5.0, 0.0], [0.0, 5.0]]);
        assert_eq!(classes, vec![0, 1]);
    }
}
