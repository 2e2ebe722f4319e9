use crate::activation::sigmoid;
use crate::config::RbmConfig;
use crate::error::{Error, Result};
use ndarray::{Array, Array2, ArrayView2, Axis};
use ndarray_rand::RandomExt;
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::{StandardNormal, Uniform};

/// Restricted Boltzmann Machine over binary visible units.
///
/// `weights` is hidden x visible; `visible_bias` and `hidden_bias` are
/// columns. Parameters update after every example (contrastive divergence is
/// not batched here).
#[derive(Debug, Clone)]
pub struct Rbm {
    pub weights: Array2<f64>,
    pub visible_bias: Array2<f64>,
    pub hidden_bias: Array2<f64>,
}

/// Draw one binary configuration of `dim` units.
///
/// Each unit turns on when an independent uniform(0,1) draw falls below its
/// sigmoid-activated linear projection `sigmoid(weight · input + bias)`. The
/// shape of the projection is checked against `dim` before sampling.
pub fn sample_vector<R: Rng + ?Sized>(
    dim: usize,
    weight: ArrayView2<f64>,
    input: &Array2<f64>,
    bias: &Array2<f64>,
    rng: &mut R,
) -> Array2<f64> {
    let probs = (weight.dot(input) + bias).mapv(sigmoid);
    assert_eq!(
        probs.dim(),
        (dim, 1),
        "sampled configuration has the wrong shape"
    );
    let draws = Array::random_using((dim, 1), Uniform::new(0.0, 1.0), rng);
    let mut sample = Array2::zeros((dim, 1));
    ndarray::Zip::from(&mut sample)
        .and(&probs)
        .and(&draws)
        .for_each(|s, &p, &u| *s = if u < p { 1.0 } else { 0.0 });
    sample
}

impl Rbm {
    /// Initialize with `W ~ 0.01 · N(0,1)` and zero biases.
    pub fn new<R: Rng + ?Sized>(
        num_hidden: usize,
        num_visible: usize,
        rng: &mut R,
    ) -> Result<Rbm> {
        if num_hidden == 0 || num_visible == 0 {
            return Err(Error::InvalidConfig(format!(
                "RBM dimensions must be positive, got {num_hidden} hidden and \
                 {num_visible} visible units"
            )));
        }
        Ok(Rbm {
            weights: Array::random_using((num_hidden, num_visible), StandardNormal, rng) * 0.01,
            visible_bias: Array2::zeros((num_visible, 1)),
            hidden_bias: Array2::zeros((num_hidden, 1)),
        })
    }

    pub fn num_hidden(&self) -> usize {
        self.weights.nrows()
    }

    pub fn num_visible(&self) -> usize {
        self.weights.ncols()
    }

    /// One contrastive-divergence update from a single visible example.
    ///
    /// Runs a `k`-step Gibbs chain starting at the real example, then moves
    /// the parameters along the difference between the positive statistics
    /// (real example) and the negative statistics (end of the chain).
    pub fn contrastive_divergence<R: Rng + ?Sized>(
        &mut self,
        visible: &Array2<f64>,
        k: usize,
        eta: f64,
        rng: &mut R,
    ) {
        let mut chain = visible.clone();
        for _ in 0..k {
            let hidden = sample_vector(
                self.num_hidden(),
                self.weights.view(),
                &chain,
                &self.hidden_bias,
                rng,
            );
            chain = sample_vector(
                self.num_visible(),
                self.weights.t(),
                &hidden,
                &self.visible_bias,
                rng,
            );
        }

        let positive = (self.weights.dot(visible) + &self.hidden_bias).mapv(sigmoid);
        let negative = (self.weights.dot(&chain) + &self.hidden_bias).mapv(sigmoid);

        self.weights += &((positive.dot(&visible.t()) - negative.dot(&chain.t())) * eta);
        self.visible_bias += &((visible - &chain) * eta);
        self.hidden_bias += &((&positive - &negative) * eta);
    }

    /// Train on every column of `inputs` (binary visible vectors), one
    /// contrastive-divergence update per example, for `cfg.epochs` passes.
    /// Logs the reconstruction divergence of a fixed probe example at the
    /// configured interval.
    pub fn train<R: Rng + ?Sized>(
        &mut self,
        inputs: &Array2<f64>,
        cfg: &RbmConfig,
        rng: &mut R,
    ) -> Result<()> {
        cfg.validate()?;
        if inputs.nrows() != self.num_visible() {
            return Err(Error::ShapeMismatch(format!(
                "data has {} visible units but the RBM expects {}",
                inputs.nrows(),
                self.num_visible()
            )));
        }
        if inputs.ncols() == 0 {
            return Err(Error::InvalidData(
                "cannot train an RBM on zero examples".to_owned(),
            ));
        }

        let probe = inputs.column(0).insert_axis(Axis(1)).to_owned();
        for epoch in 0..cfg.epochs {
            log::info!("rbm epoch {epoch}");
            for (i, visible) in inputs.columns().into_iter().enumerate() {
                if i % cfg.snapshot_interval == 0 {
                    let reconstruction = self.reconstruct(&probe, rng);
                    let divergence = (&probe - &reconstruction).mapv(f64::abs).mean();
                    log::debug!(
                        "epoch {epoch} example {i}: probe reconstruction divergence {:.4}",
                        divergence.unwrap_or(f64::NAN)
                    );
                }
                let visible = visible.insert_axis(Axis(1)).to_owned();
                self.contrastive_divergence(&visible, cfg.gibbs_steps, cfg.eta, rng);
            }
        }
        Ok(())
    }

    /// Sample a hidden configuration and project it back to visible space.
    pub fn reconstruct<R: Rng + ?Sized>(
        &self,
        visible: &Array2<f64>,
        rng: &mut R,
    ) -> Array2<f64> {
        let hidden = sample_vector(
            self.num_hidden(),
            self.weights.view(),
            visible,
            &self.hidden_bias,
            rng,
        );
        sample_vector(
            self.num_visible(),
            self.weights.t(),
            &hidden,
            &self.visible_bias,
            rng,
        )
    }

    /// Sampled binary hidden representation for every column of `inputs`,
    /// returned hidden x examples. These are the feature vectors handed to
    /// external embedding tools.
    pub fn hidden_representations<R: Rng + ?Sized>(
        &self,
        inputs: &Array2<f64>,
        rng: &mut R,
    ) -> Array2<f64> {
        let mut features = Array2::zeros((self.num_hidden(), inputs.ncols()));
        for (j, visible) in inputs.columns().into_iter().enumerate() {
            let visible = visible.insert_axis(Axis(1)).to_owned();
            let hidden = sample_vector(
                self.num_hidden(),
                self.weights.view(),
                &visible,
                &self.hidden_bias,
                rng,
            );
            features.column_mut(j).assign(&hidden.column(0));
        }
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand::rngs::StdRng;

    #[test]
    fn sample_vector_is_binary_and_column_shaped() {
        let mut rng = StdRng::seed_from_u64(1234);
        let weight = Array::random_using((5, 3), StandardNormal, &mut rng);
        let bias = Array2::zeros((5, 1));
        let input = array![[1.0], [0.0], [1.0]];

        for _ in 0..100 {
            let sample = sample_vector(5, weight.view(), &input, &bias, &mut rng);
            assert_eq!(sample.dim(), (5, 1));
            assert!(sample.iter().all(|&s| s == 0.0 || s == 1.0));
        }
    }

    #[test]
    fn sampling_replays_exactly_under_a_fixed_seed() {
        let weight = Array2::from_shape_fn((4, 4), |(i, j)| ((i + 2 * j) as f64 - 3.0) / 4.0);
        let bias = array![[0.1], [-0.2], [0.0], [0.3]];
        let input = array![[1.0], [0.0], [0.0], [1.0]];

        let mut first = Vec::new();
        let mut rng = StdRng::seed_from_u64(77);
        for _ in 0..10_000 {
            first.push(sample_vector(4, weight.view(), &input, &bias, &mut rng));
        }

        let mut rng = StdRng::seed_from_u64(77);
        for expected in &first {
            let replayed = sample_vector(4, weight.view(), &input, &bias, &mut rng);
            assert_eq!(&replayed, expected);
        }
    }

    #[test]
    fn contrastive_divergence_moves_towards_the_data() {
        // With a strong, repeated pattern the visible bias should drift up
        // for active pixels and down for inactive ones.
        let mut rng = StdRng::seed_from_u64(1234);
        let mut rbm = Rbm::new(6, 4, &mut rng).unwrap();
        let example = array![[1.0], [1.0], [0.0], [0.0]];

        for _ in 0..200 {
            rbm.contrastive_divergence(&example, 1, 0.1, &mut rng);
        }
        assert!(rbm.visible_bias[[0, 0]] > rbm.visible_bias[[2, 0]]);
        assert!(rbm.visible_bias[[1, 0]] > rbm.visible_bias[[3, 0]]);
    }

    #[test]
    fn training_checks_the_visible_dimension() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut rbm = Rbm::new(4, 6, &mut rng).unwrap();
        let wrong = Array2::zeros((5, 2));
        assert!(matches!(
            rbm.train(&wrong, &RbmConfig::default(), &mut rng),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn hidden_representations_cover_every_example() {
        let mut rng = StdRng::seed_from_u64(9);
        let rbm = Rbm::new(3, 4, &mut rng).unwrap();
        let inputs = array![
            [1.0, 0.0, 1.0],
            [0.0, 1.0, 1.0],
            [1.0, 1.0, 0.0],
            [0.0, 0.0, 1.0]
        ];
        let features = rbm.hidden_representations(&inputs, &mut rng);
        assert_eq!(features.dim(), (3, 3));
        assert!(features.iter().all(|&f| f == 0.0 || f == 1.0));
    }
}
