use crate::error::Error;
use ndarray::Array2;
use std::str::FromStr;

/// Loss function applied to the softmax output of the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loss {
    CrossEntropy,
    Squared,
}

impl Loss {
    /// Total loss over every example in the batch (summed, not averaged),
    /// matching the magnitudes the log files report.
    pub fn value(self, prediction: &Array2<f64>, target: &Array2<f64>) -> f64 {
        match self {
            Loss::CrossEntropy => -(target * &prediction.mapv(f64::ln)).sum(),
            Loss::Squared => 0.5 * (target - prediction).mapv(|d| d * d).sum(),
        }
    }

    /// Gradient of the loss with respect to the output-layer pre-activation,
    /// for a single example (one column).
    ///
    /// Cross-entropy composed with softmax collapses to `yhat - y`. Squared
    /// loss composed with softmax keeps the full Jacobian term:
    /// `(yhat - y) ⊙ yhat - yhat * ((yhat - y) · yhat)`.
    pub fn output_delta(self, prediction: &Array2<f64>, target: &Array2<f64>) -> Array2<f64> {
        match self {
            Loss::CrossEntropy => prediction - target,
            Loss::Squared => {
                let diff = prediction - target;
                let dot = diff.t().dot(prediction)[[0, 0]];
                &diff * prediction - prediction * dot
            }
        }
    }
}

impl FromStr for Loss {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "ce" => Ok(Loss::CrossEntropy),
            "sq" => Ok(Loss::Squared),
            other => Err(Error::InvalidConfig(format!(
                "unknown loss {other:?}, expected ce or sq"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn cross_entropy_of_perfect_prediction_is_zero() {
        let y = array![[1.0], [0.0]];
        let yhat = array![[1.0], [0.0]];
        // 0 * ln(0) contributes a NaN in IEEE terms, so check the pure column.
        let loss = Loss::CrossEntropy.value(&array![[1.0]], &array![[1.0]]);
        assert!(loss.abs() < 1e-12);
        let delta = Loss::CrossEntropy.output_delta(&yhat, &y);
        assert_eq!(delta, array![[0.0], [0.0]]);
    }

    #[test]
    fn squared_loss_sums_half_squared_differences() {
        let y = array![[1.0, 0.0], [0.0, 1.0]];
        let yhat = array![[0.5, 0.5], [0.5, 0.5]];
        let loss = Loss::Squared.value(&yhat, &y);
        assert!((loss - 0.5).abs() < 1e-12);
    }

    #[test]
    fn squared_delta_keeps_the_softmax_jacobian_term() {
        let y = array![[1.0], [0.0]];
        let yhat = array![[0.8], [0.2]];
        let delta = Loss::Squared.output_delta(&yhat, &y);
        // (yhat - y) . yhat = -0.2 * 0.8 + 0.2 * 0.2 = -0.12
        let expected = array![[-0.2 * 0.8 - 0.8 * -0.12], [0.2 * 0.2 - 0.2 * -0.12]];
        assert!((delta[[0, 0]] - expected[[0, 0]]).abs() < 1e-12);
        assert!((delta[[1, 0]] - expected[[1, 0]]).abs() < 1e-12);
    }

    #[test]
    fn loss_names_parse() {
        assert_eq!("ce".parse::<Loss>().unwrap(), Loss::CrossEntropy);
        assert_eq!("sq".parse::<Loss>().unwrap(), Loss::Squared);
        assert!("mse".parse::<Loss>().is_err());
    }
}
