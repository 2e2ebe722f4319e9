use crate::error::Error;
use ndarray::{Array2, Axis};
use std::str::FromStr;

/// Elementwise nonlinearity applied to hidden-layer pre-activations.
///
/// `Relu` is the leaky variant used throughout this project: `z` for positive
/// inputs and `0.01 * z` otherwise. The output layer never goes through one of
/// these; it is always a softmax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Sigmoid,
    Tanh,
    Relu,
}

impl Activation {
    pub fn apply(self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Sigmoid => z.mapv(sigmoid),
            Activation::Tanh => z.mapv(f64::tanh),
            Activation::Relu => z.mapv(|z| if z > 0.0 { z } else { 0.01 * z }),
        }
    }

    /// Derivative with respect to the pre-activation `z`.
    pub fn derivative(self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Sigmoid => z.mapv(|z| sigmoid(z) * (1.0 - sigmoid(z))),
            Activation::Tanh => z.mapv(|z| 1.0 - z.tanh() * z.tanh()),
            Activation::Relu => z.mapv(|z| if z > 0.0 { 1.0 } else { 0.01 }),
        }
    }
}

impl FromStr for Activation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            "relu" => Ok(Activation::Relu),
            other => Err(Error::InvalidConfig(format!(
                "unknown activation {other:?}, expected sigmoid, tanh or relu"
            ))),
        }
    }
}

pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + f64::exp(-z))
}

/// Column-wise softmax. Each column is one example; the maximum entry is
/// subtracted before exponentiating so large logits cannot overflow.
pub fn softmax(z: &Array2<f64>) -> Array2<f64> {
    let max = z.fold(f64::NEG_INFINITY, |max, &v| max.max(v));
    let numer = z.mapv(|v| (v - max).exp());
    let denom = numer.sum_axis(Axis(0)).insert_axis(Axis(0));
    numer / &denom
}
