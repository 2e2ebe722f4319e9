use crate::config::TrainConfig;
use crate::error::Error;
use crate::params::{Gradients, Parameters};
use ndarray::Zip;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    Gd,
    Momentum,
    Nag,
    Adam,
}

impl FromStr for OptimizerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "gd" => Ok(OptimizerKind::Gd),
            "momentum" => Ok(OptimizerKind::Momentum),
            "nag" => Ok(OptimizerKind::Nag),
            "adam" => Ok(OptimizerKind::Adam),
            other => Err(Error::InvalidConfig(format!(
                "unknown optimizer {other:?}, expected gd, momentum, nag or adam"
            ))),
        }
    }
}

/// First-order optimizer with its auxiliary state held outside the model.
///
/// All four variants share the same control skeleton: the training loop sums
/// per-example gradients and hands the accumulator over once per batch.
/// The velocity buffers of `Momentum` and `Nag` persist across epochs.
/// `Adam` keeps its moment estimates across epochs too, but its step counter
/// goes back to zero at every `begin_epoch`, so bias correction restarts
/// per epoch. That matches the behavior this trainer has always had; see
/// DESIGN.md before changing it.
#[derive(Debug, Clone)]
pub enum Optimizer {
    Gd,
    Momentum {
        gamma: f64,
        velocity: Gradients,
    },
    Nag {
        gamma: f64,
        velocity: Gradients,
    },
    Adam {
        beta1: f64,
        beta2: f64,
        eps: f64,
        first_moment: Gradients,
        second_moment: Gradients,
        step: u32,
    },
}

impl Optimizer {
    pub fn new(kind: OptimizerKind, cfg: &TrainConfig, params: &Parameters) -> Optimizer {
        match kind {
            OptimizerKind::Gd => Optimizer::Gd,
            OptimizerKind::Momentum => Optimizer::Momentum {
                gamma: cfg.gamma,
                velocity: Gradients::zeros_like(params),
            },
            OptimizerKind::Nag => Optimizer::Nag {
                gamma: cfg.gamma,
                velocity: Gradients::zeros_like(params),
            },
            OptimizerKind::Adam => Optimizer::Adam {
                beta1: cfg.beta1,
                beta2: cfg.beta2,
                eps: cfg.eps,
                first_moment: Gradients::zeros_like(params),
                second_moment: Gradients::zeros_like(params),
                step: 0,
            },
        }
    }

    /// Called at the start of every epoch. Only Adam reacts: its
    /// bias-correction step counter restarts while the moment buffers keep
    /// their values.
    pub fn begin_epoch(&mut self) {
        if let Optimizer::Adam { step, .. } = self {
            *step = 0;
        }
    }

    /// Consume one accumulated batch gradient and update the parameters in
    /// place.
    pub fn step(
        &mut self,
        params: &mut Parameters,
        grads: &Gradients,
        eta: f64,
        batch_size: usize,
    ) {
        match self {
            // θ ← θ - η · (g / batch_size)
            Optimizer::Gd => {
                for (layer, g) in params.layers.iter_mut().zip(&grads.layers) {
                    layer.weights.scaled_add(-eta / batch_size as f64, &g.weights);
                    layer.bias.scaled_add(-eta / batch_size as f64, &g.bias);
                }
            }
            // v ← γ·v + η·g; θ ← θ - v
            Optimizer::Momentum { gamma, velocity } | Optimizer::Nag { gamma, velocity } => {
                for ((layer, g), v) in params
                    .layers
                    .iter_mut()
                    .zip(&grads.layers)
                    .zip(&mut velocity.layers)
                {
                    v.weights
                        .zip_mut_with(&g.weights, |v, &g| *v = *gamma * *v + eta * g);
                    v.bias.zip_mut_with(&g.bias, |v, &g| *v = *gamma * *v + eta * g);
                    layer.weights -= &v.weights;
                    layer.bias -= &v.bias;
                }
            }
            Optimizer::Adam {
                beta1,
                beta2,
                eps,
                first_moment,
                second_moment,
                step,
            } => {
                *step += 1;
                let corr1 = 1.0 - beta1.powi(*step as i32);
                let corr2 = 1.0 - beta2.powi(*step as i32);

                for ((layer, g), (m, v)) in params
                    .layers
                    .iter_mut()
                    .zip(&grads.layers)
                    .zip(first_moment.layers.iter_mut().zip(&mut second_moment.layers))
                {
                    // v ← β2·v + (1-β2)·g²; m ← β1·m + (1-β1)·g, then the
                    // bias-corrected update θ ← θ - η/√(v̂+ε) · m̂. Note the ε
                    // sits inside the square root here.
                    v.weights
                        .zip_mut_with(&g.weights, |v, &g| *v = *beta2 * *v + (1.0 - *beta2) * g * g);
                    m.weights
                        .zip_mut_with(&g.weights, |m, &g| *m = *beta1 * *m + (1.0 - *beta1) * g);
                    Zip::from(&mut layer.weights)
                        .and(&m.weights)
                        .and(&v.weights)
                        .for_each(|p, &m, &v| {
                            *p -= eta / (v / corr2 + *eps).sqrt() * (m / corr1);
                        });

                    v.bias
                        .zip_mut_with(&g.bias, |v, &g| *v = *beta2 * *v + (1.0 - *beta2) * g * g);
                    m.bias
                        .zip_mut_with(&g.bias, |m, &g| *m = *beta1 * *m + (1.0 - *beta1) * g);
                    Zip::from(&mut layer.bias)
                        .and(&m.bias)
                        .and(&v.bias)
                        .for_each(|p, &m, &v| {
                            *p -= eta / (v / corr2 + *eps).sqrt() * (m / corr1);
                        });
                }
            }
        }
    }

    /// Nesterov lookahead: an extra unconditional decrement applied after
    /// every batch, on top of the momentum-style main step. The velocity
    /// decays by γ and the parameters move again.
    pub fn lookahead(&mut self, params: &mut Parameters) {
        if let Optimizer::Nag { gamma, velocity } = self {
            for (layer, v) in params.layers.iter_mut().zip(&mut velocity.layers) {
                v.weights.mapv_inplace(|v| *gamma * v);
                v.bias.mapv_inplace(|v| *gamma * v);
                layer.weights -= &v.weights;
                layer.bias -= &v.bias;
            }
        }
    }
}
