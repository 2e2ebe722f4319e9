use crate::activation::Activation;
use crate::error::{Error, Result};
use crate::loss::Loss;
use crate::optimizer::OptimizerKind;
use std::path::PathBuf;

/// Hyperparameters and paths for one classifier training run.
///
/// Defaults mirror the reference experiments: Adam with cross-entropy on a
/// sigmoid network of two 100-unit hidden layers, batch size 20, annealing
/// enabled. `seed` drives every random draw of the run; two runs with equal
/// configs produce identical parameter trajectories.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub eta: f64,
    pub gamma: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub hidden: Vec<usize>,
    pub activation: Activation,
    pub loss: Loss,
    pub optimizer: OptimizerKind,
    pub anneal: bool,
    pub seed: u64,
    pub save_dir: PathBuf,
    pub expt_dir: PathBuf,
    /// Warm start: load parameters from this checkpoint epoch instead of
    /// initializing fresh ones.
    pub pretrain: Option<usize>,
}

impl Default for TrainConfig {
    fn default() -> TrainConfig {
        TrainConfig {
            eta: 0.005,
            gamma: 0.5,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            epochs: 15,
            batch_size: 20,
            hidden: vec![100, 100],
            activation: Activation::Sigmoid,
            loss: Loss::CrossEntropy,
            optimizer: OptimizerKind::Adam,
            anneal: true,
            seed: 1234,
            save_dir: PathBuf::from("save_dir"),
            expt_dir: PathBuf::from("expt_dir"),
            pretrain: None,
        }
    }
}

impl TrainConfig {
    /// Fatal configuration check, run once at startup.
    pub fn validate(&self) -> Result<()> {
        if !(self.eta.is_finite() && self.eta > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be finite and > 0, got {}",
                self.eta
            )));
        }
        if !(self.gamma.is_finite() && (0.0..1.0).contains(&self.gamma)) {
            return Err(Error::InvalidConfig(format!(
                "momentum gamma must be in [0, 1), got {}",
                self.gamma
            )));
        }
        for (name, beta) in [("beta1", self.beta1), ("beta2", self.beta2)] {
            if !(beta.is_finite() && (0.0..1.0).contains(&beta)) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be in [0, 1), got {beta}"
                )));
            }
        }
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "adam eps must be finite and > 0, got {}",
                self.eps
            )));
        }
        if self.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be > 0".to_owned()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be > 0".to_owned()));
        }
        if self.hidden.iter().any(|&units| units == 0) {
            return Err(Error::InvalidConfig(format!(
                "hidden layer sizes must be positive, got {:?}",
                self.hidden
            )));
        }
        Ok(())
    }
}

/// Hyperparameters for one RBM training run.
#[derive(Debug, Clone)]
pub struct RbmConfig {
    /// Number of hidden units.
    pub num_hidden: usize,
    /// Gibbs steps per contrastive-divergence update.
    pub gibbs_steps: usize,
    pub eta: f64,
    pub epochs: usize,
    /// Raw pixel intensities at or above this value binarize to 1.
    pub threshold: f64,
    pub seed: u64,
    /// Log a probe reconstruction every this many examples.
    pub snapshot_interval: usize,
}

impl Default for RbmConfig {
    fn default() -> RbmConfig {
        RbmConfig {
            num_hidden: 100,
            gibbs_steps: 1,
            eta: 7e-4,
            epochs: 15,
            threshold: 127.0,
            seed: 1234,
            snapshot_interval: 936,
        }
    }
}

impl RbmConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_hidden == 0 {
            return Err(Error::InvalidConfig(
                "the RBM needs at least one hidden unit".to_owned(),
            ));
        }
        if self.gibbs_steps == 0 {
            return Err(Error::InvalidConfig(
                "contrastive divergence needs at least one Gibbs step".to_owned(),
            ));
        }
        if !(self.eta.is_finite() && self.eta > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be finite and > 0, got {}",
                self.eta
            )));
        }
        if self.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be > 0".to_owned()));
        }
        if self.snapshot_interval == 0 {
            return Err(Error::InvalidConfig(
                "snapshot interval must be > 0".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_train_config_is_valid() {
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn bad_hyperparameters_are_fatal() {
        let mut cfg = TrainConfig::default();
        cfg.eta = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = TrainConfig::default();
        cfg.gamma = 1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = TrainConfig::default();
        cfg.batch_size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = TrainConfig::default();
        cfg.hidden = vec![100, 0];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn default_rbm_config_is_valid() {
        assert!(RbmConfig::default().validate().is_ok());
        let mut cfg = RbmConfig::default();
        cfg.gibbs_steps = 0;
        assert!(cfg.validate().is_err());
    }
}
