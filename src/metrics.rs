use crate::error::Result;
use itertools::Itertools;
use ndarray::Array2;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Loss and error snapshot taken every 100 completed batches, keyed by
/// `(epoch, step)`. Rendered into the two log files at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepRecord {
    pub epoch: usize,
    pub step: usize,
    pub train_loss: f64,
    pub train_err: f64,
    pub val_loss: f64,
    pub val_err: f64,
    pub eta: f64,
}

/// One accepted epoch: appended after the epoch's checkpoint is written,
/// consulted by the annealing decision, never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
}

/// Percentage of columns whose predicted argmax matches the target argmax.
pub fn accuracy(prediction: &Array2<f64>, target: &Array2<f64>) -> f64 {
    assert_eq!(
        prediction.dim(),
        target.dim(),
        "prediction and target cover different examples"
    );
    let matches = prediction
        .columns()
        .into_iter()
        .zip(target.columns())
        .filter(|(yhat, y)| {
            let predicted = yhat.iter().position_max_by(|a, b| a.total_cmp(b));
            let expected = y.iter().position_max_by(|a, b| a.total_cmp(b));
            predicted == expected
        })
        .count();
    100.0 * matches as f64 / prediction.ncols() as f64
}

/// Classification error in percent.
pub fn error_rate(prediction: &Array2<f64>, target: &Array2<f64>) -> f64 {
    100.0 - accuracy(prediction, target)
}

/// Render the retained step snapshots into `log_train.txt` and
/// `log_val.txt` under `expt_dir`, creating the directory if needed.
pub fn write_log_files(expt_dir: &Path, steps: &[StepRecord]) -> Result<()> {
    fs::create_dir_all(expt_dir)?;

    let mut train = BufWriter::new(File::create(expt_dir.join("log_train.txt"))?);
    for record in steps {
        writeln!(
            train,
            "Epoch {}, Step {}, Loss: {}, Error: {}, lr: {}",
            record.epoch,
            record.step,
            round2(record.train_loss),
            round2(record.train_err),
            record.eta
        )?;
    }
    train.flush()?;

    let mut val = BufWriter::new(File::create(expt_dir.join("log_val.txt"))?);
    for record in steps {
        writeln!(
            val,
            "Epoch {}, Step {}, Loss: {}, Error:{}, lr: {}",
            record.epoch,
            record.step,
            round2(record.val_loss),
            round2(record.val_err),
            record.eta
        )?;
    }
    val.flush()?;

    log::info!("log files created in {}", expt_dir.display());
    Ok(())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn accuracy_counts_matching_argmax_columns() {
        let target = array![[1.0, 0.0, 0.0], [0.0, 1.0, 1.0]];
        let prediction = array![[0.9, 0.4, 0.8], [0.1, 0.6, 0.2]];
        // Columns 0 and 1 match, column 2 does not.
        assert!((accuracy(&prediction, &target) - 200.0 / 3.0).abs() < 1e-9);
        assert!((error_rate(&prediction, &target) - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn log_files_carry_one_line_per_snapshot() {
        let dir = std::env::temp_dir().join(format!("digit-descent-logs-{}", std::process::id()));
        let steps = vec![
            StepRecord {
                epoch: 0,
                step: 100,
                train_loss: 123.456,
                train_err: 12.345,
                val_loss: 234.567,
                val_err: 23.456,
                eta: 0.005,
            },
            StepRecord {
                epoch: 1,
                step: 200,
                train_loss: 99.0,
                train_err: 9.0,
                val_loss: 100.0,
                val_err: 10.0,
                eta: 0.0025,
            },
        ];

        write_log_files(&dir, &steps).unwrap();
        let train = fs::read_to_string(dir.join("log_train.txt")).unwrap();
        assert_eq!(
            train.lines().next().unwrap(),
            "Epoch 0, Step 100, Loss: 123.46, Error: 12.35, lr: 0.005"
        );
        assert_eq!(train.lines().count(), 2);

        let val = fs::read_to_string(dir.join("log_val.txt")).unwrap();
        assert_eq!(
            val.lines().next().unwrap(),
            "Epoch 0, Step 100, Loss: 234.57, Error:23.46, lr: 0.005"
        );
        fs::remove_dir_all(&dir).ok();
    }
}
