use crate::checkpoint;
use crate::config::TrainConfig;
use crate::error::Result;
use crate::loss::Loss;
use crate::metrics::{self, EpochRecord, StepRecord};
use crate::network::Network;
use crate::params::Gradients;
use ndarray::{Array2, Axis};

/// Records accumulated over one training run: the per-100-batch snapshots
/// destined for the log files and the accepted per-epoch records.
#[derive(Debug, Clone, Default)]
pub struct TrainReport {
    pub step_records: Vec<StepRecord>,
    pub epoch_records: Vec<EpochRecord>,
}

/// Train/validation loss and error from a full forward pass over both sets.
#[derive(Debug, Clone, Copy)]
struct Performance {
    train_loss: f64,
    train_err: f64,
    val_loss: f64,
    val_err: f64,
}

fn measure(
    net: &Network,
    train_inputs: &Array2<f64>,
    train_targets: &Array2<f64>,
    val_inputs: &Array2<f64>,
    val_targets: &Array2<f64>,
    loss: Loss,
) -> Performance {
    let (train_prediction, _) = net.forward(train_inputs);
    let (val_prediction, _) = net.forward(val_inputs);
    Performance {
        train_loss: loss.value(&train_prediction, train_targets),
        train_err: metrics::error_rate(&train_prediction, train_targets),
        val_loss: loss.value(&val_prediction, val_targets),
        val_err: metrics::error_rate(&val_prediction, val_targets),
    }
}

/// The annealing condition: at least one epoch has been accepted and the
/// previous epoch's validation loss failed to improve on the current one.
pub fn anneal_triggered(records: &[EpochRecord], epoch: usize, val_loss: f64) -> bool {
    epoch >= 1
        && records
            .get(epoch - 1)
            .is_some_and(|prev| prev.val_loss <= val_loss)
}

/// Epoch-boundary bookkeeping.
///
/// On a rollback the learning rate halves, the parameters reload from the
/// previous epoch's checkpoint, and the epoch counter is pulled back so the
/// same epoch index runs again. On acceptance the epoch record is appended
/// and the checkpoint is written before the counter advances; the advance
/// never happens before the checkpoint is durable.
fn end_of_epoch(
    net: &mut Network,
    cfg: &TrainConfig,
    eta: &mut f64,
    epoch: &mut usize,
    records: &mut Vec<EpochRecord>,
    perf: Performance,
) -> Result<()> {
    if cfg.anneal && anneal_triggered(records, *epoch, perf.val_loss) {
        *eta /= 2.0;
        net.params = checkpoint::load(&cfg.save_dir, *epoch - 1)?;
        log::info!(
            "epoch {}: validation loss {:.2} did not improve, annealing lr to {} and \
             retrying from the epoch {} checkpoint",
            *epoch,
            perf.val_loss,
            *eta,
            *epoch - 1
        );
        *epoch -= 1;
    } else {
        log::info!(
            "epoch {}: train error {:.2} train loss {:.2} validation error {:.2} \
             validation loss {:.2}",
            *epoch,
            perf.train_err,
            perf.train_loss,
            perf.val_err,
            perf.val_loss
        );
        records.push(EpochRecord {
            epoch: *epoch,
            train_loss: perf.train_loss,
            val_loss: perf.val_loss,
        });
        checkpoint::save(&net.params, &cfg.save_dir, *epoch)?;
    }
    *epoch += 1;
    Ok(())
}

/// Run the full training loop over the given split.
///
/// Examples are visited in their fixed dataset order, one at a time; the
/// gradient accumulator sums per-example gradients and the optimizer consumes
/// it on every `batch_size`-th example seen. The `points_seen` counter
/// deciding batch boundaries deliberately persists across epochs. Every 100
/// completed batches a loss/error snapshot is taken for the log files.
pub fn train(
    net: &mut Network,
    train_inputs: &Array2<f64>,
    train_targets: &Array2<f64>,
    val_inputs: &Array2<f64>,
    val_targets: &Array2<f64>,
    cfg: &TrainConfig,
) -> Result<TrainReport> {
    cfg.validate()?;
    net.check_data_shape(train_inputs, train_targets)?;
    net.check_data_shape(val_inputs, val_targets)?;

    let mut optimizer = crate::optimizer::Optimizer::new(cfg.optimizer, cfg, &net.params);
    let mut report = TrainReport::default();
    let mut eta = cfg.eta;
    let mut points_seen: usize = 0;
    let mut epoch = 0;

    while epoch < cfg.epochs {
        let mut grads = Gradients::zeros_like(&net.params);
        optimizer.begin_epoch();
        let mut step = 0;

        for j in 0..train_inputs.ncols() {
            let x = train_inputs.column(j).insert_axis(Axis(1)).to_owned();
            let y = train_targets.column(j).insert_axis(Axis(1)).to_owned();

            let (yhat, cache) = net.forward(&x);
            let grad_current = net.backward(&cache, &y, &yhat, cfg.loss);
            grads.accumulate(&grad_current);
            points_seen += 1;

            if points_seen % cfg.batch_size == 0 {
                step += 1;
                optimizer.step(&mut net.params, &grads, eta, cfg.batch_size);
                grads.reset();

                if step % 100 == 0 {
                    let perf = measure(
                        net,
                        train_inputs,
                        train_targets,
                        val_inputs,
                        val_targets,
                        cfg.loss,
                    );
                    let record = StepRecord {
                        epoch,
                        step,
                        train_loss: perf.train_loss,
                        train_err: perf.train_err,
                        val_loss: perf.val_loss,
                        val_err: perf.val_err,
                        eta,
                    };
                    // Snapshots are keyed by (epoch, step): a retried epoch
                    // replaces its earlier entries instead of duplicating
                    // them.
                    match report
                        .step_records
                        .iter_mut()
                        .find(|r| r.epoch == epoch && r.step == step)
                    {
                        Some(existing) => *existing = record,
                        None => report.step_records.push(record),
                    }
                }

                // The Nesterov lookahead lands after the snapshot, as a
                // second decrement within the same batch.
                optimizer.lookahead(&mut net.params);
            }
        }

        let perf = measure(
            net,
            train_inputs,
            train_targets,
            val_inputs,
            val_targets,
            cfg.loss,
        );
        end_of_epoch(
            net,
            cfg,
            &mut eta,
            &mut epoch,
            &mut report.epoch_records,
            perf,
        )?;
    }

    Ok(report)
}
