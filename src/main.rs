use digit_descent::{
    Activation, Network, Rbm, RbmConfig, TrainConfig, checkpoint, data, metrics, train::train,
};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use std::process;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        usage(&args[0]);
        process::exit(1);
    }

    let outcome = match args[1].as_str() {
        "train" => cmd_train(&args[2..]),
        "rbm" => cmd_rbm(&args[2..]),
        "predict" => cmd_predict(&args[2..]),
        other => {
            eprintln!("unknown command {other:?}");
            usage(&args[0]);
            process::exit(1);
        }
    };

    if let Err(err) = outcome {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn usage(program: &str) {
    eprintln!("Usage: {program} <command> [arguments...]");
    eprintln!(
        "  train <train_csv> <val_csv> [optimizer] [activation] [loss] [eta] [batch_size] [epochs]"
    );
    eprintln!("      optimizer: gd | momentum | nag | adam   activation: sigmoid | tanh | relu");
    eprintln!("      loss: ce | sq");
    eprintln!("  rbm <train_csv> <test_csv> [num_hidden] [gibbs_steps] [eta] [epochs]");
    eprintln!("  predict <test_csv> <checkpoint_epoch> <out_csv> [activation]");
    eprintln!();
    eprintln!("Checkpoints land in save_dir/, log files in expt_dir/.");
}

fn parse_arg<T: std::str::FromStr>(
    args: &[String],
    index: usize,
    name: &str,
    default: T,
) -> digit_descent::Result<T>
where
    T::Err: std::fmt::Display,
{
    match args.get(index) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|err| {
            digit_descent::Error::InvalidConfig(format!("bad {name} {raw:?}: {err}"))
        }),
    }
}

fn cmd_train(args: &[String]) -> digit_descent::Result<()> {
    let [train_csv, val_csv, ..] = args else {
        return Err(digit_descent::Error::InvalidConfig(
            "train needs a training CSV and a validation CSV".to_owned(),
        ));
    };

    let mut cfg = TrainConfig::default();
    cfg.optimizer = parse_arg(args, 2, "optimizer", cfg.optimizer)?;
    cfg.activation = parse_arg(args, 3, "activation", cfg.activation)?;
    cfg.loss = parse_arg(args, 4, "loss", cfg.loss)?;
    cfg.eta = parse_arg(args, 5, "eta", cfg.eta)?;
    cfg.batch_size = parse_arg(args, 6, "batch_size", cfg.batch_size)?;
    cfg.epochs = parse_arg(args, 7, "epochs", cfg.epochs)?;
    cfg.validate()?;

    let train_set = data::read_labeled(Path::new(train_csv))?;
    let val_set = data::read_labeled(Path::new(val_csv))?;

    let train_inputs = data::normalize(&train_set.inputs);
    let train_targets = data::one_hot(&train_set.labels, 10)?;
    let val_inputs = data::normalize(&val_set.inputs);
    let val_targets = data::one_hot(&val_set.labels, 10)?;

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut net = match cfg.pretrain {
        Some(epoch) => {
            Network::from_parameters(checkpoint::load(&cfg.save_dir, epoch)?, cfg.activation)
        }
        None => Network::new(
            &cfg.hidden,
            train_inputs.nrows(),
            10,
            cfg.activation,
            &mut rng,
        )?,
    };

    let report = train(
        &mut net,
        &train_inputs,
        &train_targets,
        &val_inputs,
        &val_targets,
        &cfg,
    )?;
    metrics::write_log_files(&cfg.expt_dir, &report.step_records)?;
    Ok(())
}

fn cmd_rbm(args: &[String]) -> digit_descent::Result<()> {
    let [train_csv, test_csv, ..] = args else {
        return Err(digit_descent::Error::InvalidConfig(
            "rbm needs a training CSV and a test CSV".to_owned(),
        ));
    };

    let mut cfg = RbmConfig::default();
    cfg.num_hidden = parse_arg(args, 2, "num_hidden", cfg.num_hidden)?;
    cfg.gibbs_steps = parse_arg(args, 3, "gibbs_steps", cfg.gibbs_steps)?;
    cfg.eta = parse_arg(args, 4, "eta", cfg.eta)?;
    cfg.epochs = parse_arg(args, 5, "epochs", cfg.epochs)?;
    cfg.validate()?;

    let train_set = data::read_labeled(Path::new(train_csv))?;
    let test_set = data::read_labeled(Path::new(test_csv))?;
    let train_inputs = data::binarize(&train_set.inputs, cfg.threshold);
    let test_inputs = data::binarize(&test_set.inputs, cfg.threshold);

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut rbm = Rbm::new(cfg.num_hidden, train_inputs.nrows(), &mut rng)?;
    rbm.train(&train_inputs, &cfg, &mut rng)?;

    // Hidden features for the test split, consumed by external embedding
    // tools (t-SNE, UMAP).
    let features = rbm.hidden_representations(&test_inputs, &mut rng);
    let out = PathBuf::from(format!(
        "k{} n{} eta{} epochs{}",
        cfg.gibbs_steps, cfg.num_hidden, cfg.eta, cfg.epochs
    ))
    .join("hidden_reps.csv");
    data::write_features(&out, &features)?;
    log::info!("wrote hidden representations to {}", out.display());
    Ok(())
}

fn cmd_predict(args: &[String]) -> digit_descent::Result<()> {
    let [test_csv, epoch, out_csv, ..] = args else {
        return Err(digit_descent::Error::InvalidConfig(
            "predict needs a test CSV, a checkpoint epoch and an output path".to_owned(),
        ));
    };
    let epoch: usize = epoch.parse().map_err(|err| {
        digit_descent::Error::InvalidConfig(format!("bad checkpoint epoch {epoch:?}: {err}"))
    })?;
    let activation: Activation = parse_arg(args, 3, "activation", Activation::Relu)?;

    let cfg = TrainConfig::default();
    let params = checkpoint::load(&cfg.save_dir, epoch)?;
    let net = Network::from_parameters(params, activation);

    let test_set = data::read_unlabeled(Path::new(test_csv))?;
    let inputs = data::normalize(&test_set.inputs);
    let classes = net.predict(&inputs);
    data::write_submission(Path::new(out_csv), &test_set.ids, &classes)?;
    Ok(())
}
