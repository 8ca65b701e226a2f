//! Command line entry points for the tutorial helpers
//!
//! # Usage
//! Runnable via
//! ```sh
//! cargo run -- -h
//! cargo run -- reorganize --data-dir data/dogs --valid-ratio 0.1
//! RUST_LOG=info cargo run -- demo --dataset moon --output output/loss.svg
//! ```
//!
//! `demo` trains a small MLP on a synthetic 2-D dataset with the generic training loop and
//! plots the loss curves while it goes.

use std::{error::Error, path::PathBuf, process::ExitCode};

use burn::{
    backend::{Autodiff, NdArray},
    module::AutodiffModule,
    nn::{Linear, LinearConfig, Relu},
    prelude::*,
};
use clap::{Parser, Subcommand};
use d2l_helpers::{
    datasets::Dataset,
    device::try_all_gpus,
    evaluate::{Classifier, evaluate_accuracy},
    reorganize::reorganize_data,
    train::{TrainConfig, train},
};
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

type DemoBackend = Autodiff<NdArray>;

#[derive(Parser)]
#[clap(version, about)]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Splits `<data-dir>/train` into train/valid folders using `<data-dir>/labels.csv`
    Reorganize {
        #[clap(short, long)]
        data_dir: PathBuf,
        #[clap(short, long, default_value_t = 0.1)]
        valid_ratio: f64,
    },
    /// Trains an MLP on a synthetic dataset and plots the loss curves
    Demo {
        #[clap(short, long, default_value_t = Dataset::Moon)]
        dataset: Dataset,
        #[clap(short, long, default_value_t = 500)]
        class_size: usize,
        #[clap(short, long, default_value_t = 50)]
        batch_size: usize,
        #[clap(short, long, default_value_t = 20)]
        epochs: usize,
        #[clap(short, long, default_value_t = 0.001)]
        lr: f64,
        #[clap(long, default_value_t = 5e-4)]
        wd: f64,
        #[clap(long, default_value_t = 4)]
        lr_period: usize,
        #[clap(long, default_value_t = 0.9)]
        lr_decay: f64,
        // when set, overrides the hyper-parameter flags above
        #[clap(long)]
        config: Option<PathBuf>,
        #[clap(long, default_value_t = 16)]
        hidden_units: usize,
        #[clap(long, default_value_t = 0)]
        seed: u64,
        #[clap(short, long, default_value = "output/loss.svg")]
        output: PathBuf,
    },
}

// A NN with one hidden layer, output is the logit of each class
#[derive(Module, Debug)]
struct Mlp<B: Backend> {
    l1: Linear<B>,
    relu: Relu,
    l2: Linear<B>,
}

impl<B: Backend> Mlp<B> {
    fn new(n_classes: usize, hidden_size: usize, device: &B::Device) -> Self {
        Self {
            l1: LinearConfig::new(2, hidden_size).init(device),
            relu: Relu::new(),
            l2: LinearConfig::new(hidden_size, n_classes).init(device),
        }
    }
}

impl<B: Backend> Classifier<B, 2> for Mlp<B> {
    fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.relu.forward(self.l1.forward(features));
        self.l2.forward(x)
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    let result: Result<(), Box<dyn Error>> = match args.command {
        Command::Reorganize {
            data_dir,
            valid_ratio,
        } => reorganize_data(&data_dir, valid_ratio)
            .map(|n_valid| log::info!("{n_valid} validation examples per label"))
            .map_err(Into::into),
        Command::Demo {
            dataset,
            class_size,
            batch_size,
            epochs,
            lr,
            wd,
            lr_period,
            lr_decay,
            config,
            hidden_units,
            seed,
            output,
        } => {
            let train_config: Result<_, Box<dyn Error>> = match config {
                Some(path) => TrainConfig::load(&path).map_err(|e| e.to_string().into()),
                None => Ok(TrainConfig::new(epochs, lr)
                    .with_weight_decay(wd)
                    .with_lr_period(lr_period)
                    .with_lr_decay(lr_decay)),
            };
            train_config.and_then(|train_config| {
                run_demo(
                    dataset,
                    class_size,
                    batch_size,
                    hidden_units,
                    seed,
                    &train_config,
                    output,
                )
            })
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_demo(
    dataset: Dataset,
    class_size: usize,
    batch_size: usize,
    hidden_units: usize,
    seed: u64,
    config: &TrainConfig,
    output: PathBuf,
) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    let train_samples = dataset.generate(class_size, &mut rng);
    let n_classes = train_samples.num_classes();
    let train_iter = train_samples.into_loader(batch_size, true)?;
    let valid_iter = dataset
        .generate(class_size / 4 + 1, &mut rng)
        .into_loader(batch_size, false)?;

    let devices = try_all_gpus::<DemoBackend>();
    let net = Mlp::<DemoBackend>::new(n_classes, hidden_units, &devices[0]);
    log::info!(
        "training on {dataset} ({} examples) for {} epochs",
        train_iter.len(),
        config.num_epochs
    );

    let (net, report) = train::<DemoBackend, _, 2>(
        net,
        &train_iter,
        Some(&valid_iter),
        config,
        &devices,
        Some(output.as_path()),
    )?;
    evaluate_accuracy::<NdArray, _, _, 2>(&valid_iter, &net.valid(), &devices)?;
    log::info!(
        "Loss curves saved to '{}' (last learning rate {}).",
        output.display(),
        report.last_lr
    );
    Ok(())
}
