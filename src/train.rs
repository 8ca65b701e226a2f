//! Supervised training loop with SGD and a step learning rate schedule

use std::path::Path;

use burn::{
    module::AutodiffModule,
    optim::{
        GradientsParams, Optimizer, SgdConfig, decay::WeightDecayConfig, momentum::MomentumConfig,
    },
    prelude::*,
    tensor::{ElementConversion, backend::AutodiffBackend},
};
use thiserror::Error;

use crate::{
    accumulator::Accumulator,
    dataloader::{BatchSource, DataLoaderError},
    evaluate::{Classifier, EvalError, evaluate_loss},
    loss::cross_entropy,
    plot::{Animator, AxesConfig, PlotError},
    scheduler::{LrSchedule, StepLr},
    timer::Timer,
};

/// Errors for the training loop
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("No device to train on")]
    NoDevice,
    #[error("Training data yielded no batches")]
    EmptyTrainSet,
    #[error("Number of epochs must be positive")]
    NoEpochs,
    #[error(transparent)]
    Data(#[from] DataLoaderError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Plot(#[from] PlotError),
}

/// Hyper-parameters of [`train`]
#[derive(Config, Debug)]
pub struct TrainConfig {
    pub num_epochs: usize,
    /// Initial learning rate
    pub lr: f64,
    /// L2 penalty, disabled when zero
    #[config(default = 0.0)]
    pub weight_decay: f64,
    /// SGD momentum, disabled when zero
    #[config(default = 0.9)]
    pub momentum: f64,
    /// Epochs between two learning rate decays
    #[config(default = 1)]
    pub lr_period: usize,
    /// Factor applied to the learning rate every `lr_period` epochs
    #[config(default = 1.0)]
    pub lr_decay: f64,
}

impl TrainConfig {
    /// SGD matching `torch.optim.SGD(momentum=.., weight_decay=..)`, i.e. without dampening
    pub fn optimizer(&self) -> SgdConfig {
        let momentum = (self.momentum > 0.0).then(|| {
            MomentumConfig::new()
                .with_momentum(self.momentum)
                .with_dampening(0.0)
        });
        let weight_decay =
            (self.weight_decay > 0.0).then(|| WeightDecayConfig::new(self.weight_decay as f32));
        SgdConfig::new()
            .with_momentum(momentum)
            .with_weight_decay(weight_decay)
    }

    pub fn scheduler(&self) -> StepLr {
        StepLr::new(self.lr, self.lr_period, self.lr_decay)
    }
}

/// Summary of a [`train`] run
#[derive(Debug, Clone)]
pub struct TrainReport {
    /// Mean training loss of the last epoch
    pub train_loss: f64,
    /// Mean validation loss after the last epoch
    pub valid_loss: Option<f64>,
    pub examples_per_sec: f64,
    /// Learning rate used in the last epoch
    pub last_lr: f64,
    /// Loss curves, `train loss` then `valid loss`
    pub animator: Animator,
}

/// Trains `net` with the summed per-example cross entropy on `train_iter` for
/// `config.num_epochs` epochs and returns the trained model.
///
/// Batches and the model are placed on the first device. The loss curve is plotted with an
/// [`Animator`] (written to `plot_path` on every update when given): the running training
/// loss five times per epoch, and the validation loss after every epoch when `valid_iter` is
/// provided.
pub fn train<B, M, const D: usize>(
    net: M,
    train_iter: &dyn BatchSource<B, D>,
    valid_iter: Option<&dyn BatchSource<B::InnerBackend, D>>,
    config: &TrainConfig,
    devices: &[B::Device],
    plot_path: Option<&Path>,
) -> Result<(M, TrainReport), TrainError>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Classifier<B, D>,
    M::InnerModule: Classifier<B::InnerBackend, D>,
{
    let device = devices.first().ok_or(TrainError::NoDevice)?;
    if devices.len() > 1 {
        log::warn!("{} devices given, training on {device:?} only", devices.len());
    }
    if config.num_epochs == 0 {
        return Err(TrainError::NoEpochs);
    }
    let num_batches = train_iter.num_batches();
    if num_batches == 0 {
        return Err(TrainError::EmptyTrainSet);
    }

    // `to_device` drops the autodiff tracking of the parameters, `fork` keeps it
    let mut net = net.fork(device);
    let mut optim = config.optimizer().init::<B, M>();
    let mut scheduler = config.scheduler();
    let mut timer = Timer::new();

    let mut legend = vec!["train loss"];
    if valid_iter.is_some() {
        legend.push("valid loss");
    }
    let axes = AxesConfig::default()
        .with_xlabel("epoch")
        .with_xlim(1.0, config.num_epochs as f64)
        .with_legend(legend);
    let mut animator = Animator::new(axes);
    if let Some(path) = plot_path {
        animator = animator.with_output(path);
    }
    let animate_every = (num_batches / 5).max(1);

    // total loss, number of examples
    let mut metric = Accumulator::new(2);
    let mut valid_loss = None;
    let mut total_examples = 0.0;
    let mut lr = scheduler.lr();
    for epoch in 0..config.num_epochs {
        metric.reset();
        lr = scheduler.lr();
        for (i, batch) in train_iter.batches(device)?.enumerate() {
            timer.start();
            let batch = batch.to_device(device);
            let batch_size = batch.len();

            let output = net.forward(batch.features);
            let l = cross_entropy(output, batch.labels).sum();
            let l_sum = l.clone().into_scalar().elem::<f64>();
            let grads = GradientsParams::from_grads(l.backward(), &net);
            net = optim.step(lr, net, grads);

            metric.add(&[l_sum, batch_size as f64]);
            timer.stop();

            if (i + 1) % animate_every == 0 || i + 1 == num_batches {
                let x = epoch as f64 + (i + 1) as f64 / num_batches as f64;
                animator.add(x, &[Some(metric[0] / metric[1]), None])?;
            }
        }
        total_examples += metric[1];

        if let Some(valid_iter) = valid_iter {
            let valid_net = net.valid();
            let loss = evaluate_loss::<B::InnerBackend, _, _, D>(valid_iter, &valid_net, devices)?;
            animator.add((epoch + 1) as f64, &[None, Some(loss)])?;
            valid_loss = Some(loss);
        }
        log::debug!(
            "epoch {}/{}: train loss {:.4}, lr {lr}",
            epoch + 1,
            config.num_epochs,
            metric[0] / metric[1]
        );
        scheduler.step();
    }

    let train_loss = metric[0] / metric[1];
    let mut measures = format!("train loss {train_loss:.3}");
    if let Some(valid_loss) = valid_loss {
        measures.push_str(&format!(", valid loss {valid_loss:.3}"));
    }
    let elapsed = timer.sum();
    let examples_per_sec = if elapsed > 0.0 {
        total_examples / elapsed
    } else {
        0.0
    };
    log::info!("{measures}");
    log::info!("{examples_per_sec:.1} examples/sec on {devices:?}");

    let report = TrainReport {
        train_loss,
        valid_loss,
        examples_per_sec,
        last_lr: lr,
        animator,
    };
    Ok((net, report))
}
