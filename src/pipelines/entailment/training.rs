use burn::{
    data::dataloader::batcher::Batcher as _,
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, ElementConversion},
    train::ClassificationOutput,
};
use derive_new::new;
use log::{debug, info};

use crate::{
    checkpoint::Checkpointer,
    datasets::rte::Dataset,
    models::Classifier,
    session::Session,
};

use super::{
    batcher::Train,
    clipping::clip_by_global_norm,
    inference::{evaluate, num_correct, Evaluation},
    optim::{adadelta, adagrad, adam},
    Batcher, OptimizerKind, TrainingConfig, TrainingError,
};

/// Training statistics since the previous report
#[derive(Debug, Default)]
struct Window {
    loss: f64,
    correct: usize,
    examples: usize,
    batches: usize,
}

impl Window {
    fn record<B: AutodiffBackend>(&mut self, output: &ClassificationOutput<B>, loss: f64) {
        let [batch_size, _] = output.output.dims();

        self.loss += loss;
        self.correct += num_correct(output);
        self.examples += batch_size;
        self.batches += 1;
    }

    fn take(&mut self) -> (f64, f64) {
        let window = std::mem::take(self);

        if window.batches == 0 {
            return (0.0, 0.0);
        }

        (
            window.loss / window.batches as f64,
            window.correct as f64 / window.examples as f64,
        )
    }
}

/// One periodic progress report
#[derive(Debug, Clone, PartialEq, new)]
pub struct Report {
    /// One-based epoch
    pub epoch: usize,

    /// Batches processed since training started
    pub batch: usize,

    /// Mean training loss over the window
    pub train_loss: f64,

    /// Training accuracy over the window
    pub train_accuracy: f64,

    /// Scores on the validation set
    pub validation: Evaluation,

    /// Whether this validation produced a new checkpoint
    pub saved: bool,
}

/// What happened during a training run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSummary {
    /// Epochs completed
    pub epochs: usize,

    /// Batches processed
    pub batches: usize,

    /// Every periodic report, in order
    pub reports: Vec<Report>,

    /// Every validation score, in order
    pub evaluations: Vec<Evaluation>,

    /// Validation accuracy of each checkpoint written, in order
    pub saved_accuracies: Vec<f64>,

    /// Best validation accuracy seen
    pub best_accuracy: Option<f64>,
}

/// Validate, then checkpoint when the accuracy beats every earlier one. Returns whether a
/// checkpoint was written.
fn validate<B: AutodiffBackend>(
    model: &Classifier<B>,
    valid: &Dataset,
    config: &TrainingConfig,
    checkpointer: &Checkpointer,
    device: &B::Device,
    summary: &mut TrainingSummary,
) -> Result<(Evaluation, bool), TrainingError> {
    let evaluation = evaluate(&model.valid(), valid, config.eval_batch_size(), device);
    summary.evaluations.push(evaluation);

    let improved = summary
        .best_accuracy
        .map_or(true, |best| evaluation.accuracy > best);

    if improved {
        checkpointer.save(model)?;
        summary.best_accuracy = Some(evaluation.accuracy);
        summary.saved_accuracies.push(evaluation.accuracy);
    }

    Ok((evaluation, improved))
}

/// Train `model` on `train`, validating on `valid` every `report_interval` batches and at the end
/// of every epoch. The best model by validation accuracy is kept on disk by `checkpointer`; the
/// model returned is the one after the last step.
pub fn train<B: AutodiffBackend>(
    session: &mut Session<B>,
    model: Classifier<B>,
    train: &Dataset,
    valid: &Dataset,
    config: &TrainingConfig,
    checkpointer: &Checkpointer,
) -> Result<(Classifier<B>, TrainingSummary), TrainingError> {
    if train.labels().is_empty() {
        return Err(TrainingError::EmptyDataset("training"));
    }
    if valid.labels().is_empty() {
        return Err(TrainingError::EmptyDataset("validation"));
    }
    if config.batch_size == 0 || config.report_interval == 0 {
        return Err(TrainingError::InvalidConfig(format!(
            "batch_size ({}) and report_interval ({}) must be positive",
            config.batch_size, config.report_interval
        )));
    }

    let model = model.with_training(config.dropout_keep, config.l2);

    match config.optimizer {
        OptimizerKind::Adagrad => {
            run(session, model, adagrad(), train, valid, config, checkpointer)
        }
        OptimizerKind::Adadelta => {
            run(session, model, adadelta(), train, valid, config, checkpointer)
        }
        OptimizerKind::Adam => run(session, model, adam(), train, valid, config, checkpointer),
    }
}

fn run<B: AutodiffBackend, O: Optimizer<Classifier<B>, B>>(
    session: &mut Session<B>,
    mut model: Classifier<B>,
    mut optim: O,
    train: &Dataset,
    valid: &Dataset,
    config: &TrainingConfig,
    checkpointer: &Checkpointer,
) -> Result<(Classifier<B>, TrainingSummary), TrainingError> {
    let device = session.device().clone();
    let batcher = Batcher::<B>::new(device.clone());

    let mut summary = TrainingSummary::default();
    let mut window = Window::default();

    info!(
        "Training on {} pairs for {} epochs with {} (batch size {}, learning rate {})",
        train.labels().len(),
        config.num_epochs,
        config.optimizer,
        config.batch_size,
        config.learning_rate
    );

    for epoch in 1..=config.num_epochs {
        let order = session.permutation(train.labels().len());
        let mut validated = false;

        for (index, indices) in order.chunks(config.batch_size).enumerate() {
            let batch: Train<B> = batcher.batch(train.items(indices));
            let output = model.forward(batch);
            let objective = model.objective(&output);

            // checked with the L2 term included
            if !objective.clone().into_scalar().elem::<f64>().is_finite() {
                return Err(TrainingError::NonFiniteLoss {
                    epoch,
                    batch: index + 1,
                });
            }
            let loss = output.loss.clone().into_scalar().elem::<f64>();
            window.record(&output, loss);

            let grads = GradientsParams::from_grads(objective.backward(), &model);
            let grads = match config.clip_norm {
                Some(clip_norm) => {
                    let (grads, norm) = clip_by_global_norm(&model, grads, clip_norm);
                    debug!("Gradient norm before clipping: {:.4}", norm);
                    grads
                }
                None => grads,
            };

            model = optim.step(config.learning_rate, model, grads);
            summary.batches += 1;
            validated = false;

            if summary.batches % config.report_interval == 0 {
                let (train_loss, train_accuracy) = window.take();
                let (validation, saved) =
                    validate(&model, valid, config, checkpointer, &device, &mut summary)?;

                info!(
                    "Epoch {} batch {}: train loss {:.4}, train acc {:.4}, validation loss {:.4}, validation acc {:.4}{}",
                    epoch,
                    summary.batches,
                    train_loss,
                    train_accuracy,
                    validation.loss,
                    validation.accuracy,
                    if saved { " (saved)" } else { "" }
                );

                summary.reports.push(Report::new(
                    epoch,
                    summary.batches,
                    train_loss,
                    train_accuracy,
                    validation,
                    saved,
                ));
                validated = true;
            }
        }

        if !validated {
            let (validation, saved) =
                validate(&model, valid, config, checkpointer, &device, &mut summary)?;

            info!(
                "End of epoch {}: validation loss {:.4}, validation acc {:.4}{}",
                epoch,
                validation.loss,
                validation.accuracy,
                if saved { " (saved)" } else { "" }
            );
        }

        summary.epochs = epoch;
    }

    Ok((model, summary))
}
