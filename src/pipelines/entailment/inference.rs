use burn::{
    data::dataloader::batcher::Batcher as _,
    tensor::{backend::Backend, ElementConversion, Int, Tensor},
    train::ClassificationOutput,
};
use derive_new::new;

use crate::{datasets::rte::Dataset, models::Classifier};

use super::{
    batcher::{Infer, Train},
    Batcher,
};

/// Mean loss and accuracy over a dataset
#[derive(Debug, Clone, Copy, PartialEq, new)]
pub struct Evaluation {
    /// Cross-entropy averaged over examples
    pub loss: f64,

    /// Fraction of examples classified correctly
    pub accuracy: f64,
}

/// Number of rows of `output` whose most likely class is the target
pub fn num_correct<B: Backend>(output: &ClassificationOutput<B>) -> usize {
    let [batch_size, _] = output.output.dims();

    let correct = output
        .output
        .clone()
        .argmax(1)
        .reshape([batch_size])
        .equal(output.targets.clone())
        .int()
        .sum()
        .into_scalar();

    correct.elem::<i64>() as usize
}

/// Score `model` on every example of `dataset`, in order
pub fn evaluate<B: Backend>(
    model: &Classifier<B>,
    dataset: &Dataset,
    batch_size: usize,
    device: &B::Device,
) -> Evaluation {
    let batcher = Batcher::<B>::new(device.clone());
    let indices: Vec<usize> = (0..dataset.labels().len()).collect();

    let mut total_loss = 0.0;
    let mut correct = 0;

    for chunk in indices.chunks(batch_size.max(1)) {
        let batch: Train<B> = batcher.batch(dataset.items(chunk));
        let output = model.forward(batch);

        total_loss += output.loss.clone().into_scalar().elem::<f64>() * chunk.len() as f64;
        correct += num_correct(&output);
    }

    if indices.is_empty() {
        return Evaluation::new(0.0, 0.0);
    }

    let count = indices.len() as f64;

    Evaluation::new(total_loss / count, correct as f64 / count)
}

/// Predict the class id of every example of `dataset`, in order
pub fn predict<B: Backend>(
    model: &Classifier<B>,
    dataset: &Dataset,
    batch_size: usize,
    device: &B::Device,
) -> Vec<usize> {
    let batcher = Batcher::<B>::new(device.clone());
    let indices: Vec<usize> = (0..dataset.labels().len()).collect();

    indices
        .chunks(batch_size.max(1))
        .flat_map(|chunk| {
            let batch: Infer<B> = batcher.batch(dataset.items(chunk));
            let predictions: Tensor<B, 1, Int> = model.predict(batch);

            predictions
                .into_data()
                .convert::<i64>()
                .value
                .into_iter()
                .map(|id| id as usize)
        })
        .collect()
}
