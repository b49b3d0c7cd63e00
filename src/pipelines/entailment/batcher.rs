use burn::{
    data::dataloader,
    tensor::{backend::Backend, Bool, Data, Int, Shape, Tensor},
};
use derive_new::new;

use crate::{
    datasets::vocabulary::PADDING_ID,
    utils::tensors::{pad_to, padding_mask},
};

use super::Item;

/// An inference batch of sentence pairs
#[derive(Debug, Clone, new)]
pub struct Infer<B: Backend> {
    /// Premise ids: [batch_size, premise_length]
    pub premises: Tensor<B, 2, Int>,

    /// Hypothesis ids: [batch_size, hypothesis_length]
    pub hypotheses: Tensor<B, 2, Int>,

    /// `true` at padded premise positions
    pub premise_padding: Tensor<B, 2, Bool>,

    /// `true` at padded hypothesis positions
    pub hypothesis_padding: Tensor<B, 2, Bool>,
}

/// A training batch of sentence pairs
#[derive(Debug, Clone, new)]
pub struct Train<B: Backend> {
    /// Model input
    pub input: Infer<B>,

    /// Class ids for the batch
    pub targets: Tensor<B, 1, Int>,
}

/// Pads items into batches. Each sentence side is padded to its longest member, or to
/// `min_length` when that is wider.
#[derive(Clone, Debug, new)]
pub struct Batcher<B: Backend> {
    /// Device on which batches are created
    pub device: B::Device,

    /// A floor on the padded width of both sentence sides
    #[new(default)]
    pub min_length: Option<usize>,
}

impl<B: Backend> Batcher<B> {
    /// Pad every batch to at least `min_length` positions
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = Some(min_length);
        self
    }

    fn side(&self, sentences: &[Vec<usize>]) -> (Tensor<B, 2, Int>, Tensor<B, 2, Bool>) {
        let lengths: Vec<usize> = sentences.iter().map(Vec::len).collect();
        let width = lengths
            .iter()
            .copied()
            .max()
            .unwrap_or(0)
            .max(self.min_length.unwrap_or(0));

        (
            pad_to(PADDING_ID, sentences, width, &self.device),
            padding_mask(&lengths, width, &self.device),
        )
    }
}

/// Implement Batcher trait for inference
impl<B: Backend> dataloader::batcher::Batcher<Item, Infer<B>> for Batcher<B> {
    /// Collects sentence pairs into an inference batch
    fn batch(&self, items: Vec<Item>) -> Infer<B> {
        let (premises, hypotheses): (Vec<_>, Vec<_>) = items
            .into_iter()
            .map(|item| (item.premise, item.hypothesis))
            .unzip();

        let (premises, premise_padding) = self.side(&premises);
        let (hypotheses, hypothesis_padding) = self.side(&hypotheses);

        Infer::new(premises, hypotheses, premise_padding, hypothesis_padding)
    }
}

/// Implement Batcher trait for training
impl<B: Backend> dataloader::batcher::Batcher<Item, Train<B>> for Batcher<B> {
    /// Collects sentence pairs and their labels into a training batch
    fn batch(&self, items: Vec<Item>) -> Train<B> {
        let labels: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let batch_size = labels.len();

        let targets = Tensor::from_data(
            Data::new(labels, Shape::new([batch_size])).convert::<B::IntElem>(),
            &self.device,
        );

        let input = dataloader::batcher::Batcher::<Item, Infer<B>>::batch(self, items);

        Train::new(input, targets)
    }
}

#[cfg(test)]
mod tests {
    use burn::{backend::NdArray, data::dataloader::batcher::Batcher as _};
    use pretty_assertions::assert_eq;

    use super::*;

    type TestBackend = NdArray;

    #[test]
    fn test_train_batch_pads_each_side() {
        let batcher = Batcher::<TestBackend>::new(Default::default());
        let items = vec![
            Item::new(vec![2, 3, 4], vec![2, 5], 1),
            Item::new(vec![2], vec![2, 6, 7, 8], 0),
        ];

        let batch: Train<TestBackend> = batcher.batch(items);

        assert_eq!(batch.input.premises.dims(), [2, 3]);
        assert_eq!(batch.input.hypotheses.dims(), [2, 4]);
        assert_eq!(
            batch.input.premise_padding.into_data().value,
            vec![false, false, false, false, true, true]
        );
        assert_eq!(batch.targets.into_data().convert::<i64>().value, vec![1, 0]);
    }

    #[test]
    fn test_min_length_widens_batches() {
        let batcher = Batcher::<TestBackend>::new(Default::default()).with_min_length(6);
        let batch: Infer<TestBackend> = batcher.batch(vec![Item::new(vec![2, 3], vec![2], 0)]);

        assert_eq!(batch.premises.dims(), [1, 6]);
        assert_eq!(batch.hypotheses.dims(), [1, 6]);
        assert_eq!(
            batch.premises.into_data().convert::<i64>().value,
            vec![2, 3, 0, 0, 0, 0]
        );
    }
}
