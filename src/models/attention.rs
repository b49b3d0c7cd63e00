use burn::{
    module::{Module, Param},
    tensor::{activation::softmax, backend::Backend, Bool, Data, Int, Shape, Tensor},
};

use crate::session::Session;

use super::feed_forward::FeedForward;

/// Score given to padded keys before normalization; `exp` of it underflows to exactly zero
pub const MASK_VALUE: f32 = -1e9;

/// Softmax of `[batch, queries, keys]` scores over the key axis, with every key marked `true` in
/// the `[batch, keys]` padding mask receiving zero weight
pub fn masked_softmax<B: Backend>(
    scores: Tensor<B, 3>,
    key_padding: Tensor<B, 2, Bool>,
) -> Tensor<B, 3> {
    let [batch_size, queries, keys] = scores.dims();
    let mask = key_padding
        .reshape([batch_size, 1, keys])
        .repeat(1, queries);

    softmax(scores.mask_fill(mask, MASK_VALUE), 2)
}

/// Self-alignment within a sentence, biased by the clamped forward distance between tokens
#[derive(Module, Debug)]
pub struct IntraAttention<B: Backend> {
    /// Projection applied to tokens before scoring
    pub project: FeedForward<B>,

    /// One learned bias per distance bucket
    pub distance_bias: Param<Tensor<B, 1>>,

    /// Number of distance buckets
    pub max_distance: usize,
}

impl<B: Backend> IntraAttention<B> {
    /// Create a layer for `d_input` features scored through `d_hidden` units
    pub fn new(
        d_input: usize,
        d_hidden: usize,
        max_distance: usize,
        session: &mut Session<B>,
    ) -> Self {
        let distance_bias = session.uniform_vector(max_distance, 0.1);

        Self {
            project: FeedForward::new(d_input, d_hidden, session),
            distance_bias: Param::from_tensor(distance_bias),
            max_distance,
        }
    }

    /// Concatenate every token of `[batch, length, d_input]` sentences with its attended summary,
    /// producing `[batch, length, 2 * d_input]`
    pub fn forward(&self, sentences: Tensor<B, 3>, padding: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let weights = self.weights(sentences.clone(), padding);
        let attended = weights.matmul(sentences.clone());

        Tensor::cat(vec![sentences, attended], 2)
    }

    /// Attention weights of shape `[batch, length, length]`
    pub fn weights(&self, sentences: Tensor<B, 3>, padding: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let [_, length, _] = sentences.dims();

        let projected = self.project.forward(sentences);
        let scores = projected.clone().matmul(projected.swap_dims(1, 2));
        let bias = self.distance_biases(length, &scores.device());

        masked_softmax(scores + bias.unsqueeze::<3>(), padding)
    }

    /// The `[length, length]` bias matrix, with entry `(i, j)` taken from bucket
    /// `clamp(j - i, 0, max_distance - 1)`
    fn distance_biases(&self, length: usize, device: &B::Device) -> Tensor<B, 2> {
        let last = self.max_distance.saturating_sub(1) as i64;
        let buckets: Vec<i64> = (0..length as i64)
            .flat_map(|i| (0..length as i64).map(move |j| (j - i).clamp(0, last)))
            .collect();

        let indices = Tensor::<B, 1, Int>::from_data(
            Data::new(buckets, Shape::new([length * length])).convert::<B::IntElem>(),
            device,
        );

        self.distance_bias
            .val()
            .select(0, indices)
            .reshape([length, length])
    }
}

/// The soft alignment of two sentences
#[derive(Debug, Clone)]
pub struct Alignment<B: Backend> {
    /// For every premise token, the hypothesis summary aligned to it: `[batch, premise, d]`
    pub beta: Tensor<B, 3>,

    /// For every hypothesis token, the premise summary aligned to it: `[batch, hypothesis, d]`
    pub alpha: Tensor<B, 3>,

    /// Weights over hypothesis tokens: `[batch, premise, hypothesis]`
    pub beta_weights: Tensor<B, 3>,

    /// Weights over premise tokens: `[batch, hypothesis, premise]`
    pub alpha_weights: Tensor<B, 3>,
}

/// Cross-sentence attention, sharing one projection between both sentences
#[derive(Module, Debug)]
pub struct CrossAttention<B: Backend> {
    /// Projection applied to tokens before scoring
    pub project: FeedForward<B>,
}

impl<B: Backend> CrossAttention<B> {
    /// Create a layer for `d_input` features scored through `d_hidden` units
    pub fn new(d_input: usize, d_hidden: usize, session: &mut Session<B>) -> Self {
        Self {
            project: FeedForward::new(d_input, d_hidden, session),
        }
    }

    /// Align premises with hypotheses
    pub fn forward(
        &self,
        premises: Tensor<B, 3>,
        hypotheses: Tensor<B, 3>,
        premise_padding: Tensor<B, 2, Bool>,
        hypothesis_padding: Tensor<B, 2, Bool>,
    ) -> Alignment<B> {
        let projected_premises = self.project.forward(premises.clone());
        let projected_hypotheses = self.project.forward(hypotheses.clone());

        let scores = projected_premises.matmul(projected_hypotheses.swap_dims(1, 2));

        let beta_weights = masked_softmax(scores.clone(), hypothesis_padding);
        let alpha_weights = masked_softmax(scores.swap_dims(1, 2), premise_padding);

        Alignment {
            beta: beta_weights.clone().matmul(hypotheses),
            alpha: alpha_weights.clone().matmul(premises),
            beta_weights,
            alpha_weights,
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::utils::tensors::{padding_mask, to_vec};

    type TestBackend = NdArray;

    fn assert_rows_are_distributions(weights: Vec<f32>, keys: usize, lengths: &[usize]) {
        let rows_per_batch = weights.len() / keys / lengths.len();

        for (row_index, row) in weights.chunks(keys).enumerate() {
            let length = lengths[row_index / rows_per_batch];
            let mass: f32 = row[..length].iter().sum();

            assert!((mass - 1.0).abs() < 1e-5, "row {} sums to {}", row_index, mass);
            assert!(row[length..].iter().all(|weight| *weight == 0.0));
        }
    }

    #[test]
    fn test_masked_softmax_ignores_padding() {
        let device = Default::default();
        let mut session = Session::<TestBackend>::new(device, 5);
        let scores = session.uniform_matrix(2 * 3, 4, 10.0).reshape([2, 3, 4]);
        let padding = padding_mask::<TestBackend>(&[2, 4], 4, &Default::default());

        let weights = masked_softmax(scores, padding);

        assert_rows_are_distributions(to_vec(weights), 4, &[2, 4]);
    }

    #[test]
    fn test_cross_attention_masks_both_sentences() {
        let mut session = Session::<TestBackend>::new(Default::default(), 5);
        let attention = CrossAttention::new(4, 3, &mut session);

        let premises = session.uniform_matrix(2 * 3, 4, 1.0).reshape([2, 3, 4]);
        let hypotheses = session.uniform_matrix(2 * 5, 4, 1.0).reshape([2, 5, 4]);
        let premise_padding = padding_mask::<TestBackend>(&[3, 1], 3, session.device());
        let hypothesis_padding = padding_mask::<TestBackend>(&[2, 5], 5, session.device());

        let alignment = attention.forward(premises, hypotheses, premise_padding, hypothesis_padding);

        assert_eq!(alignment.beta.dims(), [2, 3, 4]);
        assert_eq!(alignment.alpha.dims(), [2, 5, 4]);
        assert_rows_are_distributions(to_vec(alignment.beta_weights), 5, &[2, 5]);
        assert_rows_are_distributions(to_vec(alignment.alpha_weights), 3, &[3, 1]);
    }

    #[test]
    fn test_intra_attention_doubles_width() {
        let mut session = Session::<TestBackend>::new(Default::default(), 5);
        let attention = IntraAttention::new(4, 3, 2, &mut session);

        let sentences = session.uniform_matrix(2 * 4, 4, 1.0).reshape([2, 4, 4]);
        let padding = padding_mask::<TestBackend>(&[4, 2], 4, session.device());

        let weights = attention.weights(sentences.clone(), padding.clone());
        assert_rows_are_distributions(to_vec(weights), 4, &[4, 2]);

        let output = attention.forward(sentences, padding);
        assert_eq!(output.dims(), [2, 4, 8]);
    }

    #[test]
    fn test_distance_buckets_are_clamped() {
        let mut session = Session::<TestBackend>::new(Default::default(), 5);
        let mut attention = IntraAttention::new(2, 2, 2, &mut session);
        attention.distance_bias = Param::from_tensor(crate::utils::tensors::vector(
            vec![10.0, 20.0],
            session.device(),
        ));

        let biases = to_vec(attention.distance_biases(3, session.device()));

        assert_eq!(
            biases,
            vec![10.0, 20.0, 20.0, 10.0, 10.0, 20.0, 10.0, 10.0, 10.0]
        );
    }
}
