use burn::{
    module::{Module, Param},
    nn::{loss::CrossEntropyLossConfig, Linear},
    tensor::{
        activation::softmax,
        backend::{AutodiffBackend, Backend},
        module::embedding,
        Bool, Int, Tensor,
    },
    train::{ClassificationOutput, TrainOutput, TrainStep, ValidStep},
};
use derive_new::new;

use crate::pipelines::entailment::batcher::{Infer, Train};

use super::{
    attention::{Alignment, CrossAttention, IntraAttention},
    config::Architecture,
    encoder::Encoder,
    feed_forward::FeedForward,
};

/// Decomposable attention for sentence-pair classification: attend, compare, aggregate.
///
/// Both sentences share every component. The encoder stage decides the architecture (plain
/// projected embeddings or an LSTM); everything after it is common.
#[derive(Module, Debug, new)]
pub struct Classifier<B: Backend> {
    /// Embedding table, one row per vocabulary id
    pub embedding: Param<Tensor<B, 2>>,

    /// Whether gradients reach the embedding table
    pub train_embeddings: bool,

    /// Token encoder
    pub encoder: Encoder<B>,

    /// Optional self-alignment applied to each sentence
    pub intra_attention: Option<IntraAttention<B>>,

    /// Cross-sentence alignment (`F`)
    pub attention: CrossAttention<B>,

    /// Comparison of each token with its aligned summary (`G`)
    pub compare: FeedForward<B>,

    /// Classifier network over the aggregated comparisons (`H`)
    pub aggregate: FeedForward<B>,

    /// Final linear map to the class logits
    pub output: Linear<B>,

    /// Total number of classes
    pub num_classes: usize,

    /// Weight of the L2 penalty on weight matrices
    #[new(value = "0.0")]
    pub l2: f64,
}

impl<B: Backend> Classifier<B> {
    /// Configure the regularization used while training. `dropout_keep` is the probability of
    /// keeping a unit.
    pub fn with_training(mut self, dropout_keep: f64, l2: f64) -> Self {
        let prob = (1.0 - dropout_keep).clamp(0.0, 1.0);

        self.intra_attention = self.intra_attention.map(|mut intra| {
            intra.project = intra.project.with_dropout(prob);
            intra
        });
        self.attention.project = self.attention.project.with_dropout(prob);
        self.compare = self.compare.with_dropout(prob);
        self.aggregate = self.aggregate.with_dropout(prob);
        self.l2 = l2;

        self
    }

    /// Replace the embedding table, e.g. after restoring a checkpoint against a new vocabulary
    pub fn with_embeddings(mut self, embeddings: Tensor<B, 2>) -> Self {
        self.embedding = Param::from_tensor(embeddings);
        self
    }

    /// The architecture of the encoder stage
    pub fn architecture(&self) -> Architecture {
        self.encoder.architecture()
    }

    /// Look up, encode and (optionally) self-align one side of a batch
    pub fn encode(&self, ids: Tensor<B, 2, Int>, padding: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let table = if self.train_embeddings {
            self.embedding.val()
        } else {
            self.embedding.val().detach()
        };

        let encoded = self.encoder.forward(embedding(table, ids));

        match &self.intra_attention {
            Some(intra) => intra.forward(encoded, padding),
            None => encoded,
        }
    }

    /// Class logits of shape `[batch_size, num_classes]`
    pub fn logits(&self, input: Infer<B>) -> Tensor<B, 2> {
        let premises = self.encode(input.premises, input.premise_padding.clone());
        let hypotheses = self.encode(input.hypotheses, input.hypothesis_padding.clone());

        let Alignment { beta, alpha, .. } = self.attention.forward(
            premises.clone(),
            hypotheses.clone(),
            input.premise_padding.clone(),
            input.hypothesis_padding.clone(),
        );

        let compared_premises = self.compare.forward(Tensor::cat(vec![premises, beta], 2));
        let compared_hypotheses = self.compare.forward(Tensor::cat(vec![hypotheses, alpha], 2));

        let aggregated = Tensor::cat(
            vec![
                masked_sum(compared_premises, input.premise_padding),
                masked_sum(compared_hypotheses, input.hypothesis_padding),
            ],
            1,
        );

        self.output.forward(self.aggregate.forward(aggregated))
    }

    /// Defines forward pass for training
    pub fn forward(&self, item: Train<B>) -> ClassificationOutput<B> {
        let targets = item.targets;
        let output = self.logits(item.input);

        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput {
            loss,
            output,
            targets,
        }
    }

    /// Defines forward pass for inference, returning class probabilities
    pub fn infer(&self, input: Infer<B>) -> Tensor<B, 2> {
        softmax(self.logits(input), 1)
    }

    /// The most likely class of every pair
    pub fn predict(&self, input: Infer<B>) -> Tensor<B, 1, Int> {
        let [batch_size, _] = input.premises.dims();

        self.logits(input).argmax(1).reshape([batch_size])
    }

    /// The quantity minimized during training: the cross-entropy of `output` plus the L2 penalty
    pub fn objective(&self, output: &ClassificationOutput<B>) -> Tensor<B, 1> {
        if self.l2 > 0.0 {
            output.loss.clone() + self.l2_penalty()
        } else {
            output.loss.clone()
        }
    }

    /// `l2 * sum(||W||^2) / 2` over the weight matrices; biases and the embedding table are
    /// left out
    pub fn l2_penalty(&self) -> Tensor<B, 1> {
        let device = self.output.weight.val().device();
        let mut weights = vec![self.output.weight.val()];

        let mut add_network = |network: &FeedForward<B>| {
            weights.push(network.input.weight.val());
            weights.push(network.hidden.weight.val());
        };
        add_network(&self.attention.project);
        add_network(&self.compare);
        add_network(&self.aggregate);
        if let Some(intra) = &self.intra_attention {
            add_network(&intra.project);
        }

        if let Some(projection) = &self.encoder.projection {
            weights.push(projection.weight.val());
        }
        if let Some(lstm) = &self.encoder.lstm {
            weights.push(lstm.weights.val());
        }

        weights
            .into_iter()
            .map(|weight| (weight.clone() * weight).sum())
            .fold(Tensor::zeros([1], &device), |total, squares| total + squares)
            .mul_scalar(self.l2 / 2.0)
    }
}

/// Sum `[batch, length, d]` features over the positions not marked as padding
fn masked_sum<B: Backend>(features: Tensor<B, 3>, padding: Tensor<B, 2, Bool>) -> Tensor<B, 2> {
    let [batch_size, _, d_model] = features.dims();
    let keep = padding.bool_not().float().unsqueeze_dim::<3>(2);

    (features * keep).sum_dim(1).reshape([batch_size, d_model])
}

impl<B: AutodiffBackend> TrainStep<Train<B>, ClassificationOutput<B>> for Classifier<B> {
    fn step(&self, item: Train<B>) -> TrainOutput<ClassificationOutput<B>> {
        let output = self.forward(item);
        let objective = self.objective(&output);

        TrainOutput::new(self, objective.backward(), output)
    }
}

impl<B: Backend> ValidStep<Train<B>, ClassificationOutput<B>> for Classifier<B> {
    fn step(&self, item: Train<B>) -> ClassificationOutput<B> {
        self.forward(item)
    }
}
