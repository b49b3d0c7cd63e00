use burn::{
    module::Module,
    nn::Linear,
    tensor::{activation::relu, backend::Backend, Tensor},
};

use crate::session::Session;

use super::{
    config::{Architecture, ClassifierConfig},
    feed_forward::dense,
    lstm::{LstmEncoder, LstmWeights},
    ModelError,
};

/// Turns embedded tokens into the representations both sentences are aligned with
#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    /// Learned projection from the embedding width to `num_units`, followed by a ReLU
    pub projection: Option<Linear<B>>,

    /// Recurrent layer of the `lstm` architecture
    pub lstm: Option<LstmEncoder<B>>,
}

impl<B: Backend> Encoder<B> {
    /// Build the stages `config` asks for
    pub fn new(
        config: &ClassifierConfig,
        session: &mut Session<B>,
        lstm_weights: Option<LstmWeights>,
    ) -> Result<Self, ModelError> {
        let projection = config
            .project_input
            .then(|| dense(config.embedding_size, config.num_units, session));

        let lstm = match config.architecture {
            Architecture::Lstm => Some(LstmEncoder::new(
                config.input_size(),
                config.num_units,
                lstm_weights,
                session,
            )?),
            Architecture::FeedForward => None,
        };

        Ok(Self { projection, lstm })
    }

    /// The architecture this encoder was built for
    pub fn architecture(&self) -> Architecture {
        if self.lstm.is_some() {
            Architecture::Lstm
        } else {
            Architecture::FeedForward
        }
    }

    /// Encode `[batch, length, embedding_size]` embeddings
    pub fn forward(&self, embedded: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = match &self.projection {
            Some(projection) => relu(projection.forward(embedded)),
            None => embedded,
        };

        match &self.lstm {
            Some(lstm) => lstm.forward(x),
            None => x,
        }
    }
}
