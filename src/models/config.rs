use std::fmt::Display;

use burn::{
    config::Config,
    module::{Module, Param},
    tensor::backend::Backend,
};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{datasets::EmbeddingMatrix, session::Session};

use super::{
    attention::{CrossAttention, IntraAttention},
    classifier::Classifier,
    encoder::Encoder,
    feed_forward::{dense, FeedForward},
    lstm::LstmWeights,
    ModelError,
};

/// The token encoder in front of the shared attend/compare/aggregate pipeline
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Architecture {
    /// Embeddings (optionally projected) feed attention directly
    #[serde(rename = "mlp")]
    FeedForward,

    /// A recurrent layer runs over each sentence before attention
    #[serde(rename = "lstm")]
    Lstm,
}

impl TryFrom<&str> for Architecture {
    type Error = ModelError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "mlp" => Ok(Architecture::FeedForward),
            "lstm" => Ok(Architecture::Lstm),
            _ => Err(ModelError::UnknownArchitecture(value.to_string())),
        }
    }
}

impl Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Architecture::FeedForward => "mlp",
            Architecture::Lstm => "lstm",
        };

        write!(f, "{}", name)
    }
}

/// Architecture hyperparameters, persisted as `config.json` with every checkpoint
#[derive(Config, Debug)]
pub struct ClassifierConfig {
    /// Which token encoder to use
    pub architecture: Architecture,

    /// Width of the internal representations
    pub num_units: usize,

    /// Number of rows in the embedding table
    pub vocab_size: usize,

    /// Dimensionality of the embeddings
    pub embedding_size: usize,

    /// Number of output classes
    #[config(default = 3)]
    pub num_classes: usize,

    /// Linearly project embeddings to `num_units` before anything else
    #[config(default = true)]
    pub project_input: bool,

    /// Attend within each sentence before attending across sentences
    #[config(default = false)]
    pub use_intra_attention: bool,

    /// Number of learned distance biases used by intra-sentence attention
    #[config(default = 10)]
    pub distance_biases: usize,

    /// Let gradients flow into the embedding table
    #[config(default = false)]
    pub train_embeddings: bool,
}

impl ClassifierConfig {
    /// Replace the architecture
    pub fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    /// Replace the width of the internal representations
    pub fn with_num_units(mut self, num_units: usize) -> Self {
        self.num_units = num_units;
        self
    }

    /// Replace the number of embedding rows
    pub fn with_vocab_size(mut self, vocab_size: usize) -> Self {
        self.vocab_size = vocab_size;
        self
    }

    /// Replace the embedding dimensionality
    pub fn with_embedding_size(mut self, embedding_size: usize) -> Self {
        self.embedding_size = embedding_size;
        self
    }

    /// Width of the token representations entering the encoder
    pub fn input_size(&self) -> usize {
        if self.project_input {
            self.num_units
        } else {
            self.embedding_size
        }
    }

    /// Width of the token representations leaving the encoder
    pub fn encoded_size(&self) -> usize {
        match self.architecture {
            Architecture::FeedForward => self.input_size(),
            Architecture::Lstm => self.num_units,
        }
    }

    /// Width of the token representations entering cross-sentence attention
    pub fn attended_size(&self) -> usize {
        if self.use_intra_attention {
            2 * self.encoded_size()
        } else {
            self.encoded_size()
        }
    }

    /// Initialize a classifier with random weights and the given embedding table.
    ///
    /// `lstm_weights`, when given, seed the recurrent encoder and must match the configured
    /// shapes; they are rejected for the feed-forward architecture.
    pub fn init<B: Backend>(
        &self,
        session: &mut Session<B>,
        embeddings: &EmbeddingMatrix,
        lstm_weights: Option<LstmWeights>,
    ) -> Result<Classifier<B>, ModelError> {
        self.validate()?;

        if embeddings.cols != self.embedding_size {
            return Err(ModelError::EmbeddingSize {
                expected: self.embedding_size,
                found: embeddings.cols,
            });
        }

        if lstm_weights.is_some() && self.architecture != Architecture::Lstm {
            return Err(ModelError::UnexpectedLstmWeights(self.architecture));
        }

        let embedding = Param::from_tensor(embeddings.to_tensor(session.device()));
        let encoder = Encoder::new(self, session, lstm_weights)?;

        let intra_attention = self.use_intra_attention.then(|| {
            IntraAttention::new(
                self.encoded_size(),
                self.num_units,
                self.distance_biases,
                session,
            )
        });

        let attended = self.attended_size();
        let attention = CrossAttention::new(attended, self.num_units, session);
        let compare = FeedForward::new(2 * attended, self.num_units, session);
        let aggregate = FeedForward::new(2 * self.num_units, self.num_units, session);
        let output = dense(self.num_units, self.num_classes, session);

        let classifier = Classifier::new(
            embedding,
            self.train_embeddings,
            encoder,
            intra_attention,
            attention,
            compare,
            aggregate,
            output,
            self.num_classes,
        );

        debug!("Total parameters: {}", classifier.num_params());

        Ok(classifier)
    }

    /// Reject hyperparameters no model can be built from
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.num_units == 0 || self.embedding_size == 0 || self.num_classes == 0 {
            return Err(ModelError::InvalidConfig(format!(
                "num_units ({}), embedding_size ({}) and num_classes ({}) must be positive",
                self.num_units, self.embedding_size, self.num_classes
            )));
        }

        if self.use_intra_attention && self.distance_biases == 0 {
            return Err(ModelError::InvalidConfig(
                "intra-sentence attention needs at least one distance bias".to_string(),
            ));
        }

        Ok(())
    }

    /// Fail if a checkpoint recorded with `self` cannot serve as the architecture `requested`
    pub fn ensure_compatible(&self, requested: &ClassifierConfig) -> Result<(), ModelError> {
        let mismatch = |field: &'static str, saved: String, requested: String| {
            Err(ModelError::Incompatible {
                field,
                saved,
                requested,
            })
        };

        if self.architecture != requested.architecture {
            return mismatch(
                "architecture",
                self.architecture.to_string(),
                requested.architecture.to_string(),
            );
        }
        if self.num_units != requested.num_units {
            return mismatch(
                "num_units",
                self.num_units.to_string(),
                requested.num_units.to_string(),
            );
        }
        if self.num_classes != requested.num_classes {
            return mismatch(
                "num_classes",
                self.num_classes.to_string(),
                requested.num_classes.to_string(),
            );
        }
        if self.embedding_size != requested.embedding_size {
            return mismatch(
                "embedding_size",
                self.embedding_size.to_string(),
                requested.embedding_size.to_string(),
            );
        }
        if self.project_input != requested.project_input {
            return mismatch(
                "project_input",
                self.project_input.to_string(),
                requested.project_input.to_string(),
            );
        }
        if self.use_intra_attention != requested.use_intra_attention {
            return mismatch(
                "use_intra_attention",
                self.use_intra_attention.to_string(),
                requested.use_intra_attention.to_string(),
            );
        }
        // the bias table is only a parameter when intra-sentence attention is on
        if self.use_intra_attention && self.distance_biases != requested.distance_biases {
            return mismatch(
                "distance_biases",
                self.distance_biases.to_string(),
                requested.distance_biases.to_string(),
            );
        }

        Ok(())
    }
}
