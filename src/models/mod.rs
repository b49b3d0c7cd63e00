use std::path::PathBuf;

/// Self- and cross-sentence attention
pub mod attention;

/// The attend-compare-aggregate classifier
pub mod classifier;

/// Architecture hyperparameters
pub mod config;

/// Token encoders in front of attention
pub mod encoder;

/// Two-layer ReLU networks
pub mod feed_forward;

/// The recurrent encoder of the `lstm` architecture
pub mod lstm;

pub use classifier::Classifier;
pub use config::{Architecture, ClassifierConfig};
pub use lstm::LstmWeights;

/// Model Error
#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    /// No architecture found for the given string
    #[error("no architecture named {0} (expected `mlp` or `lstm`)")]
    UnknownArchitecture(String),

    /// Hyperparameters no model can be built from
    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),

    /// The embedding table does not match the configured width
    #[error("embeddings have {found} dimensions, but the model expects {expected}")]
    EmbeddingSize {
        /// Configured embedding size
        expected: usize,
        /// Width of the supplied table
        found: usize,
    },

    /// Pretrained recurrent weights were given to a model without a recurrent encoder
    #[error("pretrained LSTM weights cannot be used with the {0} architecture")]
    UnexpectedLstmWeights(config::Architecture),

    /// Pretrained gate matrix of the wrong shape
    #[error("LSTM weights have shape {found:?}, expected {expected:?}")]
    LstmWeights {
        /// `(input_size + num_units, 4 * num_units)`
        expected: (usize, usize),
        /// Shape of the supplied matrix
        found: (usize, usize),
    },

    /// Pretrained gate bias of the wrong length
    #[error("LSTM bias has {found} entries, expected {expected}")]
    LstmBias {
        /// `4 * num_units`
        expected: usize,
        /// Length of the supplied bias
        found: usize,
    },

    /// A saved model disagrees with the requested architecture
    #[error("saved model has {field} = {saved}, but {requested} was requested")]
    Incompatible {
        /// The conflicting hyperparameter
        field: &'static str,
        /// Value recorded with the saved model
        saved: String,
        /// Value asked for
        requested: String,
    },

    /// A model file could not be read
    #[error("unable to read {path}: {source}")]
    Io {
        /// The file involved
        path: PathBuf,
        /// The underlying failure
        source: std::io::Error,
    },

    /// A model file is not valid JSON of the expected form
    #[error("unable to parse {path}: {source}")]
    Json {
        /// The file involved
        path: PathBuf,
        /// The underlying failure
        source: serde_json::Error,
    },

    /// A numpy archive is missing an array or holds one of the wrong form
    #[error("unable to decode numpy archive {path}: {message}")]
    Numpy {
        /// The file involved
        path: PathBuf,
        /// What went wrong
        message: String,
    },
}
