/// Batches of padded sentence pairs
pub mod batcher;

/// Global-norm gradient clipping
pub mod clipping;

/// Training hyperparameters
pub mod config;

/// Evaluation and prediction
pub mod inference;

/// Sentence pair items
pub mod item;

/// Optimizers
pub mod optim;

/// The training loop
pub mod training;

pub use batcher::Batcher;
pub use config::TrainingConfig;
pub use inference::{evaluate, predict, Evaluation};
pub use item::Item;
pub use optim::OptimizerKind;
pub use training::{train, Report, TrainingSummary};

use crate::{checkpoint::CheckpointError, datasets::DatasetError, models::ModelError};

/// Training Error
#[derive(thiserror::Error, Debug)]
pub enum TrainingError {
    /// The loss of a batch was NaN or infinite; parameters were left as they were before it
    #[error("non-finite loss in epoch {epoch}, batch {batch}")]
    NonFiniteLoss {
        /// One-based epoch
        epoch: usize,
        /// One-based batch within the epoch
        batch: usize,
    },

    /// A dataset has no examples
    #[error("the {0} dataset is empty")]
    EmptyDataset(&'static str),

    /// Hyperparameters training cannot run with
    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),

    /// No optimizer found for the given string
    #[error("no optimizer named {0} (expected `adagrad`, `adadelta` or `adam`)")]
    UnknownOptimizer(String),

    /// Writing a checkpoint failed
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// Preparing data failed
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// Building the model failed
    #[error(transparent)]
    Model(#[from] ModelError),
}
