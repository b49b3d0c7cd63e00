use burn::LearningRate;

use super::optim::OptimizerKind;

/// Define configuration struct for the experiment
#[derive(burn::config::Config, Debug)]
pub struct TrainingConfig {
    /// Number of passes over the training data
    #[config(default = 10)]
    pub num_epochs: usize,

    /// Batch size
    #[config(default = 32)]
    pub batch_size: usize,

    /// Batch size used for validation; defaults to `batch_size`
    pub eval_batch_size: Option<usize>,

    /// Learning rate
    #[config(default = 0.001)]
    pub learning_rate: LearningRate,

    /// Probability of keeping a unit in dropout layers
    #[config(default = 1.0)]
    pub dropout_keep: f64,

    /// Weight of the L2 penalty on weight matrices
    #[config(default = 0.0)]
    pub l2: f64,

    /// Rescale gradients whose global norm exceeds this value
    pub clip_norm: Option<f64>,

    /// Number of batches between reports
    #[config(default = 100)]
    pub report_interval: usize,

    /// The optimizer
    #[config(default = "OptimizerKind::Adagrad")]
    pub optimizer: OptimizerKind,

    /// Seed for parameter initialization, shuffling and dropout
    #[config(default = 42)]
    pub seed: u64,
}

impl TrainingConfig {
    /// Batch size used for validation
    pub fn eval_batch_size(&self) -> usize {
        self.eval_batch_size.unwrap_or(self.batch_size)
    }
}
