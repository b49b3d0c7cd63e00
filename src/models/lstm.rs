use std::path::Path;

use burn::{
    module::{Module, Param},
    tensor::{activation::sigmoid, backend::Backend, Tensor},
};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    session::Session,
    utils::{
        files::{read_bytes, read_text},
        numpy::{self, Array},
        tensors,
    },
};

use super::ModelError;

/// Added to the forget gate pre-activation at run time
pub const FORGET_BIAS: f64 = 1.0;

/// Pretrained recurrent parameters: a fused `(input_size + num_units, 4 * num_units)` gate matrix
/// and its `4 * num_units` bias, gates ordered input, candidate, forget, output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmWeights {
    /// Gate matrix rows
    pub weights: Vec<Vec<f32>>,

    /// Gate bias
    pub bias: Vec<f32>,
}

impl LstmWeights {
    /// Read weights from a numpy `.npz` archive with `weights` and `bias` arrays, or from a JSON
    /// file of the form `{"weights": [[...]], "bias": [...]}`
    pub async fn load(path: &Path) -> Result<Self, ModelError> {
        info!("Reading LSTM weights from {}", path.display());

        if path.extension().is_some_and(|extension| extension == "npz") {
            return Self::load_archive(path).await;
        }

        let contents = read_text(path).await.map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|source| ModelError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    async fn load_archive(path: &Path) -> Result<Self, ModelError> {
        let bytes = read_bytes(path).await.map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let entry = |name: &str| -> Result<Array, ModelError> {
            let decode_error = |message: String| ModelError::Numpy {
                path: path.to_path_buf(),
                message,
            };

            numpy::read_archive_entry(bytes.clone(), name)
                .map_err(|e| decode_error(e.to_string()))?
                .ok_or_else(|| decode_error(format!("no array named {:?}", name)))
        };

        let weights = entry("weights")?;
        let bias = entry("bias")?;

        let (_, cols) = weights.matrix_shape().ok_or_else(|| ModelError::Numpy {
            path: path.to_path_buf(),
            message: format!("weights must be a matrix, found shape {:?}", weights.shape),
        })?;
        if bias.shape.len() != 1 {
            return Err(ModelError::Numpy {
                path: path.to_path_buf(),
                message: format!("bias must be a vector, found shape {:?}", bias.shape),
            });
        }

        Ok(Self {
            weights: weights
                .values
                .chunks(cols.max(1))
                .map(<[f32]>::to_vec)
                .collect(),
            bias: bias.values,
        })
    }

    fn check_shape(&self, input_size: usize, num_units: usize) -> Result<(), ModelError> {
        let rows = input_size + num_units;
        let cols = 4 * num_units;

        let ragged = self.weights.iter().find(|row| row.len() != cols);
        if self.weights.len() != rows || ragged.is_some() {
            return Err(ModelError::LstmWeights {
                expected: (rows, cols),
                found: (
                    self.weights.len(),
                    ragged.or(self.weights.first()).map_or(0, Vec::len),
                ),
            });
        }

        if self.bias.len() != cols {
            return Err(ModelError::LstmBias {
                expected: cols,
                found: self.bias.len(),
            });
        }

        Ok(())
    }
}

/// A single-layer, unidirectional LSTM over `[batch, length, input_size]` sequences.
///
/// Each position only sees the positions before it, so right padding never changes the outputs
/// at real tokens.
#[derive(Module, Debug)]
pub struct LstmEncoder<B: Backend> {
    /// Fused gate matrix
    pub weights: Param<Tensor<B, 2>>,

    /// Fused gate bias
    pub bias: Param<Tensor<B, 1>>,

    /// Width of the hidden state
    pub num_units: usize,
}

impl<B: Backend> LstmEncoder<B> {
    /// Create an encoder, seeded from `pretrained` when given
    pub fn new(
        input_size: usize,
        num_units: usize,
        pretrained: Option<LstmWeights>,
        session: &mut Session<B>,
    ) -> Result<Self, ModelError> {
        let rows = input_size + num_units;
        let cols = 4 * num_units;

        let (weights, bias) = match pretrained {
            Some(pretrained) => {
                pretrained.check_shape(input_size, num_units)?;

                let values = pretrained.weights.into_iter().flatten().collect();
                (
                    tensors::matrix(values, rows, cols, session.device()),
                    tensors::vector(pretrained.bias, session.device()),
                )
            }
            None => {
                let limit = (6.0 / (rows + cols) as f32).sqrt();
                (
                    session.uniform_matrix(rows, cols, limit),
                    tensors::vector(vec![0.0; cols], session.device()),
                )
            }
        };

        Ok(Self {
            weights: Param::from_tensor(weights),
            bias: Param::from_tensor(bias),
            num_units,
        })
    }

    /// Run over every sentence, returning the hidden state at each position
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch_size, length, input_size] = input.dims();
        let units = self.num_units;
        let device = input.device();

        let weights = self.weights.val();
        let bias = self.bias.val().unsqueeze::<2>();

        let mut hidden = Tensor::<B, 2>::zeros([batch_size, units], &device);
        let mut cell = Tensor::<B, 2>::zeros([batch_size, units], &device);
        let mut outputs = Vec::with_capacity(length);

        for step in 0..length {
            let x = input
                .clone()
                .slice([0..batch_size, step..step + 1, 0..input_size])
                .reshape([batch_size, input_size]);

            let gates = Tensor::cat(vec![x, hidden], 1).matmul(weights.clone()) + bias.clone();
            let gate = |index: usize| {
                gates
                    .clone()
                    .slice([0..batch_size, index * units..(index + 1) * units])
            };

            let input_gate = sigmoid(gate(0));
            let candidate = gate(1).tanh();
            let forget_gate = sigmoid(gate(2).add_scalar(FORGET_BIAS));
            let output_gate = sigmoid(gate(3));

            cell = cell * forget_gate + input_gate * candidate;
            hidden = cell.clone().tanh() * output_gate;

            outputs.push(hidden.clone().unsqueeze_dim::<3>(1));
        }

        if outputs.is_empty() {
            return Tensor::zeros([batch_size, 0, units], &device);
        }

        Tensor::cat(outputs, 1)
    }
}
