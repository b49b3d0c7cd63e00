use burn::{
    module::{Module, Param},
    nn::{Dropout, DropoutConfig, Linear},
    tensor::{activation::relu, backend::Backend, Tensor},
};

use crate::{session::Session, utils::tensors};

/// A dense layer with Glorot-uniform weights and zero biases
pub fn dense<B: Backend>(d_input: usize, d_output: usize, session: &mut Session<B>) -> Linear<B> {
    let limit = (6.0 / (d_input + d_output) as f32).sqrt();
    let weight = session.uniform_matrix(d_input, d_output, limit);
    let bias = tensors::vector(vec![0.0; d_output], session.device());

    Linear {
        weight: Param::from_tensor(weight),
        bias: Some(Param::from_tensor(bias)),
    }
}

/// Two ReLU layers, each preceded by dropout.
///
/// Dropout only fires on autodiff backends, so the inner (validation) model passes its input
/// through unchanged.
#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    /// First layer
    pub input: Linear<B>,

    /// Second layer
    pub hidden: Linear<B>,

    /// Dropout applied before each layer
    pub dropout: Dropout,
}

impl<B: Backend> FeedForward<B> {
    /// Create a network mapping `d_input` features to `d_hidden`
    pub fn new(d_input: usize, d_hidden: usize, session: &mut Session<B>) -> Self {
        Self {
            input: dense(d_input, d_hidden, session),
            hidden: dense(d_hidden, d_hidden, session),
            dropout: DropoutConfig::new(0.0).init(),
        }
    }

    /// Replace the dropout probability
    pub fn with_dropout(mut self, prob: f64) -> Self {
        self.dropout = DropoutConfig::new(prob).init();
        self
    }

    /// Apply the network to `[..., d_input]` features
    pub fn forward<const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        let x = relu(self.input.forward(self.dropout.forward(input)));

        relu(self.hidden.forward(self.dropout.forward(x)))
    }
}
