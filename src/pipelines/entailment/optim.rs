use std::fmt::Display;

use burn::{
    module::AutodiffModule,
    optim::{adaptor::OptimizerAdaptor, AdaGradConfig, AdamConfig, Optimizer, SimpleOptimizer},
    record::Record,
    tensor::{
        backend::{AutodiffBackend, Backend},
        Tensor,
    },
    LearningRate,
};
use derive_new::new;
use serde::{Deserialize, Serialize};

use super::TrainingError;

/// Numerical stability term of the burn optimizers
const EPSILON: f32 = 1e-8;

/// The optimizers available for training, fixed for the whole run
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    /// Per-parameter learning rates from accumulated squared gradients
    Adagrad,

    /// Adagrad with decaying accumulators and unit-corrected steps
    Adadelta,

    /// Bias-corrected first and second moment estimates
    Adam,
}

impl TryFrom<&str> for OptimizerKind {
    type Error = TrainingError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "adagrad" => Ok(OptimizerKind::Adagrad),
            "adadelta" => Ok(OptimizerKind::Adadelta),
            "adam" => Ok(OptimizerKind::Adam),
            _ => Err(TrainingError::UnknownOptimizer(value.to_string())),
        }
    }
}

impl Display for OptimizerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OptimizerKind::Adagrad => "adagrad",
            OptimizerKind::Adadelta => "adadelta",
            OptimizerKind::Adam => "adam",
        };

        write!(f, "{}", name)
    }
}

/// Burn's Adagrad
pub fn adagrad<B: AutodiffBackend, M: AutodiffModule<B>>() -> impl Optimizer<M, B> {
    AdaGradConfig::new().with_epsilon(EPSILON).init()
}

/// [`Adadelta`] with its default constants
pub fn adadelta<B: AutodiffBackend, M: AutodiffModule<B>>() -> impl Optimizer<M, B> {
    OptimizerAdaptor::<Adadelta, M, B>::from(Adadelta::default())
}

/// Burn's Adam
pub fn adam<B: AutodiffBackend, M: AutodiffModule<B>>() -> impl Optimizer<M, B> {
    AdamConfig::new().with_epsilon(EPSILON).init()
}

/// Adadelta, scaled by the learning rate
#[derive(Debug, Clone)]
pub struct Adadelta {
    /// Decay of both running averages
    pub rho: f64,

    /// Numerical stability term
    pub epsilon: f64,
}

impl Default for Adadelta {
    fn default() -> Self {
        Self {
            rho: 0.95,
            epsilon: 1e-8,
        }
    }
}

/// Running averages of squared gradients and squared updates
#[derive(Record, Clone, new)]
pub struct AdadeltaState<B: Backend, const D: usize> {
    /// Decayed average of squared gradients
    pub gradients: Tensor<B, D>,

    /// Decayed average of squared updates
    pub updates: Tensor<B, D>,
}

impl<B: Backend> SimpleOptimizer<B> for Adadelta {
    type State<const D: usize> = AdadeltaState<B, D>;

    fn step<const D: usize>(
        &self,
        lr: LearningRate,
        tensor: Tensor<B, D>,
        grad: Tensor<B, D>,
        state: Option<Self::State<D>>,
    ) -> (Tensor<B, D>, Option<Self::State<D>>) {
        let squared = grad.clone() * grad.clone();

        let AdadeltaState { gradients, updates } = match state {
            Some(state) => state,
            None => AdadeltaState::new(squared.zeros_like(), squared.zeros_like()),
        };

        let gradients = gradients.mul_scalar(self.rho) + squared.mul_scalar(1.0 - self.rho);
        let update = updates
            .clone()
            .add_scalar(self.epsilon)
            .sqrt()
            .div(gradients.clone().add_scalar(self.epsilon).sqrt())
            .mul(grad);
        let updates =
            updates.mul_scalar(self.rho) + (update.clone() * update.clone()).mul_scalar(1.0 - self.rho);

        (
            tensor - update.mul_scalar(lr),
            Some(AdadeltaState::new(gradients, updates)),
        )
    }

    fn to_device<const D: usize>(
        mut state: Self::State<D>,
        device: &<B as Backend>::Device,
    ) -> Self::State<D> {
        state.gradients = state.gradients.to_device(device);
        state.updates = state.updates.to_device(device);
        state
    }
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::{Autodiff, NdArray},
        module::{Module, Param},
        optim::GradientsParams,
    };

    use super::*;
    use crate::utils::tensors::{to_vec, vector};

    type TestBackend = NdArray;
    type TestAutodiffBackend = Autodiff<NdArray>;

    #[derive(Module, Debug)]
    struct Point<B: Backend> {
        position: Param<Tensor<B, 1>>,
    }

    /// Minimize `|position|^2` from `(1, -2)`
    fn descend<O>(mut optim: O, steps: usize) -> Vec<f32>
    where
        O: Optimizer<Point<TestAutodiffBackend>, TestAutodiffBackend>,
    {
        let device = Default::default();
        let mut point = Point {
            position: Param::from_tensor(vector::<TestAutodiffBackend>(vec![1.0, -2.0], &device)),
        };

        for _ in 0..steps {
            let position = point.position.val();
            let loss = (position.clone() * position).sum();
            let grads = GradientsParams::from_grads(loss.backward(), &point);

            point = optim.step(0.1, point, grads);
        }

        to_vec(point.position.val().inner())
    }

    #[test]
    fn test_every_optimizer_descends() {
        for (name, values) in [
            ("adagrad", descend(adagrad(), 5)),
            ("adadelta", descend(adadelta(), 5)),
            ("adam", descend(adam(), 5)),
        ] {
            assert!(values[0].abs() < 1.0, "{} did not move toward zero", name);
            assert!(values[1].abs() < 2.0, "{} did not move toward zero", name);
        }
    }

    #[test]
    fn test_adadelta_first_step() {
        let device = Default::default();
        let tensor = vector::<TestBackend>(vec![1.0], &device);

        let (next, state) = Adadelta::default().step(1.0, tensor.clone(), tensor, None);

        // E[g^2] = 0.05, update = sqrt(eps) / sqrt(0.05 + eps) * g
        let expected = 1.0 - (1e-8f64).sqrt() / (0.05f64 + 1e-8).sqrt();
        assert!((to_vec(next)[0] as f64 - expected).abs() < 1e-6);
        assert!(state.is_some());
    }

    #[test]
    fn test_optimizer_names() {
        assert_eq!(OptimizerKind::try_from("Adam").unwrap(), OptimizerKind::Adam);
        assert_eq!(OptimizerKind::Adadelta.to_string(), "adadelta");
        assert!(OptimizerKind::try_from("sgd").is_err());
    }
}
