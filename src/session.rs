use burn::tensor::{backend::Backend, Tensor};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use crate::utils::tensors;

/// The execution handle for a training or evaluation run.
///
/// Owns the device every tensor is placed on and the random number generator used for parameter
/// initialization and epoch shuffling. Two sessions created with the same seed produce the same
/// parameters and the same batch order.
pub struct Session<B: Backend> {
    device: B::Device,
    rng: StdRng,
}

impl<B: Backend> Session<B> {
    /// Create a session on `device`, seeding both the host generator and the backend generator
    /// (which drives dropout masks)
    pub fn new(device: B::Device, seed: u64) -> Self {
        B::seed(seed);

        Self {
            device,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The device on which tensors are created
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Direct access to the host random number generator
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Sample a `[rows, cols]` matrix uniformly from `[-limit, limit)`
    pub fn uniform_matrix(&mut self, rows: usize, cols: usize, limit: f32) -> Tensor<B, 2> {
        let values = self.uniform_values(rows * cols, limit);

        tensors::matrix(values, rows, cols, &self.device)
    }

    /// Sample a vector uniformly from `[-limit, limit)`
    pub fn uniform_vector(&mut self, length: usize, limit: f32) -> Tensor<B, 1> {
        let values = self.uniform_values(length, limit);

        tensors::vector(values, &self.device)
    }

    /// Sample raw values uniformly from `[-limit, limit)`
    pub fn uniform_values(&mut self, count: usize, limit: f32) -> Vec<f32> {
        if limit <= 0.0 {
            return vec![0.0; count];
        }

        (0..count).map(|_| self.rng.gen_range(-limit..limit)).collect()
    }

    /// A random permutation of `0..len`
    pub fn permutation(&mut self, len: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..len).collect();
        indices.shuffle(&mut self.rng);

        indices
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;

    #[test]
    fn test_same_seed_same_draws() {
        let mut first = Session::<NdArray>::new(Default::default(), 7);
        let mut second = Session::<NdArray>::new(Default::default(), 7);

        assert_eq!(first.permutation(10), second.permutation(10));
        assert_eq!(
            first.uniform_values(5, 0.1),
            second.uniform_values(5, 0.1)
        );
    }

    #[test]
    fn test_permutation_covers_all_indices() {
        let mut session = Session::<NdArray>::new(Default::default(), 3);
        let mut indices = session.permutation(6);
        indices.sort_unstable();

        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    }
}
