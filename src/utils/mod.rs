/// File utilities
pub mod files;

/// Tensor Utilities
pub mod tensors;

/// Utilities for classification labels
pub mod classes;

/// Numpy `.npy` arrays and `.npz` archives
pub mod numpy;
