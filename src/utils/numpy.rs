use std::io::{self, Cursor};

use npyz::{npz::NpzArchive, NpyFile};

/// A dense array read from numpy, converted to `f32`
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    /// Dimensions, outermost first
    pub shape: Vec<usize>,

    /// Row-major values
    pub values: Vec<f32>,
}

impl Array {
    /// The `(rows, cols)` of a two-dimensional array
    pub fn matrix_shape(&self) -> Option<(usize, usize)> {
        match self.shape.as_slice() {
            [rows, cols] => Some((*rows, *cols)),
            _ => None,
        }
    }
}

/// Parse the contents of a `.npy` file holding `float32` or `float64` values
pub fn read_array(bytes: &[u8]) -> io::Result<Array> {
    let npy = NpyFile::new(bytes)?;
    let shape = to_usize(npy.shape());

    let values = match npy.into_vec::<f32>() {
        Ok(values) => values,
        Err(_) => widen(NpyFile::new(bytes)?.into_vec::<f64>()?),
    };

    Ok(Array { shape, values })
}

/// Parse the entry `name` of an `.npz` archive, or `None` when the archive has no such entry
pub fn read_archive_entry(bytes: Vec<u8>, name: &str) -> io::Result<Option<Array>> {
    let mut archive = NpzArchive::new(Cursor::new(bytes))?;

    let Some(npy) = archive.by_name(name)? else {
        return Ok(None);
    };
    let shape = to_usize(npy.shape());

    if let Ok(values) = npy.into_vec::<f32>() {
        return Ok(Some(Array { shape, values }));
    }

    let values = match archive.by_name(name)? {
        Some(npy) => widen(npy.into_vec::<f64>()?),
        None => return Ok(None),
    };

    Ok(Some(Array { shape, values }))
}

fn to_usize(shape: &[u64]) -> Vec<usize> {
    shape.iter().map(|dim| *dim as usize).collect()
}

fn widen(values: Vec<f64>) -> Vec<f32> {
    values.into_iter().map(|value| value as f32).collect()
}
