use std::{collections::HashSet, path::Path};

use burn::tensor::{backend::Backend, Tensor};
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::utils::{
    files::{read_bytes, read_file, read_text, write_atomic},
    numpy, tensors,
};

use super::{
    vocabulary::{Vocabulary, NUM_RESERVED},
    DatasetError,
};

/// File holding the rows of the reserved tokens, written next to a checkpoint
pub static EXTRA_EMBEDDINGS_FILE: &str = "extra-embeddings.json";

/// Half-width of the interval reserved rows are drawn from
const RESERVED_INIT_LIMIT: f32 = 0.1;

/// A dense row-major embedding matrix kept on the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMatrix {
    /// Number of rows (vocabulary entries)
    pub rows: usize,

    /// Number of columns (embedding dimensionality)
    pub cols: usize,

    /// Row-major values
    pub values: Vec<f32>,
}

impl EmbeddingMatrix {
    /// Wrap row-major values, checking the shape
    pub fn new(rows: usize, cols: usize, values: Vec<f32>) -> Result<Self, DatasetError> {
        if values.len() != rows * cols {
            return Err(DatasetError::EmbeddingShape {
                rows,
                cols,
                values: values.len(),
            });
        }

        Ok(Self { rows, cols, values })
    }

    /// A single row
    pub fn row(&self, index: usize) -> &[f32] {
        &self.values[index * self.cols..(index + 1) * self.cols]
    }

    /// The rows of the reserved tokens
    pub fn reserved(&self) -> EmbeddingMatrix {
        let rows = NUM_RESERVED.min(self.rows);

        EmbeddingMatrix {
            rows,
            cols: self.cols,
            values: self.values[..rows * self.cols].to_vec(),
        }
    }

    /// Stack `other` below this matrix
    pub fn stack(mut self, other: &EmbeddingMatrix) -> Result<Self, DatasetError> {
        if self.cols != other.cols {
            return Err(DatasetError::EmbeddingDimension {
                line: self.rows + 1,
                expected: self.cols,
                found: other.cols,
            });
        }

        self.values.extend_from_slice(&other.values);
        self.rows += other.rows;

        Ok(self)
    }

    /// Scale every row to unit L2 norm; all-zero rows are left as they are
    pub fn normalize(mut self) -> Self {
        for row in self.values.chunks_mut(self.cols.max(1)) {
            let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();

            if norm > 0.0 {
                row.iter_mut().for_each(|v| *v /= norm);
            }
        }

        self
    }

    /// Move the matrix onto a device
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        tensors::matrix(self.values.clone(), self.rows, self.cols, device)
    }
}

/// Draw the rows of the reserved tokens uniformly from `[-0.1, 0.1)`
pub fn generate_reserved<R: Rng>(embedding_size: usize, rng: &mut R) -> EmbeddingMatrix {
    let values = (0..NUM_RESERVED * embedding_size)
        .map(|_| rng.gen_range(-RESERVED_INIT_LIMIT..RESERVED_INIT_LIMIT))
        .collect();

    EmbeddingMatrix {
        rows: NUM_RESERVED,
        cols: embedding_size,
        values,
    }
}

/// Read the reserved rows saved alongside a checkpoint
pub async fn read_reserved(dir: &Path) -> Result<EmbeddingMatrix, DatasetError> {
    let path = dir.join(EXTRA_EMBEDDINGS_FILE);
    let contents = read_text(&path).await.map_err(|source| DatasetError::Io {
        path: path.clone(),
        source,
    })?;

    let matrix: EmbeddingMatrix =
        serde_json::from_str(&contents).map_err(|e| DatasetError::MalformedRow {
            path: path.clone(),
            line: e.line(),
            message: e.to_string(),
        })?;

    if matrix.rows != NUM_RESERVED {
        return Err(DatasetError::EmbeddingShape {
            rows: matrix.rows,
            cols: matrix.cols,
            values: matrix.values.len(),
        });
    }

    EmbeddingMatrix::new(matrix.rows, matrix.cols, matrix.values)
}

/// Save the reserved rows so a later run can rebuild an identical table
pub fn write_reserved(dir: &Path, matrix: &EmbeddingMatrix) -> Result<(), DatasetError> {
    let path = dir.join(EXTRA_EMBEDDINGS_FILE);

    let contents =
        serde_json::to_vec(&matrix.reserved()).map_err(|e| DatasetError::MalformedRow {
            path: path.clone(),
            line: 0,
            message: e.to_string(),
        })?;

    write_atomic(&path, &contents).map_err(|source| DatasetError::Io { path, source })
}

/// Read word embeddings. A `.npy` file holds the matrix and needs `vocabulary`, a file with one
/// word per row; anything else is read as text.
pub async fn read_embeddings(
    path: impl AsRef<Path>,
    vocabulary: Option<&Path>,
) -> Result<(Vec<String>, EmbeddingMatrix), DatasetError> {
    let path = path.as_ref();

    if path.extension().is_some_and(|extension| extension == "npy") {
        let vocabulary =
            vocabulary.ok_or_else(|| DatasetError::MissingVocabulary(path.to_path_buf()))?;

        return read_numpy_embeddings(path, vocabulary).await;
    }

    read_text_embeddings(path).await
}

/// Read a text embedding file (`word v1 ... vn` per line, with an optional `count dim` header).
/// Duplicate words and rows for the reserved tokens are skipped.
pub async fn read_text_embeddings(
    path: impl AsRef<Path>,
) -> Result<(Vec<String>, EmbeddingMatrix), DatasetError> {
    let path = path.as_ref();
    info!("Reading embeddings from {}", path.display());

    let lines = read_file(path).await.map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let reserved = Vocabulary::new(Vec::<String>::new());
    let mut seen = HashSet::new();
    let mut words = Vec::new();
    let mut values = Vec::new();
    let mut cols = None;

    for (index, line) in lines.iter().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();

        if fields.is_empty() || (index == 0 && is_header(&fields)) {
            continue;
        }

        let (word, vector) = (fields[0], &fields[1..]);
        let expected = *cols.get_or_insert(vector.len());

        if vector.len() != expected {
            return Err(DatasetError::EmbeddingDimension {
                line: index + 1,
                expected,
                found: vector.len(),
            });
        }

        if reserved.contains(word) || !seen.insert(word.to_string()) {
            warn!("Skipping repeated embedding for {:?} on line {}", word, index + 1);
            continue;
        }

        for field in vector {
            let value = field
                .parse::<f32>()
                .map_err(|e| DatasetError::MalformedRow {
                    path: path.to_path_buf(),
                    line: index + 1,
                    message: e.to_string(),
                })?;
            values.push(value);
        }

        words.push(word.to_string());
    }

    let cols = cols.ok_or_else(|| DatasetError::EmptyEmbeddings(path.to_path_buf()))?;
    let matrix = EmbeddingMatrix::new(words.len(), cols, values)?;

    debug!("Embeddings have shape ({}, {})", matrix.rows, matrix.cols);

    Ok((words, matrix))
}

/// Read a `(words, dim)` numpy matrix and the vocabulary file naming its rows. Duplicate words
/// and rows for the reserved tokens are skipped.
pub async fn read_numpy_embeddings(
    path: &Path,
    vocabulary: &Path,
) -> Result<(Vec<String>, EmbeddingMatrix), DatasetError> {
    info!(
        "Reading embeddings from {} with vocabulary {}",
        path.display(),
        vocabulary.display()
    );

    let bytes = read_bytes(path).await.map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let array = numpy::read_array(&bytes).map_err(|e| DatasetError::Numpy {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let (rows, cols) = array.matrix_shape().ok_or_else(|| DatasetError::Numpy {
        path: path.to_path_buf(),
        message: format!("expected a matrix, found shape {:?}", array.shape),
    })?;

    let lines = read_file(vocabulary).await.map_err(|source| DatasetError::Io {
        path: vocabulary.to_path_buf(),
        source,
    })?;
    let words: Vec<&str> = lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect();

    if words.len() != rows {
        return Err(DatasetError::VocabularySize {
            words: words.len(),
            rows,
        });
    }

    let reserved = Vocabulary::new(Vec::<String>::new());
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    let mut values = Vec::with_capacity(array.values.len());

    for (index, word) in words.into_iter().enumerate() {
        if reserved.contains(word) || !seen.insert(word) {
            warn!("Skipping repeated embedding for {:?} in row {}", word, index);
            continue;
        }

        values.extend_from_slice(&array.values[index * cols..(index + 1) * cols]);
        kept.push(word.to_string());
    }

    if kept.is_empty() {
        return Err(DatasetError::EmptyEmbeddings(path.to_path_buf()));
    }

    let matrix = EmbeddingMatrix::new(kept.len(), cols, values)?;
    debug!("Embeddings have shape ({}, {})", matrix.rows, matrix.cols);

    Ok((kept, matrix))
}

/// Combine reserved rows and loaded word rows into one table with its vocabulary. Only the loaded
/// rows are normalized.
pub fn assemble(
    words: Vec<String>,
    loaded: EmbeddingMatrix,
    reserved: EmbeddingMatrix,
    normalize: bool,
) -> Result<(Vocabulary, EmbeddingMatrix), DatasetError> {
    let vocabulary = Vocabulary::new(words);
    let loaded = if normalize { loaded.normalize() } else { loaded };
    let matrix = reserved.stack(&loaded)?;

    debug_assert_eq!(vocabulary.len(), matrix.rows);

    Ok((vocabulary, matrix))
}

/// Read an embedding file and put the reserved rows in front of it, generating them when no
/// saved rows are given
pub async fn load_table<R: Rng>(
    path: impl AsRef<Path>,
    vocabulary: Option<&Path>,
    reserved: Option<EmbeddingMatrix>,
    rng: &mut R,
) -> Result<(Vocabulary, EmbeddingMatrix), DatasetError> {
    let (words, loaded) = read_embeddings(path, vocabulary).await?;
    let reserved = reserved.unwrap_or_else(|| generate_reserved(loaded.cols, rng));

    assemble(words, loaded, reserved, true)
}

fn is_header(fields: &[&str]) -> bool {
    fields.len() == 2 && fields.iter().all(|field| field.parse::<usize>().is_ok())
}

#[cfg(test)]
mod tests {
    use npyz::WriterBuilder;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[tokio::test]
    async fn test_read_and_assemble() {
        let dir = std::env::temp_dir().join(format!("burn-rte-emb-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("vectors.txt");
        std::fs::write(&path, "2 2\ncat 3 4\nsat 0 2\ncat 1 1\n").unwrap();

        let (words, loaded) = read_embeddings(&path, None).await.unwrap();
        assert_eq!(words, vec!["cat".to_string(), "sat".to_string()]);

        let reserved = generate_reserved(2, &mut StdRng::seed_from_u64(1));
        let (vocabulary, matrix) = assemble(words, loaded, reserved, true).unwrap();

        assert_eq!(vocabulary.len(), 5);
        assert_eq!(matrix.rows, 5);
        assert_eq!(matrix.row(vocabulary.id("cat")), &[0.6, 0.8]);
        assert_eq!(matrix.row(vocabulary.id("sat")), &[0.0, 1.0]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_ragged_rows_are_rejected() {
        let dir = std::env::temp_dir().join(format!("burn-rte-ragged-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("vectors.txt");
        std::fs::write(&path, "cat 3 4\nsat 0\n").unwrap();

        let result = read_embeddings(&path, None).await;
        assert!(matches!(
            result,
            Err(DatasetError::EmbeddingDimension { line: 2, expected: 2, found: 1 })
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_reserved_round_trip() {
        let dir = std::env::temp_dir().join(format!("burn-rte-reserved-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let reserved = generate_reserved(4, &mut StdRng::seed_from_u64(2));
        let table = reserved
            .clone()
            .stack(&EmbeddingMatrix::new(1, 4, vec![1.0; 4]).unwrap())
            .unwrap();

        write_reserved(&dir, &table).unwrap();

        assert_eq!(read_reserved(&dir).await.unwrap(), reserved);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    fn write_npy(path: &Path, shape: &[u64], values: &[f32]) {
        let mut buffer = Vec::new();
        let mut writer = npyz::WriteOptions::new()
            .default_dtype()
            .shape(shape)
            .writer(&mut buffer)
            .begin_nd()
            .unwrap();
        writer.extend(values.iter().copied()).unwrap();
        writer.finish().unwrap();

        std::fs::write(path, buffer).unwrap();
    }

    #[tokio::test]
    async fn test_read_numpy_with_vocabulary() {
        let dir = std::env::temp_dir().join(format!("burn-rte-npy-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("vectors.npy");
        let vocab = dir.join("vocabulary.txt");
        write_npy(&path, &[3, 2], &[3.0, 4.0, 9.0, 9.0, 0.0, 2.0]);
        std::fs::write(&vocab, "cat\n<PAD>\nsat\n").unwrap();

        assert!(matches!(
            read_embeddings(&path, None).await,
            Err(DatasetError::MissingVocabulary(_))
        ));

        let (words, loaded) = read_embeddings(&path, Some(&vocab)).await.unwrap();
        assert_eq!(words, vec!["cat".to_string(), "sat".to_string()]);
        assert_eq!(loaded.values, vec![3.0, 4.0, 0.0, 2.0]);

        let reserved = generate_reserved(2, &mut StdRng::seed_from_u64(3));
        let (vocabulary, matrix) = assemble(words, loaded, reserved, true).unwrap();
        assert_eq!(matrix.row(vocabulary.id("cat")), &[0.6, 0.8]);

        std::fs::write(&vocab, "cat\nsat\n").unwrap();
        assert!(matches!(
            read_embeddings(&path, Some(&vocab)).await,
            Err(DatasetError::VocabularySize { words: 2, rows: 3 })
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
