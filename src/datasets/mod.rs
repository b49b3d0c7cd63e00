use std::path::PathBuf;

/// Tokenized sentence pairs and corpus readers
pub mod corpus;

/// Pretrained word embeddings
pub mod embeddings;

/// Label dictionaries
pub mod labels;

/// Padded RTE datasets
pub mod rte;

/// Sentence tokenization
pub mod tokenizer;

/// Token vocabularies
pub mod vocabulary;

pub use corpus::{read_corpus, Pair, Preprocessing};
pub use embeddings::EmbeddingMatrix;
pub use labels::LabelDict;
pub use tokenizer::Language;
pub use vocabulary::Vocabulary;

/// Dataset Error
#[derive(thiserror::Error, Debug)]
pub enum DatasetError {
    /// A file could not be read or written
    #[error("unable to access {path}: {source}")]
    Io {
        /// The file involved
        path: PathBuf,
        /// The underlying failure
        source: std::io::Error,
    },

    /// A row of a corpus or embedding file could not be parsed
    #[error("malformed row at {path}:{line}: {message}")]
    MalformedRow {
        /// The file involved
        path: PathBuf,
        /// One-based line number
        line: usize,
        /// What went wrong
        message: String,
    },

    /// An evaluation pair carries a label the training split never produced
    #[error("example {index} has label {label:?}, which does not occur in the training data")]
    UnknownLabel {
        /// Position of the pair in its corpus
        index: usize,
        /// The offending label
        label: String,
    },

    /// The training split has more distinct labels than the classifier has classes
    #[error("found labels {found:?}, but the classifier only has {num_classes} classes")]
    TooManyLabels {
        /// Every distinct label found
        found: Vec<String>,
        /// Number of classifier outputs
        num_classes: usize,
    },

    /// Parallel sequences of a dataset differ in length
    #[error("{premises} premises, {hypotheses} hypotheses and {labels} labels do not line up")]
    LengthMismatch {
        /// Number of premises
        premises: usize,
        /// Number of hypotheses
        hypotheses: usize,
        /// Number of labels
        labels: usize,
    },

    /// A sentence contains the padding id as content
    #[error("sentence {index} contains the padding id")]
    PaddingInContent {
        /// Position of the sentence
        index: usize,
    },

    /// Embedding rows differ in dimensionality
    #[error("embedding on line {line} has {found} dimensions, expected {expected}")]
    EmbeddingDimension {
        /// One-based line number
        line: usize,
        /// Dimensionality of the first row
        expected: usize,
        /// Dimensionality of the offending row
        found: usize,
    },

    /// An embedding matrix does not hold `rows * cols` values
    #[error("embedding matrix of shape ({rows}, {cols}) cannot hold {values} values")]
    EmbeddingShape {
        /// Declared rows
        rows: usize,
        /// Declared columns
        cols: usize,
        /// Number of values present
        values: usize,
    },

    /// A numpy embedding file was given without its vocabulary file
    #[error("{0} is a numpy array, which needs a vocabulary file")]
    MissingVocabulary(PathBuf),

    /// A numpy file could not be decoded
    #[error("unable to decode numpy array {path}: {message}")]
    Numpy {
        /// The file involved
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// A vocabulary file and its embedding matrix disagree on the number of words
    #[error("vocabulary has {words} words, but the embedding matrix has {rows} rows")]
    VocabularySize {
        /// Lines in the vocabulary file
        words: usize,
        /// Rows in the embedding matrix
        rows: usize,
    },

    /// An embedding file contains no vectors
    #[error("no embeddings found in {0}")]
    EmptyEmbeddings(PathBuf),

    /// Unsupported corpus language
    #[error("no tokenizer for language {0}")]
    UnknownLanguage(String),
}
