use burn::data::dataset;

use crate::pipelines::entailment::Item;

use super::{
    corpus::Pair,
    labels::LabelDict,
    vocabulary::{Vocabulary, PADDING_ID},
    DatasetError,
};

/// The name of the RTE dataset family
pub static DATASET: &str = "rte";

/// A rectangular matrix of sentence ids, right-padded with the padding id, plus the true length of
/// every row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceMatrix {
    ids: Vec<usize>,
    lengths: Vec<usize>,
    width: usize,
}

impl SentenceMatrix {
    /// Pad `sentences` to the length of the longest one
    pub fn from_sentences(sentences: &[Vec<usize>]) -> Result<Self, DatasetError> {
        let width = sentences.iter().map(Vec::len).max().unwrap_or(0);
        let mut ids = vec![PADDING_ID; sentences.len() * width];
        let mut lengths = Vec::with_capacity(sentences.len());

        for (index, sentence) in sentences.iter().enumerate() {
            if sentence.contains(&PADDING_ID) {
                return Err(DatasetError::PaddingInContent { index });
            }

            ids[index * width..index * width + sentence.len()].copy_from_slice(sentence);
            lengths.push(sentence.len());
        }

        Ok(Self {
            ids,
            lengths,
            width,
        })
    }

    /// The unpadded ids of a row
    pub fn row(&self, index: usize) -> &[usize] {
        let start = index * self.width;

        &self.ids[start..start + self.lengths[index]]
    }

    /// True lengths of every row
    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// The padded width
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    /// Whether the matrix has no rows
    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }
}

/// Index-aligned premises, hypotheses and label ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    premises: SentenceMatrix,
    hypotheses: SentenceMatrix,
    labels: Vec<usize>,
}

impl Dataset {
    /// Assemble a dataset, checking that the three parallel sequences line up
    pub fn new(
        premises: SentenceMatrix,
        hypotheses: SentenceMatrix,
        labels: Vec<usize>,
    ) -> Result<Self, DatasetError> {
        if premises.len() != hypotheses.len() || premises.len() != labels.len() {
            return Err(DatasetError::LengthMismatch {
                premises: premises.len(),
                hypotheses: hypotheses.len(),
                labels: labels.len(),
            });
        }

        Ok(Self {
            premises,
            hypotheses,
            labels,
        })
    }

    /// Map tokenized pairs to ids. Every sentence is prefixed with the null token. A label that
    /// the training split never produced is an error naming the offending pair.
    pub fn from_pairs(
        pairs: &[Pair],
        vocabulary: &Vocabulary,
        label_dict: &LabelDict,
    ) -> Result<Self, DatasetError> {
        let premises: Vec<_> = pairs
            .iter()
            .map(|pair| vocabulary.encode(&pair.premise))
            .collect();
        let hypotheses: Vec<_> = pairs
            .iter()
            .map(|pair| vocabulary.encode(&pair.hypothesis))
            .collect();

        let labels = pairs
            .iter()
            .enumerate()
            .map(|(index, pair)| {
                label_dict
                    .id(&pair.label)
                    .ok_or_else(|| DatasetError::UnknownLabel {
                        index,
                        label: pair.label.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(
            SentenceMatrix::from_sentences(&premises)?,
            SentenceMatrix::from_sentences(&hypotheses)?,
            labels,
        )
    }

    /// The premise matrix
    pub fn premises(&self) -> &SentenceMatrix {
        &self.premises
    }

    /// The hypothesis matrix
    pub fn hypotheses(&self) -> &SentenceMatrix {
        &self.hypotheses
    }

    /// Label ids
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Collect the items at `indices`, in that order
    pub fn items(&self, indices: &[usize]) -> Vec<Item> {
        indices.iter().map(|index| self.item(*index)).collect()
    }

    fn item(&self, index: usize) -> Item {
        Item::new(
            self.premises.row(index).to_vec(),
            self.hypotheses.row(index).to_vec(),
            self.labels[index],
        )
    }
}

/// Implement the Dataset trait for the RTE dataset
impl dataset::Dataset<Item> for Dataset {
    /// Returns a specific item from the dataset
    fn get(&self, index: usize) -> Option<Item> {
        (index < self.labels.len()).then(|| self.item(index))
    }

    /// Returns the length of the dataset
    fn len(&self) -> usize {
        self.labels.len()
    }
}
