use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::utils::classes::{enumerate_labels, invert_map};

use super::{corpus::Pair, DatasetError};

/// A mapping from corpus label strings to class ids, built from the training split.
///
/// Serialized as a plain JSON object (`{"contradiction": 0, ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelDict {
    label2id: BTreeMap<String, usize>,
}

impl LabelDict {
    /// Collect the labels present in the training pairs. Fails when the corpus uses more
    /// distinct labels than the classifier has classes.
    pub fn from_pairs(pairs: &[Pair], num_classes: usize) -> Result<Self, DatasetError> {
        let label2id = enumerate_labels(pairs.iter().map(|pair| pair.label.as_str()));

        if label2id.len() > num_classes {
            return Err(DatasetError::TooManyLabels {
                found: label2id.keys().cloned().collect(),
                num_classes,
            });
        }

        Ok(Self { label2id })
    }

    /// Wrap an existing mapping, such as one restored from a checkpoint
    pub fn new(label2id: BTreeMap<String, usize>) -> Self {
        Self { label2id }
    }

    /// The id of `label`, if it was seen during training
    pub fn id(&self, label: &str) -> Option<usize> {
        self.label2id.get(label).copied()
    }

    /// A mapping from class ids back to labels
    pub fn id2label(&self) -> BTreeMap<usize, String> {
        invert_map(self.label2id.clone())
    }

    /// Number of known labels
    pub fn len(&self) -> usize {
        self.label2id.len()
    }

    /// Whether no labels are known
    pub fn is_empty(&self) -> bool {
        self.label2id.is_empty()
    }
}
