#![allow(dead_code)]

use std::path::PathBuf;

use burn::{
    backend::{Autodiff, NdArray},
    data::dataloader::batcher::Batcher as _,
    tensor::backend::Backend,
};
use burn_rte::{
    checkpoint::{Checkpoint, Checkpointer},
    datasets::{
        embeddings::{assemble, generate_reserved},
        rte::Dataset,
        EmbeddingMatrix, LabelDict, Pair, Preprocessing, Vocabulary,
    },
    models::{Architecture, ClassifierConfig},
    pipelines::entailment::{batcher::Infer, Batcher},
    session::Session,
};

pub type TestBackend = NdArray;
pub type TestAutodiffBackend = Autodiff<NdArray>;

pub const EMBEDDING_SIZE: usize = 6;
pub const NUM_UNITS: usize = 8;

pub struct Fixture<B: Backend> {
    pub session: Session<B>,
    pub vocabulary: Vocabulary,
    pub embeddings: EmbeddingMatrix,
    pub labels: LabelDict,
    pub dataset: Dataset,
    pub config: ClassifierConfig,
}

impl<B: Backend> Fixture<B> {
    pub fn new(seed: u64, architecture: Architecture) -> Self {
        let mut session = Session::<B>::new(Default::default(), seed);

        let words = ["cat", "sat", "dog", "ran"];
        let values = session.uniform_values(words.len() * EMBEDDING_SIZE, 1.0);
        let loaded = EmbeddingMatrix::new(words.len(), EMBEDDING_SIZE, values).unwrap();
        let reserved = generate_reserved(EMBEDDING_SIZE, session.rng());
        let words = words.iter().map(|word| word.to_string()).collect();
        let (vocabulary, embeddings) = assemble(words, loaded, reserved, true).unwrap();

        let pairs = pairs();
        let labels = LabelDict::from_pairs(&pairs, 3).unwrap();
        let dataset = Dataset::from_pairs(&pairs, &vocabulary, &labels).unwrap();

        let config = ClassifierConfig::new(
            architecture,
            NUM_UNITS,
            embeddings.rows,
            embeddings.cols,
        );

        Self {
            session,
            vocabulary,
            embeddings,
            labels,
            dataset,
            config,
        }
    }

    pub fn checkpointer(&self, dir: &PathBuf) -> Checkpointer {
        Checkpointer::new(
            dir,
            Checkpoint::new(
                self.config.clone(),
                self.labels.clone(),
                Preprocessing::default(),
                self.embeddings.reserved(),
            ),
        )
        .unwrap()
    }

    pub fn batch(&self, min_length: Option<usize>) -> Infer<B> {
        let mut batcher = Batcher::<B>::new(self.session.device().clone());
        batcher.min_length = min_length;

        batcher.batch(self.dataset.items(&[0, 1, 2, 3]))
    }
}

fn tokens(sentence: &str) -> Vec<String> {
    sentence.split_whitespace().map(str::to_string).collect()
}

pub fn pair(premise: &str, hypothesis: &str, label: &str) -> Pair {
    Pair::new(tokens(premise), tokens(hypothesis), label.to_string())
}

/// Four pairs over the vocabulary `cat sat dog ran`, using all three labels
pub fn pairs() -> Vec<Pair> {
    vec![
        pair("cat sat", "cat sat", "entailment"),
        pair("dog ran", "cat sat", "contradiction"),
        pair("cat sat", "dog", "neutral"),
        pair("dog ran", "dog ran", "entailment"),
    ]
}

/// A fresh, empty directory under the system temporary directory
pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("burn-rte-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();

    dir
}

pub fn values<B: Backend, const D: usize>(tensor: burn::tensor::Tensor<B, D>) -> Vec<f32> {
    tensor.into_data().convert::<f32>().value
}

pub fn assert_close(left: &[f32], right: &[f32], tolerance: f32) {
    assert_eq!(left.len(), right.len());

    for (index, (a, b)) in left.iter().zip(right).enumerate() {
        assert!(
            (a - b).abs() <= tolerance,
            "values differ at {}: {} vs {}",
            index,
            a,
            b
        );
    }
}
