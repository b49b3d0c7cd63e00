use std::path::{Path, PathBuf};

use burn::{
    config::Config,
    module::Module,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::backend::Backend,
};
use derive_new::new;
use log::{debug, info};

use crate::{
    datasets::{
        embeddings::{read_reserved, write_reserved},
        DatasetError, EmbeddingMatrix, LabelDict, Preprocessing,
    },
    models::{Classifier, ClassifierConfig, ModelError},
    session::Session,
    utils::files::{read_text, staging_path, write_atomic},
};

/// Model parameters, without the `.mpk` extension the recorder adds
pub static MODEL_FILE: &str = "model";

/// Architecture hyperparameters
pub static CONFIG_FILE: &str = "config.json";

/// Label dictionary
pub static LABEL_MAP_FILE: &str = "label-map.json";

/// Preprocessing flags
pub static PARAMS_FILE: &str = "params.json";

/// Checkpoint Error
#[derive(thiserror::Error, Debug)]
pub enum CheckpointError {
    /// A checkpoint file could not be written or read
    #[error("unable to access {path}: {source}")]
    Io {
        /// The file involved
        path: PathBuf,
        /// The underlying failure
        source: std::io::Error,
    },

    /// A checkpoint file holds unexpected contents
    #[error("unable to parse {path}: {message}")]
    Parse {
        /// The file involved
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// The model parameters could not be recorded or restored
    #[error("unable to record model parameters at {path}: {message}")]
    Record {
        /// The file involved
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// The reserved embedding rows could not be saved or restored
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// The saved model cannot serve the requested architecture
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Everything needed to rebuild a trained classifier, apart from the word embeddings
#[derive(Debug, Clone, new)]
pub struct Checkpoint {
    /// Architecture hyperparameters
    pub config: ClassifierConfig,

    /// Label dictionary of the training split
    pub labels: LabelDict,

    /// Preprocessing to reapply to new text
    pub preprocessing: Preprocessing,

    /// Embedding rows of the reserved tokens
    pub reserved: EmbeddingMatrix,
}

impl Checkpoint {
    /// Read the metadata of the checkpoint in `dir`
    pub async fn read(dir: &Path) -> Result<Self, CheckpointError> {
        let config: ClassifierConfig = read_json(&dir.join(CONFIG_FILE)).await?;
        let labels = read_json(&dir.join(LABEL_MAP_FILE)).await?;
        let preprocessing = read_json(&dir.join(PARAMS_FILE)).await?;
        let reserved = read_reserved(dir).await?;

        debug!("Read checkpoint metadata from {}", dir.display());

        Ok(Self {
            config,
            labels,
            preprocessing,
            reserved,
        })
    }

    /// Restore the saved parameters into a classifier built for `requested`, then inject
    /// `embeddings` (whose vocabulary may differ from the one used in training).
    ///
    /// Fails when `requested` disagrees with the saved architecture.
    pub fn load_model<B: Backend>(
        &self,
        dir: &Path,
        requested: &ClassifierConfig,
        embeddings: &EmbeddingMatrix,
        session: &mut Session<B>,
    ) -> Result<Classifier<B>, CheckpointError> {
        self.config.ensure_compatible(requested)?;

        let model = requested.init(session, embeddings, None)?;
        let path = dir.join(MODEL_FILE);

        info!("Loading model parameters from {}", dir.display());

        let model = model
            .load_file(path.clone(), &recorder(), session.device())
            .map_err(|e| CheckpointError::Record {
                path,
                message: format!("{:?}", e),
            })?;

        Ok(model.with_embeddings(embeddings.to_tensor(session.device())))
    }
}

/// Writes the best classifier seen so far, together with the metadata needed to reload it
#[derive(Debug, Clone)]
pub struct Checkpointer {
    dir: PathBuf,
    checkpoint: Checkpoint,
}

impl Checkpointer {
    /// Create a checkpointer writing into `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>, checkpoint: Checkpoint) -> Result<Self, CheckpointError> {
        let dir = dir.into();

        std::fs::create_dir_all(&dir).map_err(|source| CheckpointError::Io {
            path: dir.clone(),
            source,
        })?;

        Ok(Self { dir, checkpoint })
    }

    /// The checkpoint directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The metadata written with every save
    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Replace the checkpoint on disk. Every file goes to a staging name first and is renamed
    /// over the previous version.
    pub fn save<B: Backend>(&self, model: &Classifier<B>) -> Result<(), CheckpointError> {
        let config_path = self.dir.join(CONFIG_FILE);
        let staging = staging_path(&config_path);
        self.checkpoint
            .config
            .save(&staging)
            .map_err(|source| CheckpointError::Io {
                path: staging.clone(),
                source,
            })?;
        rename(&staging, &config_path)?;

        write_json(&self.dir.join(LABEL_MAP_FILE), &self.checkpoint.labels)?;
        write_json(&self.dir.join(PARAMS_FILE), &self.checkpoint.preprocessing)?;
        write_reserved(&self.dir, &self.checkpoint.reserved)?;

        // the recorder appends `.mpk` to both names
        let target = self.dir.join(MODEL_FILE);
        let staging = self.dir.join(format!("{}-next", MODEL_FILE));

        model
            .clone()
            .save_file(staging.clone(), &recorder())
            .map_err(|e| CheckpointError::Record {
                path: staging.clone(),
                message: format!("{:?}", e),
            })?;
        rename(&staging.with_extension("mpk"), &target.with_extension("mpk"))?;

        info!("Model saved to {}", self.dir.display());

        Ok(())
    }
}

fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

fn rename(from: &Path, to: &Path) -> Result<(), CheckpointError> {
    std::fs::rename(from, to).map_err(|source| CheckpointError::Io {
        path: to.to_path_buf(),
        source,
    })
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), CheckpointError> {
    let contents = serde_json::to_vec_pretty(value).map_err(|e| CheckpointError::Parse {
        path: path.to_path_buf(),
        message: format!("{:?}", e),
    })?;

    write_atomic(path, &contents).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CheckpointError> {
    let contents = read_text(path).await.map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&contents).map_err(|e| CheckpointError::Parse {
        path: path.to_path_buf(),
        message: format!("{:?}", e),
    })
}
