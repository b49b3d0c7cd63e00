//! Command line tool to train an entailment classifier

use std::path::PathBuf;

use anyhow::anyhow;
use burn::config::Config as _;
use burn_rte::{
    checkpoint::{Checkpoint, Checkpointer},
    cli::{self, TrainingBackend},
    datasets::{
        embeddings::load_table, read_corpus, rte::Dataset, LabelDict, Language, Preprocessing,
    },
    models::{Architecture, ClassifierConfig, LstmWeights},
    pipelines::entailment::{self, OptimizerKind, TrainingConfig},
    session::Session,
};
use log::{debug, info};
use pico_args::Arguments;

const HELP: &str = "\
Usage: train EMBEDDINGS TRAIN VALIDATION SAVE MODEL [OPTIONS]

Arguments:
  EMBEDDINGS           Text or numpy (.npy) file with word embeddings
  TRAIN                JSONL or TSV file with the training corpus
  VALIDATION           JSONL or TSV file with the validation corpus
  SAVE                 Directory to save the model files
  MODEL                Type of architecture ('lstm' or 'mlp')

Options:
  -h, --help           Print help
  --load DIR           Directory with a previously trained model (cannot be used with -w)
  --vocab FILE         Vocabulary file, one word per line (needed for .npy embeddings)
  -e EPOCHS            Number of epochs (default 10)
  -b BATCH_SIZE        Batch size (default 32)
  -u UNITS             Number of hidden units (default 100)
  --no-proj            Do not project input embeddings to the number of hidden units
  -d KEEP              Dropout keep probability (default 1.0)
  -c NORM              Norm to clip training gradients
  -r RATE              Learning rate (default 0.001)
  -w FILE              Numpy archive (.npz) or JSON file with pretrained LSTM weights and bias
  --lang LANG          Language, 'en' or 'pt' (default en; only affects the tokenizer)
  --lower              Lowercase the corpus (use it if the embedding model is lowercased)
  --use-intra          Use intra-sentence attention
  --l2 VALUE           L2 regularization constant (default 0.0)
  --report BATCHES     Number of batches between performance reports (default 100)
  --optim NAME         Optimizer: 'adagrad', 'adadelta' or 'adam' (default adagrad)
  --seed SEED          Random seed (default 42)
  -v                   Verbose
";

#[derive(Debug)]
struct Args {
    embeddings: PathBuf,
    train: PathBuf,
    validation: PathBuf,
    save: PathBuf,
    architecture: Architecture,
    load: Option<PathBuf>,
    vocab: Option<PathBuf>,
    num_epochs: Option<usize>,
    batch_size: Option<usize>,
    num_units: usize,
    project_input: bool,
    dropout_keep: Option<f64>,
    clip_norm: Option<f64>,
    learning_rate: Option<f64>,
    weights: Option<PathBuf>,
    language: Language,
    lowercase: bool,
    use_intra_attention: bool,
    l2: Option<f64>,
    report_interval: Option<usize>,
    optimizer: Option<OptimizerKind>,
    seed: Option<u64>,
    verbose: bool,
}

impl Args {
    fn parse() -> anyhow::Result<Option<Self>> {
        let mut pargs = Arguments::from_env();

        // Help has a higher priority and should be handled separately.
        if pargs.contains(["-h", "--help"]) {
            return Ok(None);
        }

        let language: Option<String> = pargs.opt_value_from_str("--lang")?;
        let optimizer: Option<String> = pargs.opt_value_from_str("--optim")?;

        let args = Args {
            load: pargs.opt_value_from_str("--load")?,
            vocab: pargs.opt_value_from_str("--vocab")?,
            num_epochs: pargs.opt_value_from_str("-e")?,
            batch_size: pargs.opt_value_from_str("-b")?,
            num_units: pargs.opt_value_from_str("-u")?.unwrap_or(100),
            project_input: !pargs.contains("--no-proj"),
            dropout_keep: pargs.opt_value_from_str("-d")?,
            clip_norm: pargs.opt_value_from_str("-c")?,
            learning_rate: pargs.opt_value_from_str("-r")?,
            weights: pargs.opt_value_from_str("-w")?,
            language: match language {
                Some(language) => Language::try_from(language.as_str())?,
                None => Language::English,
            },
            lowercase: pargs.contains("--lower"),
            use_intra_attention: pargs.contains("--use-intra"),
            l2: pargs.opt_value_from_str("--l2")?,
            report_interval: pargs.opt_value_from_str("--report")?,
            optimizer: optimizer
                .map(|name| OptimizerKind::try_from(name.as_str()))
                .transpose()?,
            seed: pargs.opt_value_from_str("--seed")?,
            verbose: pargs.contains("-v"),
            embeddings: cli::required(&mut pargs, "EMBEDDINGS")?,
            train: cli::required(&mut pargs, "TRAIN")?,
            validation: cli::required(&mut pargs, "VALIDATION")?,
            save: cli::required(&mut pargs, "SAVE")?,
            architecture: {
                let model: String = cli::required(&mut pargs, "MODEL")?;
                Architecture::try_from(model.as_str())?
            },
        };

        let remaining = pargs.finish();
        if !remaining.is_empty() {
            return Err(anyhow!("Unexpected arguments: {:?}", remaining));
        }

        args.validate()?;

        Ok(Some(args))
    }

    /// Reject option combinations that would be silently ignored
    fn validate(&self) -> anyhow::Result<()> {
        if self.load.is_some() && self.weights.is_some() {
            return Err(anyhow!(
                "-w cannot be combined with --load: a loaded model keeps its trained LSTM weights"
            ));
        }

        Ok(())
    }

    fn training_config(&self) -> TrainingConfig {
        let mut config = TrainingConfig::new();

        if let Some(num_epochs) = self.num_epochs {
            config.num_epochs = num_epochs;
        }

        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }

        if let Some(learning_rate) = self.learning_rate {
            config.learning_rate = learning_rate;
        }

        if let Some(dropout_keep) = self.dropout_keep {
            config.dropout_keep = dropout_keep;
        }

        if let Some(l2) = self.l2 {
            config.l2 = l2;
        }

        if let Some(report_interval) = self.report_interval {
            config.report_interval = report_interval;
        }

        if let Some(optimizer) = self.optimizer {
            config.optimizer = optimizer;
        }

        if let Some(seed) = self.seed {
            config.seed = seed;
        }

        config.clip_norm = self.clip_norm;

        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Some(args) = Args::parse()? else {
        print!("{}", HELP);

        return Ok(());
    };

    cli::init_logging(args.verbose);

    let config = args.training_config();
    let preprocessing = Preprocessing::new(args.lowercase, args.language);

    let mut session = Session::<TrainingBackend>::new(cli::device(), config.seed);

    let train_pairs = read_corpus(&args.train, preprocessing).await?;
    let valid_pairs = read_corpus(&args.validation, preprocessing).await?;

    let saved = match &args.load {
        Some(dir) => Some(Checkpoint::read(dir).await?),
        None => None,
    };

    // reserved rows come from the loaded model, or are drawn fresh
    let (vocabulary, embeddings) = load_table(
        &args.embeddings,
        args.vocab.as_deref(),
        saved.as_ref().map(|checkpoint| checkpoint.reserved.clone()),
        session.rng(),
    )
    .await?;

    info!("Converting words to indices");

    let model_config = ClassifierConfig::new(
        args.architecture,
        args.num_units,
        embeddings.rows,
        embeddings.cols,
    )
    .with_project_input(args.project_input)
    .with_use_intra_attention(args.use_intra_attention);

    let labels = LabelDict::from_pairs(&train_pairs, model_config.num_classes)?;
    let train = Dataset::from_pairs(&train_pairs, &vocabulary, &labels)?;
    let valid = Dataset::from_pairs(&valid_pairs, &vocabulary, &labels)?;

    debug!(
        "Training sentences have shape ({}, {}) (firsts) and ({}, {}) (seconds)",
        train.premises().len(),
        train.premises().width(),
        train.hypotheses().len(),
        train.hypotheses().width()
    );
    debug!(
        "Validation sentences have shape ({}, {}) (firsts) and ({}, {}) (seconds)",
        valid.premises().len(),
        valid.premises().width(),
        valid.hypotheses().len(),
        valid.hypotheses().width()
    );

    info!("Creating model");

    let model = match (&saved, &args.load) {
        (Some(checkpoint), Some(dir)) => {
            checkpoint.load_model(dir, &model_config, &embeddings, &mut session)?
        }
        _ => {
            let lstm_weights = match &args.weights {
                Some(path) => Some(LstmWeights::load(path).await?),
                None => None,
            };

            model_config.init(&mut session, &embeddings, lstm_weights)?
        }
    };

    let checkpointer = Checkpointer::new(
        &args.save,
        Checkpoint::new(model_config, labels, preprocessing, embeddings.reserved()),
    )?;

    config
        .save(args.save.join("training.json"))
        .map_err(|e| anyhow!("Unable to save the training configuration: {}", e))?;

    info!("Starting training");

    let (_, summary) = entailment::train(
        &mut session,
        model,
        &train,
        &valid,
        &config,
        &checkpointer,
    )?;

    info!(
        "Finished {} epochs ({} batches); best validation accuracy {:.4}",
        summary.epochs,
        summary.batches,
        summary.best_accuracy.unwrap_or_default()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args {
            embeddings: PathBuf::from("vectors.txt"),
            train: PathBuf::from("train.jsonl"),
            validation: PathBuf::from("dev.jsonl"),
            save: PathBuf::from("model"),
            architecture: Architecture::Lstm,
            load: None,
            vocab: None,
            num_epochs: None,
            batch_size: None,
            num_units: 100,
            project_input: true,
            dropout_keep: None,
            clip_norm: None,
            learning_rate: None,
            weights: None,
            language: Language::English,
            lowercase: false,
            use_intra_attention: false,
            l2: None,
            report_interval: None,
            optimizer: None,
            seed: None,
            verbose: false,
        }
    }

    #[test]
    fn test_weights_cannot_be_combined_with_load() {
        assert!(args().validate().is_ok());

        let weights_only = Args {
            weights: Some(PathBuf::from("lstm.npz")),
            ..args()
        };
        assert!(weights_only.validate().is_ok());

        let both = Args {
            load: Some(PathBuf::from("previous")),
            ..weights_only
        };
        assert!(both.validate().is_err());
    }

    #[test]
    fn test_training_config_overrides() {
        let config = Args {
            num_epochs: Some(3),
            optimizer: Some(OptimizerKind::Adam),
            clip_norm: Some(5.0),
            ..args()
        }
        .training_config();

        assert_eq!(config.num_epochs, 3);
        assert_eq!(config.optimizer, OptimizerKind::Adam);
        assert_eq!(config.clip_norm, Some(5.0));
        assert_eq!(config.batch_size, 32);
    }
}
