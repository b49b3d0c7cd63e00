//! Command line tool to evaluate a trained entailment classifier on a corpus

use std::path::PathBuf;

use anyhow::anyhow;
use burn_rte::{
    checkpoint::Checkpoint,
    cli::{self, Backend},
    datasets::{embeddings::load_table, read_corpus, rte::Dataset},
    pipelines::entailment,
    session::Session,
};
use log::info;
use pico_args::Arguments;

const HELP: &str = "\
Usage: evaluate MODEL_DIR EMBEDDINGS CORPUS [OPTIONS]

Arguments:
  MODEL_DIR            Directory with a trained model
  EMBEDDINGS           Text or numpy (.npy) file with word embeddings
  CORPUS               JSONL or TSV file with the corpus to evaluate on

Options:
  -h, --help           Print help
  --vocab FILE         Vocabulary file, one word per line (needed for .npy embeddings)
  -b BATCH_SIZE        Batch size (default 32)
  -v                   Verbose
";

#[derive(Debug)]
struct Args {
    model_dir: PathBuf,
    embeddings: PathBuf,
    corpus: PathBuf,
    vocab: Option<PathBuf>,
    batch_size: usize,
    verbose: bool,
}

impl Args {
    fn parse() -> anyhow::Result<Option<Self>> {
        let mut pargs = Arguments::from_env();

        // Help has a higher priority and should be handled separately.
        if pargs.contains(["-h", "--help"]) {
            return Ok(None);
        }

        let args = Args {
            vocab: pargs.opt_value_from_str("--vocab")?,
            batch_size: pargs.opt_value_from_str("-b")?.unwrap_or(32),
            verbose: pargs.contains("-v"),
            model_dir: cli::required(&mut pargs, "MODEL_DIR")?,
            embeddings: cli::required(&mut pargs, "EMBEDDINGS")?,
            corpus: cli::required(&mut pargs, "CORPUS")?,
        };

        let remaining = pargs.finish();
        if !remaining.is_empty() {
            return Err(anyhow!("Unexpected arguments: {:?}", remaining));
        }

        Ok(Some(args))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Some(args) = Args::parse()? else {
        print!("{}", HELP);

        return Ok(());
    };

    cli::init_logging(args.verbose);

    let checkpoint = Checkpoint::read(&args.model_dir).await?;
    let mut session = Session::<Backend>::new(cli::device(), 0);

    let pairs = read_corpus(&args.corpus, checkpoint.preprocessing).await?;
    let (vocabulary, embeddings) = load_table(
        &args.embeddings,
        args.vocab.as_deref(),
        Some(checkpoint.reserved.clone()),
        session.rng(),
    )
    .await?;

    let dataset = Dataset::from_pairs(&pairs, &vocabulary, &checkpoint.labels)?;

    let requested = checkpoint
        .config
        .clone()
        .with_vocab_size(embeddings.rows)
        .with_embedding_size(embeddings.cols);
    let model = checkpoint.load_model(&args.model_dir, &requested, &embeddings, &mut session)?;

    info!("Evaluating on {} pairs", pairs.len());

    let evaluation = entailment::evaluate(&model, &dataset, args.batch_size, session.device());

    println!("Loss: {:.4}", evaluation.loss);
    println!("Accuracy: {:.4}", evaluation.accuracy);

    Ok(())
}
