use std::path::Path;

use derive_new::new;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::{
    tokenizer::{tokenize, Language},
    DatasetError,
};

/// Label used by SNLI-style corpora for pairs without annotator consensus
pub static NO_CONSENSUS: &str = "-";

/// A tokenized sentence pair with its gold label
#[derive(Clone, Debug, PartialEq, Eq, new)]
pub struct Pair {
    /// Tokens of the first sentence (premise)
    pub premise: Vec<String>,

    /// Tokens of the second sentence (hypothesis)
    pub hypothesis: Vec<String>,

    /// The gold label as written in the corpus
    pub label: String,
}

/// Preprocessing flags that must be reapplied to any text fed to a trained model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct Preprocessing {
    /// Whether the corpus was lowercased (use it if the embedding model is lowercased)
    pub lowercase: bool,

    /// The language driving the tokenizer
    pub language: Language,
}

impl Default for Preprocessing {
    fn default() -> Self {
        Self::new(false, Language::English)
    }
}

impl Preprocessing {
    fn apply(&self, text: &str) -> Vec<String> {
        let tokens = tokenize(text, self.language);

        if self.lowercase {
            tokens.into_iter().map(|token| token.to_lowercase()).collect()
        } else {
            tokens
        }
    }

    fn normalize(&self, tokens: Vec<String>) -> Vec<String> {
        if self.lowercase {
            tokens.into_iter().map(|token| token.to_lowercase()).collect()
        } else {
            tokens
        }
    }
}

/// One line of an SNLI-style JSONL corpus
#[derive(Debug, Deserialize)]
struct JsonRecord {
    sentence1: String,
    sentence2: String,
    gold_label: String,
    sentence1_parse: Option<String>,
    sentence2_parse: Option<String>,
}

/// Read a corpus file. `.tsv` and `.txt` files hold `sentence1<TAB>sentence2<TAB>label` rows;
/// anything else is read as JSONL. Pairs labelled `-` are skipped.
pub async fn read_corpus(
    path: impl AsRef<Path>,
    preprocessing: Preprocessing,
) -> Result<Vec<Pair>, DatasetError> {
    let path = path.as_ref();
    info!("Reading data from {}", path.display());

    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let is_tabular = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("tsv") | Some("txt")
    );

    let pairs = if is_tabular {
        parse_tsv(path, &contents, preprocessing)?
    } else {
        parse_jsonl(path, &contents, preprocessing)?
    };

    info!("Read {} pairs from {}", pairs.len(), path.display());

    Ok(pairs)
}

/// Parse tab-separated rows
pub fn parse_tsv(
    path: &Path,
    contents: &str,
    preprocessing: Preprocessing,
) -> Result<Vec<Pair>, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .from_reader(contents.as_bytes());

    let mut pairs = Vec::new();

    for (index, record) in reader.records().enumerate() {
        let malformed = |message: String| DatasetError::MalformedRow {
            path: path.to_path_buf(),
            line: index + 1,
            message,
        };

        let record = record.map_err(|e| malformed(e.to_string()))?;

        if record.len() != 3 {
            return Err(malformed(format!("expected 3 columns, found {}", record.len())));
        }

        let label = record[2].trim();
        if label == NO_CONSENSUS {
            continue;
        }

        pairs.push(Pair::new(
            preprocessing.apply(&record[0]),
            preprocessing.apply(&record[1]),
            label.to_string(),
        ));
    }

    Ok(pairs)
}

/// Parse SNLI-style JSON lines, preferring the leaves of the constituency parses when present
pub fn parse_jsonl(
    path: &Path,
    contents: &str,
    preprocessing: Preprocessing,
) -> Result<Vec<Pair>, DatasetError> {
    let mut pairs = Vec::new();
    let mut skipped = 0;

    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let record: JsonRecord =
            serde_json::from_str(line).map_err(|e| DatasetError::MalformedRow {
                path: path.to_path_buf(),
                line: index + 1,
                message: e.to_string(),
            })?;

        if record.gold_label == NO_CONSENSUS {
            skipped += 1;
            continue;
        }

        let premise = match &record.sentence1_parse {
            Some(parse) => preprocessing.normalize(parse_leaves(parse)),
            None => preprocessing.apply(&record.sentence1),
        };
        let hypothesis = match &record.sentence2_parse {
            Some(parse) => preprocessing.normalize(parse_leaves(parse)),
            None => preprocessing.apply(&record.sentence2),
        };

        pairs.push(Pair::new(premise, hypothesis, record.gold_label));
    }

    if skipped > 0 {
        warn!("Skipped {} pairs without a gold label in {}", skipped, path.display());
    }

    Ok(pairs)
}

/// Extract the leaves of a bracketed constituency parse such as `(ROOT (NP (DT A) (NN cat)))`
pub fn parse_leaves(parse: &str) -> Vec<String> {
    let spaced = parse.replace('(', " ( ").replace(')', " ) ");
    let symbols: Vec<&str> = spaced.split_whitespace().collect();

    symbols
        .iter()
        .enumerate()
        .filter(|(index, symbol)| {
            **symbol != "(" && **symbol != ")" && *index > 0 && symbols[index - 1] != "("
        })
        .map(|(_, symbol)| symbol.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn strings(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|token| token.to_string()).collect()
    }

    #[test]
    fn test_parse_leaves() {
        assert_eq!(
            parse_leaves("(ROOT (S (NP (DT A) (NN cat)) (VP (VBD sat))))"),
            strings(&["A", "cat", "sat"])
        );
    }

    #[test]
    fn test_parse_tsv_skips_no_consensus() {
        let contents = "A cat sat.\tA dog ran.\tneutral\nThe cat sat.\tNothing.\t-\n";
        let pairs = parse_tsv(
            Path::new("corpus.tsv"),
            contents,
            Preprocessing::new(true, Language::English),
        )
        .unwrap();

        assert_eq!(
            pairs,
            vec![Pair::new(
                strings(&["a", "cat", "sat", "."]),
                strings(&["a", "dog", "ran", "."]),
                "neutral".to_string()
            )]
        );
    }

    #[test]
    fn test_parse_tsv_reports_malformed_line() {
        let contents = "one\ttwo\tneutral\nonly one column\n";
        let error = parse_tsv(Path::new("corpus.tsv"), contents, Preprocessing::default());

        assert!(matches!(error, Err(DatasetError::MalformedRow { line: 2, .. })));
    }

    #[test]
    fn test_parse_jsonl_prefers_parse_trees() {
        let contents = concat!(
            r#"{"sentence1": "A cat sat.", "sentence2": "A cat.", "gold_label": "entailment", "#,
            r#""sentence1_parse": "(ROOT (S (NP (DT A) (NN cat)) (VP (VBD sat))))"}"#,
            "\n",
            r#"{"sentence1": "x", "sentence2": "y", "gold_label": "-"}"#,
        );
        let pairs = parse_jsonl(Path::new("corpus.jsonl"), contents, Preprocessing::default())
            .unwrap();

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].premise, strings(&["A", "cat", "sat"]));
        assert_eq!(pairs[0].hypothesis, strings(&["A", "cat", "."]));
        assert_eq!(pairs[0].label, "entailment");
    }
}
