use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::DatasetError;

/// Corpus language, which only changes how sentences are split into tokens
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Language {
    /// English
    #[serde(rename = "en")]
    English,

    /// Portuguese
    #[serde(rename = "pt")]
    Portuguese,
}

impl TryFrom<&str> for Language {
    type Error = DatasetError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "en" => Ok(Language::English),
            "pt" => Ok(Language::Portuguese),
            _ => Err(DatasetError::UnknownLanguage(value.to_string())),
        }
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Language::English => "en",
            Language::Portuguese => "pt",
        };

        write!(f, "{}", name)
    }
}

/// English clitics split from the end of a word
const ENGLISH_CLITICS: &[&str] = &["n't", "'s", "'re", "'ve", "'ll", "'m", "'d"];

/// Split a sentence into word and punctuation tokens
pub fn tokenize(text: &str, language: Language) -> Vec<String> {
    let mut tokens = Vec::new();

    for chunk in text.split_whitespace() {
        for piece in split_punctuation(chunk, language) {
            match language {
                Language::English => push_english(&mut tokens, piece),
                Language::Portuguese => push_portuguese(&mut tokens, piece),
            }
        }
    }

    tokens
}

/// Split off leading and trailing punctuation, keeping word-internal apostrophes and hyphens
fn split_punctuation(chunk: &str, language: Language) -> Vec<&str> {
    let is_joiner = |c: char| c == '\'' || (c == '-' && language == Language::Portuguese);

    let mut pieces = Vec::new();
    let mut start = None;

    for (index, c) in chunk.char_indices() {
        if c.is_alphanumeric() || (is_joiner(c) && start.is_some()) {
            start.get_or_insert(index);
            continue;
        }

        if let Some(begin) = start.take() {
            pieces.push(&chunk[begin..index]);
        }

        pieces.push(&chunk[index..index + c.len_utf8()]);
    }

    if let Some(begin) = start {
        pieces.push(&chunk[begin..]);
    }

    pieces
}

fn push_english(tokens: &mut Vec<String>, piece: &str) {
    let lower = piece.to_lowercase();

    for clitic in ENGLISH_CLITICS {
        if lower.len() > clitic.len() && lower.ends_with(clitic) {
            let split = piece.len() - clitic.len();
            tokens.push(piece[..split].to_string());
            tokens.push(piece[split..].to_string());
            return;
        }
    }

    tokens.push(piece.to_string());
}

fn push_portuguese(tokens: &mut Vec<String>, piece: &str) {
    // Enclitic pronouns: "disse-me" becomes "disse" and "-me"
    match piece.find('-') {
        Some(split) if split > 0 && split + 1 < piece.len() => {
            tokens.push(piece[..split].to_string());
            tokens.push(piece[split..].to_string());
        }
        _ => tokens.push(piece.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_english_punctuation_and_clitics() {
        assert_eq!(
            tokenize("The cat didn't sit, it's late.", Language::English),
            vec!["The", "cat", "did", "n't", "sit", ",", "it", "'s", "late", "."]
        );
    }

    #[test]
    fn test_portuguese_clitics() {
        assert_eq!(
            tokenize("Ele disse-me algo.", Language::Portuguese),
            vec!["Ele", "disse", "-me", "algo", "."]
        );
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!(Language::try_from("PT").unwrap(), Language::Portuguese);
        assert!(Language::try_from("de").is_err());
    }
}
