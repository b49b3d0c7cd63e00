use std::collections::HashMap;

/// Token used to fill sentences up to the batch width
pub static PADDING: &str = "<PAD>";

/// Token substituted for words missing from the vocabulary
pub static UNKNOWN: &str = "<UNK>";

/// Token prepended to every sentence, giving attention a place to align to nothing
pub static NULL: &str = "<NULL>";

/// Id of the padding token
pub const PADDING_ID: usize = 0;

/// Id of the unknown token
pub const UNKNOWN_ID: usize = 1;

/// Id of the null-alignment token
pub const NULL_ID: usize = 2;

/// Number of reserved ids at the start of every vocabulary
pub const NUM_RESERVED: usize = 3;

/// A fixed mapping from tokens to embedding rows.
///
/// Ids `0..NUM_RESERVED` always belong to the padding, unknown and null tokens, in that order;
/// loaded words follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    ids: HashMap<String, usize>,
}

impl Vocabulary {
    /// Build a vocabulary from words in embedding-row order. Words that collide with a reserved
    /// token, or repeat an earlier word, keep their first id.
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids = HashMap::from([
            (PADDING.to_string(), PADDING_ID),
            (UNKNOWN.to_string(), UNKNOWN_ID),
            (NULL.to_string(), NULL_ID),
        ]);

        for word in words {
            let next = ids.len();
            ids.entry(word.into()).or_insert(next);
        }

        Self { ids }
    }

    /// The id for `token`, or the unknown id when the token was never seen
    pub fn id(&self, token: &str) -> usize {
        self.ids.get(token).copied().unwrap_or(UNKNOWN_ID)
    }

    /// Whether `token` has its own row
    pub fn contains(&self, token: &str) -> bool {
        self.ids.contains_key(token)
    }

    /// Map a tokenized sentence to ids, prefixed with the null token
    pub fn encode<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<usize> {
        std::iter::once(NULL_ID)
            .chain(tokens.iter().map(|token| self.id(token.as_ref())))
            .collect()
    }

    /// Total number of ids, reserved ones included
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// A vocabulary always holds the reserved tokens, so it is never empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_reserved_ids_come_first() {
        let vocabulary = Vocabulary::new(["cat", "sat"]);

        assert_eq!(vocabulary.len(), 5);
        assert_eq!(vocabulary.id(PADDING), PADDING_ID);
        assert_eq!(vocabulary.id("cat"), 3);
        assert_eq!(vocabulary.id("sat"), 4);
    }

    #[test]
    fn test_unknown_tokens_and_null_prefix() {
        let vocabulary = Vocabulary::new(["cat", "sat", "cat"]);

        assert_eq!(vocabulary.len(), 5);
        assert_eq!(vocabulary.encode(&["cat", "flew"]), vec![NULL_ID, 3, UNKNOWN_ID]);
    }
}
