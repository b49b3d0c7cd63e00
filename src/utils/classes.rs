use std::{collections::BTreeMap, hash::Hash};

/// Invert a map by swapping keys and values
pub fn invert_map<K, V, MK, MV>(original: MK) -> MV
where
    K: Ord + Hash + Eq,
    V: Ord + Hash + Eq + Clone,
    MK: IntoIterator<Item = (K, V)>,
    MV: FromIterator<(V, K)>,
{
    original
        .into_iter()
        .map(|(key, value)| (value, key))
        .collect()
}

/// Assign dense ids to the distinct labels, in sorted order
pub fn enumerate_labels<'a, I>(labels: I) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let distinct: std::collections::BTreeSet<&str> = labels.into_iter().collect();

    distinct
        .into_iter()
        .enumerate()
        .map(|(id, label)| (label.to_string(), id))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_enumerate_labels_is_sorted_and_dense() {
        let ids = enumerate_labels(["neutral", "entailment", "neutral", "contradiction"]);

        assert_eq!(
            ids.into_iter().collect::<Vec<_>>(),
            vec![
                ("contradiction".to_string(), 0),
                ("entailment".to_string(), 1),
                ("neutral".to_string(), 2),
            ]
        );
    }

    #[test]
    fn test_invert_map() {
        let ids = enumerate_labels(["b", "a"]);
        let names: HashMap<usize, String> = invert_map(ids);

        assert_eq!(names[&0], "a");
        assert_eq!(names[&1], "b");
    }
}
