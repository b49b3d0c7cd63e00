use derive_new::new;

/// A sentence pair as id sequences (null token first, no padding) with its class id
#[derive(Clone, Debug, PartialEq, Eq, new)]
pub struct Item {
    /// Premise ids
    pub premise: Vec<usize>,

    /// Hypothesis ids
    pub hypothesis: Vec<usize>,

    /// Class id
    pub label: usize,
}
