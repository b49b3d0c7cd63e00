/// Recognizing textual entailment: batching, training and evaluation of sentence pair
/// classifiers
pub mod entailment;
