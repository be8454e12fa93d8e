pub mod classifier;
pub mod debouncer;

pub use classifier::{parse_predictions, Classifier, CommandClassifier};
pub use debouncer::Debouncer;
