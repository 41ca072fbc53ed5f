//! Intent classification.
//!
//! The classifier asks the classification service first and validates its
//! answer; anything it cannot trust is replaced by the local heuristic.

pub mod classifier;
pub mod heuristics;
pub mod model;

pub use classifier::{Classification, ClassificationOutcome, IntentClassifier, IntentSource};
pub use model::{Complexity, Intent, IntentCategory, IntentParameters};
