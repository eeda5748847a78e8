//! Email classification pipeline.
//!
//! Every request flows through:
//! 1. `normalize`: lower-case, collapse whitespace, strip punctuation
//! 2. `Classifier`: keyword rules, or the AI classifier when configured
//! 3. `EmailProcessor`: reply generation seeded with the category
//!
//! **Nothing in here fails outward.** Classification and generation errors
//! degrade into a neutral category or a canned reply.

pub mod classifier;
pub mod normalize;
pub mod processor;
pub mod rules;
pub mod types;

pub use classifier::{AiClassifier, Classifier, ClassifierMode};
pub use processor::EmailProcessor;
pub use rules::{KeywordLists, RulesEngine, classify_by_rules};
pub use types::{Category, ClassificationResult, Confidence, EmailAnalysis};
