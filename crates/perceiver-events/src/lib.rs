//! Event perceiver: turns the game's free-text output into typed events.
//!
//! - Tagged console channel parsing (`[REWARD] ...`)
//! - Battle-log entries scoped by author (player, enemy, system)
//! - Keyword classification with a versioned vocabulary
//! - Excerpt categorisation of raw log lines
pub mod classifier;
pub mod errors;
pub mod tagged;
pub mod vocabulary;

// Re-exports
pub use classifier::EventClassifier;
pub use errors::{ClassifierError, Result};
pub use tagged::{author_rules, split_tag, LogTag, Rule, TaggedLine};
pub use vocabulary::Vocabulary;
