//! Heuristic threat classification.
//!
//! - [`rules`] - configurable rule inputs (extension set, deny list)
//! - [`engine`] - the pure classification engine

pub mod engine;
pub mod rules;

pub use engine::Classifier;
pub use rules::SuspiciousRules;
