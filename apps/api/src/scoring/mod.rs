pub mod engine;
pub mod rules;

pub use engine::{ModuleScore, ScoringEngine};
pub use rules::ScoringRules;
