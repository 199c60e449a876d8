pub mod engine;
pub mod ranking;

pub use engine::{SelectionEngine, SelectionSettings};
pub use ranking::{pick_winner, ScoredCandidate, TieBreak};
