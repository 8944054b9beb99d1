//! Query evaluation and ranked results.

pub mod evaluator;
pub mod score_list;

pub use self::evaluator::QueryEvaluator;
pub use self::score_list::{ScoreList, ScoredDoc};
