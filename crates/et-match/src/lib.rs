//! Match evaluation for EngineTune.
//!
//! Provides:
//! - the [`MatchEvaluator`] trait every comparator implements
//! - a cutechess-cli runner with colour-aware result parsing

pub mod cutechess;
pub mod evaluator;

pub use cutechess::{
    parse_finished_game, CutechessCommand, CutechessEvaluator, FinishedGame, GameResult,
    MINUS_ENGINE, PLUS_ENGINE,
};
pub use evaluator::{EvaluatorResult, MatchEvaluator};
