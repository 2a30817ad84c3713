//! Comparator abstraction.

use async_trait::async_trait;

use et_optimizer::TrialPair;
use et_types::{EvaluatorError, MatchOutcome};

/// Result alias for comparator operations.
pub type EvaluatorResult<T> = Result<T, EvaluatorError>;

/// Plays the two variants of a trial against each other.
///
/// Implementations may launch a match runner process, call a remote service or
/// simulate games in-process. The only contract is the returned score: the
/// fraction of points `plus` earned against `minus` over `games` games, with
/// sides alternated so neither variant keeps the first-move advantage.
#[async_trait]
pub trait MatchEvaluator: Send + Sync {
    /// Run one batch and score it from `pair.plus`'s point of view.
    async fn evaluate(&self, pair: &TrialPair, games: u32) -> EvaluatorResult<MatchOutcome>;

    /// Human-readable evaluator name.
    fn name(&self) -> &str;
}
