//! Comparator results.

use serde::{Deserialize, Serialize};

use crate::errors::EvaluatorError;

/// Win/draw/loss counts from the point of view of the "plus" variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameTally {
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
}

impl GameTally {
    pub fn total(&self) -> u32 {
        self.wins + self.draws + self.losses
    }

    pub fn record_win(&mut self) {
        self.wins += 1;
    }

    pub fn record_draw(&mut self) {
        self.draws += 1;
    }

    pub fn record_loss(&mut self) {
        self.losses += 1;
    }

    /// `(wins + draws / 2) / games`, or `None` when no game was counted.
    pub fn score(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        Some((self.wins as f64 + self.draws as f64 / 2.0) / total as f64)
    }
}

/// Fraction of points the plus variant earned against the minus variant.
///
/// Always within `[0, 1]`; constructors reject anything else.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    score: f64,
    tally: Option<GameTally>,
}

impl MatchOutcome {
    pub fn from_score(score: f64) -> Result<Self, EvaluatorError> {
        if !(0.0..=1.0).contains(&score) {
            return Err(EvaluatorError::ScoreOutOfRange { score });
        }
        Ok(Self { score, tally: None })
    }

    pub fn from_tally(tally: GameTally) -> Result<Self, EvaluatorError> {
        let score = tally.score().ok_or(EvaluatorError::NoGames)?;
        Ok(Self {
            score,
            tally: Some(tally),
        })
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn tally(&self) -> Option<GameTally> {
        self.tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_score_counts_draws_as_half() {
        let tally = GameTally {
            wins: 3,
            draws: 2,
            losses: 5,
        };
        assert_eq!(tally.total(), 10);
        assert_eq!(tally.score(), Some(0.4));
        assert_eq!(GameTally::default().score(), None);
    }

    #[test]
    fn test_outcome_rejects_out_of_range() {
        assert!(MatchOutcome::from_score(0.0).is_ok());
        assert!(MatchOutcome::from_score(1.0).is_ok());
        assert!(matches!(
            MatchOutcome::from_score(1.01),
            Err(EvaluatorError::ScoreOutOfRange { .. })
        ));
        assert!(MatchOutcome::from_score(f64::NAN).is_err());
    }

    #[test]
    fn test_outcome_from_empty_tally_is_no_games() {
        assert!(matches!(
            MatchOutcome::from_tally(GameTally::default()),
            Err(EvaluatorError::NoGames)
        ));

        let mut tally = GameTally::default();
        tally.record_win();
        tally.record_draw();
        let outcome = MatchOutcome::from_tally(tally).unwrap();
        assert_eq!(outcome.score(), 0.75);
        assert_eq!(outcome.tally().unwrap().total(), 2);
    }
}
