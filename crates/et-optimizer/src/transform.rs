//! Score to update-signal mapping.

use et_types::{ConfigError, MatchOutcome};

/// Steepness used by the tuner unless configured otherwise.
pub const REFERENCE_STEEPNESS: f64 = 8.0;

/// Saturating odd map from a score in `[0, 1]` to a signal in `(-1, 1)`.
///
/// `n = 2s - 1`, `t = 2 / (1 + exp(-n * c)) - 1`. An even result gives zero,
/// decisive results approach ±1 without reaching it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutcomeTransform {
    steepness: f64,
}

impl Default for OutcomeTransform {
    fn default() -> Self {
        Self {
            steepness: REFERENCE_STEEPNESS,
        }
    }
}

impl OutcomeTransform {
    /// A transform with a custom steepness. Must be positive and finite, or
    /// the map stops being strictly increasing.
    pub fn new(steepness: f64) -> Result<Self, ConfigError> {
        if !steepness.is_finite() || steepness <= 0.0 {
            return Err(ConfigError::invalid(
                "steepness",
                format!("must be a positive finite number, got {steepness}"),
            ));
        }
        Ok(Self { steepness })
    }

    pub fn steepness(&self) -> f64 {
        self.steepness
    }

    pub fn apply(&self, score: f64) -> f64 {
        let normalised = score * 2.0 - 1.0;
        2.0 / (1.0 + (-normalised * self.steepness).exp()) - 1.0
    }

    pub fn signal(&self, outcome: &MatchOutcome) -> f64 {
        self.apply(outcome.score())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> impl Iterator<Item = f64> {
        (0..=1000).map(|i| i as f64 / 1000.0)
    }

    #[test]
    fn test_even_score_is_zero() {
        let t = OutcomeTransform::default();
        assert_eq!(t.apply(0.5), 0.0);
        for s in grid().filter(|s| *s != 0.5) {
            assert_ne!(t.apply(s), 0.0, "s={s}");
        }
    }

    #[test]
    fn test_antisymmetric() {
        let t = OutcomeTransform::default();
        for s in grid() {
            let diff = t.apply(s) + t.apply(1.0 - s);
            assert!(diff.abs() < 1e-12, "s={s} diff={diff}");
        }
    }

    #[test]
    fn test_strictly_increasing() {
        let t = OutcomeTransform::default();
        let values: Vec<f64> = grid().map(|s| t.apply(s)).collect();
        for pair in values.windows(2) {
            assert!(pair[1] > pair[0], "{} !> {}", pair[1], pair[0]);
        }
    }

    #[test]
    fn test_bounded_but_saturating() {
        let t = OutcomeTransform::default();
        let low = t.apply(0.0);
        let high = t.apply(1.0);
        assert!(low > -1.0 && high < 1.0);
        assert!(high > 0.999);
        assert!(low < -0.999);

        // The same deviation from even is amplified more than linearly at first.
        assert!(t.apply(0.6) > 0.2);
    }

    #[test]
    fn test_signal_reads_outcome_score() {
        let t = OutcomeTransform::default();
        let outcome = MatchOutcome::from_score(0.75).unwrap();
        assert_eq!(t.signal(&outcome), t.apply(0.75));
    }

    #[test]
    fn test_rejects_non_increasing_steepness() {
        for steepness in [0.0, -8.0, f64::NAN, f64::INFINITY] {
            assert!(OutcomeTransform::new(steepness).is_err(), "steepness={steepness}");
        }

        let gentle = OutcomeTransform::new(2.0).unwrap();
        assert_eq!(gentle.steepness(), 2.0);
        assert!(gentle.apply(0.75) > 0.0 && gentle.apply(0.75) < OutcomeTransform::default().apply(0.75));
    }
}
