//! Random perturbation directions.

use rand::seq::index;
use rand::Rng;
use rand_distr::StandardNormal;
use tracing::debug;

use et_types::{ConfigError, ParameterVector, TunerConfig};

/// Non-negative per-parameter offsets for one trial.
///
/// The sign is applied later: the plus variant adds the variation, the minus
/// variant subtracts it.
#[derive(Debug, Clone, PartialEq)]
pub struct Variation(Vec<f64>);

impl Variation {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of parameters this variation actually moves.
    pub fn touched(&self) -> usize {
        self.0.iter().filter(|v| **v != 0.0).count()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for Variation {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Draws masked, normalised, value-scaled perturbations.
#[derive(Debug, Clone, PartialEq)]
pub struct PerturbationSampler {
    dimension: usize,
    subset_size: usize,
    delta: f64,
}

impl PerturbationSampler {
    pub fn new(dimension: usize, subset_size: usize, delta: f64) -> Result<Self, ConfigError> {
        if subset_size == 0 || subset_size > dimension {
            return Err(ConfigError::invalid(
                "subset_size",
                format!("must be between 1 and {dimension}, got {subset_size}"),
            ));
        }
        if !delta.is_finite() || delta <= 0.0 {
            return Err(ConfigError::invalid(
                "delta",
                format!("must be a positive finite number, got {delta}"),
            ));
        }
        Ok(Self {
            dimension,
            subset_size,
            delta,
        })
    }

    pub fn from_config(config: &TunerConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.initial_parameters.len(),
            config.subset_size,
            config.delta,
        )
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn subset_size(&self) -> usize {
        self.subset_size
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Standard-normal samples at `subset_size` distinct random positions,
    /// zero everywhere else.
    pub fn raw_direction<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let mut direction = vec![0.0; self.dimension];
        for i in index::sample(rng, self.dimension, self.subset_size).into_iter() {
            direction[i] = rng.sample(StandardNormal);
        }
        direction
    }

    /// A raw direction scaled to unit L2 norm.
    ///
    /// A zero-norm draw is possible only in floating point, never in theory;
    /// it is discarded and drawn again.
    pub fn direction<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        loop {
            let mut direction = self.raw_direction(rng);
            let norm = direction.iter().map(|d| d * d).sum::<f64>().sqrt();
            if norm > 0.0 && norm.is_finite() {
                direction.iter_mut().for_each(|d| *d /= norm);
                return direction;
            }
            debug!(norm, "degenerate perturbation direction, resampling");
        }
    }

    /// Draw the variation for one trial from a snapshot of the current values.
    pub fn sample<R: Rng + ?Sized>(&self, snapshot: &ParameterVector, rng: &mut R) -> Variation {
        debug_assert_eq!(snapshot.len(), self.dimension);
        let direction = self.direction(rng);
        snapshot
            .values()
            .iter()
            .zip(direction)
            .map(|(value, d)| (value * d * self.delta).abs())
            .collect::<Vec<_>>()
            .into()
    }
}
