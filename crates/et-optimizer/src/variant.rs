//! Symmetric candidate pairs.

use et_types::{internal_error, ParameterVector, TuneResult};

use crate::sampler::Variation;

/// The two candidate parameter sets compared in one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialPair {
    pub plus: ParameterVector,
    pub minus: ParameterVector,
}

impl TrialPair {
    /// `(snapshot + variation, snapshot - variation)`, names preserved.
    pub fn build(snapshot: &ParameterVector, variation: &Variation) -> TuneResult<Self> {
        if snapshot.len() != variation.len() {
            return Err(internal_error!(
                "variation has {} entries but the parameter vector has {}",
                variation.len(),
                snapshot.len()
            ));
        }

        let (plus, minus): (Vec<f64>, Vec<f64>) = snapshot
            .values()
            .iter()
            .zip(variation.as_slice())
            .map(|(value, v)| (value + v, value - v))
            .unzip();

        // Lengths were checked above, so `with_values` cannot fail.
        match (snapshot.with_values(plus), snapshot.with_values(minus)) {
            (Some(plus), Some(minus)) => Ok(Self { plus, minus }),
            _ => Err(internal_error!("trial pair length mismatch")),
        }
    }
}
