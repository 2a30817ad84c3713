//! # et-optimizer
//!
//! The numerical core of EngineTune.
//!
//! Each trial draws a random direction over a subset of the parameters,
//! builds a plus/minus pair around the current values, and folds the match
//! score back into the shared vector:
//!
//! - [`PerturbationSampler`] draws masked, unit-norm, value-scaled variations
//! - [`TrialPair`] holds the two candidate sets
//! - [`OutcomeTransform`] turns a score in `[0, 1]` into a bounded signal
//! - [`UpdateCoordinator`] is the only writer of the shared vector

mod coordinator;
mod sampler;
mod transform;
mod variant;

pub use coordinator::{UpdateCoordinator, UpdateReceipt};
pub use sampler::{PerturbationSampler, Variation};
pub use transform::{OutcomeTransform, REFERENCE_STEEPNESS};
pub use variant::TrialPair;
