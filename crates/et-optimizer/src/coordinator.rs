//! The single write path into the shared parameter vector.
//!
//! All updates and all snapshots go through one [`parking_lot::RwLock`]:
//! `apply` holds the write lock for the whole read-modify-write, `snapshot`
//! clones the full vector under the read lock. A snapshot therefore never
//! mixes values from before and after a concurrent update. Progress
//! receipts are queued with a non-blocking send while the write lock is
//! still held, so they arrive in commit order. The lock is never held
//! across I/O or an evaluation.

use crossbeam_channel::{Sender, TrySendError};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::warn;

use et_types::{internal_error, ParameterVector, PersistenceError, TuneResult};

/// Result of one committed update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateReceipt {
    /// 1-based position of this update in the global commit order.
    pub sequence: u64,
    /// The full vector as it was right after this update committed.
    pub values: ParameterVector,
}

#[derive(Debug)]
struct SharedState {
    values: ParameterVector,
    sequence: u64,
}

/// Owns the parameter vector and serialises every mutation of it.
#[derive(Debug)]
pub struct UpdateCoordinator {
    state: RwLock<SharedState>,
    progress: Option<Sender<UpdateReceipt>>,
}

impl UpdateCoordinator {
    pub fn new(initial: ParameterVector) -> Self {
        Self {
            state: RwLock::new(SharedState {
                values: initial,
                sequence: 0,
            }),
            progress: None,
        }
    }

    /// Forward every committed update to a progress recorder.
    ///
    /// Delivery is best effort: a full or closed channel is logged and the
    /// update still commits.
    pub fn with_progress(mut self, tx: Sender<UpdateReceipt>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// A consistent copy of the current vector.
    pub fn snapshot(&self) -> ParameterVector {
        self.state.read().values.clone()
    }

    /// Number of updates committed so far.
    pub fn update_count(&self) -> u64 {
        self.state.read().sequence
    }

    /// `values <- values + variation * signal * step_scale`, atomically.
    ///
    /// Inputs that would make any value non-finite, or a variation of the
    /// wrong length, are rejected without touching the state.
    pub fn apply(&self, variation: &[f64], signal: f64, step_scale: f64) -> TuneResult<UpdateReceipt> {
        if !signal.is_finite() || !step_scale.is_finite() {
            return Err(internal_error!(
                "non-finite update (signal {signal}, step scale {step_scale})"
            ));
        }

        let receipt = {
            let mut state = self.state.write();
            if variation.len() != state.values.len() {
                return Err(internal_error!(
                    "variation has {} entries but the parameter vector has {}",
                    variation.len(),
                    state.values.len()
                ));
            }

            let updated: Vec<f64> = state
                .values
                .values()
                .iter()
                .zip(variation)
                .map(|(value, delta)| value + delta * signal * step_scale)
                .collect();
            if let Some(i) = updated.iter().position(|v| !v.is_finite()) {
                return Err(internal_error!(
                    "update would make {} non-finite",
                    state.values.names()[i]
                ));
            }

            state.values.values_mut().copy_from_slice(&updated);
            state.sequence += 1;
            let receipt = UpdateReceipt {
                sequence: state.sequence,
                values: state.values.clone(),
            };
            // Published before the lock is released so the record keeps
            // commit order. `try_send` never blocks.
            self.publish(&receipt);
            receipt
        };

        Ok(receipt)
    }

    /// Consume the coordinator and return the final vector.
    pub fn into_inner(self) -> ParameterVector {
        self.state.into_inner().values
    }

    fn publish(&self, receipt: &UpdateReceipt) {
        let Some(tx) = &self.progress else {
            return;
        };
        match tx.try_send(receipt.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(sequence = receipt.sequence, "progress record is lagging, entry dropped");
            }
            Err(TrySendError::Disconnected(_)) => {
                let error = PersistenceError::ChannelClosed;
                warn!(sequence = receipt.sequence, %error, "progress entry dropped");
            }
        }
    }
}
