//! The per-worker optimisation loop.
//!
//! Each iteration walks `Sampling -> Evaluating -> Updating`. A failed or
//! timed-out evaluation discards the trial and the loop starts over from a
//! fresh snapshot; only a permanently unreachable comparator (or too many
//! failures in a row, when a limit is configured) ends the worker in
//! `Failed`. A stop request ends it in `Stopped` without applying the trial
//! in flight.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use et_match::MatchEvaluator;
use et_optimizer::{OutcomeTransform, PerturbationSampler, TrialPair, UpdateCoordinator};
use et_types::{EvaluatorError, MatchOutcome, TuneError, TunerConfig};

use crate::stop::StopSignal;

/// Pause after a failed evaluation before the next trial.
pub const DEFAULT_FAILURE_BACKOFF: Duration = Duration::from_secs(1);

/// Loop position of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerState {
    Sampling,
    Evaluating,
    Updating,
    Stopped,
    Failed,
}

/// Per-worker settings derived from the tuner configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub batch_size: u32,
    pub step_scale: f64,
    pub match_timeout: Option<Duration>,
    pub max_consecutive_failures: Option<u32>,
    pub failure_backoff: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &TunerConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            step_scale: config.step_scale,
            match_timeout: config.match_timeout,
            max_consecutive_failures: config.max_consecutive_failures,
            failure_backoff: DEFAULT_FAILURE_BACKOFF,
        }
    }

    pub fn with_failure_backoff(mut self, backoff: Duration) -> Self {
        self.failure_backoff = backoff;
        self
    }
}

/// A committed iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationReport {
    pub worker: usize,
    pub iteration: u64,
    pub outcome: MatchOutcome,
    pub signal: f64,
    /// Global commit sequence number of the resulting update.
    pub sequence: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// What one call to [`Worker::step`] did.
#[derive(Debug)]
pub enum IterationOutcome {
    Committed(IterationReport),
    /// The comparator failed; nothing was applied.
    Discarded(EvaluatorError),
    /// The update itself was refused; nothing was applied.
    Rejected(TuneError),
    /// A stop arrived while evaluating; nothing was applied.
    Cancelled,
}

/// How a worker ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum WorkerExit {
    Stopped,
    Failed { reason: String },
}

/// Totals reported when a worker exits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerSummary {
    pub worker: usize,
    pub committed: u64,
    pub discarded: u64,
    pub exit: WorkerExit,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// One optimisation loop sharing the coordinator with its siblings.
pub struct Worker {
    id: usize,
    settings: WorkerSettings,
    coordinator: Arc<UpdateCoordinator>,
    evaluator: Arc<dyn MatchEvaluator>,
    sampler: PerturbationSampler,
    transform: OutcomeTransform,
    rng: StdRng,
    state: WorkerState,
    iteration: u64,
}

impl Worker {
    pub fn new(
        id: usize,
        settings: WorkerSettings,
        coordinator: Arc<UpdateCoordinator>,
        evaluator: Arc<dyn MatchEvaluator>,
        sampler: PerturbationSampler,
        rng: StdRng,
    ) -> Self {
        Self {
            id,
            settings,
            coordinator,
            evaluator,
            sampler,
            transform: OutcomeTransform::default(),
            rng,
            state: WorkerState::Sampling,
            iteration: 0,
        }
    }

    pub fn with_transform(mut self, transform: OutcomeTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Run one sample/evaluate/update iteration.
    pub async fn step(&mut self, stop: &mut StopSignal) -> IterationOutcome {
        self.iteration += 1;
        let started_at = Utc::now();

        self.state = WorkerState::Sampling;
        let snapshot = self.coordinator.snapshot();
        let variation = self.sampler.sample(&snapshot, &mut self.rng);
        let pair = match TrialPair::build(&snapshot, &variation) {
            Ok(pair) => pair,
            Err(e) => return IterationOutcome::Rejected(e),
        };
        debug!(worker = self.id, iteration = self.iteration, "trial sampled");

        self.state = WorkerState::Evaluating;
        let result = tokio::select! {
            biased;
            _ = stop.stopped() => return IterationOutcome::Cancelled,
            result = self.evaluate(&pair) => result,
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    worker = self.id,
                    iteration = self.iteration,
                    error = %e,
                    plus = %pair.plus.to_record_line(),
                    minus = %pair.minus.to_record_line(),
                    "evaluation failed, trial discarded"
                );
                return IterationOutcome::Discarded(e);
            }
        };

        self.state = WorkerState::Updating;
        let signal = self.transform.signal(&outcome);
        let receipt = match self
            .coordinator
            .apply(variation.as_slice(), signal, self.settings.step_scale)
        {
            Ok(receipt) => receipt,
            Err(e) => {
                error!(worker = self.id, error = %e, "update rejected");
                return IterationOutcome::Rejected(e);
            }
        };

        info!(
            worker = self.id,
            score = outcome.score(),
            signal,
            sequence = receipt.sequence,
            "finished match"
        );
        info!(worker = self.id, "current optimum:\n{}", receipt.values);

        IterationOutcome::Committed(IterationReport {
            worker: self.id,
            iteration: self.iteration,
            outcome,
            signal,
            sequence: receipt.sequence,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Loop until stopped or failed.
    pub async fn run(mut self, mut stop: StopSignal) -> WorkerSummary {
        let started_at = Utc::now();
        let mut committed = 0;
        let mut discarded = 0;
        let mut consecutive_failures: u32 = 0;
        info!(worker = self.id, evaluator = self.evaluator.name(), "worker started");

        let exit = loop {
            if stop.is_stopped() {
                break WorkerExit::Stopped;
            }

            let failure = match self.step(&mut stop).await {
                IterationOutcome::Committed(_) => {
                    committed += 1;
                    consecutive_failures = 0;
                    continue;
                }
                IterationOutcome::Cancelled => break WorkerExit::Stopped,
                IterationOutcome::Discarded(e) if e.is_permanent() => {
                    discarded += 1;
                    break WorkerExit::Failed {
                        reason: e.to_string(),
                    };
                }
                IterationOutcome::Discarded(e) => e.to_string(),
                IterationOutcome::Rejected(e) => e.to_string(),
            };

            discarded += 1;
            consecutive_failures += 1;
            if let Some(limit) = self.settings.max_consecutive_failures {
                if consecutive_failures >= limit {
                    break WorkerExit::Failed {
                        reason: format!("{consecutive_failures} consecutive failures, last: {failure}"),
                    };
                }
            }

            if !self.settings.failure_backoff.is_zero() {
                tokio::select! {
                    _ = stop.stopped() => break WorkerExit::Stopped,
                    _ = tokio::time::sleep(self.settings.failure_backoff) => {}
                }
            }
        };

        self.state = match exit {
            WorkerExit::Stopped => WorkerState::Stopped,
            WorkerExit::Failed { .. } => WorkerState::Failed,
        };
        match &exit {
            WorkerExit::Stopped => info!(worker = self.id, committed, discarded, "worker stopped"),
            WorkerExit::Failed { reason } => {
                error!(worker = self.id, committed, discarded, %reason, "worker failed")
            }
        }

        WorkerSummary {
            worker: self.id,
            committed,
            discarded,
            exit,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn evaluate(&self, pair: &TrialPair) -> Result<MatchOutcome, EvaluatorError> {
        let evaluation = self.evaluator.evaluate(pair, self.settings.batch_size);
        match self.settings.match_timeout {
            Some(timeout) => tokio::time::timeout(timeout, evaluation)
                .await
                .map_err(|_| EvaluatorError::Timeout { timeout })?,
            None => evaluation.await,
        }
    }
}
