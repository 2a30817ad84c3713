//! Concurrent workers sharing one coordinator.

use std::sync::Arc;

use crossbeam_channel::Sender;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info};

use et_match::MatchEvaluator;
use et_optimizer::{PerturbationSampler, UpdateCoordinator, UpdateReceipt};
use et_types::{ParameterVector, TuneResult, TunerConfig};

use crate::stop::{stop_channel, StopHandle};
use crate::worker::{Worker, WorkerExit, WorkerSettings, WorkerSummary};

/// Final state of a pool run.
#[derive(Debug, Clone, Serialize)]
pub struct PoolReport {
    pub summaries: Vec<WorkerSummary>,
    pub final_parameters: ParameterVector,
    /// Updates committed across all workers.
    pub updates: u64,
}

impl PoolReport {
    pub fn failed_workers(&self) -> usize {
        self.summaries
            .iter()
            .filter(|s| matches!(s.exit, WorkerExit::Failed { .. }))
            .count()
    }
}

/// Running set of workers.
pub struct WorkerPool {
    coordinator: Arc<UpdateCoordinator>,
    stop: StopHandle,
    handles: Vec<(usize, JoinHandle<WorkerSummary>)>,
}

impl WorkerPool {
    /// Validate `config` and spawn `worker_count` workers on the current
    /// runtime.
    pub fn start(
        config: &TunerConfig,
        evaluator: Arc<dyn MatchEvaluator>,
        progress: Option<Sender<UpdateReceipt>>,
    ) -> TuneResult<Self> {
        Self::start_with(config, WorkerSettings::from_config(config), evaluator, progress)
    }

    /// Like [`WorkerPool::start`] with explicit worker settings.
    pub fn start_with(
        config: &TunerConfig,
        settings: WorkerSettings,
        evaluator: Arc<dyn MatchEvaluator>,
        progress: Option<Sender<UpdateReceipt>>,
    ) -> TuneResult<Self> {
        config.validate()?;
        let sampler = PerturbationSampler::from_config(config)?;

        let mut coordinator = UpdateCoordinator::new(config.initial_parameters.clone());
        if let Some(tx) = progress {
            coordinator = coordinator.with_progress(tx);
        }
        let coordinator = Arc::new(coordinator);
        let (stop, _) = stop_channel();

        let handles = (0..config.worker_count)
            .map(|id| {
                let rng = match config.seed {
                    Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id as u64)),
                    None => StdRng::from_os_rng(),
                };
                let worker = Worker::new(
                    id,
                    settings.clone(),
                    Arc::clone(&coordinator),
                    Arc::clone(&evaluator),
                    sampler.clone(),
                    rng,
                );
                (id, tokio::spawn(worker.run(stop.signal())))
            })
            .collect();

        info!(
            workers = config.worker_count,
            parameters = config.initial_parameters.len(),
            evaluator = evaluator.name(),
            "worker pool started"
        );

        Ok(Self {
            coordinator,
            stop,
            handles,
        })
    }

    pub fn coordinator(&self) -> &Arc<UpdateCoordinator> {
        &self.coordinator
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Ask every worker to stop after (or instead of) its current trial.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Wait for every worker to exit.
    ///
    /// Does not stop the workers; call [`WorkerPool::stop`] first unless they
    /// are expected to fail on their own.
    pub async fn join(self) -> TuneResult<PoolReport> {
        let mut summaries = Vec::with_capacity(self.handles.len());
        for (id, handle) in self.handles {
            match handle.await {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    error!(worker = id, error = %e, "worker task aborted");
                    let now = chrono::Utc::now();
                    summaries.push(WorkerSummary {
                        worker: id,
                        committed: 0,
                        discarded: 0,
                        exit: WorkerExit::Failed {
                            reason: e.to_string(),
                        },
                        started_at: now,
                        finished_at: now,
                    });
                }
            }
        }

        let report = PoolReport {
            summaries,
            final_parameters: self.coordinator.snapshot(),
            updates: self.coordinator.update_count(),
        };
        info!(
            updates = report.updates,
            failed = report.failed_workers(),
            "worker pool finished"
        );
        Ok(report)
    }
}
