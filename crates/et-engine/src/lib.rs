//! # et-engine
//!
//! Runs the tuning loop: any number of [`Worker`]s share one
//! [`UpdateCoordinator`](et_optimizer::UpdateCoordinator), each repeatedly
//! sampling a trial, handing it to a [`MatchEvaluator`](et_match::MatchEvaluator)
//! and folding the result back in. [`WorkerPool`] owns the workers and the
//! stop signal; [`ProgressRecorder`] appends every committed vector to disk.

pub mod pool;
pub mod progress;
pub mod stop;
pub mod worker;

pub use pool::{PoolReport, WorkerPool};
pub use progress::{ProgressRecorder, DEFAULT_PROGRESS_CAPACITY};
pub use stop::{stop_channel, StopHandle, StopSignal};
pub use worker::{
    IterationOutcome, IterationReport, Worker, WorkerExit, WorkerSettings, WorkerState,
    WorkerSummary, DEFAULT_FAILURE_BACKOFF,
};
