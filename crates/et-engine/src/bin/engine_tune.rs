use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info, warn};

use et_engine::{ProgressRecorder, WorkerPool, DEFAULT_PROGRESS_CAPACITY};
use et_match::{CutechessEvaluator, MatchEvaluator};
use et_types::TunerConfig;

#[derive(Parser)]
#[command(name = "engine-tune")]
#[command(about = "Tune engine parameters by self-play against perturbed copies")]
struct Args {
    /// Path to the JSON tuning configuration
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Override the configured number of workers
    #[arg(long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let mut config = TunerConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(workers) = args.workers {
        config.worker_count = workers;
        config.validate().context("--workers")?;
    }
    config.log_warnings();

    let Some(runner) = config.match_runner.clone() else {
        bail!("{} has no match_runner section", args.config.display());
    };
    let evaluator: Arc<dyn MatchEvaluator> = Arc::new(CutechessEvaluator::new(runner));

    let (recorder, progress) = match &config.progress_file {
        Some(path) => match ProgressRecorder::spawn(path, DEFAULT_PROGRESS_CAPACITY) {
            Ok((recorder, tx)) => (Some(recorder), Some(tx)),
            Err(e) => {
                warn!(error = %e, "continuing without a progress record");
                (None, None)
            }
        },
        None => (None, None),
    };

    let pool = WorkerPool::start(&config, evaluator, progress)?;
    let stop = pool.stop_handle();
    let ctrl_c = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupt received, stopping workers"),
            Err(e) => error!(error = %e, "could not listen for Ctrl-C, stopping workers"),
        }
        stop.stop();
    });

    let report = pool.join().await?;
    ctrl_c.abort();

    if let Some(recorder) = recorder {
        let path = recorder.path().display().to_string();
        let written = recorder.finish();
        info!(%path, written, "progress record closed");
    }

    for summary in &report.summaries {
        info!(
            worker = summary.worker,
            committed = summary.committed,
            discarded = summary.discarded,
            exit = ?summary.exit,
            "worker summary"
        );
    }
    println!("{}", report.final_parameters);

    if report.failed_workers() == report.summaries.len() {
        bail!("every worker failed after {} updates", report.updates);
    }
    Ok(())
}
