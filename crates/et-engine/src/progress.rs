//! Append-only progress record.
//!
//! Committed updates arrive over a bounded channel and are written by a
//! dedicated thread, one `name:value,...` line per update. Write failures are
//! logged and the recorder keeps going; nothing here can fail an update.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, warn};

use et_optimizer::UpdateReceipt;
use et_types::PersistenceError;

/// Updates that may queue before new ones are dropped.
pub const DEFAULT_PROGRESS_CAPACITY: usize = 1024;

/// Handle to the recorder thread.
#[derive(Debug)]
pub struct ProgressRecorder {
    path: PathBuf,
    handle: JoinHandle<u64>,
}

impl ProgressRecorder {
    /// Open (or create) `path` for appending and start the recorder thread.
    ///
    /// Returns the sender to hand to the update coordinator. The thread exits
    /// once every sender has been dropped.
    pub fn spawn<P: AsRef<Path>>(
        path: P,
        capacity: usize,
    ) -> Result<(Self, Sender<UpdateReceipt>), PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| PersistenceError::Open {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let (tx, rx) = bounded(capacity.max(1));
        let thread_path = path.clone();
        let handle = std::thread::Builder::new()
            .name("progress-recorder".to_string())
            .spawn(move || record_loop(file, &thread_path, rx))
            .map_err(|e| PersistenceError::Open {
                path: path.display().to_string(),
                message: format!("could not start recorder thread: {e}"),
            })?;

        Ok((Self { path, handle }, tx))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the recorder to drain and return the number of lines written.
    ///
    /// Only returns once every sender is gone.
    pub fn finish(self) -> u64 {
        match self.handle.join() {
            Ok(written) => written,
            Err(_) => {
                warn!(path = %self.path.display(), "progress recorder thread panicked");
                0
            }
        }
    }
}

fn record_loop(mut file: File, path: &Path, rx: Receiver<UpdateReceipt>) -> u64 {
    let mut written = 0;
    for receipt in rx {
        let line = receipt.values.to_record_line();
        match writeln!(file, "{line}").and_then(|_| file.flush()) {
            Ok(()) => {
                written += 1;
                debug!(sequence = receipt.sequence, "progress recorded");
            }
            Err(e) => {
                let error = PersistenceError::Write {
                    path: path.display().to_string(),
                    message: e.to_string(),
                };
                warn!(sequence = receipt.sequence, %error, "failed to record progress");
            }
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use et_optimizer::UpdateCoordinator;
    use et_types::ParameterVector;

    #[test]
    fn test_records_one_line_per_update() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");

        let (recorder, tx) = ProgressRecorder::spawn(&path, 16).unwrap();
        let initial = ParameterVector::from_pairs([("A", 100.0), ("B", 50.0)]).unwrap();
        let coordinator = UpdateCoordinator::new(initial).with_progress(tx);
        coordinator.apply(&[1.0, 0.0], 1.0, 1.0).unwrap();
        coordinator.apply(&[0.0, 2.0], -1.0, 0.5).unwrap();
        drop(coordinator);

        assert_eq!(recorder.finish(), 2);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "A:101,B:50\nA:101,B:49\n");
    }

    #[test]
    fn test_appends_to_existing_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        std::fs::write(&path, "A:1\n").unwrap();

        let (recorder, tx) = ProgressRecorder::spawn(&path, 4).unwrap();
        let coordinator =
            UpdateCoordinator::new(ParameterVector::from_pairs([("A", 1.0)]).unwrap()).with_progress(tx);
        coordinator.apply(&[1.0], 1.0, 1.0).unwrap();
        drop(coordinator);
        recorder.finish();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "A:1\nA:2\n");
    }

    #[test]
    fn test_unopenable_path_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("history.csv");
        let err = ProgressRecorder::spawn(&path, 4).unwrap_err();
        assert!(matches!(err, PersistenceError::Open { .. }));
    }
}
