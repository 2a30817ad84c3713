use std::time::Duration;

use thiserror::Error;

/// Main error type for the EngineTune system
#[derive(Error, Debug)]
pub enum TuneError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Evaluator error: {0}")]
    Evaluator(#[from] EvaluatorError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Startup configuration errors. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    Missing { field: String },

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: String, message: String },

    #[error("Could not parse configuration: {message}")]
    Parse { message: String },

    #[error("Could not read configuration file {path}: {message}")]
    Unreadable { path: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Failures of a single comparator invocation.
///
/// Everything except [`EvaluatorError::Unreachable`] is recovered by
/// discarding the trial and sampling a new one.
#[derive(Error, Debug)]
pub enum EvaluatorError {
    #[error("Failed to launch comparator: {message}")]
    Spawn { message: String },

    #[error("Comparator unreachable: {message}")]
    Unreachable { message: String },

    #[error("Comparator exited with status {code:?}")]
    ExitStatus { code: Option<i32> },

    #[error("Comparator timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Malformed comparator output: {line}")]
    Malformed { line: String },

    #[error("Comparator finished without any counted games")]
    NoGames,

    #[error("Comparator score {score} is outside [0, 1]")]
    ScoreOutOfRange { score: f64 },

    #[error("Comparator IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EvaluatorError {
    /// Whether retrying with another trial is pointless.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

/// Progress record failures. Logged, never propagated into the update path.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Could not open progress record {path}: {message}")]
    Open { path: String, message: String },

    #[error("Could not append to progress record {path}: {message}")]
    Write { path: String, message: String },

    #[error("Progress recorder is no longer running")]
    ChannelClosed,
}

/// Result type alias for EngineTune operations
pub type TuneResult<T> = Result<T, TuneError>;

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::TuneError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($field:expr, $($arg:tt)*) => {
        $crate::ConfigError::invalid($field, format!($($arg)*))
    };
}
