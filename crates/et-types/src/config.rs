//! Startup configuration.
//!
//! The on-disk format is a single JSON object. Loading is two-phase: the raw
//! object is checked for every required key (all missing keys are reported at
//! once), then deserialized and validated into a [`TunerConfig`]. Nothing in a
//! required field is ever defaulted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::errors::ConfigError;
use crate::parameters::ParameterVector;

/// Required keys, each with the legacy names accepted for it.
const REQUIRED_FIELDS: &[(&str, &[&str])] = &[
    ("worker_count", &["n_threads"]),
    ("subset_size", &["n_iter_adjust"]),
    ("delta", &[]),
    ("step_scale", &["apply_factor"]),
    ("batch_size", &["batch"]),
    ("initial_parameters", &["variables"]),
];

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(alias = "n_threads")]
    worker_count: i64,
    #[serde(alias = "n_iter_adjust")]
    subset_size: i64,
    delta: f64,
    #[serde(alias = "apply_factor")]
    step_scale: f64,
    #[serde(alias = "batch")]
    batch_size: i64,
    #[serde(alias = "variables")]
    initial_parameters: Map<String, Value>,
    #[serde(default)]
    progress_file: Option<PathBuf>,
    #[serde(default)]
    match_timeout_secs: Option<f64>,
    #[serde(default)]
    max_consecutive_failures: Option<u32>,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    match_runner: Option<MatchRunnerConfig>,
}

/// Opening book file format understood by cutechess-cli.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookFormat {
    #[default]
    Pgn,
    Epd,
}

impl BookFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pgn => "pgn",
            Self::Epd => "epd",
        }
    }
}

/// Settings for the cutechess-cli backed comparator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRunnerConfig {
    /// Runner executable. Resolved to `cutechess-cli` when absent.
    #[serde(default)]
    pub binary: Option<PathBuf>,
    /// Engine command shared by both variants.
    pub engine: String,
    /// Time control, e.g. `"10+0.1"`.
    pub tc: String,
    /// Opening book; games start from the initial position when absent.
    #[serde(default)]
    pub book: Option<PathBuf>,
    #[serde(default)]
    pub book_format: BookFormat,
    /// Fixed UCI options applied to both engines, in order.
    #[serde(default)]
    pub uci_options: Map<String, Value>,
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_concurrency() -> u32 {
    1
}

impl MatchRunnerConfig {
    pub fn new(engine: impl Into<String>, tc: impl Into<String>) -> Self {
        Self {
            binary: None,
            engine: engine.into(),
            tc: tc.into(),
            book: None,
            book_format: BookFormat::default(),
            uci_options: Map::new(),
            concurrency: default_concurrency(),
            extra_args: Vec::new(),
        }
    }

    /// UCI options rendered as `(name, value)` strings.
    pub fn uci_option_pairs(&self) -> Vec<(String, String)> {
        self.uci_options
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (name.clone(), value)
            })
            .collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.trim().is_empty() {
            return Err(ConfigError::invalid("match_runner.engine", "must not be empty"));
        }
        if self.tc.trim().is_empty() {
            return Err(ConfigError::invalid("match_runner.tc", "must not be empty"));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::invalid("match_runner.concurrency", "must be at least 1"));
        }
        Ok(())
    }
}

/// Validated tuner configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TunerConfig {
    /// Number of concurrent workers.
    pub worker_count: usize,
    /// How many parameters each perturbation touches (`k`).
    pub subset_size: usize,
    /// Perturbation magnitude relative to each parameter's value.
    pub delta: f64,
    /// Learning-rate-like factor applied to every update (`apply_factor`).
    pub step_scale: f64,
    /// Games per comparator invocation.
    pub batch_size: u32,
    pub initial_parameters: ParameterVector,
    pub progress_file: Option<PathBuf>,
    pub match_timeout: Option<Duration>,
    pub max_consecutive_failures: Option<u32>,
    pub seed: Option<u64>,
    pub match_runner: Option<MatchRunnerConfig>,
}

impl TunerConfig {
    /// Programmatic construction with the required fields; optional settings
    /// start unset. Call [`TunerConfig::validate`] before use.
    pub fn new(
        initial_parameters: ParameterVector,
        worker_count: usize,
        subset_size: usize,
        delta: f64,
        step_scale: f64,
        batch_size: u32,
    ) -> Self {
        Self {
            worker_count,
            subset_size,
            delta,
            step_scale,
            batch_size,
            initial_parameters,
            progress_file: None,
            match_timeout: None,
            max_consecutive_failures: None,
            seed: None,
            match_runner: None,
        }
    }

    pub fn with_progress_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.progress_file = Some(path.into());
        self
    }

    pub fn with_match_timeout(mut self, timeout: Duration) -> Self {
        self.match_timeout = Some(timeout);
        self
    }

    pub fn with_max_consecutive_failures(mut self, n: u32) -> Self {
        self.max_consecutive_failures = Some(n);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_match_runner(mut self, runner: MatchRunnerConfig) -> Self {
        self.match_runner = Some(runner);
        self
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        Self::from_json_value(value)
    }

    pub fn from_json_value(value: Value) -> Result<Self, ConfigError> {
        let object = value.as_object().ok_or_else(|| ConfigError::Parse {
            message: "configuration must be a JSON object".to_string(),
        })?;

        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .filter(|(name, aliases)| {
                !object.contains_key(*name) && !aliases.iter().any(|a| object.contains_key(*a))
            })
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing {
                field: missing.join(", "),
            });
        }

        let raw: RawConfig = serde_json::from_value(value).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let worker_count = positive_count("worker_count", raw.worker_count)?;
        let subset_size = positive_count("subset_size", raw.subset_size)?;
        let batch_size = u32::try_from(positive_count("batch_size", raw.batch_size)?)
            .map_err(|_| ConfigError::invalid("batch_size", "too large"))?;

        let mut pairs = Vec::with_capacity(raw.initial_parameters.len());
        for (name, value) in raw.initial_parameters {
            let number = value.as_f64().ok_or_else(|| {
                ConfigError::invalid(
                    "initial_parameters",
                    format!("{name} must be a number, got {value}"),
                )
            })?;
            pairs.push((name, number));
        }
        let initial_parameters = ParameterVector::from_pairs(pairs)?;

        let match_timeout = match raw.match_timeout_secs {
            Some(secs) if !secs.is_finite() || secs <= 0.0 => {
                return Err(ConfigError::invalid(
                    "match_timeout_secs",
                    format!("must be a positive number of seconds, got {secs}"),
                ));
            }
            Some(secs) => Some(Duration::from_secs_f64(secs)),
            None => None,
        };

        let config = Self {
            worker_count,
            subset_size,
            delta: raw.delta,
            step_scale: raw.step_scale,
            batch_size,
            initial_parameters,
            progress_file: raw.progress_file,
            match_timeout,
            max_consecutive_failures: raw.max_consecutive_failures,
            seed: raw.seed,
            match_runner: raw.match_runner,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every invariant the optimiser relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::invalid("worker_count", "must be at least 1"));
        }
        let n = self.initial_parameters.len();
        if self.subset_size == 0 || self.subset_size > n {
            return Err(crate::config_error!(
                "subset_size",
                "must be between 1 and {n} (the number of parameters), got {}",
                self.subset_size
            ));
        }
        if !self.delta.is_finite() || self.delta <= 0.0 {
            return Err(crate::config_error!(
                "delta",
                "must be a positive finite number, got {}",
                self.delta
            ));
        }
        if !self.step_scale.is_finite() || self.step_scale <= 0.0 {
            return Err(crate::config_error!(
                "step_scale",
                "must be a positive finite number, got {}",
                self.step_scale
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be at least 1"));
        }
        if self.max_consecutive_failures == Some(0) {
            return Err(ConfigError::invalid(
                "max_consecutive_failures",
                "must be at least 1 when set",
            ));
        }
        if let Some(runner) = &self.match_runner {
            runner.validate()?;
        }
        Ok(())
    }

    /// Log settings that are legal but probably unintended.
    pub fn log_warnings(&self) {
        if self.batch_size % 2 == 1 {
            warn!(
                batch_size = self.batch_size,
                "odd batch size: colours cannot be balanced between the two variants"
            );
        }
        for (name, value) in self.initial_parameters.iter() {
            if value == 0.0 {
                warn!(parameter = name, "parameter starts at zero and will never be perturbed");
            }
        }
    }
}

fn positive_count(field: &str, value: i64) -> Result<usize, ConfigError> {
    if value < 1 {
        return Err(ConfigError::invalid(field, format!("must be at least 1, got {value}")));
    }
    usize::try_from(value).map_err(|_| ConfigError::invalid(field, "too large"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_json() -> Value {
        json!({
            "worker_count": 4,
            "subset_size": 2,
            "delta": 0.05,
            "step_scale": 1.0,
            "batch_size": 16,
            "initial_parameters": { "PAWN_MG": 90, "PAWN_EG": 110, "KNIGHT_MG": 310.5 }
        })
    }

    #[test]
    fn test_parses_minimal_config() {
        let config = TunerConfig::from_json_value(base_json()).unwrap();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.subset_size, 2);
        assert_eq!(config.batch_size, 16);
        assert_eq!(
            config.initial_parameters.names(),
            &["PAWN_MG".to_string(), "PAWN_EG".to_string(), "KNIGHT_MG".to_string()]
        );
        assert_eq!(config.initial_parameters.get("KNIGHT_MG"), Some(310.5));
        assert!(config.progress_file.is_none());
        assert!(config.match_timeout.is_none());
        assert!(config.match_runner.is_none());
    }

    #[test]
    fn test_accepts_legacy_field_names() {
        let legacy = json!({
            "n_threads": 2,
            "n_iter_adjust": 1,
            "delta": 0.1,
            "apply_factor": 0.5,
            "batch": 8,
            "variables": { "A": 100 }
        });
        let config = TunerConfig::from_json_value(legacy).unwrap();
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.step_scale, 0.5);
        assert_eq!(config.batch_size, 8);
    }

    #[test]
    fn test_reports_every_missing_field() {
        let err = TunerConfig::from_json_value(json!({ "delta": 0.1 })).unwrap_err();
        match err {
            ConfigError::Missing { field } => {
                assert!(field.contains("worker_count"));
                assert!(field.contains("initial_parameters"));
                assert!(!field.contains("delta"));
            }
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_subset_larger_than_vector() {
        let mut raw = base_json();
        raw["subset_size"] = json!(4);
        let err = TunerConfig::from_json_value(raw).unwrap_err();
        assert!(err.to_string().contains("subset_size"));

        let mut raw = base_json();
        raw["subset_size"] = json!(0);
        assert!(TunerConfig::from_json_value(raw).is_err());
    }

    #[test]
    fn test_rejects_bad_scalars() {
        for (field, value) in [
            ("delta", json!(0.0)),
            ("delta", json!(-0.1)),
            ("step_scale", json!(0.0)),
            ("batch_size", json!(0)),
            ("worker_count", json!(-3)),
        ] {
            let mut raw = base_json();
            raw[field] = value;
            let err = TunerConfig::from_json_value(raw).unwrap_err();
            assert!(err.to_string().contains(field), "{field}: {err}");
        }
    }

    #[test]
    fn test_rejects_non_numeric_parameter() {
        let mut raw = base_json();
        raw["initial_parameters"]["PAWN_MG"] = json!("ninety");
        let err = TunerConfig::from_json_value(raw).unwrap_err();
        assert!(err.to_string().contains("PAWN_MG"));
    }

    #[test]
    fn test_parses_optional_sections() {
        let mut raw = base_json();
        raw["progress_file"] = json!("history.csv");
        raw["match_timeout_secs"] = json!(90);
        raw["max_consecutive_failures"] = json!(5);
        raw["seed"] = json!(7);
        raw["match_runner"] = json!({
            "engine": "./Koivisto",
            "tc": "10+0.1",
            "book": "books/4moves_noob.pgn",
            "uci_options": { "Hash": 16, "Threads": "1" }
        });
        let config = TunerConfig::from_json_value(raw).unwrap();
        assert_eq!(config.match_timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.max_consecutive_failures, Some(5));
        assert_eq!(config.seed, Some(7));

        let runner = config.match_runner.unwrap();
        assert_eq!(runner.concurrency, 1);
        assert_eq!(runner.book_format, BookFormat::Pgn);
        assert_eq!(
            runner.uci_option_pairs(),
            vec![
                ("Hash".to_string(), "16".to_string()),
                ("Threads".to_string(), "1".to_string())
            ]
        );
    }

    #[test]
    fn test_rejects_empty_runner_engine() {
        let mut raw = base_json();
        raw["match_runner"] = json!({ "engine": "", "tc": "10+0.1" });
        let err = TunerConfig::from_json_value(raw).unwrap_err();
        assert!(err.to_string().contains("match_runner.engine"));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, base_json().to_string()).unwrap();
        let config = TunerConfig::load(&path).unwrap();
        assert_eq!(config.initial_parameters.len(), 3);

        let missing = TunerConfig::load(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(missing, ConfigError::Unreadable { .. }));
    }
}
