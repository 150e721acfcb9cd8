//! Configuration model loaded from external sources.

use std::path::PathBuf;
use std::time::Duration;

use log::LevelFilter;
use serde::Deserialize;

use crate::processing::PipelineError;
use crate::processing::collector::CollectorTimings;
use crate::scoring::embedding::DEFAULT_MODEL;

/// Prefix of environment variables overriding file settings,
/// e.g. `QT_SCORER_WORKERS=8` or `QT_SCORER_SCORER__MODEL=all-minilm-l6-v2`.
pub const ENV_PREFIX: &str = "QT_SCORER";

fn default_workers() -> usize {
    3
}

fn default_dispatch_endpoint() -> String {
    "tcp://127.0.0.1:1991".to_string()
}

fn default_results_endpoint() -> String {
    "tcp://127.0.0.1:1992".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_idle_threshold_ms() -> u64 {
    20_000
}

fn default_report_window_ms() -> u64 {
    60_000
}

fn default_drain_grace_ms() -> u64 {
    2_000
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScorerConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// Directory holding downloaded model weights.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            cache_dir: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoggingConfig {
    /// One of `debug`, `info`, `warning`, `error`, `critical` (`warn` is
    /// accepted too). `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Write logs to this file instead of stderr. The file is truncated on
    /// start and never rotated.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Maps the configured level name to a filter. `critical` has no
    /// counterpart in `log` and maps to `Error`.
    pub fn level_filter(&self) -> Option<LevelFilter> {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(LevelFilter::Debug),
            "info" => Some(LevelFilter::Info),
            "warning" | "warn" => Some(LevelFilter::Warn),
            "error" | "critical" => Some(LevelFilter::Error),
            _ => None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
/// Settings for one scoring run.
pub struct PipelineConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_dispatch_endpoint")]
    pub dispatch_endpoint: String,
    #[serde(default = "default_results_endpoint")]
    pub results_endpoint: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_idle_threshold_ms")]
    pub idle_threshold_ms: u64,
    #[serde(default = "default_report_window_ms")]
    pub report_window_ms: u64,
    #[serde(default = "default_drain_grace_ms")]
    pub drain_grace_ms: u64,
    #[serde(default)]
    pub scorer: ScorerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Config with default settings for the given input and output files.
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            workers: default_workers(),
            dispatch_endpoint: default_dispatch_endpoint(),
            results_endpoint: default_results_endpoint(),
            poll_interval_ms: default_poll_interval_ms(),
            idle_threshold_ms: default_idle_threshold_ms(),
            report_window_ms: default_report_window_ms(),
            drain_grace_ms: default_drain_grace_ms(),
            scorer: ScorerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Loads settings from an optional YAML file overlaid with `QT_SCORER_*`
    /// environment variables.
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.logging.level_filter().is_none() {
            return Err(PipelineError::InvalidConfig(format!(
                "unknown log level {:?}, expected debug, info, warning, error or critical",
                self.logging.level
            )));
        }
        if self.workers == 0 {
            return Err(PipelineError::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(PipelineError::InvalidConfig(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.idle_threshold_ms <= self.poll_interval_ms {
            return Err(PipelineError::InvalidConfig(format!(
                "idle_threshold_ms ({}) must exceed poll_interval_ms ({})",
                self.idle_threshold_ms, self.poll_interval_ms
            )));
        }
        if self.report_window_ms == 0 {
            return Err(PipelineError::InvalidConfig(
                "report_window_ms must be positive".to_string(),
            ));
        }
        if self.dispatch_endpoint == self.results_endpoint {
            return Err(PipelineError::InvalidConfig(format!(
                "dispatch and results endpoints must differ, both are {}",
                self.dispatch_endpoint
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }

    pub fn collector_timings(&self) -> CollectorTimings {
        CollectorTimings {
            poll_interval: self.poll_interval(),
            idle_threshold: Duration::from_millis(self.idle_threshold_ms),
            report_window: Duration::from_millis(self.report_window_ms),
            drain_grace: self.drain_grace(),
        }
    }
}
