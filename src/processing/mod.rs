use std::path::PathBuf;

use thiserror::Error;

use crate::processing::collector::CollectorStats;
use crate::processing::worker::WorkerStats;
use crate::scoring::ScoringError;
use crate::transport::TransportError;

pub mod collector;
pub mod pipeline;
pub mod reader;
pub mod stop;
pub mod worker;

/// Failures that prevent a pipeline run from starting or completing.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to open input {}: {source}", path.display())]
    OpenInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create output {}: {source}", path.display())]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to build scorer for worker {worker}: {source}")]
    Scorer {
        worker: usize,
        #[source]
        source: ScoringError,
    },
    #[error("pipeline task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Totals gathered from every component once the pipeline has stopped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSummary {
    pub records_read: u64,
    pub results_written: u64,
    pub decode_failures: u64,
    pub scoring_failures: u64,
    pub write_failures: u64,
}

impl PipelineSummary {
    pub(crate) fn from_parts(
        records_read: u64,
        workers: &[WorkerStats],
        collector: CollectorStats,
    ) -> Self {
        Self {
            records_read,
            results_written: collector.written,
            decode_failures: workers.iter().map(|w| w.decode_failures).sum(),
            scoring_failures: workers.iter().map(|w| w.scoring_failures).sum(),
            write_failures: collector.write_failures,
        }
    }
}
