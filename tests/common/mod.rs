//! Helpers for integration tests.

use std::path::PathBuf;
use std::time::Duration;

use qt_scorer::models::config::PipelineConfig;
use qt_scorer::scoring::{Scorer, ScoringError, ScoringResult};
use tempfile::TempDir;

/// Input and output files living in a temporary directory.
pub struct TestFiles {
    dir: TempDir,
}

impl TestFiles {
    pub fn new(input: &str) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir.");
        std::fs::write(dir.path().join("input.tsv"), input).expect("Failed to write input.");
        TestFiles { dir }
    }

    pub fn input_path(&self) -> PathBuf {
        self.dir.path().join("input.tsv")
    }

    pub fn output_path(&self) -> PathBuf {
        self.dir.path().join("output.tsv")
    }

    pub fn output_lines(&self) -> Vec<String> {
        std::fs::read_to_string(self.output_path())
            .expect("Failed to read output.")
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Config with shortened timings and in-process endpoints.
    pub fn config(&self, name: &str, workers: usize) -> PipelineConfig {
        let mut config = PipelineConfig::new(self.input_path(), self.output_path());
        config.workers = workers;
        config.dispatch_endpoint = format!("inproc://{name}-dispatch");
        config.results_endpoint = format!("inproc://{name}-results");
        config.poll_interval_ms = 50;
        config.idle_threshold_ms = 500;
        config.drain_grace_ms = 200;
        config
    }
}

/// Dispatch line for a query/title pair.
pub fn record(query: &str, title: &str) -> String {
    format!("{{\"query\":\"{query}\",\"title\":\"{title}\"}}")
}

/// Scores 1.0 for identical texts and 0.0 otherwise; fails on the title
/// `boom`. An optional delay simulates model latency.
pub struct StubScorer {
    pub delay: Duration,
}

impl StubScorer {
    pub fn instant(_worker: usize) -> ScoringResult<Self> {
        Ok(Self {
            delay: Duration::ZERO,
        })
    }
}

impl Scorer for StubScorer {
    fn score(&mut self, query: &str, title: &str) -> ScoringResult<f64> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if title == "boom" {
            return Err(ScoringError::Embedding("stub failure".to_string()));
        }
        Ok(if query == title { 1.0 } else { 0.0 })
    }
}
