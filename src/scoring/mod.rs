//! Similarity scoring capability consumed by the workers.

use thiserror::Error;

pub mod embedding;

pub use embedding::EmbeddingScorer;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("unknown embedding model: {0}")]
    UnknownModel(String),
    #[error("failed to initialize embedder: {0}")]
    Init(String),
    #[error("failed to generate embeddings: {0}")]
    Embedding(String),
    #[error("embedding dimensions differ: {0} != {1}")]
    DimensionMismatch(usize, usize),
}

pub type ScoringResult<T> = Result<T, ScoringError>;

/// Computes a similarity value, typically in `[-1, 1]`, for a query/title pair.
///
/// Every worker owns its scorer, so implementations may keep mutable state
/// such as model sessions without synchronisation.
pub trait Scorer {
    fn score(&mut self, query: &str, title: &str) -> ScoringResult<f64>;
}

impl<F> Scorer for F
where
    F: FnMut(&str, &str) -> ScoringResult<f64>,
{
    fn score(&mut self, query: &str, title: &str) -> ScoringResult<f64> {
        self(query, title)
    }
}
