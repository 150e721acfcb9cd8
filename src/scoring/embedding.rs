use std::path::Path;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::scoring::{Scorer, ScoringError, ScoringResult};

/// Model used when the configuration does not name one.
pub const DEFAULT_MODEL: &str = "multilingual-e5-large";

/// Resolve a configured model name to a `fastembed` model.
pub fn embedding_model(name: &str) -> ScoringResult<EmbeddingModel> {
    match name.to_ascii_lowercase().as_str() {
        "multilingual-e5-large" => Ok(EmbeddingModel::MultilingualE5Large),
        "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "paraphrase-multilingual-mpnet-base-v2" => Ok(EmbeddingModel::ParaphraseMLMpnetBaseV2),
        _ => Err(ScoringError::UnknownModel(name.to_string())),
    }
}

/// Normalize a vector to unit length.
///
/// Returns the original vector when the norm is zero.
pub(crate) fn normalize_embedding(vec: &[f32]) -> Vec<f32> {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        vec.to_vec()
    } else {
        vec.iter().map(|x| x / norm).collect()
    }
}

/// Cosine similarity of two vectors.
///
/// A zero vector has no direction and scores `0.0` against anything.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> ScoringResult<f64> {
    if a.len() != b.len() {
        return Err(ScoringError::DimensionMismatch(a.len(), b.len()));
    }
    let a = normalize_embedding(a);
    let b = normalize_embedding(b);
    let dot = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum::<f64>();
    Ok(dot.clamp(-1.0, 1.0))
}

/// Scores a query/title pair by the cosine similarity of their sentence
/// embeddings.
pub struct EmbeddingScorer {
    embedder: TextEmbedding,
}

impl EmbeddingScorer {
    /// Loads the named model, reusing weights from `cache_dir` when given.
    pub fn new(model: &str, cache_dir: Option<&Path>) -> ScoringResult<Self> {
        let mut options = InitOptions::new(embedding_model(model)?);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir.to_path_buf());
        }
        let embedder = TextEmbedding::try_new(options)
            .map_err(|error| ScoringError::Init(format!("{error:?}")))?;
        Ok(Self { embedder })
    }
}

impl Scorer for EmbeddingScorer {
    fn score(&mut self, query: &str, title: &str) -> ScoringResult<f64> {
        let embeddings = self
            .embedder
            .embed(vec![query.to_string(), title.to_string()], None)
            .map_err(|error| ScoringError::Embedding(format!("{error:?}")))?;

        match embeddings.as_slice() {
            [query_embedding, title_embedding] => {
                cosine_similarity(query_embedding, title_embedding)
            }
            other => Err(ScoringError::Embedding(format!(
                "expected 2 embeddings, got {}",
                other.len()
            ))),
        }
    }
}
