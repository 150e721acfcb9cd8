use serde::Deserialize;
use thiserror::Error;

/// Field separator used by both input records and result lines.
pub const FIELD_SEPARATOR: u8 = b'\t';

/// Number of fractional digits a score is rendered with.
pub const SCORE_PRECISION: usize = 6;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid request field: {0}")]
    Json(#[from] serde_json::Error),
}

/// Query/title pair carried in the leading field of a record.
#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct ScoringRequest {
    pub query: String,
    pub title: String,
}

impl ScoringRequest {
    /// Decodes the first tab-delimited field of `record`.
    ///
    /// Remaining fields are ignored here and travel with the record
    /// untouched.
    pub fn decode(record: &[u8]) -> Result<Self, DecodeError> {
        let head = record
            .split(|byte| *byte == FIELD_SEPARATOR)
            .next()
            .unwrap_or_default();
        Ok(serde_json::from_slice(head)?)
    }
}

/// Builds the result line `<record>\t<score>`.
pub fn format_result(record: &[u8], score: f64) -> Vec<u8> {
    let score = format!("{:.*}", SCORE_PRECISION, score);
    let mut line = Vec::with_capacity(record.len() + 1 + score.len());
    line.extend_from_slice(record);
    line.push(FIELD_SEPARATOR);
    line.extend_from_slice(score.as_bytes());
    line
}
