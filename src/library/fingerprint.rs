//! Text encoding for stored fingerprints: comma-separated decimal `f32` values.

use std::fmt::Write;

use thiserror::Error;

use crate::analysis::oracle::OracleError;
use crate::analysis::{EMBEDDING_DIM, Embedding};

/// A stored fingerprint that could not be decoded.
#[derive(Debug, Error, PartialEq)]
pub enum FingerprintParseError {
    #[error("Stored fingerprint is empty")]
    Empty,
    #[error("Invalid value {token:?} at index {index}")]
    InvalidValue { index: usize, token: String },
    #[error("Non-finite value at index {index}")]
    NonFinite { index: usize },
    #[error("Expected {expected} values, got {actual}", expected = EMBEDDING_DIM)]
    WrongDimension { actual: usize },
    #[error("Stored fingerprint rejected: {0}")]
    Rejected(String),
}

/// Encode with the shortest representation that parses back to the same `f32`.
pub fn encode_fingerprint(embedding: &Embedding) -> String {
    let mut out = String::with_capacity(embedding.as_slice().len() * 10);
    for (index, value) in embedding.as_slice().iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        let _ = write!(out, "{value}");
    }
    out
}

pub fn decode_fingerprint(text: &str) -> Result<Embedding, FingerprintParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(FingerprintParseError::Empty);
    }
    let mut values = Vec::with_capacity(EMBEDDING_DIM);
    for (index, token) in text.split(',').enumerate() {
        let token = token.trim();
        let value: f32 = token
            .parse()
            .map_err(|_| FingerprintParseError::InvalidValue {
                index,
                token: token.to_string(),
            })?;
        if !value.is_finite() {
            return Err(FingerprintParseError::NonFinite { index });
        }
        values.push(value);
    }
    Embedding::new(values).map_err(|err| match err {
        OracleError::DimensionMismatch { actual, .. } => {
            FingerprintParseError::WrongDimension { actual }
        }
        other => FingerprintParseError::Rejected(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Embedding {
        let values = (0..EMBEDDING_DIM)
            .map(|i| (i as f32 * 0.1).sin() / 3.0)
            .collect();
        Embedding::new(values).unwrap()
    }

    #[test]
    fn decimal_text_restores_exact_values() {
        let embedding = sample();
        let text = encode_fingerprint(&embedding);
        assert_eq!(text.split(',').count(), EMBEDDING_DIM);
        assert_eq!(decode_fingerprint(&text).unwrap(), embedding);
    }

    #[test]
    fn empty_text_is_rejected() {
        assert_eq!(decode_fingerprint("  "), Err(FingerprintParseError::Empty));
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        let mut text = encode_fingerprint(&sample());
        text.push_str(",abc");
        assert!(matches!(
            decode_fingerprint(&text),
            Err(FingerprintParseError::InvalidValue { index, .. }) if index == EMBEDDING_DIM
        ));
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        assert_eq!(
            decode_fingerprint("0.5,0.25"),
            Err(FingerprintParseError::WrongDimension { actual: 2 })
        );
        let mut text = encode_fingerprint(&sample());
        text.push_str(",0.5");
        assert_eq!(
            decode_fingerprint(&text),
            Err(FingerprintParseError::WrongDimension {
                actual: EMBEDDING_DIM + 1
            })
        );
        assert_eq!(
            FingerprintParseError::WrongDimension { actual: 2 }.to_string(),
            format!("Expected {EMBEDDING_DIM} values, got 2")
        );
    }

    #[test]
    fn non_finite_values_are_rejected() {
        assert_eq!(
            decode_fingerprint("0.5,NaN"),
            Err(FingerprintParseError::NonFinite { index: 1 })
        );
        assert_eq!(
            decode_fingerprint("inf"),
            Err(FingerprintParseError::NonFinite { index: 0 })
        );
    }
}
