//! Embedding and classification oracle contract.
//!
//! The pipeline only sees two operations: window → embedding and
//! embedding → label. Backends are injected so scans can run against a
//! deterministic stub as easily as against a real model.

mod tflite;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{EMBEDDING_DIM, WINDOW_SAMPLES};

pub use tflite::{TfliteModelPaths, TfliteOracle};

/// Label substituted when classification fails.
pub const ERROR_LABEL: &str = "Error";
/// Label used when the winning score index has no entry in the label table.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Errors reported by embedding or classification backends.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The backend runtime or model could not be loaded.
    #[error("Failed to load model runtime: {0}")]
    Load(String),
    /// Reading the label table failed.
    #[error("Failed to read labels from {path}: {source}")]
    Labels {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Embedding inference failed for one window.
    #[error("Embedding inference failed: {0}")]
    Embedding(String),
    /// Classification failed for one embedding.
    #[error("Classification failed: {0}")]
    Classification(String),
    /// Input or output had the wrong number of values.
    #[error("Expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// A point in the style-similarity space.
///
/// Always `EMBEDDING_DIM` finite values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Result<Self, OracleError> {
        if values.len() != EMBEDDING_DIM {
            return Err(OracleError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                actual: values.len(),
            });
        }
        if let Some(index) = values.iter().position(|value| !value.is_finite()) {
            return Err(OracleError::Embedding(format!(
                "non-finite value at dimension {index}"
            )));
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

impl TryFrom<Vec<f32>> for Embedding {
    type Error = OracleError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<Embedding> for Vec<f32> {
    fn from(embedding: Embedding) -> Self {
        embedding.0
    }
}

/// Window embedding and label classification backend.
///
/// Implementations may hold non-thread-safe runtime state; give each worker its
/// own instance.
pub trait EmbeddingOracle {
    /// Embed exactly `WINDOW_SAMPLES` mono samples at the analysis rate.
    fn embed(&mut self, window: &[f32]) -> Result<Embedding, OracleError>;

    /// Map an embedding to a label.
    fn classify(&mut self, embedding: &Embedding) -> Result<String, OracleError>;
}

impl<T: EmbeddingOracle + ?Sized> EmbeddingOracle for Box<T> {
    fn embed(&mut self, window: &[f32]) -> Result<Embedding, OracleError> {
        (**self).embed(window)
    }

    fn classify(&mut self, embedding: &Embedding) -> Result<String, OracleError> {
        (**self).classify(embedding)
    }
}

/// Reject windows that are not exactly one analysis window long.
pub fn check_window(window: &[f32]) -> Result<(), OracleError> {
    if window.len() == WINDOW_SAMPLES {
        Ok(())
    } else {
        Err(OracleError::DimensionMismatch {
            expected: WINDOW_SAMPLES,
            actual: window.len(),
        })
    }
}

/// Argmax over `scores`, first occurrence winning ties.
///
/// Returns [`UNKNOWN_LABEL`] when there is no finite score or the winning index
/// has no label.
pub fn label_for_scores<'a>(scores: &[f32], labels: &'a [String]) -> &'a str {
    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        if !score.is_finite() {
            continue;
        }
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((index, score));
        }
    }
    best.and_then(|(index, _)| labels.get(index))
        .map(String::as_str)
        .unwrap_or(UNKNOWN_LABEL)
}
