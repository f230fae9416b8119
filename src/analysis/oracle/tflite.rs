use std::fs;
use std::path::PathBuf;

use super::{Embedding, EmbeddingOracle, OracleError, check_window, label_for_scores};
use crate::analysis::EMBEDDING_DIM;
use crate::analysis::tflite_runtime::TfliteRuntime;

/// File locations for a TFLite-backed oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TfliteModelPaths {
    /// Shared library exposing the TensorFlow Lite C API.
    pub library: PathBuf,
    /// Waveform → embedding model.
    pub embedding_model: PathBuf,
    /// Embedding → class scores model.
    pub classifier_model: PathBuf,
    /// One label per line, in score order.
    pub labels: PathBuf,
    pub threads: i32,
}

/// Oracle running an embedding model and a classifier head through TFLite.
pub struct TfliteOracle {
    embedder: TfliteRuntime,
    classifier: TfliteRuntime,
    labels: Vec<String>,
}

impl TfliteOracle {
    pub fn load(paths: &TfliteModelPaths) -> Result<Self, OracleError> {
        let labels = read_labels(paths)?;
        let embedder = TfliteRuntime::load(&paths.embedding_model, &paths.library, paths.threads)?;
        let classifier =
            TfliteRuntime::load(&paths.classifier_model, &paths.library, paths.threads)?;
        tracing::info!(
            labels = labels.len(),
            model = %paths.embedding_model.display(),
            "Loaded TFLite oracle"
        );
        Ok(Self {
            embedder,
            classifier,
            labels,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl EmbeddingOracle for TfliteOracle {
    fn embed(&mut self, window: &[f32]) -> Result<Embedding, OracleError> {
        check_window(window)?;
        let values = self
            .embedder
            .run(window, Some(EMBEDDING_DIM))
            .map_err(OracleError::Embedding)?;
        Embedding::new(values)
    }

    fn classify(&mut self, embedding: &Embedding) -> Result<String, OracleError> {
        let scores = self
            .classifier
            .run(embedding.as_slice(), None)
            .map_err(OracleError::Classification)?;
        Ok(label_for_scores(&scores, &self.labels).to_string())
    }
}

fn read_labels(paths: &TfliteModelPaths) -> Result<Vec<String>, OracleError> {
    let text = fs::read_to_string(&paths.labels).map_err(|source| OracleError::Labels {
        path: paths.labels.clone(),
        source,
    })?;
    Ok(parse_labels(&text))
}

fn parse_labels(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
