use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::defaults::{
    clamp_analysis_worker_count, clamp_history_capacity, clamp_tflite_threads,
    default_analysis_worker_count, default_history_capacity, default_tflite_threads,
};
use crate::analysis::oracle::TfliteModelPaths;

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Library database location; defaults to `library.db` in the app root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_db: Option<PathBuf>,
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub recommendation: RecommendationSettings,
}

impl AppConfig {
    pub(crate) fn normalized(mut self) -> Self {
        self.analysis.worker_count = clamp_analysis_worker_count(self.analysis.worker_count);
        self.analysis.tflite_threads = clamp_tflite_threads(self.analysis.tflite_threads);
        self.recommendation.history_capacity =
            clamp_history_capacity(self.recommendation.history_capacity);
        self
    }
}

/// Worker pool and model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Fingerprint worker count (0 = auto).
    #[serde(default = "default_analysis_worker_count")]
    pub worker_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier_model: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels_file: Option<PathBuf>,
    /// TensorFlow Lite C library (`libtensorflowlite_c`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tflite_library: Option<PathBuf>,
    /// Interpreter threads per oracle instance.
    #[serde(default = "default_tflite_threads")]
    pub tflite_threads: i32,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            worker_count: default_analysis_worker_count(),
            embedding_model: None,
            classifier_model: None,
            labels_file: None,
            tflite_library: None,
            tflite_threads: default_tflite_threads(),
        }
    }
}

impl AnalysisSettings {
    /// Model file set, if every path has been configured.
    pub fn model_paths(&self) -> Option<TfliteModelPaths> {
        Some(TfliteModelPaths {
            library: self.tflite_library.clone()?,
            embedding_model: self.embedding_model.clone()?,
            classifier_model: self.classifier_model.clone()?,
            labels: self.labels_file.clone()?,
            threads: self.tflite_threads,
        })
    }

    /// Names of the model settings that are still unset.
    pub fn missing_model_settings(&self) -> Vec<&'static str> {
        [
            ("analysis.tflite_library", self.tflite_library.is_none()),
            ("analysis.embedding_model", self.embedding_model.is_none()),
            ("analysis.classifier_model", self.classifier_model.is_none()),
            ("analysis.labels_file", self.labels_file.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationSettings {
    /// How many recent plays `next` avoids repeating.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
        }
    }
}
