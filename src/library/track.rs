use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::Embedding;

/// Identifier for a track in the library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(String);

impl TrackId {
    /// Create a new unique track identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Rehydrate a track identifier from a stored string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A library track and its optional style fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub path: PathBuf,
    pub duration_seconds: Option<f64>,
    /// Absent until the track has been probed successfully.
    pub fingerprint: Option<Embedding>,
}

impl Track {
    pub fn new(path: impl Into<PathBuf>, duration_seconds: Option<f64>) -> Self {
        Self {
            id: TrackId::new(),
            path: path.into(),
            duration_seconds,
            fingerprint: None,
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: Embedding) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    pub fn is_analyzed(&self) -> bool {
        self.fingerprint.is_some()
    }

    /// File name for display, falling back to the full path.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}
