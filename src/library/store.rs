//! SQLite-backed track library and play history.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;

use super::fingerprint::{decode_fingerprint, encode_fingerprint};
use super::track::{Track, TrackId};
use crate::analysis::Embedding;
use crate::recommend::PlayHistory;

/// Errors returned when operating on the library database.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to create the directory for the database file.
    #[error("Could not create library directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Library database query failed: {0}")]
    Sql(#[from] rusqlite::Error),
}

const TRACK_COLUMNS: &str = "track_id, path, duration_seconds, fingerprint";

/// Tracks, their fingerprints and the persisted play history.
pub struct LibraryStore {
    connection: Connection,
}

impl LibraryStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        create_parent_if_needed(path)?;
        let connection = Connection::open(path)?;
        let store = Self { connection };
        store.apply_pragmas()?;
        store.apply_schema()?;
        tracing::debug!(path = %path.display(), "Opened library database");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            connection: Connection::open_in_memory()?,
        };
        store.apply_schema()?;
        Ok(store)
    }

    fn apply_pragmas(&self) -> Result<(), StoreError> {
        self.connection.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;
        Ok(())
    }

    fn apply_schema(&self) -> Result<(), StoreError> {
        self.connection.execute_batch(
            "CREATE TABLE IF NOT EXISTS tracks (
                track_id TEXT PRIMARY KEY,
                path TEXT NOT NULL UNIQUE,
                duration_seconds REAL,
                fingerprint TEXT
            );
             CREATE TABLE IF NOT EXISTS play_history (
                position INTEGER PRIMARY KEY,
                track_id TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Register `path`, keeping the existing id and fingerprint if it is known.
    ///
    /// A `None` duration leaves a previously stored duration in place.
    pub fn upsert_track(
        &self,
        path: &Path,
        duration_seconds: Option<f64>,
    ) -> Result<Track, StoreError> {
        let path_text = path_key(path);
        self.connection.execute(
            "INSERT INTO tracks (track_id, path, duration_seconds, fingerprint)
             VALUES (?1, ?2, ?3, NULL)
             ON CONFLICT(path) DO UPDATE SET
                duration_seconds = COALESCE(excluded.duration_seconds, tracks.duration_seconds)",
            params![TrackId::new().as_str(), path_text, duration_seconds],
        )?;
        let track = self
            .connection
            .query_row(
                &format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE path = ?1"),
                params![path_text],
                track_from_row,
            )?;
        Ok(track)
    }

    pub fn track(&self, id: &TrackId) -> Result<Option<Track>, StoreError> {
        let track = self
            .connection
            .query_row(
                &format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE track_id = ?1"),
                params![id.as_str()],
                track_from_row,
            )
            .optional()?;
        Ok(track)
    }

    pub fn track_by_path(&self, path: &Path) -> Result<Option<Track>, StoreError> {
        let track = self
            .connection
            .query_row(
                &format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE path = ?1"),
                params![path_key(path)],
                track_from_row,
            )
            .optional()?;
        Ok(track)
    }

    /// Every track, ordered by path.
    pub fn tracks(&self) -> Result<Vec<Track>, StoreError> {
        self.query_tracks(&format!(
            "SELECT {TRACK_COLUMNS} FROM tracks ORDER BY path"
        ))
    }

    /// Tracks without a usable fingerprint, including malformed ones.
    pub fn unanalyzed_tracks(&self) -> Result<Vec<Track>, StoreError> {
        let tracks = self.tracks()?;
        Ok(tracks.into_iter().filter(|track| !track.is_analyzed()).collect())
    }

    /// Record the decoded duration. Returns `false` for an unknown id.
    pub fn set_duration(&self, id: &TrackId, seconds: f64) -> Result<bool, StoreError> {
        let changed = self.connection.execute(
            "UPDATE tracks SET duration_seconds = ?1 WHERE track_id = ?2",
            params![seconds, id.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Overwrite the stored fingerprint. Returns `false` for an unknown id.
    pub fn set_fingerprint(&self, id: &TrackId, embedding: &Embedding) -> Result<bool, StoreError> {
        let changed = self.connection.execute(
            "UPDATE tracks SET fingerprint = ?1 WHERE track_id = ?2",
            params![encode_fingerprint(embedding), id.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Stored fingerprint, or `None` when absent or unreadable.
    pub fn fingerprint(&self, id: &TrackId) -> Result<Option<Embedding>, StoreError> {
        let text: Option<Option<String>> = self
            .connection
            .query_row(
                "SELECT fingerprint FROM tracks WHERE track_id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(text.flatten().and_then(|text| parse_stored(id, &text)))
    }

    pub fn clear_fingerprint(&self, id: &TrackId) -> Result<(), StoreError> {
        self.connection.execute(
            "UPDATE tracks SET fingerprint = NULL WHERE track_id = ?1",
            params![id.as_str()],
        )?;
        Ok(())
    }

    /// Load the persisted play history, oldest first.
    pub fn load_history(&self, capacity: usize) -> Result<PlayHistory, StoreError> {
        let mut stmt = self
            .connection
            .prepare("SELECT track_id FROM play_history ORDER BY position")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PlayHistory::from_ids(
            capacity,
            ids.into_iter().map(TrackId::from_string),
        ))
    }

    /// Replace the persisted play history.
    pub fn save_history(&mut self, history: &PlayHistory) -> Result<(), StoreError> {
        let tx = self.connection.transaction()?;
        tx.execute("DELETE FROM play_history", [])?;
        {
            let mut insert =
                tx.prepare("INSERT INTO play_history (position, track_id) VALUES (?1, ?2)")?;
            for (position, id) in history.iter().enumerate() {
                insert.execute(params![position as i64, id.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn query_tracks(&self, sql: &str) -> Result<Vec<Track>, StoreError> {
        let mut stmt = self.connection.prepare(sql)?;
        let rows = stmt.query_map([], track_from_row)?;
        let mut tracks = Vec::new();
        for row in rows {
            tracks.push(row?);
        }
        Ok(tracks)
    }
}

fn track_from_row(row: &Row<'_>) -> rusqlite::Result<Track> {
    let id = TrackId::from_string(row.get::<_, String>(0)?);
    let path: String = row.get(1)?;
    let duration_seconds: Option<f64> = row.get(2)?;
    let fingerprint: Option<String> = row.get(3)?;
    let fingerprint = fingerprint.and_then(|text| parse_stored(&id, &text));
    Ok(Track {
        id,
        path: PathBuf::from(path),
        duration_seconds,
        fingerprint,
    })
}

fn parse_stored(id: &TrackId, text: &str) -> Option<Embedding> {
    match decode_fingerprint(text) {
        Ok(embedding) => Some(embedding),
        Err(err) => {
            tracing::warn!(track = %id, "Ignoring malformed fingerprint: {err}");
            None
        }
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn create_parent_if_needed(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}
