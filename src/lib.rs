//! Audio analysis and next-track recommendation.
//!
//! Files are decoded and mixed down to 16 kHz mono, scanned window by window
//! through an embedding oracle, and summarised either as labelled events or as
//! a probe-averaged style fingerprint. Fingerprints feed a cosine-similarity
//! recommender that steers clear of recently played tracks.

/// Decoding, resampling, scanning and fingerprinting.
pub mod analysis;
/// Where config, logs and the library database live.
pub mod app_dirs;
/// TOML settings.
pub mod config;
/// Worker pool for fingerprinting many tracks.
pub mod jobs;
/// Track records and the SQLite store.
pub mod library;
/// Tracing subscriber setup.
pub mod logging;
/// Similarity search and play history.
pub mod recommend;
/// Per-session playback state.
pub mod session;
