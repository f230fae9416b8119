//! Next-track selection by fingerprint similarity.
//!
//! The search is a pure read over already computed fingerprints; any number of
//! threads may call [`find_next`] on the same snapshot.

pub mod history;

use crate::library::{Track, TrackId};

pub use history::{HISTORY_CAPACITY, PlayHistory};

/// Cosine similarity over the shared prefix of `a` and `b`.
///
/// A zero-norm side yields 0 instead of dividing by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for i in 0..len {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= 0.0 || !denom.is_finite() {
        return 0.0;
    }
    dot / denom
}

/// Pick the candidate most similar to `current`.
///
/// Candidates sharing `current`'s identity or lacking a fingerprint never
/// qualify. Among qualifying candidates the best one absent from `recent` wins;
/// when every qualifying candidate was played recently the best overall is
/// returned. Ties keep the earliest candidate.
pub fn find_next<'a>(
    current: &Track,
    candidates: &'a [Track],
    recent: &[TrackId],
) -> Option<&'a Track> {
    let reference = current.fingerprint.as_ref()?;
    let mut best_fresh: Option<(&Track, f32)> = None;
    let mut best_any: Option<(&Track, f32)> = None;
    for candidate in candidates {
        if candidate.id == current.id {
            continue;
        }
        let Some(fingerprint) = candidate.fingerprint.as_ref() else {
            continue;
        };
        let score = cosine_similarity(reference.as_slice(), fingerprint.as_slice());
        if best_any.is_none_or(|(_, top)| score > top) {
            best_any = Some((candidate, score));
        }
        if !recent.contains(&candidate.id) && best_fresh.is_none_or(|(_, top)| score > top) {
            best_fresh = Some((candidate, score));
        }
    }
    let (track, score) = best_fresh.or(best_any)?;
    tracing::debug!(track = %track.id, score, "Selected next track");
    Some(track)
}
