//! Cheap per-track style fingerprints from a handful of probed windows.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use super::decode::{AudioDecoder, DecodeError, SymphoniaDecoder};
use super::oracle::{Embedding, EmbeddingOracle};
use super::progress::NoProgress;
use super::resample::resample_to_mono;
use super::{EMBEDDING_DIM, WINDOW_SAMPLES};

/// Raw samples (before mixdown) a probe aims to collect.
pub const PROBE_SNIPPET_SAMPLES: usize = 20_000;
/// Consecutive empty decoder results tolerated before a probe gives up.
pub const PROBE_RETRY_LIMIT: usize = 50;
/// Tracks shorter than this get a single probe at the start.
pub const SHORT_TRACK_SECONDS: f64 = 10.0;
/// Probe positions as fractions of the track duration.
pub const PROBE_FRACTIONS: [f64; 5] = [0.15, 0.30, 0.50, 0.70, 0.85];

/// Probe timestamps in seconds. Unknown or non-positive durations count as short.
pub fn probe_times(duration_seconds: Option<f64>) -> Vec<f64> {
    match duration_seconds.filter(|seconds| seconds.is_finite() && *seconds > 0.0) {
        Some(seconds) if seconds >= SHORT_TRACK_SECONDS => PROBE_FRACTIONS
            .iter()
            .map(|fraction| seconds * fraction)
            .collect(),
        _ => vec![0.0],
    }
}

/// Average the embeddings of every successful probe.
///
/// Returns `None` when no probe produced an embedding; a missing fingerprint is
/// never replaced by a zero vector. Setting `cancel` stops before the next
/// probe and keeps whatever has been collected.
pub fn fingerprint_track(
    decoder: &mut dyn AudioDecoder,
    duration_seconds: Option<f64>,
    oracle: &mut dyn EmbeddingOracle,
    cancel: Option<&AtomicBool>,
) -> Option<Embedding> {
    let times = probe_times(duration_seconds);
    let mut sums = vec![0.0_f64; EMBEDDING_DIM];
    let mut successes = 0_usize;
    for &time in &times {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            tracing::debug!(successes, "Fingerprint cancelled between probes");
            break;
        }
        let Some(window) = probe_window(decoder, time) else {
            continue;
        };
        match oracle.embed(&window) {
            Ok(embedding) => {
                for (sum, value) in sums.iter_mut().zip(embedding.as_slice()) {
                    *sum += f64::from(*value);
                }
                successes += 1;
            }
            Err(err) => tracing::warn!(time, "Skipping probe: {err}"),
        }
    }
    if successes == 0 {
        tracing::debug!(probes = times.len(), "No probe produced an embedding");
        return None;
    }
    let averaged = sums
        .into_iter()
        .map(|sum| (sum / successes as f64) as f32)
        .collect();
    match Embedding::new(averaged) {
        Ok(embedding) => Some(embedding),
        Err(err) => {
            tracing::warn!("Discarding averaged fingerprint: {err}");
            None
        }
    }
}

/// Open `path` and fingerprint it. Falls back to the container duration when
/// `duration_seconds` is `None`.
pub fn fingerprint_file(
    path: &Path,
    duration_seconds: Option<f64>,
    oracle: &mut dyn EmbeddingOracle,
    cancel: Option<&AtomicBool>,
) -> Result<Option<Embedding>, DecodeError> {
    let mut decoder = SymphoniaDecoder::open(path)?;
    let duration = duration_seconds.or_else(|| decoder.format().known_duration());
    Ok(fingerprint_track(&mut decoder, duration, oracle, cancel))
}

fn probe_window(decoder: &mut dyn AudioDecoder, time: f64) -> Option<Vec<f32>> {
    if let Err(err) = decoder.seek(time) {
        tracing::warn!(time, "Probe seek failed: {err}");
        return None;
    }
    let raw = read_snippet(decoder);
    let format = *decoder.format();
    let mut mono = resample_to_mono(&raw, format.sample_rate, format.channels, &mut NoProgress);
    if mono.len() < WINDOW_SAMPLES {
        tracing::debug!(time, samples = mono.len(), "Probe snippet too short");
        return None;
    }
    mono.truncate(WINDOW_SAMPLES);
    Some(mono)
}

/// Raw samples needed for one probe: the nominal snippet, or one second of
/// interleaved audio when the source rate needs more to fill a window.
fn snippet_target(sample_rate: u32, channels: u16) -> usize {
    let one_second = sample_rate as usize * channels.max(1) as usize;
    PROBE_SNIPPET_SAMPLES.max(one_second)
}

fn read_snippet(decoder: &mut dyn AudioDecoder) -> Vec<i16> {
    let mut samples = Vec::new();
    let mut empty_reads = 0;
    loop {
        let format = decoder.format();
        if samples.len() >= snippet_target(format.sample_rate, format.channels) {
            break;
        }
        match decoder.next_chunk() {
            Ok(Some(chunk)) if chunk.is_empty() => {
                empty_reads += 1;
                if empty_reads >= PROBE_RETRY_LIMIT {
                    tracing::warn!(collected = samples.len(), "Decoder stalled during probe");
                    break;
                }
            }
            Ok(Some(chunk)) => {
                empty_reads = 0;
                samples.extend_from_slice(&chunk.samples);
            }
            Ok(None) => break,
            Err(err) => {
                tracing::warn!("Probe decode failed: {err}");
                break;
            }
        }
    }
    samples
}
