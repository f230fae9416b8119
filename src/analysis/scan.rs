//! Full-scan analysis: decode, mix down, classify every window, consolidate.

use std::path::Path;

use super::TARGET_SAMPLE_RATE;
use super::decode::{AudioDecoder, DecodeError, SymphoniaDecoder, decode_all};
use super::events::{AudioEvent, EventConsolidator, Prediction};
use super::oracle::{ERROR_LABEL, EmbeddingOracle};
use super::progress::{ANALYZING, FINALIZING, PhaseProgress, ProgressSink};
use super::resample::resample_to_mono;
use super::windowing::ScanWindows;

/// Classify every full window of a 16 kHz mono waveform and merge the results.
///
/// Windows whose embedding fails are skipped. A failed classification is kept
/// as [`ERROR_LABEL`] so the timeline stays contiguous.
pub fn analyze_waveform(
    waveform: &[f32],
    oracle: &mut dyn EmbeddingOracle,
    progress: &mut dyn ProgressSink,
) -> Vec<AudioEvent> {
    let windows = ScanWindows::new(waveform);
    let total = windows.len();
    let mut consolidator = EventConsolidator::new();
    let mut skipped = 0_usize;
    {
        let mut phase = PhaseProgress::new(progress, ANALYZING);
        for (start, window) in windows.clone() {
            let time = start as f64 / TARGET_SAMPLE_RATE as f64;
            match oracle.embed(window) {
                Ok(embedding) => {
                    let label = oracle.classify(&embedding).unwrap_or_else(|err| {
                        tracing::warn!(time, "Classification failed: {err}");
                        ERROR_LABEL.to_string()
                    });
                    tracing::debug!(time, label = %label, "Window classified");
                    consolidator.push(Prediction::new(time, label));
                }
                Err(err) => {
                    skipped += 1;
                    tracing::warn!(time, "Skipping window: {err}");
                }
            }
            phase.report(windows.progress_at(start));
        }
    }
    let events = consolidator.finish();
    PhaseProgress::new(progress, FINALIZING).finish();
    tracing::info!(
        windows = total,
        skipped,
        events = events.len(),
        "Analysis finished"
    );
    events
}

/// Decode and analyze an already opened source.
///
/// Decode failures are logged and produce an empty event list.
pub fn analyze_audio(
    decoder: &mut dyn AudioDecoder,
    oracle: &mut dyn EmbeddingOracle,
    progress: &mut dyn ProgressSink,
) -> Vec<AudioEvent> {
    let decoded = match decode_all(decoder, progress) {
        Ok(decoded) => decoded,
        Err(err) => {
            tracing::warn!("Decoding failed, no events produced: {err}");
            return Vec::new();
        }
    };
    let waveform = resample_to_mono(
        &decoded.samples,
        decoded.format.sample_rate,
        decoded.format.channels,
        progress,
    );
    drop(decoded);
    analyze_waveform(&waveform, oracle, progress)
}

/// Open `path` and run a full scan.
///
/// Only failing to open the source is an error; anything after that degrades to
/// an empty result.
pub fn analyze_file(
    path: &Path,
    oracle: &mut dyn EmbeddingOracle,
    progress: &mut dyn ProgressSink,
) -> Result<Vec<AudioEvent>, DecodeError> {
    let mut decoder = SymphoniaDecoder::open(path)?;
    tracing::info!(path = %path.display(), "Analyzing file");
    Ok(analyze_audio(&mut decoder, oracle, progress))
}
