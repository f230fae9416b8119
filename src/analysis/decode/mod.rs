//! Decoder adapter: a pull interface over 16-bit interleaved PCM.
//!
//! Every backend exposes the same contract: format metadata up front, successive
//! PCM chunks until the stream ends, and a keyframe seek that flushes codec state.
//! An empty chunk means the codec consumed input without producing output yet.

mod buffer;
mod memory;
mod symphonia_decoder;

use std::path::PathBuf;

use thiserror::Error;

use super::progress::{DECODING, PhaseProgress, ProgressSink};

pub use buffer::{DEFAULT_DECODE_CAPACITY, PcmBuffer};
pub use memory::MemoryDecoder;
pub use symphonia_decoder::SymphoniaDecoder;

/// Errors raised while opening or pulling from an audio source.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The source file could not be opened.
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The container was not recognised.
    #[error("Unsupported or corrupt audio container: {0}")]
    Probe(String),
    /// The container holds no decodable audio track.
    #[error("No audio track found")]
    NoAudioTrack,
    /// The audio track does not declare a sample rate.
    #[error("Audio track is missing a sample rate")]
    MissingSampleRate,
    /// The audio track declares no usable channel layout.
    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(usize),
    /// The codec failed in a way that cannot be skipped.
    #[error("Decoder failure: {0}")]
    Codec(String),
    /// Seeking to a probe position failed.
    #[error("Seek to {seconds:.3}s failed: {reason}")]
    Seek { seconds: f64, reason: String },
    /// The stream ended without producing any PCM.
    #[error("Decoded 0 samples")]
    NoSamples,
    /// Reading the underlying byte stream failed.
    #[error("Audio source read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Format metadata reported by a decoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Total duration when the container declares one.
    pub duration_seconds: Option<f64>,
}

impl AudioFormat {
    /// Duration usable for percentage math; `None` when absent or non-positive.
    pub fn known_duration(&self) -> Option<f64> {
        self.duration_seconds
            .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
    }
}

/// One block of interleaved 16-bit samples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PcmChunk {
    pub samples: Vec<i16>,
}

impl PcmChunk {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// A chunk with no samples: the codec has not produced output yet.
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Pull-based PCM source.
///
/// A decoder owns its codec exclusively; share work across threads by giving
/// each worker its own instance.
pub trait AudioDecoder {
    /// Current output format. Backends update it in place on format changes.
    fn format(&self) -> &AudioFormat;

    /// Pull the next chunk. `Ok(None)` marks end of stream.
    fn next_chunk(&mut self) -> Result<Option<PcmChunk>, DecodeError>;

    /// Move to the nearest keyframe at or before `seconds` and flush codec state.
    fn seek(&mut self, seconds: f64) -> Result<(), DecodeError>;
}

/// Iterate over the remaining chunks of `decoder`. The iterator ends after the first error.
pub fn chunks<D: AudioDecoder + ?Sized>(decoder: &mut D) -> PcmChunks<'_, D> {
    PcmChunks {
        decoder,
        finished: false,
    }
}

/// Iterator adapter over [`AudioDecoder::next_chunk`], built by [`chunks`].
pub struct PcmChunks<'a, D: AudioDecoder + ?Sized> {
    decoder: &'a mut D,
    finished: bool,
}

impl<D: AudioDecoder + ?Sized> Iterator for PcmChunks<'_, D> {
    type Item = Result<PcmChunk, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.decoder.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

/// Fully decoded interleaved PCM plus the format it was produced in.
#[derive(Debug, Clone)]
pub struct DecodedPcm {
    pub samples: Vec<i16>,
    pub format: AudioFormat,
}

/// Drain `decoder` into memory, reporting progress against the declared duration.
pub fn decode_all(
    decoder: &mut dyn AudioDecoder,
    progress: &mut dyn ProgressSink,
) -> Result<DecodedPcm, DecodeError> {
    let initial = *decoder.format();
    let mut buffer = PcmBuffer::with_estimate(&initial);
    let expected_samples = initial.known_duration().map(|seconds| {
        seconds * initial.sample_rate as f64 * initial.channels.max(1) as f64
    });
    let mut phase = PhaseProgress::new(progress, DECODING);
    for chunk in chunks(&mut *decoder) {
        let chunk = chunk?;
        if chunk.is_empty() {
            continue;
        }
        buffer.push(&chunk.samples);
        if let Some(expected) = expected_samples {
            phase.report(buffer.len() as f64 / expected * 100.0);
        }
    }
    phase.finish();
    if buffer.is_empty() {
        return Err(DecodeError::NoSamples);
    }
    let format = *decoder.format();
    if format != initial {
        tracing::debug!(
            "Decoder format changed from {}Hz/{}ch to {}Hz/{}ch",
            initial.sample_rate,
            initial.channels,
            format.sample_rate,
            format.channels
        );
    }
    Ok(DecodedPcm {
        samples: buffer.into_samples(),
        format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::progress::NoProgress;

    fn format(rate: u32, channels: u16, duration: Option<f64>) -> AudioFormat {
        AudioFormat {
            sample_rate: rate,
            channels,
            duration_seconds: duration,
        }
    }

    #[test]
    fn known_duration_rejects_non_positive_values() {
        assert_eq!(format(8_000, 1, Some(0.0)).known_duration(), None);
        assert_eq!(format(8_000, 1, Some(-3.0)).known_duration(), None);
        assert_eq!(format(8_000, 1, None).known_duration(), None);
        assert_eq!(format(8_000, 1, Some(2.5)).known_duration(), Some(2.5));
    }

    #[test]
    fn decode_all_collects_every_chunk_in_order() {
        let samples: Vec<i16> = (0..10_000).map(|v| (v % 300) as i16).collect();
        let mut decoder = MemoryDecoder::new(samples.clone(), 8_000, 1).with_chunk_len(777);
        let decoded = decode_all(&mut decoder, &mut NoProgress).unwrap();
        assert_eq!(decoded.samples, samples);
        assert_eq!(decoded.format.sample_rate, 8_000);
    }

    #[test]
    fn decode_all_reports_monotonic_progress_ending_at_100() {
        let samples = vec![1_i16; 16_000];
        let mut decoder = MemoryDecoder::new(samples, 8_000, 2).with_chunk_len(1_000);
        let mut seen = Vec::new();
        let mut sink = |percent: u8, message: &str| {
            assert_eq!(message, DECODING);
            seen.push(percent);
        };
        decode_all(&mut decoder, &mut sink).unwrap();
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(seen.last(), Some(&100));
    }

    #[test]
    fn decode_all_rejects_empty_streams() {
        let mut decoder = MemoryDecoder::new(Vec::new(), 8_000, 1);
        let err = decode_all(&mut decoder, &mut NoProgress).unwrap_err();
        assert!(matches!(err, DecodeError::NoSamples));
    }

    #[test]
    fn chunk_iterator_stops_at_end_of_stream() {
        let mut decoder = MemoryDecoder::new(vec![0_i16; 10], 8_000, 1).with_chunk_len(4);
        let lens: Vec<usize> = chunks(&mut decoder).map(|chunk| chunk.unwrap().len()).collect();
        assert_eq!(lens, vec![4, 4, 2]);
    }
}
