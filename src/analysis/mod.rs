//! Audio analysis pipeline: decoding, 16 kHz mixdown, windowed scanning, event
//! consolidation and probe-based style fingerprints.

pub mod decode;
pub mod events;
pub mod oracle;
pub mod probe;
pub mod progress;
pub mod resample;
pub mod scan;
pub mod windowing;

pub(crate) mod tflite_runtime;

/// Sample rate of every waveform handed to the embedding oracle.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;
/// Samples per analysis window (1.0 s at the target rate).
pub const WINDOW_SAMPLES: usize = 16_000;
/// Stride between consecutive full-scan windows (0.5 s).
pub const HOP_SAMPLES: usize = 8_000;
/// Hop length expressed in seconds.
pub const HOP_SEC: f64 = HOP_SAMPLES as f64 / TARGET_SAMPLE_RATE as f64;
/// Dimensionality of every embedding produced by the oracle.
pub const EMBEDDING_DIM: usize = 1024;

pub use decode::{AudioDecoder, AudioFormat, DecodeError, PcmChunk};
pub use events::{AudioEvent, Prediction, consolidate};
pub use oracle::{Embedding, EmbeddingOracle, OracleError};
pub use probe::{fingerprint_file, fingerprint_track, probe_times};
pub use progress::{ChannelProgress, NoProgress, ProgressSink, ProgressUpdate};
pub use resample::resample_to_mono;
pub use scan::{analyze_audio, analyze_file, analyze_waveform};
pub use windowing::{ScanWindows, window_count};
