use super::{AudioDecoder, AudioFormat, DecodeError, PcmChunk};

const DEFAULT_CHUNK_FRAMES: usize = 4_096;

/// Decoder over PCM that is already in memory.
///
/// Seeks snap to the previous multiple of the keyframe interval, mimicking a
/// compressed stream whose sync points are spaced apart.
#[derive(Debug, Clone)]
pub struct MemoryDecoder {
    samples: Vec<i16>,
    format: AudioFormat,
    chunk_len: usize,
    keyframe_frames: usize,
    position: usize,
}

impl MemoryDecoder {
    /// Wrap interleaved samples. The duration is derived from the sample count.
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let frames = samples.len() / channels as usize;
        let duration_seconds = if sample_rate > 0 {
            Some(frames as f64 / sample_rate as f64)
        } else {
            None
        };
        Self {
            samples,
            format: AudioFormat {
                sample_rate,
                channels,
                duration_seconds,
            },
            chunk_len: DEFAULT_CHUNK_FRAMES * channels as usize,
            keyframe_frames: 1,
            position: 0,
        }
    }

    /// Chunk length in interleaved samples (rounded up to whole frames).
    pub fn with_chunk_len(mut self, chunk_len: usize) -> Self {
        let channels = self.format.channels as usize;
        self.chunk_len = chunk_len.max(1).div_ceil(channels) * channels;
        self
    }

    /// Spacing of seekable sync points, in frames.
    pub fn with_keyframe_interval(mut self, frames: usize) -> Self {
        self.keyframe_frames = frames.max(1);
        self
    }

    /// Override the declared duration, e.g. to model containers without one.
    pub fn with_declared_duration(mut self, duration_seconds: Option<f64>) -> Self {
        self.format.duration_seconds = duration_seconds;
        self
    }

    /// Current read position in interleaved samples.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl AudioDecoder for MemoryDecoder {
    fn format(&self) -> &AudioFormat {
        &self.format
    }

    fn next_chunk(&mut self) -> Result<Option<PcmChunk>, DecodeError> {
        if self.position >= self.samples.len() {
            return Ok(None);
        }
        let end = (self.position + self.chunk_len).min(self.samples.len());
        let chunk = self.samples[self.position..end].to_vec();
        self.position = end;
        Ok(Some(PcmChunk::new(chunk)))
    }

    fn seek(&mut self, seconds: f64) -> Result<(), DecodeError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(DecodeError::Seek {
                seconds,
                reason: "timestamp must be a non-negative number".to_string(),
            });
        }
        let channels = self.format.channels as usize;
        let frame = (seconds * self.format.sample_rate as f64).floor() as usize;
        let keyframe = frame / self.keyframe_frames * self.keyframe_frames;
        self.position = keyframe.saturating_mul(channels).min(self.samples.len());
        Ok(())
    }
}
