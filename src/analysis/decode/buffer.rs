use super::AudioFormat;

/// Initial capacity used when the duration is unknown or the estimate is non-positive.
pub const DEFAULT_DECODE_CAPACITY: usize = 1_048_576;
/// Upper bound on the up-front reservation; larger streams grow past it on demand.
const MAX_INITIAL_CAPACITY: usize = 1 << 26;

/// Growable PCM accumulator for full decodes.
///
/// Capacity starts at `duration * sample_rate * channels` and, on overflow, grows by
/// the larger of half the current capacity and the space the incoming chunk needs.
#[derive(Debug, Default)]
pub struct PcmBuffer {
    samples: Vec<i16>,
    capacity: usize,
}

impl PcmBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn with_estimate(format: &AudioFormat) -> Self {
        Self::with_capacity(estimate_capacity(format))
    }

    /// Append a chunk, growing capacity according to the decode growth policy.
    pub fn push(&mut self, chunk: &[i16]) {
        let required = self.samples.len() + chunk.len();
        if required > self.capacity {
            let additional = required - self.capacity;
            let growth = (self.capacity / 2).max(additional);
            self.capacity += growth;
            self.samples
                .reserve_exact(self.capacity.saturating_sub(self.samples.len()));
        }
        self.samples.extend_from_slice(chunk);
    }

    /// Capacity as tracked by the growth policy.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[i16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}

fn estimate_capacity(format: &AudioFormat) -> usize {
    let Some(seconds) = format.known_duration() else {
        return DEFAULT_DECODE_CAPACITY;
    };
    let estimate = seconds * format.sample_rate as f64 * format.channels as f64;
    if !estimate.is_finite() || estimate < 1.0 {
        return DEFAULT_DECODE_CAPACITY;
    }
    (estimate as usize).min(MAX_INITIAL_CAPACITY)
}
