//! Mixdown of interleaved 16-bit PCM to 16 kHz mono float samples.

use super::TARGET_SAMPLE_RATE;
use super::progress::{PhaseProgress, ProgressSink, RESAMPLING};

const I16_SCALE: f32 = 32_768.0;

/// Number of output samples produced for `input_len` interleaved samples.
///
/// Equals `floor(mono_len * TARGET_SAMPLE_RATE / input_rate)`.
pub fn target_length(input_len: usize, input_rate: u32, channels: u16) -> usize {
    if input_rate == 0 {
        return 0;
    }
    let mono_len = input_len / channels.max(1) as usize;
    (mono_len as u64 * TARGET_SAMPLE_RATE as u64 / input_rate as u64) as usize
}

/// Downmix and linearly resample interleaved PCM to the analysis rate.
///
/// Each output sample `i` reads the source at `i * input_rate / 16000`. Reads at or
/// past the end yield 0; when only the right neighbour is out of range the left
/// sample is repeated.
pub fn resample_to_mono(
    input: &[i16],
    input_rate: u32,
    channels: u16,
    progress: &mut dyn ProgressSink,
) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    let out_len = target_length(input.len(), input_rate, channels as u16);
    let mono_len = input.len() / channels;
    let ratio = input_rate as f64 / TARGET_SAMPLE_RATE as f64;
    let mut phase = PhaseProgress::new(progress, RESAMPLING);
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let input_index = i as f64 * ratio;
        let idx1 = input_index.floor() as usize;
        let idx2 = idx1 + 1;
        let frac = (input_index - idx1 as f64) as f32;
        let val1 = if idx1 < mono_len {
            mono_sample(input, idx1, channels)
        } else {
            0.0
        };
        let val2 = if idx2 < mono_len {
            mono_sample(input, idx2, channels)
        } else if idx1 < mono_len {
            val1
        } else {
            0.0
        };
        out.push(val1 * (1.0 - frac) + val2 * frac);
        phase.report_ratio(i + 1, out_len);
    }
    out
}

fn mono_sample(input: &[i16], frame: usize, channels: usize) -> f32 {
    let base = frame * channels;
    let value = match channels {
        1 => input[base] as f32,
        2 => (input[base] as f32 + input[base + 1] as f32) / 2.0,
        _ => {
            let sum: f32 = input[base..base + channels].iter().map(|&v| v as f32).sum();
            sum / channels as f32
        }
    };
    value / I16_SCALE
}
