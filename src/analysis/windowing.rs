//! Fixed-length, fixed-hop window schedule for full scans.

use super::{HOP_SAMPLES, WINDOW_SAMPLES};

/// Number of full windows a waveform of `len` samples yields.
pub fn window_count(len: usize) -> usize {
    if len < WINDOW_SAMPLES {
        0
    } else {
        (len - WINDOW_SAMPLES) / HOP_SAMPLES + 1
    }
}

/// Lazy `(start_sample, window)` sequence over an immutable waveform.
///
/// A trailing partial window is dropped, never padded. Cloning restarts from the
/// clone's current position.
#[derive(Debug, Clone)]
pub struct ScanWindows<'a> {
    waveform: &'a [f32],
    next_start: usize,
}

impl<'a> ScanWindows<'a> {
    pub fn new(waveform: &'a [f32]) -> Self {
        Self {
            waveform,
            next_start: 0,
        }
    }

    /// Percentage reached once the window at `start` has been processed.
    pub fn progress_at(&self, start: usize) -> f64 {
        let span = self.waveform.len().saturating_sub(WINDOW_SAMPLES);
        if span == 0 {
            100.0
        } else {
            start as f64 / span as f64 * 100.0
        }
    }
}

impl<'a> Iterator for ScanWindows<'a> {
    type Item = (usize, &'a [f32]);

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start;
        let end = start.checked_add(WINDOW_SAMPLES)?;
        if end > self.waveform.len() {
            return None;
        }
        self.next_start = start + HOP_SAMPLES;
        Some((start, &self.waveform[start..end]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = window_count(self.waveform.len().saturating_sub(self.next_start));
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ScanWindows<'_> {}
