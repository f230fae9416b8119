//! Progress reporting shared by the decode, resample and scan phases.
//!
//! Sinks are invoked from the worker running the operation. Percentages are
//! non-decreasing within a phase and may restart at 0 when the phase message
//! changes.

use std::sync::mpsc::Sender;

/// Phase message used while pulling PCM from the decoder.
pub const DECODING: &str = "Decoding...";
/// Phase message used while mixing down and resampling.
pub const RESAMPLING: &str = "Resampling...";
/// Phase message used while embedding and classifying windows.
pub const ANALYZING: &str = "Analyzing...";
/// Phase message used while consolidating results.
pub const FINALIZING: &str = "Finalizing...";

/// Receiver of advisory progress updates.
pub trait ProgressSink {
    /// Called with a percentage in `0..=100` and the current phase message.
    fn on_progress(&mut self, percent: u8, message: &str);
}

impl<F> ProgressSink for F
where
    F: FnMut(u8, &str),
{
    fn on_progress(&mut self, percent: u8, message: &str) {
        self(percent, message)
    }
}

/// Sink that drops every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _percent: u8, _message: &str) {}
}

/// Owned progress update, suitable for sending across threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub percent: u8,
    pub message: String,
}

/// Forwards progress over a channel so another thread can render it.
///
/// A disconnected receiver is ignored; progress is advisory.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    sender: Sender<ProgressUpdate>,
}

impl ChannelProgress {
    pub fn new(sender: Sender<ProgressUpdate>) -> Self {
        Self { sender }
    }
}

impl ProgressSink for ChannelProgress {
    fn on_progress(&mut self, percent: u8, message: &str) {
        let _ = self.sender.send(ProgressUpdate {
            percent,
            message: message.to_string(),
        });
    }
}

/// Throttles one phase so each whole percentage is reported at most once.
pub(crate) struct PhaseProgress<'a> {
    sink: &'a mut dyn ProgressSink,
    message: &'static str,
    last: Option<u8>,
}

impl<'a> PhaseProgress<'a> {
    pub(crate) fn new(sink: &'a mut dyn ProgressSink, message: &'static str) -> Self {
        Self {
            sink,
            message,
            last: None,
        }
    }

    /// Report a fractional percentage; values that do not advance are dropped.
    pub(crate) fn report(&mut self, percent: f64) {
        if !percent.is_finite() {
            return;
        }
        let whole = percent.clamp(0.0, 100.0).floor() as u8;
        if self.last.is_some_and(|last| whole <= last) {
            return;
        }
        self.last = Some(whole);
        self.sink.on_progress(whole, self.message);
    }

    /// Report `done / total` as a percentage. A zero total reports completion.
    pub(crate) fn report_ratio(&mut self, done: usize, total: usize) {
        if total == 0 {
            self.report(100.0);
        } else {
            self.report(done as f64 / total as f64 * 100.0);
        }
    }

    pub(crate) fn finish(&mut self) {
        self.report(100.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn phase_progress_suppresses_duplicates_and_regressions() {
        let mut seen = Vec::new();
        let mut sink = |percent: u8, _message: &str| seen.push(percent);
        {
            let mut phase = PhaseProgress::new(&mut sink, RESAMPLING);
            for value in [0.0, 0.4, 0.9, 1.0, 1.5, 0.5, 2.0, 99.9, 100.0, 100.0] {
                phase.report(value);
            }
        }
        assert_eq!(seen, vec![0, 1, 2, 99, 100]);
    }

    #[test]
    fn ratio_with_zero_total_reports_completion() {
        let mut seen = Vec::new();
        let mut sink = |percent: u8, message: &str| seen.push((percent, message.to_string()));
        PhaseProgress::new(&mut sink, ANALYZING).report_ratio(0, 0);
        assert_eq!(seen, vec![(100, ANALYZING.to_string())]);
    }

    #[test]
    fn channel_progress_forwards_updates() {
        let (tx, rx) = mpsc::channel();
        let mut sink = ChannelProgress::new(tx);
        sink.on_progress(42, DECODING);
        let update = rx.try_recv().unwrap();
        assert_eq!(update.percent, 42);
        assert_eq!(update.message, DECODING);
    }
}
