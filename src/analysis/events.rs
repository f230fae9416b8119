//! Consolidation of per-window labels into time-ranged events.

use serde::{Deserialize, Serialize};

use super::HOP_SEC;

/// Classification of one window, stamped with the window start in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub time: f64,
    pub label: String,
}

impl Prediction {
    pub fn new(time: f64, label: impl Into<String>) -> Self {
        Self {
            time,
            label: label.into(),
        }
    }
}

/// A run of consecutive predictions sharing one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioEvent {
    pub label: String,
    pub start: f64,
    pub end: f64,
}

/// Streaming fold over time-ordered predictions.
///
/// Runs merge on label equality alone; a gap left by skipped windows does not
/// split an event.
#[derive(Debug, Default)]
pub struct EventConsolidator {
    finished: Vec<AudioEvent>,
    current: Option<AudioEvent>,
}

impl EventConsolidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, prediction: Prediction) {
        let end = prediction.time + HOP_SEC;
        if let Some(current) = self.current.as_mut() {
            if current.label == prediction.label {
                current.end = end;
                return;
            }
        }
        let next = AudioEvent {
            label: prediction.label,
            start: prediction.time,
            end,
        };
        if let Some(done) = self.current.replace(next) {
            self.finished.push(done);
        }
    }

    pub fn finish(mut self) -> Vec<AudioEvent> {
        if let Some(current) = self.current.take() {
            self.finished.push(current);
        }
        self.finished
    }
}

/// Consolidate an ordered prediction list into events.
pub fn consolidate(predictions: impl IntoIterator<Item = Prediction>) -> Vec<AudioEvent> {
    let mut consolidator = EventConsolidator::new();
    for prediction in predictions {
        consolidator.push(prediction);
    }
    consolidator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(label: &str, start: f64, end: f64) -> AudioEvent {
        AudioEvent {
            label: label.to_string(),
            start,
            end,
        }
    }

    #[test]
    fn empty_input_yields_no_events() {
        assert!(consolidate(Vec::new()).is_empty());
    }

    #[test]
    fn label_changes_split_events() {
        let events = consolidate(vec![
            Prediction::new(0.0, "music"),
            Prediction::new(0.5, "music"),
            Prediction::new(1.0, "applause"),
            Prediction::new(1.5, "applause"),
        ]);
        assert_eq!(
            events,
            vec![event("music", 0.0, 1.0), event("applause", 1.0, 2.0)]
        );
    }

    #[test]
    fn single_label_spans_first_to_last_plus_hop() {
        let predictions: Vec<_> = (0..7)
            .map(|i| Prediction::new(i as f64 * 0.5, "speech"))
            .collect();
        assert_eq!(consolidate(predictions), vec![event("speech", 0.0, 3.5)]);
    }

    #[test]
    fn gaps_between_same_label_predictions_are_merged() {
        let events = consolidate(vec![
            Prediction::new(0.0, "music"),
            Prediction::new(4.0, "music"),
        ]);
        assert_eq!(events, vec![event("music", 0.0, 4.5)]);
    }

    #[test]
    fn returning_label_opens_a_new_event() {
        let events = consolidate(vec![
            Prediction::new(0.0, "a"),
            Prediction::new(0.5, "b"),
            Prediction::new(1.0, "a"),
        ]);
        assert_eq!(
            events,
            vec![event("a", 0.0, 0.5), event("b", 0.5, 1.0), event("a", 1.0, 1.5)]
        );
    }
}
