use crate::recommend::HISTORY_CAPACITY;

pub(super) const MAX_ANALYSIS_WORKER_COUNT: u32 = 64;
pub(super) const MAX_HISTORY_CAPACITY: usize = 100;

pub(super) fn clamp_analysis_worker_count(value: u32) -> u32 {
    value.min(MAX_ANALYSIS_WORKER_COUNT)
}

pub(super) fn clamp_history_capacity(value: usize) -> usize {
    value.clamp(1, MAX_HISTORY_CAPACITY)
}

pub(super) fn clamp_tflite_threads(value: i32) -> i32 {
    value.clamp(1, MAX_ANALYSIS_WORKER_COUNT as i32)
}

pub(super) fn default_analysis_worker_count() -> u32 {
    0
}

pub(super) fn default_tflite_threads() -> i32 {
    1
}

pub(super) fn default_history_capacity() -> usize {
    HISTORY_CAPACITY
}
