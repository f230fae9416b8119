//! Fingerprinting many tracks on a pool of worker threads.
//!
//! Each worker builds its own oracle and opens one decoder per job, so neither
//! needs to be `Send` or shareable. Outcomes stream back over an `mpsc` channel
//! as they complete.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;

use crate::analysis::decode::{AudioDecoder, DecodeError, SymphoniaDecoder};
use crate::analysis::oracle::{Embedding, EmbeddingOracle, OracleError};
use crate::analysis::probe::fingerprint_track;
use crate::library::{LibraryStore, StoreError, TrackId};

/// Environment variable overriding the automatic worker count.
pub const WORKERS_ENV: &str = "TRACKSENSE_ANALYSIS_WORKERS";

/// One track to fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintJob {
    pub track_id: TrackId,
    pub path: PathBuf,
    /// Known duration; the container's is used when absent.
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FingerprintOutcome {
    Fingerprinted {
        track_id: TrackId,
        embedding: Embedding,
        duration_seconds: Option<f64>,
    },
    /// Decoded, but no probe produced an embedding.
    Unanalyzable {
        track_id: TrackId,
        duration_seconds: Option<f64>,
    },
    /// The source could not be opened.
    Failed { track_id: TrackId, error: String },
}

impl FingerprintOutcome {
    pub fn track_id(&self) -> &TrackId {
        match self {
            Self::Fingerprinted { track_id, .. }
            | Self::Unanalyzable { track_id, .. }
            | Self::Failed { track_id, .. } => track_id,
        }
    }

    /// Duration reported by the job or the opened container.
    pub fn duration_seconds(&self) -> Option<f64> {
        match self {
            Self::Fingerprinted {
                duration_seconds, ..
            }
            | Self::Unanalyzable {
                duration_seconds, ..
            } => *duration_seconds,
            Self::Failed { .. } => None,
        }
    }
}

/// Write an outcome's duration and fingerprint to `store`.
///
/// Returns `true` when a fingerprint was stored.
pub fn persist_outcome(
    store: &LibraryStore,
    outcome: &FingerprintOutcome,
) -> Result<bool, StoreError> {
    if let Some(seconds) = outcome.duration_seconds() {
        store.set_duration(outcome.track_id(), seconds)?;
    }
    match outcome {
        FingerprintOutcome::Fingerprinted {
            track_id,
            embedding,
            ..
        } => store.set_fingerprint(track_id, embedding),
        _ => Ok(false),
    }
}

/// Totals for one [`FingerprintPool::run`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    /// Jobs claimed by a worker, whatever their outcome.
    pub processed: usize,
    pub fingerprinted: usize,
    /// Jobs never started because of cancellation.
    pub skipped: usize,
}

/// Resolve the worker count: explicit override, then the environment, then
/// available parallelism minus two (at least one).
pub fn worker_count_with_override(override_count: u32) -> usize {
    if override_count >= 1 {
        return override_count as usize;
    }
    if let Ok(value) = std::env::var(WORKERS_ENV) {
        if let Ok(parsed) = value.trim().parse::<usize>() {
            if parsed >= 1 {
                return parsed;
            }
        }
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(2)
        .max(1)
}

/// Fixed-size pool of fingerprint workers.
#[derive(Debug, Clone, Copy)]
pub struct FingerprintPool {
    worker_count: usize,
}

impl FingerprintPool {
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count: worker_count.max(1),
        }
    }

    /// Pool sized by [`worker_count_with_override`].
    pub fn with_override(override_count: u32) -> Self {
        Self::new(worker_count_with_override(override_count))
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Fingerprint `jobs` from audio files on disk.
    pub fn run<F, O>(
        &self,
        jobs: &[FingerprintJob],
        oracle_factory: F,
        cancel: &AtomicBool,
        sender: Sender<FingerprintOutcome>,
    ) -> Result<PoolSummary, OracleError>
    where
        F: Fn(usize) -> Result<O, OracleError> + Sync,
        O: EmbeddingOracle,
    {
        self.run_with(
            jobs,
            oracle_factory,
            |path: &Path| SymphoniaDecoder::open(path),
            cancel,
            sender,
        )
    }

    /// Like [`run`](Self::run) with a custom decoder source.
    ///
    /// Fails only when no worker could build an oracle; every job is then left
    /// unprocessed.
    pub fn run_with<F, O, G, D>(
        &self,
        jobs: &[FingerprintJob],
        oracle_factory: F,
        open_decoder: G,
        cancel: &AtomicBool,
        sender: Sender<FingerprintOutcome>,
    ) -> Result<PoolSummary, OracleError>
    where
        F: Fn(usize) -> Result<O, OracleError> + Sync,
        O: EmbeddingOracle,
        G: Fn(&Path) -> Result<D, DecodeError> + Sync,
        D: AudioDecoder,
    {
        let next_job = AtomicUsize::new(0);
        let processed = AtomicUsize::new(0);
        let fingerprinted = AtomicUsize::new(0);
        let started = AtomicUsize::new(0);
        let first_error: Mutex<Option<OracleError>> = Mutex::new(None);
        let workers = self.worker_count.min(jobs.len().max(1));

        std::thread::scope(|scope| {
            for worker_index in 0..workers {
                let sender = sender.clone();
                let context = WorkerContext {
                    jobs,
                    next_job: &next_job,
                    processed: &processed,
                    fingerprinted: &fingerprinted,
                    cancel,
                };
                let oracle_factory = &oracle_factory;
                let open_decoder = &open_decoder;
                let started = &started;
                let first_error = &first_error;
                let spawned = std::thread::Builder::new()
                    .name(format!("tracksense-fingerprint-{worker_index}"))
                    .spawn_scoped(scope, move || {
                        let mut oracle = match oracle_factory(worker_index) {
                            Ok(oracle) => oracle,
                            Err(err) => {
                                tracing::error!(worker_index, "Oracle unavailable: {err}");
                                if let Ok(mut slot) = first_error.lock() {
                                    slot.get_or_insert(err);
                                }
                                return;
                            }
                        };
                        started.fetch_add(1, Ordering::Relaxed);
                        context.work(&mut oracle, open_decoder, &sender);
                    });
                if let Err(err) = spawned {
                    tracing::error!(worker_index, "Failed to spawn fingerprint worker: {err}");
                }
            }
        });

        if started.load(Ordering::Relaxed) == 0 && !jobs.is_empty() {
            let err = first_error
                .into_inner()
                .ok()
                .flatten()
                .unwrap_or_else(|| OracleError::Load("no fingerprint worker started".to_string()));
            return Err(err);
        }
        let processed = processed.into_inner();
        let summary = PoolSummary {
            processed,
            fingerprinted: fingerprinted.into_inner(),
            skipped: jobs.len().saturating_sub(processed),
        };
        tracing::info!(
            processed = summary.processed,
            fingerprinted = summary.fingerprinted,
            skipped = summary.skipped,
            "Fingerprint pool finished"
        );
        Ok(summary)
    }
}

struct WorkerContext<'a> {
    jobs: &'a [FingerprintJob],
    next_job: &'a AtomicUsize,
    processed: &'a AtomicUsize,
    fingerprinted: &'a AtomicUsize,
    cancel: &'a AtomicBool,
}

impl WorkerContext<'_> {
    fn work<O, G, D>(&self, oracle: &mut O, open_decoder: &G, sender: &Sender<FingerprintOutcome>)
    where
        O: EmbeddingOracle,
        G: Fn(&Path) -> Result<D, DecodeError>,
        D: AudioDecoder,
    {
        while !self.cancel.load(Ordering::Relaxed) {
            let index = self.next_job.fetch_add(1, Ordering::Relaxed);
            let Some(job) = self.jobs.get(index) else {
                break;
            };
            let outcome = self.fingerprint(job, oracle, open_decoder);
            self.processed.fetch_add(1, Ordering::Relaxed);
            if matches!(outcome, FingerprintOutcome::Fingerprinted { .. }) {
                self.fingerprinted.fetch_add(1, Ordering::Relaxed);
            }
            // A dropped receiver only means nobody is listening any more.
            let _ = sender.send(outcome);
        }
    }

    fn fingerprint<O, G, D>(
        &self,
        job: &FingerprintJob,
        oracle: &mut O,
        open_decoder: &G,
    ) -> FingerprintOutcome
    where
        O: EmbeddingOracle,
        G: Fn(&Path) -> Result<D, DecodeError>,
        D: AudioDecoder,
    {
        let track_id = job.track_id.clone();
        let mut decoder = match open_decoder(&job.path) {
            Ok(decoder) => decoder,
            Err(err) => {
                tracing::warn!(path = %job.path.display(), "Cannot fingerprint: {err}");
                return FingerprintOutcome::Failed {
                    track_id,
                    error: err.to_string(),
                };
            }
        };
        let duration = job
            .duration_seconds
            .or_else(|| decoder.format().known_duration());
        match fingerprint_track(&mut decoder, duration, oracle, Some(self.cancel)) {
            Some(embedding) => FingerprintOutcome::Fingerprinted {
                track_id,
                embedding,
                duration_seconds: duration,
            },
            None => FingerprintOutcome::Unanalyzable {
                track_id,
                duration_seconds: duration,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::EMBEDDING_DIM;
    use crate::analysis::decode::MemoryDecoder;
    use std::sync::mpsc;

    struct ConstantOracle(f32);

    impl EmbeddingOracle for ConstantOracle {
        fn embed(&mut self, _window: &[f32]) -> Result<Embedding, OracleError> {
            Embedding::new(vec![self.0; EMBEDDING_DIM])
        }

        fn classify(&mut self, _embedding: &Embedding) -> Result<String, OracleError> {
            Ok("music".to_string())
        }
    }

    fn job(name: &str) -> FingerprintJob {
        FingerprintJob {
            track_id: TrackId::from_string(name),
            path: PathBuf::from(name),
            duration_seconds: None,
        }
    }

    /// `silent*` paths are too short for a window, `missing*` paths fail to open.
    fn open_fixture(path: &Path) -> Result<MemoryDecoder, DecodeError> {
        let name = path.to_string_lossy();
        if name.starts_with("missing") {
            return Err(DecodeError::NoAudioTrack);
        }
        let seconds = if name.starts_with("silent") { 0 } else { 12 };
        Ok(MemoryDecoder::new(vec![2_000; seconds * 16_000 + 100], 16_000, 1))
    }

    #[test]
    fn override_wins_over_automatic_count() {
        assert_eq!(worker_count_with_override(3), 3);
        assert!(worker_count_with_override(0) >= 1);
        assert_eq!(FingerprintPool::new(0).worker_count(), 1);
    }

    #[test]
    fn every_job_reports_one_outcome() {
        let jobs = vec![job("a"), job("silent"), job("missing"), job("b"), job("c")];
        let (tx, rx) = mpsc::channel();
        let cancel = AtomicBool::new(false);
        let summary = FingerprintPool::new(3)
            .run_with(&jobs, |_| Ok(ConstantOracle(0.5)), open_fixture, &cancel, tx)
            .unwrap();
        let outcomes: Vec<FingerprintOutcome> = rx.iter().collect();
        assert_eq!(outcomes.len(), jobs.len());
        assert_eq!(summary.processed, 5);
        assert_eq!(summary.fingerprinted, 3);
        assert_eq!(summary.skipped, 0);
        for outcome in &outcomes {
            match outcome {
                FingerprintOutcome::Fingerprinted {
                    track_id,
                    embedding,
                    duration_seconds,
                } => {
                    assert!(["a", "b", "c"].contains(&track_id.as_str()));
                    assert!(embedding.as_slice().iter().all(|v| *v == 0.5));
                    assert!(duration_seconds.is_some_and(|d| d > 12.0 && d < 12.01));
                }
                FingerprintOutcome::Unanalyzable { track_id, .. } => {
                    assert_eq!(track_id.as_str(), "silent")
                }
                FingerprintOutcome::Failed { track_id, .. } => {
                    assert_eq!(track_id.as_str(), "missing")
                }
            }
        }
    }

    #[test]
    fn job_duration_wins_over_the_container() {
        let mut known = job("a");
        known.duration_seconds = Some(90.0);
        let (tx, rx) = mpsc::channel();
        let cancel = AtomicBool::new(false);
        FingerprintPool::new(1)
            .run_with(&[known], |_| Ok(ConstantOracle(0.5)), open_fixture, &cancel, tx)
            .unwrap();
        let outcome = rx.recv().unwrap();
        assert_eq!(outcome.duration_seconds(), Some(90.0));
    }

    #[test]
    fn persisting_outcomes_records_duration_and_fingerprint() {
        let store = LibraryStore::open_in_memory().unwrap();
        let track = store.upsert_track(Path::new("/music/a.ogg"), None).unwrap();
        let embedding = Embedding::new(vec![0.5; EMBEDDING_DIM]).unwrap();
        let outcome = FingerprintOutcome::Fingerprinted {
            track_id: track.id.clone(),
            embedding: embedding.clone(),
            duration_seconds: Some(42.5),
        };
        assert!(persist_outcome(&store, &outcome).unwrap());
        let stored = store.track(&track.id).unwrap().unwrap();
        assert_eq!(stored.duration_seconds, Some(42.5));
        assert_eq!(stored.fingerprint, Some(embedding));

        let failed = FingerprintOutcome::Failed {
            track_id: track.id.clone(),
            error: "gone".to_string(),
        };
        assert!(!persist_outcome(&store, &failed).unwrap());
        assert_eq!(
            store.track(&track.id).unwrap().unwrap().duration_seconds,
            Some(42.5)
        );
    }

    #[test]
    fn cancelled_pool_starts_no_jobs() {
        let jobs = vec![job("a"), job("b")];
        let (tx, rx) = mpsc::channel();
        let cancel = AtomicBool::new(true);
        let summary = FingerprintPool::new(2)
            .run_with(&jobs, |_| Ok(ConstantOracle(1.0)), open_fixture, &cancel, tx)
            .unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.skipped, 2);
        assert_eq!(rx.iter().count(), 0);
    }

    #[test]
    fn failing_oracle_factory_is_an_error() {
        let jobs = vec![job("a")];
        let (tx, _rx) = mpsc::channel();
        let cancel = AtomicBool::new(false);
        let result = FingerprintPool::new(2).run_with(
            &jobs,
            |_| -> Result<ConstantOracle, OracleError> {
                Err(OracleError::Load("no runtime".to_string()))
            },
            open_fixture,
            &cancel,
            tx,
        );
        assert!(matches!(result, Err(OracleError::Load(_))));
    }

    #[test]
    fn workers_that_lose_their_oracle_leave_jobs_to_the_others() {
        let jobs: Vec<_> = (0..6).map(|i| job(&format!("t{i}"))).collect();
        let (tx, rx) = mpsc::channel();
        let cancel = AtomicBool::new(false);
        let summary = FingerprintPool::new(3)
            .run_with(
                &jobs,
                |worker| {
                    if worker == 0 {
                        Ok(ConstantOracle(0.25))
                    } else {
                        Err(OracleError::Load("busy".to_string()))
                    }
                },
                open_fixture,
                &cancel,
                tx,
            )
            .unwrap();
        assert_eq!(summary.fingerprinted, 6);
        assert_eq!(rx.iter().count(), 6);
    }
}
