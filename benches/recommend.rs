use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracksense::analysis::{EMBEDDING_DIM, Embedding};
use tracksense::library::{Track, TrackId};
use tracksense::recommend::{PlayHistory, find_next};

const CANDIDATE_COUNT: usize = 5_000;

fn random_track(rng: &mut StdRng, index: usize) -> Track {
    let values = (0..EMBEDDING_DIM)
        .map(|_| rng.random_range(-1.0_f32..1.0))
        .collect();
    Track::new(format!("/music/{index}.flac"), Some(240.0))
        .with_fingerprint(Embedding::new(values).expect("embedding"))
}

fn library(rng: &mut StdRng) -> Vec<Track> {
    (0..CANDIDATE_COUNT)
        .map(|index| {
            let track = random_track(rng, index);
            // Every tenth track is still waiting for analysis.
            if index % 10 == 0 {
                Track {
                    fingerprint: None,
                    ..track
                }
            } else {
                track
            }
        })
        .collect()
}

fn bench_find_next(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let candidates = library(&mut rng);
    let current = random_track(&mut rng, CANDIDATE_COUNT);
    let history = PlayHistory::from_ids(
        10,
        candidates.iter().step_by(97).map(|track| track.id.clone()),
    );
    let recent: Vec<TrackId> = history.snapshot();

    c.bench_with_input(
        BenchmarkId::new("find_next", CANDIDATE_COUNT),
        &candidates,
        |b, candidates| {
            b.iter(|| find_next(black_box(&current), black_box(candidates), black_box(&recent)));
        },
    );
}

criterion_group!(benches, bench_find_next);
criterion_main!(benches);
