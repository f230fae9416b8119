mod support;

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;

use support::config_env::ConfigHomeGuard;
use support::oracle::LevelOracle;
use support::wav::write_constant_wav;
use tempfile::tempdir;
use tracksense::config::{self, AppConfig};
use tracksense::jobs::{FingerprintJob, FingerprintOutcome, FingerprintPool, persist_outcome};
use tracksense::library::{LibraryStore, Track};
use tracksense::session::PlaybackSession;

/// Fingerprint `levels` as 3 s constant WAVs and store the results.
fn seeded_library(dir: &std::path::Path, levels: &[(&str, i16)]) -> (LibraryStore, Vec<Track>) {
    let store = LibraryStore::open(&dir.join("library.db")).unwrap();
    let mut jobs = Vec::new();
    for (name, level) in levels {
        let path = dir.join(format!("{name}.wav"));
        write_constant_wav(&path, *level, 3.0, 16_000);
        let track = store.upsert_track(&path, Some(3.0)).unwrap();
        jobs.push(FingerprintJob {
            track_id: track.id,
            path,
            duration_seconds: track.duration_seconds,
        });
    }

    let (tx, rx) = mpsc::channel();
    let cancel = AtomicBool::new(false);
    let summary = FingerprintPool::new(2)
        .run(&jobs, |_| Ok(LevelOracle), &cancel, tx)
        .unwrap();
    assert_eq!(summary.fingerprinted, levels.len());
    for outcome in rx {
        match outcome {
            FingerprintOutcome::Fingerprinted {
                track_id,
                embedding,
                ..
            } => assert!(store.set_fingerprint(&track_id, &embedding).unwrap()),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    let tracks = store.tracks().unwrap();
    (store, tracks)
}

fn by_name<'a>(tracks: &'a [Track], name: &str) -> &'a Track {
    tracks
        .iter()
        .find(|track| track.display_name() == format!("{name}.wav"))
        .unwrap()
}

#[test]
fn fingerprinted_library_recommends_nearest_unplayed_track() {
    let dir = tempdir().unwrap();
    let (mut store, tracks) = seeded_library(
        dir.path(),
        &[("quiet", 3_277), ("soft", 4_915), ("loud", 19_661), ("louder", 21_299)],
    );
    assert!(store.unanalyzed_tracks().unwrap().is_empty());

    let mut session = PlaybackSession::new(store.load_history(10).unwrap());
    session.play(by_name(&tracks, "quiet").clone());
    let second = session.advance(&tracks).unwrap().id.clone();
    assert_eq!(second, by_name(&tracks, "soft").id);
    let third = session.advance(&tracks).unwrap().id.clone();
    assert_eq!(third, by_name(&tracks, "loud").id);
    store.save_history(session.history()).unwrap();

    let reloaded = store.load_history(10).unwrap();
    assert_eq!(reloaded.snapshot(), session.history().snapshot());
    assert_eq!(reloaded.len(), 3);
}

#[test]
fn unanalyzed_tracks_are_never_recommended() {
    let dir = tempdir().unwrap();
    let (store, _) = seeded_library(dir.path(), &[("a", 8_000), ("b", 9_000)]);
    let pending = store
        .upsert_track(&dir.path().join("pending.wav"), None)
        .unwrap();
    let tracks = store.tracks().unwrap();
    assert!(tracks.iter().any(|track| track.id == pending.id));

    let mut session = PlaybackSession::default();
    session.play(by_name(&tracks, "a").clone());
    for _ in 0..4 {
        let next = session.advance(&tracks).unwrap();
        assert_ne!(next.id, pending.id);
    }
}

#[test]
fn fingerprinting_stores_the_decoded_duration() {
    let dir = tempdir().unwrap();
    let store = LibraryStore::open(&dir.path().join("library.db")).unwrap();
    let path = dir.path().join("unregistered.wav");
    write_constant_wav(&path, 6_000, 3.0, 16_000);
    let track = store.upsert_track(&path, None).unwrap();
    assert_eq!(track.duration_seconds, None);

    let jobs = vec![FingerprintJob {
        track_id: track.id.clone(),
        path,
        duration_seconds: None,
    }];
    let (tx, rx) = mpsc::channel();
    let cancel = AtomicBool::new(false);
    FingerprintPool::new(1)
        .run(&jobs, |_| Ok(LevelOracle), &cancel, tx)
        .unwrap();
    for outcome in rx {
        assert!(persist_outcome(&store, &outcome).unwrap());
    }

    let stored = store.track(&track.id).unwrap().unwrap();
    let duration = stored.duration_seconds.unwrap();
    assert!((duration - 3.0).abs() < 1e-6, "duration {duration}");
    assert!(stored.is_analyzed());
}

#[test]
fn config_home_env_controls_config_and_database_locations() {
    let home = tempdir().unwrap();
    let _guard = ConfigHomeGuard::set(home.path().to_path_buf());

    let config = config::load_or_default().unwrap();
    assert_eq!(config, AppConfig::default());
    let root = home.path().join(tracksense::app_dirs::APP_DIR_NAME);
    assert_eq!(config.library_db_path().unwrap(), root.join("library.db"));

    let mut changed = config.clone();
    changed.recommendation.history_capacity = 4;
    changed.library_db = Some(PathBuf::from("/srv/music/library.db"));
    config::save(&changed).unwrap();
    assert!(root.join(config::CONFIG_FILE_NAME).is_file());
    assert_eq!(config::load_or_default().unwrap(), changed);
}
