//! `tracksense` command line entry point.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;

use tracksense::analysis::oracle::{TfliteModelPaths, TfliteOracle};
use tracksense::analysis::{ProgressSink, analyze_file};
use tracksense::config::{self, AppConfig};
use tracksense::jobs::{FingerprintJob, FingerprintOutcome, FingerprintPool, persist_outcome};
use tracksense::library::LibraryStore;
use tracksense::session::PlaybackSession;
use tracksense::{app_dirs, logging};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    if let Some(home) = &options.home {
        app_dirs::set_config_base_override(home.clone());
    }
    if let Err(err) = logging::init(options.verbose) {
        eprintln!("Logging disabled: {err}");
    }
    let mut config = config::load_or_default().map_err(|err| err.to_string())?;
    if let Some(db) = &options.db {
        config.library_db = Some(db.clone());
    }
    if let Some(workers) = options.workers {
        config.analysis.worker_count = workers;
    }

    match options.command {
        Command::Analyze(path) => analyze(&config, &path),
        Command::Fingerprint(paths) => fingerprint(&config, &paths),
        Command::Next(path) => next(&config, &path),
        Command::History => history(&config),
    }
}

#[derive(Debug)]
struct CliOptions {
    home: Option<PathBuf>,
    db: Option<PathBuf>,
    workers: Option<u32>,
    verbose: bool,
    command: Command,
}

#[derive(Debug)]
enum Command {
    Analyze(PathBuf),
    Fingerprint(Vec<PathBuf>),
    Next(PathBuf),
    History,
}

fn parse_args(args: Vec<String>) -> Result<Option<CliOptions>, String> {
    let mut home = None;
    let mut db = None;
    let mut workers = None;
    let mut verbose = false;
    let mut positional = Vec::new();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "-v" | "--verbose" => verbose = true,
            "--home" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--home requires a value".to_string())?;
                home = Some(PathBuf::from(value));
            }
            "--db" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--db requires a value".to_string())?;
                db = Some(PathBuf::from(value));
            }
            "--workers" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--workers requires a value".to_string())?;
                let parsed = value
                    .parse::<u32>()
                    .map_err(|_| format!("Invalid --workers value: {value}"))?;
                workers = Some(parsed);
            }
            flag if flag.starts_with('-') => {
                return Err(format!("Unknown argument: {flag}\n\n{}", help_text()));
            }
            value => positional.push(value.to_string()),
        }
        idx += 1;
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        Some("analyze") => Command::Analyze(single_path(positional, "analyze")?),
        Some("fingerprint") => {
            let paths: Vec<PathBuf> = positional.map(PathBuf::from).collect();
            if paths.is_empty() {
                return Err("fingerprint requires at least one file".to_string());
            }
            Command::Fingerprint(paths)
        }
        Some("next") => Command::Next(single_path(positional, "next")?),
        Some("history") => Command::History,
        Some(other) => return Err(format!("Unknown command: {other}\n\n{}", help_text())),
        None => return Err(help_text()),
    };
    Ok(Some(CliOptions {
        home,
        db,
        workers,
        verbose,
        command,
    }))
}

fn single_path(mut rest: impl Iterator<Item = String>, command: &str) -> Result<PathBuf, String> {
    let path = rest
        .next()
        .ok_or_else(|| format!("{command} requires a file"))?;
    if let Some(extra) = rest.next() {
        return Err(format!("Unexpected argument for {command}: {extra}"));
    }
    Ok(PathBuf::from(path))
}

fn help_text() -> String {
    [
        "tracksense",
        "",
        "Usage:",
        "  tracksense [options] analyze <file>          Print labelled events as JSON",
        "  tracksense [options] fingerprint <file>...   Add files to the library and fingerprint them",
        "  tracksense [options] next <file>             Record <file> as played and print the next track",
        "  tracksense [options] history                 Print recently played tracks",
        "",
        "Options:",
        "  --home <dir>      Use <dir> instead of the OS config directory",
        "  --db <path>       Library database path",
        "  --workers <n>     Fingerprint worker count (0 = auto)",
        "  -v, --verbose     Debug logging",
    ]
    .join("\n")
}

fn model_paths(config: &AppConfig) -> Result<TfliteModelPaths, String> {
    config.analysis.model_paths().ok_or_else(|| {
        format!(
            "Missing model settings in {}: {}",
            config::CONFIG_FILE_NAME,
            config.analysis.missing_model_settings().join(", ")
        )
    })
}

fn open_store(config: &AppConfig) -> Result<LibraryStore, String> {
    let path = config.library_db_path().map_err(|err| err.to_string())?;
    LibraryStore::open(&path).map_err(|err| err.to_string())
}

fn analyze(config: &AppConfig, path: &Path) -> Result<(), String> {
    let paths = model_paths(config)?;
    let mut oracle = TfliteOracle::load(&paths).map_err(|err| err.to_string())?;
    let mut progress = LogProgress::default();
    let events = analyze_file(path, &mut oracle, &mut progress).map_err(|err| err.to_string())?;
    let json = serde_json::to_string_pretty(&events).map_err(|err| err.to_string())?;
    println!("{json}");
    Ok(())
}

fn fingerprint(config: &AppConfig, files: &[PathBuf]) -> Result<(), String> {
    let paths = model_paths(config)?;
    let store = open_store(config)?;
    let mut jobs = Vec::with_capacity(files.len());
    for file in files {
        let file = std::fs::canonicalize(file).unwrap_or_else(|_| file.clone());
        let track = store.upsert_track(&file, None).map_err(|err| err.to_string())?;
        jobs.push(FingerprintJob {
            track_id: track.id,
            path: track.path,
            duration_seconds: track.duration_seconds,
        });
    }

    let pool = FingerprintPool::with_override(config.analysis.worker_count);
    let cancel = AtomicBool::new(false);
    let (tx, rx) = mpsc::channel();
    let mut stored = 0usize;
    let summary = std::thread::scope(|scope| {
        let worker = scope.spawn(|| pool.run(&jobs, |_| TfliteOracle::load(&paths), &cancel, tx));
        for outcome in rx {
            match &outcome {
                FingerprintOutcome::Unanalyzable { track_id, .. } => {
                    tracing::warn!(track = %track_id, "No usable probe; track left unanalyzed");
                }
                FingerprintOutcome::Failed { track_id, error } => {
                    tracing::warn!(track = %track_id, "Fingerprint failed: {error}");
                }
                FingerprintOutcome::Fingerprinted { .. } => {}
            }
            match persist_outcome(&store, &outcome) {
                Ok(true) => stored += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::error!(track = %outcome.track_id(), "Failed to store outcome: {err}")
                }
            }
        }
        worker.join()
    });
    let summary = summary
        .map_err(|_| "Fingerprint pool panicked".to_string())?
        .map_err(|err| err.to_string())?;
    println!(
        "Fingerprinted {stored} of {} file(s) with {} worker(s)",
        summary.processed,
        pool.worker_count()
    );
    Ok(())
}

fn next(config: &AppConfig, path: &Path) -> Result<(), String> {
    let mut store = open_store(config)?;
    let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let current = store
        .track_by_path(&path)
        .map_err(|err| err.to_string())?
        .ok_or_else(|| format!("{} is not in the library; fingerprint it first", path.display()))?;
    if !current.is_analyzed() {
        return Err(format!("{} has no fingerprint yet", path.display()));
    }
    let history = store
        .load_history(config.recommendation.history_capacity)
        .map_err(|err| err.to_string())?;
    let candidates = store.tracks().map_err(|err| err.to_string())?;

    let mut session = PlaybackSession::new(history);
    session.play(current);
    match session.advance(&candidates) {
        Some(track) => println!("{}", track.path.display()),
        None => println!("No other fingerprinted track to play"),
    }
    store
        .save_history(session.history())
        .map_err(|err| err.to_string())
}

fn history(config: &AppConfig) -> Result<(), String> {
    let store = open_store(config)?;
    let history = store
        .load_history(config.recommendation.history_capacity)
        .map_err(|err| err.to_string())?;
    if history.is_empty() {
        println!("No tracks played yet");
        return Ok(());
    }
    for id in history.iter() {
        match store.track(id).map_err(|err| err.to_string())? {
            Some(track) => println!("{}", track.path.display()),
            None => println!("{id} (no longer in library)"),
        }
    }
    Ok(())
}

/// Logs each phase change and every tenth percent.
#[derive(Default)]
struct LogProgress {
    last: Option<(String, u8)>,
}

impl ProgressSink for LogProgress {
    fn on_progress(&mut self, percent: u8, message: &str) {
        let report = match &self.last {
            Some((last_message, last_percent)) => {
                last_message != message || percent / 10 > last_percent / 10
            }
            None => true,
        };
        if report {
            tracing::info!("{message} {percent}%");
            self.last = Some((message.to_string(), percent));
        }
    }
}
