use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

use audio_harvester::ledger::file_identity;
use audio_harvester::{scan_existing, Ingestor, Ledger, SilentReporter, WorkerPool};

const POLL: Duration = Duration::from_millis(10);

/// Layout:
///   watched/
///     a.bin        ("XXXOggSYYY")
///     b.bin        ("ID3v2data")
///     RBXtemp.bin  ("OggSmarker")
///     notes.txt    ("plain text")
fn create_watched_dir(root: &Path) -> std::path::PathBuf {
    let watched = root.join("watched");
    fs::create_dir_all(&watched).unwrap();
    fs::write(watched.join("a.bin"), "XXXOggSYYY").unwrap();
    fs::write(watched.join("b.bin"), "ID3v2data").unwrap();
    fs::write(watched.join("RBXtemp.bin"), "OggSmarker").unwrap();
    fs::write(watched.join("notes.txt"), "plain text").unwrap();
    watched
}

fn new_ingestor(root: &Path) -> Arc<Ingestor> {
    let ledger = Arc::new(Ledger::load(root.join("processed_files.log")));
    Arc::new(Ingestor::new(ledger, root.join("saved_audios")))
}

fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| entries.flatten().filter(|e| e.path().is_file()).count())
        .unwrap_or(0)
}

#[test]
fn test_initial_scan_scenario() {
    let tmp = tempdir().unwrap();
    let watched = create_watched_dir(tmp.path());
    let ingestor = new_ingestor(tmp.path());
    let pool = WorkerPool::new(4).unwrap();

    let summary = scan_existing(&watched, &ingestor, &pool, POLL, &SilentReporter);
    pool.shutdown();

    assert_eq!(summary.files_scanned, 4);
    assert_eq!(summary.files_copied, 3);

    let output = tmp.path().join("saved_audios");
    assert!(output.join("a.bin.ogg").exists());
    assert!(output.join("b.bin.mp3").exists());
    // The scratch-prefix rule belongs to the watcher, not the scan.
    assert!(output.join("RBXtemp.bin.ogg").exists());
    assert!(!output.join("notes.txt.ogg").exists());
    assert!(!output.join("notes.txt.mp3").exists());

    let ledger = ingestor.ledger();
    assert!(ledger.contains(&file_identity(&watched.join("a.bin"))));
    assert!(ledger.contains(&file_identity(&watched.join("b.bin"))));
    assert!(!ledger.contains(&file_identity(&watched.join("notes.txt"))));

    // Sources stay in place.
    assert_eq!(count_files(&watched), 4);
}

#[test]
fn test_ledger_survives_restart() {
    let tmp = tempdir().unwrap();
    let watched = create_watched_dir(tmp.path());

    {
        let ingestor = new_ingestor(tmp.path());
        let pool = WorkerPool::new(2).unwrap();
        scan_existing(&watched, &ingestor, &pool, POLL, &SilentReporter);
    }

    let reloaded = Ledger::load(tmp.path().join("processed_files.log"));
    assert_eq!(reloaded.len(), 3);
    assert!(reloaded.contains(&file_identity(&watched.join("a.bin"))));

    // A second run copies nothing and appends nothing.
    let log_before = fs::read_to_string(reloaded.path()).unwrap();
    let ingestor = new_ingestor(tmp.path());
    let pool = WorkerPool::new(2).unwrap();
    let summary = scan_existing(&watched, &ingestor, &pool, POLL, &SilentReporter);

    assert_eq!(summary.files_scanned, 4);
    assert_eq!(summary.files_copied, 0);
    assert_eq!(fs::read_to_string(reloaded.path()).unwrap(), log_before);
}

#[test]
fn test_prepopulated_ledger_skips_file() {
    let tmp = tempdir().unwrap();
    let watched = tmp.path().join("watched");
    fs::create_dir_all(&watched).unwrap();
    let a = watched.join("a.bin");
    fs::write(&a, "XXXOggSYYY").unwrap();

    let log_path = tmp.path().join("processed_files.log");
    let line = format!("{}\n", file_identity(&a));
    fs::write(&log_path, &line).unwrap();

    let ingestor = new_ingestor(tmp.path());
    let pool = WorkerPool::new(2).unwrap();
    let summary = scan_existing(&watched, &ingestor, &pool, POLL, &SilentReporter);

    assert_eq!(summary.files_copied, 0);
    assert!(!tmp.path().join("saved_audios").join("a.bin.ogg").exists());
    assert_eq!(fs::read_to_string(&log_path).unwrap(), line);
}

#[test]
fn test_concurrent_scan_records_every_file_once() {
    const FILES: usize = 64;

    let tmp = tempdir().unwrap();
    let watched = tmp.path().join("watched");
    fs::create_dir_all(&watched).unwrap();
    for i in 0..FILES {
        let content = if i % 2 == 0 { "..OggS.." } else { "..LAME.." };
        fs::write(watched.join(format!("track_{:03}.bin", i)), content).unwrap();
    }

    let ingestor = new_ingestor(tmp.path());
    let pool = WorkerPool::new(8).unwrap();
    let summary = scan_existing(&watched, &ingestor, &pool, POLL, &SilentReporter);
    pool.shutdown();

    assert_eq!(summary.files_scanned, FILES);
    assert_eq!(summary.files_copied, FILES);
    assert_eq!(ingestor.ledger().len(), FILES);
    assert_eq!(count_files(&tmp.path().join("saved_audios")), FILES);

    let log = fs::read_to_string(tmp.path().join("processed_files.log")).unwrap();
    let mut lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), FILES);
    lines.sort_unstable();
    lines.dedup();
    assert_eq!(lines.len(), FILES, "ledger log has duplicate lines");
}

#[test]
fn test_racing_ingests_of_one_file_copy_once() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("shared.bin");
    fs::write(&source, "vorbis").unwrap();

    let ingestor = new_ingestor(tmp.path());
    let copies = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let pool = WorkerPool::new(8).unwrap();

    for _ in 0..32 {
        let ingestor = Arc::clone(&ingestor);
        let copies = Arc::clone(&copies);
        let source = source.clone();
        pool.submit(move || {
            if ingestor.ingest(&source, true) {
                copies.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        })
        .unwrap();
    }
    pool.shutdown();

    assert_eq!(copies.load(std::sync::atomic::Ordering::SeqCst), 1);
    let log = fs::read_to_string(tmp.path().join("processed_files.log")).unwrap();
    assert_eq!(log.lines().count(), 1);
}
