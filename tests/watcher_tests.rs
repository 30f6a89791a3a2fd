use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

use audio_harvester::ledger::file_identity;
use audio_harvester::watcher::{ChangeAction, ChangeRecord, ChangeSource, Watcher};
use audio_harvester::{Error, Ingestor, Ledger};

/// Replays fixed batches, then reports the channel as closed.
struct ScriptedSource {
    batches: VecDeque<Vec<ChangeRecord>>,
}

impl ScriptedSource {
    fn new(batches: Vec<Vec<ChangeRecord>>) -> Self {
        Self {
            batches: batches.into(),
        }
    }
}

impl ChangeSource for ScriptedSource {
    fn next_batch(&mut self) -> Result<Vec<ChangeRecord>, Error> {
        self.batches.pop_front().ok_or(Error::WatcherDisconnected)
    }
}

fn new_ingestor(root: &Path) -> Arc<Ingestor> {
    let ledger = Arc::new(Ledger::load(root.join("processed_files.log")));
    Arc::new(Ingestor::new(ledger, root.join("saved_audios")))
}

#[test]
fn test_scratch_files_are_never_touched() {
    let tmp = tempdir().unwrap();
    let watched = tmp.path().join("watched");
    fs::create_dir_all(&watched).unwrap();
    fs::write(watched.join("RBXtemp.bin"), "OggSmarker").unwrap();
    fs::write(watched.join("a.bin"), "XXXOggSYYY").unwrap();

    let ingestor = new_ingestor(tmp.path());
    let watcher = Watcher::new(
        &watched,
        "RBX",
        Arc::clone(&ingestor),
        ScriptedSource::new(vec![]),
    );

    let copied = watcher.process_batch(&[
        ChangeRecord::new("RBXtemp.bin", ChangeAction::Added),
        ChangeRecord::new("a.bin", ChangeAction::Added),
    ]);

    assert_eq!(copied, 1);
    let output = tmp.path().join("saved_audios");
    assert!(output.join("a.bin.ogg").exists());
    assert!(!output.join("RBXtemp.bin.ogg").exists());
    assert!(!ingestor
        .ledger()
        .contains(&file_identity(&watched.join("RBXtemp.bin"))));
}

#[test]
fn test_vanished_and_removed_files_are_skipped() {
    let tmp = tempdir().unwrap();
    let watched = tmp.path().join("watched");
    fs::create_dir_all(&watched).unwrap();
    fs::write(watched.join("still_here.bin"), "ID3").unwrap();

    let ingestor = new_ingestor(tmp.path());
    let watcher = Watcher::new(&watched, "RBX", Arc::clone(&ingestor), ScriptedSource::new(vec![]));

    let copied = watcher.process_batch(&[
        ChangeRecord::new("never_existed.bin", ChangeAction::Added),
        ChangeRecord::new("still_here.bin", ChangeAction::Removed),
    ]);

    assert_eq!(copied, 0);
    assert!(ingestor.ledger().is_empty());
}

#[test]
fn test_repeated_events_copy_once() {
    let tmp = tempdir().unwrap();
    let watched = tmp.path().join("watched");
    fs::create_dir_all(&watched).unwrap();
    fs::write(watched.join("song.bin"), "..matroska..").unwrap();

    let ingestor = new_ingestor(tmp.path());
    let watcher = Watcher::new(&watched, "RBX", Arc::clone(&ingestor), ScriptedSource::new(vec![]));

    let copied = watcher.process_batch(&[
        ChangeRecord::new("song.bin", ChangeAction::Added),
        ChangeRecord::new("song.bin", ChangeAction::Modified),
        ChangeRecord::new("song.bin", ChangeAction::Modified),
    ]);

    assert_eq!(copied, 1);
    assert!(tmp.path().join("saved_audios").join("song.bin.mp3").exists());
}

#[test]
fn test_unknown_file_is_picked_up_once_complete() {
    let tmp = tempdir().unwrap();
    let watched = tmp.path().join("watched");
    fs::create_dir_all(&watched).unwrap();
    let growing = watched.join("growing.bin");
    fs::write(&growing, "header only").unwrap();

    let ingestor = new_ingestor(tmp.path());
    let watcher = Watcher::new(&watched, "RBX", Arc::clone(&ingestor), ScriptedSource::new(vec![]));

    let event = [ChangeRecord::new("growing.bin", ChangeAction::Modified)];
    assert_eq!(watcher.process_batch(&event), 0);

    fs::write(&growing, "header only ... OggS").unwrap();
    assert_eq!(watcher.process_batch(&event), 1);
}

#[test]
fn test_run_handles_batches_then_returns_fatal_error() {
    let tmp = tempdir().unwrap();
    let watched = tmp.path().join("watched");
    fs::create_dir_all(&watched).unwrap();
    fs::write(watched.join("one.bin"), "OggS").unwrap();
    fs::write(watched.join("two.bin"), "LAME").unwrap();

    let ingestor = new_ingestor(tmp.path());
    let source = ScriptedSource::new(vec![
        vec![ChangeRecord::new("one.bin", ChangeAction::Added)],
        vec![ChangeRecord::new("two.bin", ChangeAction::RenamedNew)],
    ]);
    let watcher = Watcher::new(&watched, "RBX", Arc::clone(&ingestor), source);

    let err = watcher.run();
    assert!(matches!(err, Error::WatcherDisconnected));

    let output = tmp.path().join("saved_audios");
    assert!(output.join("one.bin.ogg").exists());
    assert!(output.join("two.bin.mp3").exists());
    assert_eq!(ingestor.ledger().len(), 2);
}
