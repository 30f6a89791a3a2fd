use crate::ingest::Ingestor;
use crate::pool::WorkerPool;
use crate::progress::ScanReporter;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    pub files_scanned: usize,
    pub files_copied: usize,
    pub elapsed: Duration,
}

/// Decrements the pending counter when a task finishes, even if it panics.
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One-time pass over the regular files directly inside `dir`. Symlinks
/// count when their target is a regular file.
///
/// Every file becomes one pool task calling [`Ingestor::ingest`] with
/// `is_initial_scan = true`. Blocks, polling every `poll_interval`, until
/// all submitted tasks have finished. An enumeration error (including a
/// missing directory) ends submission early; what was already submitted is
/// still awaited.
pub fn scan_existing(
    dir: &Path,
    ingestor: &Arc<Ingestor>,
    pool: &WorkerPool,
    poll_interval: Duration,
    reporter: &dyn ScanReporter,
) -> ScanSummary {
    info!("Scanning existing files in {}...", dir.display());
    reporter.on_scan_start(dir);
    let start = Instant::now();

    let pending = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));
    let copied = Arc::new(AtomicUsize::new(0));
    let mut submitted = 0usize;

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            // A dangling link only loses that entry.
            Err(err) if err.depth() > 0 => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), err);
                continue;
            }
            Err(err) => {
                error!("Error enumerating {}: {}", dir.display(), err);
                break;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        let ingestor = Arc::clone(ingestor);
        let guard = PendingGuard(Arc::clone(&pending));
        let completed = Arc::clone(&completed);
        let copied = Arc::clone(&copied);

        pending.fetch_add(1, Ordering::SeqCst);
        let task = move || {
            let _guard = guard;
            if ingestor.ingest(&path, true) {
                copied.fetch_add(1, Ordering::SeqCst);
            }
            completed.fetch_add(1, Ordering::SeqCst);
        };

        // A rejected task is dropped here, which releases its pending slot.
        if let Err(err) = pool.submit(task) {
            error!("Error submitting scan task: {}", err);
            break;
        }
        submitted += 1;
    }

    while pending.load(Ordering::SeqCst) > 0 {
        reporter.on_scan_progress(completed.load(Ordering::SeqCst), submitted);
        thread::sleep(poll_interval);
    }

    let summary = ScanSummary {
        files_scanned: submitted,
        files_copied: copied.load(Ordering::SeqCst),
        elapsed: start.elapsed(),
    };
    reporter.on_scan_complete(&summary);
    info!(
        "Finished scanning existing files: {} scanned, {} copied in {:.2}s",
        summary.files_scanned,
        summary.files_copied,
        summary.elapsed.as_secs_f64()
    );

    summary
}
