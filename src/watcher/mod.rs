//! Live change watching for the input directory.
//!
//! A [`ChangeSource`] blocks until the OS reports changes and yields them as
//! a batch of [`ChangeRecord`]s. The [`Watcher`] handles each batch
//! sequentially on the calling thread.

mod notify_source;
pub mod records;
#[cfg(target_os = "windows")]
pub mod windows;

pub use notify_source::NotifySource;
pub use records::{decode_notify_buffer, ChangeAction, ChangeRecord};

use crate::error::Error;
use crate::ingest::Ingestor;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, trace};

/// Blocking producer of change batches for one directory. Any error is
/// fatal to the watch loop.
pub trait ChangeSource {
    fn next_batch(&mut self) -> Result<Vec<ChangeRecord>, Error>;
}

impl<S: ChangeSource + ?Sized> ChangeSource for Box<S> {
    fn next_batch(&mut self) -> Result<Vec<ChangeRecord>, Error> {
        (**self).next_batch()
    }
}

/// Open the native change source for `dir`.
#[cfg(target_os = "windows")]
pub fn open_platform_source(dir: &Path) -> Result<Box<dyn ChangeSource>, Error> {
    Ok(Box::new(windows::DirectoryChangesSource::open(dir)?))
}

#[cfg(not(target_os = "windows"))]
pub fn open_platform_source(dir: &Path) -> Result<Box<dyn ChangeSource>, Error> {
    Ok(Box::new(NotifySource::new(dir)?))
}

/// Names starting with the producer's scratch prefix are never classified.
pub fn is_scratch(name: &str, prefix: &str) -> bool {
    !prefix.is_empty() && name.starts_with(prefix)
}

pub struct Watcher<S: ChangeSource> {
    dir: PathBuf,
    scratch_prefix: String,
    ingestor: Arc<Ingestor>,
    source: S,
}

impl<S: ChangeSource> Watcher<S> {
    pub fn new(
        dir: impl Into<PathBuf>,
        scratch_prefix: impl Into<String>,
        ingestor: Arc<Ingestor>,
        source: S,
    ) -> Self {
        Self {
            dir: dir.into(),
            scratch_prefix: scratch_prefix.into(),
            ingestor,
            source,
        }
    }

    /// Wait for a batch, handle it, repeat. Only returns with the fatal
    /// error that ended the loop.
    pub fn run(mut self) -> Error {
        info!("Watching {} for new files...", self.dir.display());
        loop {
            let batch = match self.source.next_batch() {
                Ok(batch) => batch,
                Err(err) => {
                    error!("Watch on {} ended: {}", self.dir.display(), err);
                    return err;
                }
            };

            let copied = self.process_batch(&batch);
            debug!("Batch of {} change(s) handled, {} copied", batch.len(), copied);
        }
    }

    /// Handle each record in order. Returns how many files were copied.
    pub fn process_batch(&self, records: &[ChangeRecord]) -> usize {
        records
            .iter()
            .filter(|record| self.handle_record(record))
            .count()
    }

    fn handle_record(&self, record: &ChangeRecord) -> bool {
        if is_scratch(&record.name, &self.scratch_prefix) {
            trace!("Skipping scratch file {}", record.name);
            return false;
        }
        if record.action.is_removal() {
            return false;
        }

        let path = self.dir.join(&record.name);
        // Notifications can outlive the file they describe.
        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => self.ingestor.ingest(&path, false),
            _ => {
                trace!("{} no longer exists", path.display());
                false
            }
        }
    }
}
