use crate::classifier;
use crate::error::Error;
use crate::ledger::{file_identity, Ledger};
use crate::platform;
use ahash::AHashSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Seam for acquiring read access to a candidate file.
pub trait FileOpener: Send + Sync {
    fn open(&self, path: &Path) -> io::Result<File>;
}

/// Opens with shared access so a producer still writing the file is not
/// blocked by us.
#[derive(Debug, Default, Clone, Copy)]
pub struct SharedReadOpener;

impl FileOpener for SharedReadOpener {
    fn open(&self, path: &Path) -> io::Result<File> {
        platform::open_shared_read(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(1),
        }
    }
}

/// Open `path`, retrying only while the failure is a sharing violation.
/// Nothing is held open across the sleep between attempts.
pub fn open_with_retry(
    opener: &dyn FileOpener,
    path: &Path,
    policy: &RetryPolicy,
) -> Result<File, Error> {
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        match opener.open(path) {
            Ok(file) => return Ok(file),
            Err(err) if platform::is_sharing_violation(&err) => {
                debug!(
                    "{} is locked (attempt {}/{}): {}",
                    path.display(),
                    attempt,
                    attempts,
                    err
                );
                if attempt < attempts {
                    thread::sleep(policy.interval);
                }
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(Error::RetriesExhausted {
        path: path.to_path_buf(),
        attempts,
    })
}

/// Classifies candidate files and copies matches into the output directory,
/// recording each one in the shared [`Ledger`].
pub struct Ingestor {
    ledger: Arc<Ledger>,
    output_dir: PathBuf,
    retry: RetryPolicy,
    chunk_size: usize,
    opener: Box<dyn FileOpener>,
    in_flight: Mutex<AHashSet<String>>,
}

impl Ingestor {
    pub fn new(ledger: Arc<Ledger>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            ledger,
            output_dir: output_dir.into(),
            retry: RetryPolicy::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            opener: Box::new(SharedReadOpener),
            in_flight: Mutex::new(AHashSet::new()),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_opener(mut self, opener: impl FileOpener + 'static) -> Self {
        self.opener = Box::new(opener);
        self
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Classify `path` and, on a signature match, copy it to the output
    /// directory and record it. Returns true only when this call did the
    /// copy. Failures are logged and reported as false.
    pub fn ingest(&self, path: &Path, is_initial_scan: bool) -> bool {
        let identity = file_identity(path);
        if self.ledger.contains(&identity) {
            trace!("Already processed {}", path.display());
            return false;
        }

        let Some(_claim) = InFlightClaim::acquire(&self.in_flight, &identity) else {
            trace!("{} is being processed by another worker", path.display());
            return false;
        };
        // Another worker may have finished it between the check and the claim.
        if self.ledger.contains(&identity) {
            return false;
        }

        match self.try_ingest(path, &identity, is_initial_scan) {
            Ok(copied) => copied,
            Err(err) => {
                error!("Error processing {}: {}", path.display(), err);
                false
            }
        }
    }

    fn try_ingest(&self, path: &Path, identity: &str, is_initial_scan: bool) -> Result<bool, Error> {
        let tag = {
            let file = open_with_retry(self.opener.as_ref(), path, &self.retry)?;
            classifier::classify_reader(file, self.chunk_size)?
        };

        let Some(extension) = tag.extension() else {
            trace!("No known signature in {}", path.display());
            return Ok(false);
        };

        let destination = self.relocate(path, extension)?;

        if !self.ledger.insert(identity)? {
            warn!("{} was recorded concurrently", path.display());
            return Ok(false);
        }

        let copied_name = destination
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if is_initial_scan {
            info!(
                "File copied to '{}' directory: {}",
                self.output_dir.display(),
                copied_name
            );
        } else {
            info!("New audio discovered, copied to: {}", copied_name);
        }

        Ok(true)
    }

    /// Copy `path` to `<output_dir>/<file name>.<extension>`, overwriting.
    fn relocate(&self, path: &Path, extension: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;

        let file_name = path.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no file name", path.display()),
            )
        })?;

        let mut destination_name = OsString::from(file_name);
        destination_name.push(".");
        destination_name.push(extension);
        let destination = self.output_dir.join(destination_name);

        fs::copy(path, &destination)?;
        Ok(destination)
    }
}

/// Marks an identity as being ingested; released on drop.
struct InFlightClaim<'a> {
    set: &'a Mutex<AHashSet<String>>,
    identity: String,
}

impl<'a> InFlightClaim<'a> {
    fn acquire(set: &'a Mutex<AHashSet<String>>, identity: &str) -> Option<Self> {
        let mut guard = set.lock().unwrap_or_else(PoisonError::into_inner);
        if !guard.insert(identity.to_owned()) {
            return None;
        }
        Some(Self {
            set,
            identity: identity.to_owned(),
        })
    }
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.identity);
    }
}
