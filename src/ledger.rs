use ahash::AHashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};

/// The dedup key for a file: its path string, compared verbatim.
pub fn file_identity(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Durable set of already-processed file identities.
///
/// The in-memory set is mirrored line-for-line in an append-only log. One
/// mutex guards both the set and the log handle, so membership checks never
/// observe a half-finished insert and log lines never interleave.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    state: Mutex<LedgerState>,
}

#[derive(Debug)]
struct LedgerState {
    entries: AHashSet<String>,
    log: Option<File>,
}

impl Ledger {
    /// Load the ledger from `path`. A missing or unreadable log yields an
    /// empty ledger.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let entries = match fs::read(&path) {
            Ok(bytes) => parse_entries(&bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("No ledger at {}, starting empty", path.display());
                AHashSet::new()
            }
            Err(err) => {
                error!("Error reading ledger {}: {}", path.display(), err);
                AHashSet::new()
            }
        };

        info!(
            "Loaded {} processed file(s) from {}",
            entries.len(),
            path.display()
        );

        Self {
            path,
            state: Mutex::new(LedgerState { entries, log: None }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.lock().entries.contains(identity)
    }

    /// Record `identity`, appending and syncing it to the log before it is
    /// added to the in-memory set.
    ///
    /// Returns `Ok(false)` if the identity was already recorded. On a
    /// persist error the in-memory set is left untouched.
    pub fn insert(&self, identity: &str) -> io::Result<bool> {
        let mut state = self.lock();
        if state.entries.contains(identity) {
            return Ok(false);
        }

        let log = log_handle(&mut state.log, &self.path)?;

        let line = format!("{}\n", identity);
        if let Err(err) = append_line(log, line.as_bytes()) {
            // The handle may now sit on a torn tail; reopen on the next insert.
            state.log = None;
            return Err(err);
        }

        state.entries.insert(identity.to_owned());
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Truncate the log at `path`. Only for use while no process holds a
    /// live ledger on it.
    pub fn clear(path: &Path) -> io::Result<()> {
        File::create(path)?;
        info!("Ledger {} cleared", path.display());
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The append handle is opened on first insert so a read-only ledger never
/// creates its log file.
fn log_handle<'a>(slot: &'a mut Option<File>, path: &Path) -> io::Result<&'a mut File> {
    match slot {
        Some(log) => Ok(log),
        None => {
            let log = OpenOptions::new().create(true).append(true).open(path)?;
            Ok(slot.insert(log))
        }
    }
}

/// An append-only sink that can be cut back to a known length.
trait AppendLog: Write {
    fn committed_len(&self) -> io::Result<u64>;
    fn sync(&mut self) -> io::Result<()>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl AppendLog for File {
    fn committed_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.sync_data()
    }
}

/// Append one whole line or nothing. A failed write, flush or sync cuts the
/// log back to its prior length so no fragment is left for the next line to
/// run into.
fn append_line<L: AppendLog + ?Sized>(log: &mut L, line: &[u8]) -> io::Result<()> {
    let committed = log.committed_len()?;

    let result = log
        .write_all(line)
        .and_then(|()| log.flush())
        .and_then(|()| log.sync());

    if let Err(err) = result {
        if let Err(rollback) = log.truncate(committed) {
            error!(
                "Failed to roll back partial ledger line at offset {}: {}",
                committed, rollback
            );
        }
        return Err(err);
    }
    Ok(())
}

fn parse_entries(bytes: &[u8]) -> AHashSet<String> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.strip_prefix('\u{feff}').unwrap_or(text.as_ref());

    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}
