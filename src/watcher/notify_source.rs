use super::records::{ChangeAction, ChangeRecord};
use super::ChangeSource;
use crate::error::Error;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use tracing::{debug, info};

/// Change source backed by the platform's recommended `notify` watcher,
/// watching one directory non-recursively.
pub struct NotifySource {
    dir: PathBuf,
    events: Receiver<notify::Result<Event>>,
    _watcher: RecommendedWatcher,
}

impl NotifySource {
    pub fn new(dir: &Path) -> Result<Self, Error> {
        let (tx, events) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(tx)?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        info!("Watching path: {}", dir.display());

        Ok(Self {
            dir: dir.to_path_buf(),
            events,
            _watcher: watcher,
        })
    }
}

/// Translate one `notify` event into change records for entries of `dir`.
fn push_event(dir: &Path, event: Event, batch: &mut Vec<ChangeRecord>) {
    let actions: &[ChangeAction] = match event.kind {
        EventKind::Create(_) => &[ChangeAction::Added],
        EventKind::Remove(_) => &[ChangeAction::Removed],
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => &[ChangeAction::RenamedOld],
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            &[ChangeAction::RenamedOld, ChangeAction::RenamedNew]
        }
        EventKind::Modify(ModifyKind::Name(_)) => &[ChangeAction::RenamedNew],
        EventKind::Modify(ModifyKind::Metadata(_)) => return,
        EventKind::Modify(_) => &[ChangeAction::Modified],
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return,
    };

    // A rename reported with one path uses the first action for every path.
    for (index, path) in event.paths.iter().enumerate() {
        let action = actions.get(index).or(actions.first()).copied();
        if let (Some(name), Some(action)) = (child_name(dir, path), action) {
            batch.push(ChangeRecord { name, action });
        }
    }
}

/// File name of `path` if it names an entry inside `dir` rather than the
/// directory itself.
fn child_name(dir: &Path, path: &Path) -> Option<String> {
    if path == dir {
        return None;
    }
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

impl ChangeSource for NotifySource {
    fn next_batch(&mut self) -> Result<Vec<ChangeRecord>, Error> {
        loop {
            let first = self
                .events
                .recv()
                .map_err(|_| Error::WatcherDisconnected)?;

            let mut batch = Vec::new();
            push_event(&self.dir, first?, &mut batch);
            while let Ok(next) = self.events.try_recv() {
                push_event(&self.dir, next?, &mut batch);
            }

            if !batch.is_empty() {
                debug!("Received {} change record(s)", batch.len());
                return Ok(batch);
            }
        }
    }
}
