use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Watch error: {0}")]
    Notify(#[from] notify::Error),

    #[error("Worker pool is stopping, task rejected")]
    PoolStopped,

    #[error("File {} still locked after {attempts} attempts", .path.display())]
    RetriesExhausted { path: PathBuf, attempts: u32 },

    #[error("Malformed change buffer: {0}")]
    MalformedChangeBuffer(String),

    #[error("Watch directory does not exist: {}", .0.display())]
    WatchDirMissing(PathBuf),

    #[error("Change notification channel closed")]
    WatcherDisconnected,
}
