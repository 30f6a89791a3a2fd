pub mod classifier;
pub mod config;
pub mod error;
pub mod ingest;
pub mod ledger;
pub mod platform;
pub mod pool;
pub mod progress;
pub mod scanner;
pub mod watcher;

pub use classifier::{classify, ContentTag};
pub use crate::config::AppConfig;
pub use error::Error;
pub use ingest::{Ingestor, RetryPolicy};
pub use ledger::Ledger;
pub use pool::WorkerPool;
pub use progress::{ScanReporter, SilentReporter};
pub use scanner::{scan_existing, ScanSummary};
pub use watcher::{ChangeSource, Watcher};
