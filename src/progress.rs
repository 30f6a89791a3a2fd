use crate::scanner::ScanSummary;
use std::path::Path;

/// Trait for reporting initial-scan progress.
///
/// The binary implements it with an indicatif spinner. All methods have
/// default no-op implementations.
pub trait ScanReporter: Send + Sync {
    fn on_scan_start(&self, _dir: &Path) {}
    fn on_scan_progress(&self, _completed: usize, _submitted: usize) {}
    fn on_scan_complete(&self, _summary: &ScanSummary) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ScanReporter for SilentReporter {}
