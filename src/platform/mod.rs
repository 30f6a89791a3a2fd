#[cfg(target_os = "windows")]
pub mod windows;

use std::fs::File;
use std::io;
use std::path::Path;

/// Whether `err` means another process holds the file open in a conflicting
/// mode. These are the only open failures worth retrying.
#[cfg(target_os = "windows")]
pub fn is_sharing_violation(err: &io::Error) -> bool {
    windows::is_sharing_violation(err)
}

#[cfg(not(target_os = "windows"))]
pub fn is_sharing_violation(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
}

/// Open `path` for reading without denying the producer write access.
#[cfg(target_os = "windows")]
pub fn open_shared_read(path: &Path) -> io::Result<File> {
    windows::open_shared_read(path)
}

#[cfg(not(target_os = "windows"))]
pub fn open_shared_read(path: &Path) -> io::Result<File> {
    File::open(path)
}
