extern crate winapi;

use super::records::{decode_notify_buffer, ChangeRecord};
use super::ChangeSource;
use crate::error::Error;
use std::io;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use std::ptr;
use std::slice;
use tracing::{info, warn};
use winapi::shared::minwindef::{DWORD, FALSE, LPVOID};
use winapi::um::fileapi::{CreateFileW, OPEN_EXISTING};
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::winbase::{ReadDirectoryChangesW, FILE_FLAG_BACKUP_SEMANTICS};
use winapi::um::winnt::{
    FILE_LIST_DIRECTORY, FILE_NOTIFY_CHANGE_FILE_NAME, FILE_NOTIFY_CHANGE_SIZE, FILE_SHARE_DELETE,
    FILE_SHARE_READ, FILE_SHARE_WRITE, HANDLE,
};

const BUFFER_LEN: usize = 4096;

/// `ReadDirectoryChangesW` on a single directory, non-recursive.
pub struct DirectoryChangesSource {
    handle: HANDLE,
    // DWORD-aligned, as the API requires.
    buffer: Vec<u32>,
}

impl DirectoryChangesSource {
    pub fn open(dir: &Path) -> Result<Self, Error> {
        let dir_wide: Vec<u16> = dir
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        let handle = unsafe {
            CreateFileW(
                dir_wide.as_ptr(),
                FILE_LIST_DIRECTORY,
                FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
                ptr::null_mut(),
                OPEN_EXISTING,
                FILE_FLAG_BACKUP_SEMANTICS,
                ptr::null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(io::Error::last_os_error().into());
        }

        info!("Watching path: {}", dir.display());
        Ok(Self {
            handle,
            buffer: vec![0; BUFFER_LEN / 4],
        })
    }
}

impl ChangeSource for DirectoryChangesSource {
    fn next_batch(&mut self) -> Result<Vec<ChangeRecord>, Error> {
        loop {
            let mut bytes_returned: DWORD = 0;
            let ok = unsafe {
                ReadDirectoryChangesW(
                    self.handle,
                    self.buffer.as_mut_ptr() as LPVOID,
                    BUFFER_LEN as DWORD,
                    FALSE,
                    FILE_NOTIFY_CHANGE_FILE_NAME | FILE_NOTIFY_CHANGE_SIZE,
                    &mut bytes_returned,
                    ptr::null_mut(),
                    None,
                )
            };
            if ok == 0 {
                return Err(io::Error::last_os_error().into());
            }
            if bytes_returned == 0 {
                warn!("Change buffer overflowed, some notifications were dropped");
                continue;
            }

            let len = (bytes_returned as usize).min(BUFFER_LEN);
            let bytes = unsafe { slice::from_raw_parts(self.buffer.as_ptr() as *const u8, len) };
            let records = decode_notify_buffer(bytes)?;
            if !records.is_empty() {
                return Ok(records);
            }
        }
    }
}

impl Drop for DirectoryChangesSource {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.handle);
        }
    }
}
