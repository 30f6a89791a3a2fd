use crate::error::Error;

/// Fixed part of each record: next-entry offset, action, name length.
const HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Added,
    Removed,
    Modified,
    RenamedOld,
    RenamedNew,
    Other(u32),
}

impl ChangeAction {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => ChangeAction::Added,
            2 => ChangeAction::Removed,
            3 => ChangeAction::Modified,
            4 => ChangeAction::RenamedOld,
            5 => ChangeAction::RenamedNew,
            other => ChangeAction::Other(other),
        }
    }

    /// The name no longer refers to a file in the directory.
    pub fn is_removal(self) -> bool {
        matches!(self, ChangeAction::Removed | ChangeAction::RenamedOld)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub name: String,
    pub action: ChangeAction,
}

impl ChangeRecord {
    pub fn new(name: impl Into<String>, action: ChangeAction) -> Self {
        Self {
            name: name.into(),
            action,
        }
    }
}

/// Decode a buffer of linked, variable-length change records.
///
/// Layout per record, little-endian: `next_entry_offset: u32`,
/// `action: u32`, `name_length: u32` (bytes), then `name_length` bytes of
/// UTF-16 name. `next_entry_offset` is relative to the start of the record
/// and is 0 on the last one. Names are bounded by their declared length,
/// never by a terminator.
pub fn decode_notify_buffer(buf: &[u8]) -> Result<Vec<ChangeRecord>, Error> {
    let mut records = Vec::new();
    if buf.is_empty() {
        return Ok(records);
    }

    let mut offset = 0usize;
    loop {
        let header = offset
            .checked_add(HEADER_LEN)
            .and_then(|end| buf.get(offset..end))
            .ok_or_else(|| {
                malformed(format!(
                    "record header at offset {} overruns {} byte buffer",
                    offset,
                    buf.len()
                ))
            })?;

        let next_entry = read_u32(header, 0) as usize;
        let action = read_u32(header, 4);
        let name_len = read_u32(header, 8) as usize;

        if name_len % 2 != 0 {
            return Err(malformed(format!(
                "odd name length {} at offset {}",
                name_len, offset
            )));
        }

        let name_start = offset + HEADER_LEN;
        let name_bytes = name_start
            .checked_add(name_len)
            .and_then(|end| buf.get(name_start..end))
            .ok_or_else(|| {
                malformed(format!(
                    "name of {} bytes at offset {} overruns {} byte buffer",
                    name_len,
                    offset,
                    buf.len()
                ))
            })?;

        let units: Vec<u16> = name_bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        records.push(ChangeRecord {
            name: String::from_utf16_lossy(&units),
            action: ChangeAction::from_code(action),
        });

        if next_entry == 0 {
            break;
        }
        if next_entry < HEADER_LEN {
            return Err(malformed(format!(
                "next entry offset {} at offset {} does not advance past the header",
                next_entry, offset
            )));
        }
        offset = offset
            .checked_add(next_entry)
            .ok_or_else(|| malformed(format!("next entry offset {} overflows", next_entry)))?;
    }

    Ok(records)
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn malformed(detail: String) -> Error {
    Error::MalformedChangeBuffer(detail)
}
