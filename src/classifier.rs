use std::fmt;
use std::io::{self, Read};

const OGG_SIGNATURES: &[&[u8]] = &[b"OggS", b"vorbis"];
const MP3_SIGNATURES: &[&[u8]] = &[b"ID3", b"LAME", b"matroska"];

/// Length of the longest signature ("matroska").
const MAX_SIGNATURE_LEN: usize = 8;

/// Smallest window the streaming classifier will read at a time.
pub const MIN_CHUNK_SIZE: usize = 1024;

/// Content type derived from a file's bytes. Never from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentTag {
    Ogg,
    Mp3,
    Unknown,
}

impl ContentTag {
    /// Extension appended to relocated copies, `None` for `Unknown`.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            ContentTag::Ogg => Some("ogg"),
            ContentTag::Mp3 => Some("mp3"),
            ContentTag::Unknown => None,
        }
    }

    pub fn is_known(self) -> bool {
        self != ContentTag::Unknown
    }
}

impl fmt::Display for ContentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentTag::Ogg => write!(f, "ogg"),
            ContentTag::Mp3 => write!(f, "mp3"),
            ContentTag::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classify a buffer by signature search. Ogg markers are checked first and
/// win when both kinds are present.
pub fn classify(buffer: &[u8]) -> ContentTag {
    if contains_any(buffer, OGG_SIGNATURES) {
        ContentTag::Ogg
    } else if contains_any(buffer, MP3_SIGNATURES) {
        ContentTag::Mp3
    } else {
        ContentTag::Unknown
    }
}

/// Streaming classification over `reader` in chunks of at least
/// [`MIN_CHUNK_SIZE`] bytes.
///
/// Each window carries the tail of the previous chunk so signatures split
/// across a chunk boundary are still seen. Stops early on an Ogg marker;
/// an Mp3 marker is remembered and only reported at end-of-file, so the
/// result is the same as classifying the whole content at once.
pub fn classify_reader<R: Read>(mut reader: R, chunk_size: usize) -> io::Result<ContentTag> {
    let chunk_size = chunk_size.max(MIN_CHUNK_SIZE);
    let carry_len = MAX_SIGNATURE_LEN - 1;

    let mut chunk = vec![0u8; chunk_size];
    let mut window: Vec<u8> = Vec::with_capacity(carry_len + chunk_size);
    let mut last_len = 0;
    let mut seen_mp3 = false;

    loop {
        let read = read_chunk(&mut reader, &mut chunk)?;
        if read == 0 {
            break;
        }
        last_len = read;

        window.extend_from_slice(&chunk[..read]);
        match classify(&window) {
            ContentTag::Ogg => return Ok(ContentTag::Ogg),
            ContentTag::Mp3 => seen_mp3 = true,
            ContentTag::Unknown => {}
        }

        let keep = window.len().min(carry_len);
        window.drain(..window.len() - keep);
    }

    if seen_mp3 {
        return Ok(ContentTag::Mp3);
    }

    // Re-check the last chunk read before giving up.
    Ok(classify(&chunk[..last_len]))
}

fn read_chunk<R: Read>(reader: &mut R, chunk: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(chunk) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

fn contains_any(haystack: &[u8], needles: &[&[u8]]) -> bool {
    needles.iter().any(|needle| contains(haystack, needle))
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
