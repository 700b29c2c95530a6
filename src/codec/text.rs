//! Characters and string chunking

use bytes::BufMut;

/// Capacity of the staging buffer long strings are encoded through
pub const STAGING_BUFFER_SIZE: usize = 256;

/// Most bytes a single char takes in UTF-8
pub const MAX_UTF8_CHAR_LEN: usize = 4;

/// Characters per chunk when a string is too long for the staging buffer
pub const MAX_CHUNK_CHARS: usize = STAGING_BUFFER_SIZE / MAX_UTF8_CHAR_LEN;

/// Append one char as UTF-8
pub fn put_char<B: BufMut>(buf: &mut B, c: char) {
    let mut scratch = [0u8; MAX_UTF8_CHAR_LEN];
    buf.put_slice(c.encode_utf8(&mut scratch).as_bytes());
}

/// Total UTF-8 sequence length announced by a lead byte
pub fn utf8_len_from_lead(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7F => Some(1),
        0xC2..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF4 => Some(4),
        _ => None,
    }
}

/// Split `s` into pieces of at most `max_chars` chars
///
/// # Panics
///
/// Panics if `max_chars` is zero.
pub fn string_chunks(s: &str, max_chars: usize) -> StringChunks<'_> {
    assert!(max_chars > 0, "chunk size must be non-zero");
    StringChunks { rest: s, max_chars }
}

/// Iterator returned by [`string_chunks`]
pub struct StringChunks<'a> {
    rest: &'a str,
    max_chars: usize,
}

impl<'a> Iterator for StringChunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }

        let end = self
            .rest
            .char_indices()
            .nth(self.max_chars)
            .map_or(self.rest.len(), |(idx, _)| idx);

        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(chunk)
    }
}
