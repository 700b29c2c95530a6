//! Buffered Synchronous Reader
//!
//! Sequential cursor over any `BufRead + Seek` source. Every decode advances
//! the cursor by exactly the bytes its encoding occupies.

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use super::GenericReader;
use crate::config::Config;
use crate::error::{PersistError, Result};
use crate::resolver::EntityResolver;
use crate::types::{Clock, SystemClock};

/// Reader over a buffered, seekable source
pub struct BinaryFileReader<S, R> {
    source: S,
    /// Offset of the next unread byte
    position: u64,
    prefix_strings: bool,
    resolver: R,
    clock: Arc<dyn Clock>,
}

impl<R: EntityResolver> BinaryFileReader<BufReader<File>, R> {
    /// Open the file at `path` for reading from its start
    pub fn open(path: &Path, config: &Config, resolver: R) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), config, resolver))
    }
}

impl<R: EntityResolver> BinaryFileReader<Cursor<Vec<u8>>, R> {
    /// Read from an in-memory stream
    pub fn from_bytes(bytes: Vec<u8>, config: &Config, resolver: R) -> Self {
        Self::new(Cursor::new(bytes), config, resolver)
    }
}

impl<S: BufRead + Seek, R: EntityResolver> BinaryFileReader<S, R> {
    /// Wrap `source`, assumed to be positioned at the start of the stream
    pub fn new(source: S, config: &Config, resolver: R) -> Self {
        Self {
            source,
            position: 0,
            prefix_strings: config.prefix_strings,
            resolver,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `clock` as "now" for delta-encoded timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Give back the underlying source
    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: BufRead + Seek, R: EntityResolver> GenericReader for BinaryFileReader<S, R> {
    type Resolver = R;

    fn read_raw(&mut self, buf: &mut [u8]) -> Result<()> {
        if let Err(e) = self.source.read_exact(buf) {
            let at = self.position;
            // A short read may have consumed part of the value
            if let Ok(pos) = self.source.stream_position() {
                self.position = pos;
            }
            return Err(PersistError::from_read(e, at));
        }
        self.position += buf.len() as u64;
        Ok(())
    }

    fn end(&mut self) -> Result<bool> {
        Ok(self.source.fill_buf()?.is_empty())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.position = self.source.seek(pos)?;
        Ok(self.position)
    }

    fn prefix_strings(&self) -> bool {
        self.prefix_strings
    }

    fn resolver(&self) -> &R {
        &self.resolver
    }

    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}
