//! File sink
//!
//! Writers only ever flush their sink when closing or switching sinks, so a
//! file sink makes that flush durable.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::error::Result;

/// Output file whose `flush` syncs data to disk
#[derive(Debug)]
pub struct FileSink {
    file: File,
}

impl FileSink {
    /// Create or truncate the file at `path`
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self { file })
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.file.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_data()
    }
}
