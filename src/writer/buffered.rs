//! Buffered Synchronous Writer
//!
//! Appends into a fixed-size buffer and writes it to the sink on the
//! caller's thread whenever the next value would not fit.
//!
//! ```text
//!   write_i32(7)          buffer (capacity N)
//!        │          ┌────────────────────────┬─────────┐
//!        └────────▶ │ ...previous values...  │  free   │
//!                   └────────────────────────┴─────────┘
//!   len + 4 > N ?  ──▶ flush buffer to sink, then append
//! ```

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::sink::FileSink;
use super::{wire_len, GenericWriter};
use crate::codec::{self, MAX_CHUNK_CHARS, STAGING_BUFFER_SIZE};
use crate::config::Config;
use crate::error::{PersistError, Result};
use crate::resolver::EntityResolver;
use crate::types::{Clock, SystemClock};

/// Synchronous writer over any `Write` sink
pub struct BinaryFileWriter<W: Write, R> {
    /// Output; `None` once closed
    sink: Option<W>,
    /// Pending bytes, never longer than `capacity`
    buffer: Vec<u8>,
    capacity: usize,
    /// Bytes already handed to the sink
    flushed: u64,
    /// First sink error; once set the buffer is never retried
    failure: Option<(io::ErrorKind, String)>,
    prefix_strings: bool,
    resolver: R,
    clock: Arc<dyn Clock>,
}

impl<R: EntityResolver> BinaryFileWriter<FileSink, R> {
    /// Create (or truncate) the file at `path` and write to it
    pub fn create(path: &Path, config: &Config, resolver: R) -> Result<Self> {
        let sink = FileSink::create(path)?;
        Self::new(sink, config, resolver)
    }
}

impl<W: Write, R: EntityResolver> BinaryFileWriter<W, R> {
    pub fn new(sink: W, config: &Config, resolver: R) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            sink: Some(sink),
            buffer: Vec::with_capacity(config.buffer_size),
            capacity: config.buffer_size,
            flushed: 0,
            failure: None,
            prefix_strings: config.prefix_strings,
            resolver,
            clock: Arc::new(SystemClock),
        })
    }

    /// Use `clock` as "now" for delta-encoded timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl<W: Write, R> BinaryFileWriter<W, R> {
    /// Bytes waiting in the buffer
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes already written to the sink
    pub fn flushed_bytes(&self) -> u64 {
        self.flushed
    }

    /// Flush the buffer and hand back the sink instead of closing it
    pub fn into_inner(mut self) -> Result<W> {
        self.flush_buffer()?;
        let mut sink = self.sink.take().ok_or(PersistError::Closed)?;
        if let Err(e) = sink.flush() {
            return Err(self.fail(e));
        }
        Ok(sink)
    }

    /// Error recorded by the first failed sink write, if any
    fn check_failure(&self) -> Result<()> {
        match &self.failure {
            Some((kind, cause)) => Err(PersistError::Io(io::Error::new(*kind, cause.clone()))),
            None => Ok(()),
        }
    }

    /// Remember a sink error; the stream is unusable from here on
    fn fail(&mut self, err: io::Error) -> PersistError {
        warn!(position = self.flushed, "sink write failed, writer unusable: {}", err);
        self.failure = Some((err.kind(), err.to_string()));
        self.buffer.clear();
        PersistError::Io(err)
    }

    /// Write the buffer to the sink and clear it
    fn flush_buffer(&mut self) -> Result<()> {
        self.check_failure()?;
        if self.buffer.is_empty() {
            return Ok(());
        }

        let sink = self.sink.as_mut().ok_or(PersistError::Closed)?;
        if let Err(e) = sink.write_all(&self.buffer) {
            return Err(self.fail(e));
        }
        self.flushed += self.buffer.len() as u64;

        trace!(bytes = self.buffer.len(), total = self.flushed, "flushed write buffer");
        self.buffer.clear();
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.sink.is_none() {
            return self.check_failure();
        }

        let flushed = self.flush_buffer();
        let sink = self.sink.take();
        flushed?;
        if let Some(mut sink) = sink {
            if let Err(e) = sink.flush() {
                return Err(self.fail(e));
            }
        }

        debug!(position = self.flushed, "writer closed");
        Ok(())
    }
}

impl<W: Write, R: EntityResolver> GenericWriter for BinaryFileWriter<W, R> {
    type Resolver = R;

    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_failure()?;
        if self.sink.is_none() {
            return Err(PersistError::Closed);
        }

        if self.buffer.len() + bytes.len() > self.capacity {
            self.flush_buffer()?;
        }

        if bytes.len() > self.capacity {
            // Cannot fit even an empty buffer: bypass it
            let sink = self.sink.as_mut().ok_or(PersistError::Closed)?;
            if let Err(e) = sink.write_all(bytes) {
                return Err(self.fail(e));
            }
            self.flushed += bytes.len() as u64;
            return Ok(());
        }

        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    fn write_string_body(&mut self, value: &str) -> Result<()> {
        self.write_encoded_int(wire_len(value.len(), "string")?)?;

        if value.len() <= STAGING_BUFFER_SIZE {
            return self.write_raw(value.as_bytes());
        }

        for chunk in codec::string_chunks(value, MAX_CHUNK_CHARS) {
            self.write_raw(chunk.as_bytes())?;
        }
        Ok(())
    }

    fn position(&self) -> u64 {
        self.flushed + self.buffer.len() as u64
    }

    fn close(&mut self) -> Result<()> {
        self.finish()
    }

    fn is_closed(&self) -> bool {
        self.sink.is_none()
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

impl<W: Write, R> Drop for BinaryFileWriter<W, R> {
    fn drop(&mut self) {
        if self.sink.is_some() {
            warn!("writer dropped without close, flushing {} bytes", self.buffer.len());
            if let Err(e) = self.finish() {
                warn!("flush on drop failed: {}", e);
            }
        }
    }
}
