//! Batched Asynchronous Writer
//!
//! Writes land directly in the current `BytesMut`. Once it reaches the
//! configured capacity it is frozen and queued for the flush worker, and a
//! fresh buffer takes its place, so the producer never waits on disk.
//!
//! ```text
//!  producer                          queue (FIFO)               worker
//!  ┌──────────┐  rotate   ┌─────┬─────┬─────┐   recv   ┌──────────────┐
//!  │ current  │ ───────▶  │  A  │  B  │  C  │ ───────▶ │ write_all()  │──▶ sink
//!  └──────────┘           └─────┴─────┴─────┘          └──────────────┘
//! ```
//!
//! ## Worker lifecycle
//! - Spawned on the first enqueue, one per writer, alive until `close`
//! - `Idle` → `Draining` while buffers are pending → `Idle`
//! - `Stopped` once `close` has drained the queue and released the sink,
//!   or as soon as the worker has given up on a failed write
//!
//! A failed sink write stops the worker for good: nothing queued after the
//! failed buffer is written and the writer reports `WorkerFailed` from then
//! on, including from every later `close`.

use std::io::Write;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, warn};

use super::sink::FileSink;
use super::worker::{self, BoxedSink, WorkerMessage, WorkerShared, ACTIVE_WORKERS};
use super::GenericWriter;
use crate::config::Config;
use crate::error::{PersistError, Result};
use crate::resolver::EntityResolver;
use crate::types::{Clock, SystemClock};

/// Extra room so a value crossing the threshold doesn't reallocate
const BUFFER_SLACK: usize = 1024;

/// Number of flush workers alive in this process
pub fn active_workers() -> usize {
    ACTIVE_WORKERS.load(Ordering::SeqCst)
}

/// Wait until no flush worker is alive, up to `timeout`
///
/// Returns true if all workers finished in time.
pub fn wait_for_workers(timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while active_workers() > 0 {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
    true
}

/// Observable state of a writer's flush worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Nothing queued
    Idle,
    /// Buffers queued or being written
    Draining,
    /// Writer closed, queue drained, sink released; or the worker
    /// stopped on a sink error
    Stopped,
}

/// Writer that hands full buffers to a background worker
pub struct AsyncWriter<R> {
    /// Buffer all writes go to
    buffer: BytesMut,
    /// Rotation threshold
    capacity: usize,
    /// Buffer length when `position` was last advanced
    last_len: usize,
    /// Logical stream position
    position: u64,

    sender: Option<Sender<WorkerMessage>>,
    /// Handed to the worker when it is spawned
    receiver: Option<Receiver<WorkerMessage>>,
    /// Held until the worker takes it over
    sink: Option<BoxedSink>,
    worker: Option<JoinHandle<Result<()>>>,
    shared: Arc<WorkerShared>,

    closed: bool,
    /// Cause of a worker failure, reported by every later call
    failure: Option<String>,

    prefix_strings: bool,
    resolver: R,
    clock: Arc<dyn Clock>,
}

impl<R: EntityResolver> AsyncWriter<R> {
    /// Create (or truncate) the file at `path` and write to it
    pub fn create(path: &Path, config: &Config, resolver: R) -> Result<Self> {
        let sink = FileSink::create(path)?;
        Self::new(sink, config, resolver)
    }

    pub fn new<S: Write + Send + 'static>(sink: S, config: &Config, resolver: R) -> Result<Self> {
        config.validate()?;

        let (sender, receiver) = channel::unbounded();

        Ok(Self {
            buffer: BytesMut::with_capacity(config.async_buffer_size + BUFFER_SLACK),
            capacity: config.async_buffer_size,
            last_len: 0,
            position: 0,
            sender: Some(sender),
            receiver: Some(receiver),
            sink: Some(Box::new(sink)),
            worker: None,
            shared: Arc::new(WorkerShared::default()),
            closed: false,
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

impl<R> AsyncWriter<R> {
    pub fn worker_state(&self) -> WorkerState {
        let failed = self.failure.is_some() || self.shared.failed.load(Ordering::SeqCst);
        if failed || (self.closed && self.worker.is_none()) {
            WorkerState::Stopped
        } else if self.worker.is_none() || self.shared.pending.load(Ordering::SeqCst) == 0 {
            WorkerState::Idle
        } else {
            WorkerState::Draining
        }
    }

    /// Bytes the worker has written to the sink so far
    pub fn flushed_bytes(&self) -> u64 {
        self.shared.flushed_bytes.load(Ordering::SeqCst)
    }

    /// Bytes in the current, not yet rotated buffer
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Redirect output to `sink`
    ///
    /// Everything written so far goes to the old sink, which is flushed and
    /// dropped before the first byte reaches the new one. `position` restarts
    /// at zero.
    pub fn rotate_to<S: Write + Send + 'static>(&mut self, sink: S) -> Result<()> {
        self.check_writable()?;

        if !self.buffer.is_empty() {
            let rest = self.buffer.split().freeze();
            self.enqueue(rest)?;
        }

        let next: BoxedSink = Box::new(sink);
        if self.worker.is_some() {
            self.send(WorkerMessage::Rotate(next))?;
        } else if let Some(mut old) = self.sink.replace(next) {
            old.flush()?;
        }

        debug!(position = self.position, "rotated to new sink");
        self.position = 0;
        self.last_len = 0;
        Ok(())
    }

    fn check_writable(&mut self) -> Result<()> {
        if let Some(cause) = &self.failure {
            return Err(PersistError::WorkerFailed(cause.clone()));
        }
        if self.closed {
            return Err(PersistError::Closed);
        }
        if self.shared.failed.load(Ordering::SeqCst) {
            return Err(self.collect_failure());
        }
        Ok(())
    }

    /// Join the failed worker and remember why it stopped
    fn collect_failure(&mut self) -> PersistError {
        let cause = match self.worker.take().map(JoinHandle::join) {
            Some(Ok(Err(e))) => e.to_string(),
            Some(Ok(Ok(()))) => "worker stopped unexpectedly".to_string(),
            Some(Err(_)) => "worker panicked".to_string(),
            None => self
                .failure
                .clone()
                .unwrap_or_else(|| "worker is gone".to_string()),
        };
        self.failure = Some(cause.clone());
        PersistError::WorkerFailed(cause)
    }

    /// Advance `position` by what the last write appended; rotate when full
    fn on_write(&mut self) -> Result<()> {
        let len = self.buffer.len();
        self.position += (len - self.last_len) as u64;
        self.last_len = len;

        if len >= self.capacity {
            let full = std::mem::replace(
                &mut self.buffer,
                BytesMut::with_capacity(self.capacity + BUFFER_SLACK),
            );
            self.last_len = 0;
            self.enqueue(full.freeze())?;
        }
        Ok(())
    }

    fn ensure_worker(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }

        let sink = self.sink.take().ok_or(PersistError::Closed)?;
        let receiver = self.receiver.take().ok_or(PersistError::Closed)?;
        self.worker = Some(worker::spawn(sink, receiver, Arc::clone(&self.shared))?);
        Ok(())
    }

    fn enqueue(&mut self, bytes: Bytes) -> Result<()> {
        self.ensure_worker()?;

        let len = bytes.len();
        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.send(WorkerMessage::Buffer(bytes)) {
            self.shared.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(e);
        }

        debug!(bytes = len, position = self.position, "buffer rotated to flush worker");
        Ok(())
    }

    fn send(&mut self, message: WorkerMessage) -> Result<()> {
        let sent = match &self.sender {
            Some(sender) => sender.send(message).is_ok(),
            None => return Err(PersistError::Closed),
        };

        if sent {
            Ok(())
        } else {
            // Receiver dropped: the worker exited on an error
            Err(self.collect_failure())
        }
    }

    fn finish(&mut self) -> Result<()> {
        if self.closed {
            return match &self.failure {
                Some(cause) => Err(PersistError::WorkerFailed(cause.clone())),
                None => Ok(()),
            };
        }
        self.closed = true;

        let queued = if self.failure.is_none() && !self.buffer.is_empty() {
            let rest = self.buffer.split().freeze();
            self.last_len = 0;
            self.enqueue(rest)
        } else {
            Ok(())
        };

        // Disconnect so the worker drains what's left and stops
        self.sender = None;
        self.receiver = None;

        let joined = match self.worker.take() {
            Some(handle) => match handle.join() {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err("worker panicked".to_string()),
            },
            None => match self.sink.take() {
                Some(mut sink) => sink.flush().map_err(|e| PersistError::from(e).to_string()),
                None => Ok(()),
            },
        };

        // Keep the first cause so a repeated close reports it too
        if let Err(e) = queued {
            self.failure.get_or_insert_with(|| e.to_string());
        }
        if let Err(cause) = joined {
            self.failure.get_or_insert(cause);
        }
        if let Some(cause) = &self.failure {
            return Err(PersistError::WorkerFailed(cause.clone()));
        }

        debug!(position = self.position, flushed = self.flushed_bytes(), "async writer closed");
        Ok(())
    }
}

impl<R: EntityResolver> GenericWriter for AsyncWriter<R> {
    type Resolver = R;

    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_writable()?;
        self.buffer.extend_from_slice(bytes);
        self.on_write()
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn close(&mut self) -> Result<()> {
        self.finish()
    }

    fn is_closed(&self) -> bool {
        self.closed
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

impl<R> Drop for AsyncWriter<R> {
    fn drop(&mut self) {
        if !self.closed {
            warn!("async writer dropped without close, draining {} bytes", self.buffer.len());
            if let Err(e) = self.finish() {
                warn!("drain on drop failed: {}", e);
            }
        }
    }
}
