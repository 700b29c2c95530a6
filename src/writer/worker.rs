//! Background drain worker
//!
//! Receives rotated buffers over a FIFO channel and writes them to the sink
//! in receive order. Exits once every sender is gone and the queue is empty,
//! or on the first failed write.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use crossbeam::channel::Receiver;
use tracing::{debug, error};

use crate::error::Result;

/// Workers alive in this process
pub(super) static ACTIVE_WORKERS: AtomicUsize = AtomicUsize::new(0);

/// Output the worker writes to
pub(super) type BoxedSink = Box<dyn Write + Send>;

/// Unit of work on the queue
pub(super) enum WorkerMessage {
    /// A full (or final) buffer, written as-is
    Buffer(Bytes),
    /// Flush and drop the current sink, continue with this one
    Rotate(BoxedSink),
}

/// State shared between a writer and its worker
#[derive(Debug, Default)]
pub(super) struct WorkerShared {
    /// Buffers enqueued but not yet written
    pub pending: AtomicUsize,
    /// Bytes written to the sink so far
    pub flushed_bytes: AtomicU64,
    /// Set when a write failed and the worker gave up
    pub failed: AtomicBool,
}

/// Decrements the live worker count however the thread exits
struct ActiveGuard;

impl ActiveGuard {
    fn enter() -> Self {
        ACTIVE_WORKERS.fetch_add(1, Ordering::SeqCst);
        ActiveGuard
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        ACTIVE_WORKERS.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Start the worker thread
pub(super) fn spawn(
    sink: BoxedSink,
    queue: Receiver<WorkerMessage>,
    shared: Arc<WorkerShared>,
) -> Result<JoinHandle<Result<()>>> {
    // Counted before the thread runs; a failed spawn drops the closure and
    // the guard with it
    let active = ActiveGuard::enter();
    let handle = thread::Builder::new()
        .name("worldsave-flush".into())
        .spawn(move || {
            let _active = active;
            let result = drain(sink, &queue, &shared);
            if let Err(e) = &result {
                // Whatever is still queued will never be written
                shared.pending.store(0, Ordering::SeqCst);
                shared.failed.store(true, Ordering::SeqCst);
                error!("background flush failed: {}", e);
            }
            result
        })?;

    Ok(handle)
}

fn drain(mut sink: BoxedSink, queue: &Receiver<WorkerMessage>, shared: &WorkerShared) -> Result<()> {
    debug!("flush worker started");

    for message in queue.iter() {
        match message {
            WorkerMessage::Buffer(bytes) => {
                sink.write_all(&bytes)?;
                shared.flushed_bytes.fetch_add(bytes.len() as u64, Ordering::SeqCst);
                shared.pending.fetch_sub(1, Ordering::SeqCst);
            }
            WorkerMessage::Rotate(next) => {
                sink.flush()?;
                sink = next;
                debug!("flush worker switched sink");
            }
        }
    }

    sink.flush()?;
    debug!(
        bytes = shared.flushed_bytes.load(Ordering::SeqCst),
        "flush worker drained and stopped"
    );
    Ok(())
}
