//! Tests for the batched asynchronous writer
//!
//! These tests verify:
//! - Buffers reach the sink in enqueue order, even with a slow sink
//! - Output is byte-identical to the synchronous writer
//! - Close drains everything, is idempotent and stops the worker
//! - Sink failures surface as WorkerFailed
//! - Rotating to a new sink

use std::io::{self, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver};
use parking_lot::Mutex;
use tempfile::TempDir;

use worldsave::types::{Decimal, FixedClock, MapIndex, Point2D, Rectangle2D, TimeSpan};
use worldsave::writer::{active_workers, wait_for_workers, WorkerState};
use worldsave::{
    AsyncWriter, BinaryFileReader, BinaryFileWriter, Config, GenericReader, GenericWriter,
    PersistError, SerialResolver, Timestamp,
};

// =============================================================================
// Helpers
// =============================================================================

/// Sink appending to shared memory, optionally sleeping before each write
#[derive(Clone, Default)]
struct SharedSink {
    data: Arc<Mutex<Vec<u8>>>,
    writes: Arc<Mutex<usize>>,
    delay: bool,
}

impl SharedSink {
    fn slow() -> Self {
        SharedSink { delay: true, ..Default::default() }
    }

    fn data(&self) -> Vec<u8> {
        self.data.lock().clone()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = {
            let mut writes = self.writes.lock();
            *writes += 1;
            *writes
        };
        if self.delay {
            // Uneven delays so a reordering bug would show
            thread::sleep(Duration::from_millis((n * 7 % 5) as u64));
        }
        self.data.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink that accepts `ok_writes` writes, then fails every later one
#[derive(Clone)]
struct FailingSink {
    data: Arc<Mutex<Vec<u8>>>,
    ok_writes: usize,
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.ok_writes == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        self.ok_writes -= 1;
        self.data.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink whose first write blocks until the test releases it
struct GatedSink<S> {
    gate: Receiver<()>,
    opened: bool,
    inner: S,
}

impl<S: Write> Write for GatedSink<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.opened {
            let _ = self.gate.recv();
            self.opened = true;
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn setup_temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

fn async_config(capacity: usize) -> Config {
    Config::builder().async_buffer_size(capacity).build()
}

/// A call sequence touching every kind of write
fn write_mixed<W: GenericWriter<Resolver = SerialResolver>>(writer: &mut W, rounds: i32) {
    for i in 0..rounds {
        writer.write_encoded_int(i * 37).unwrap();
        writer.write_string(Some(format!("entry {}", i).as_str())).unwrap();
        writer.write_string(None).unwrap();
        writer.write_f64(f64::from(i) / 3.0).unwrap();
        writer.write_decimal(Decimal::new(i128::from(i) * 1001, 3).unwrap()).unwrap();
        writer.write_rect2d(Rectangle2D::new(Point2D::new(i, -i), Point2D::new(i * 2, i * 3))).unwrap();
        writer.write_map(MapIndex::new((i % 5) as u8)).unwrap();
        writer.write_char('€').unwrap();
        writer.write_delta_time(Timestamp::from_ticks(1_000_000 + i64::from(i)).unwrap()).unwrap();
        writer.write_serial((i - 1).into()).unwrap();
    }
}

// =============================================================================
// End-to-End Tests
// =============================================================================

#[test]
fn test_small_buffer_round_trip() {
    let dir = setup_temp_dir();
    let path = dir.path().join("async.bin");
    let config = async_config(16);

    let mut writer = AsyncWriter::create(&path, &config, SerialResolver).unwrap();
    for i in 1..=6 {
        writer.write_i32(i).unwrap();
    }
    assert_eq!(writer.position(), 24);
    writer.close().unwrap();

    assert_eq!(std::fs::metadata(&path).unwrap().len(), 24);

    let mut reader = BinaryFileReader::open(&path, &config, SerialResolver).unwrap();
    for i in 1..=6 {
        assert_eq!(reader.read_i32().unwrap(), i);
    }
    assert!(reader.end().unwrap());
}

#[test]
fn test_position_spans_rotations() {
    let sink = SharedSink::default();
    let mut writer = AsyncWriter::new(sink.clone(), &async_config(16), SerialResolver).unwrap();

    for i in 0..5 {
        writer.write_i32(i).unwrap();
    }
    // 16 bytes rotated out, 4 still in the current buffer
    assert_eq!(writer.position(), 20);
    assert_eq!(writer.buffered_len(), 4);

    writer.close().unwrap();
    assert_eq!(writer.flushed_bytes(), 20);
    assert_eq!(sink.data().len(), 20);
}

#[test]
fn test_slow_sink_preserves_order() {
    let sink = SharedSink::slow();
    let mut writer = AsyncWriter::new(sink.clone(), &async_config(8), SerialResolver).unwrap();

    let mut expected = Vec::new();
    for i in 0..64i64 {
        writer.write_i64(i).unwrap();
        expected.extend_from_slice(&i.to_le_bytes());
    }
    writer.close().unwrap();

    assert_eq!(sink.data(), expected);
}

#[test]
fn test_matches_sync_writer_output() {
    let clock = Arc::new(FixedClock(Timestamp::from_ticks(900_000).unwrap()));

    let mut sync = BinaryFileWriter::new(Vec::new(), &Config::default(), SerialResolver)
        .unwrap()
        .with_clock(clock.clone());
    write_mixed(&mut sync, 500);
    let sync_position = sync.position();
    let sync_bytes = sync.into_inner().unwrap();

    for capacity in [1, 7, 64, 4096] {
        let sink = SharedSink::default();
        let mut writer = AsyncWriter::new(sink.clone(), &async_config(capacity), SerialResolver)
            .unwrap()
            .with_clock(clock.clone());
        write_mixed(&mut writer, 500);
        assert_eq!(writer.position(), sync_position);
        writer.close().unwrap();

        assert_eq!(sink.data(), sync_bytes, "capacity {}", capacity);
    }
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_close_is_idempotent() {
    let dir = setup_temp_dir();
    let path = dir.path().join("close.bin");

    let mut writer = AsyncWriter::create(&path, &async_config(8), SerialResolver).unwrap();
    for i in 0..10 {
        writer.write_i32(i).unwrap();
    }
    writer.close().unwrap();
    assert!(writer.is_closed());
    assert_eq!(writer.worker_state(), WorkerState::Stopped);
    let len = std::fs::metadata(&path).unwrap().len();
    assert_eq!(len, 40);

    writer.close().unwrap();
    assert_eq!(writer.worker_state(), WorkerState::Stopped);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), len);
}

#[test]
fn test_close_without_rotation_flushes_remainder() {
    let sink = SharedSink::default();
    let mut writer = AsyncWriter::new(sink.clone(), &Config::default(), SerialResolver).unwrap();

    writer.write_string(Some("short")).unwrap();
    assert_eq!(writer.worker_state(), WorkerState::Idle);
    assert!(sink.data().is_empty());

    writer.close().unwrap();
    assert_eq!(sink.data(), vec![1, 5, b's', b'h', b'o', b'r', b't']);
}

#[test]
fn test_close_with_nothing_written() {
    let sink = SharedSink::default();
    let mut writer = AsyncWriter::new(sink.clone(), &Config::default(), SerialResolver).unwrap();

    writer.close().unwrap();
    assert_eq!(writer.worker_state(), WorkerState::Stopped);
    assert!(sink.data().is_empty());
}

#[test]
fn test_write_after_close_fails() {
    let mut writer = AsyncWriter::new(SharedSink::default(), &Config::default(), SerialResolver).unwrap();
    writer.close().unwrap();

    assert!(matches!(writer.write_i32(1), Err(PersistError::Closed)));
    assert!(matches!(writer.rotate_to(SharedSink::default()), Err(PersistError::Closed)));
}

#[test]
fn test_drop_drains_queue() {
    let sink = SharedSink::slow();
    {
        let mut writer = AsyncWriter::new(sink.clone(), &async_config(4), SerialResolver).unwrap();
        for i in 0..10 {
            writer.write_i32(i).unwrap();
        }
        writer.write_u8(0xEE).unwrap();
    }
    let data = sink.data();
    assert_eq!(data.len(), 41);
    assert_eq!(data[40], 0xEE);
}

#[test]
fn test_worker_state_while_draining() {
    let (release, gate) = channel::bounded(1);
    let inner = SharedSink::default();
    let sink = GatedSink { gate, opened: false, inner: inner.clone() };

    let mut writer = AsyncWriter::new(sink, &async_config(4), SerialResolver).unwrap();
    assert_eq!(writer.worker_state(), WorkerState::Idle);

    // Fills the buffer, rotates it and starts the worker, which then blocks
    writer.write_i32(7).unwrap();
    assert_eq!(writer.worker_state(), WorkerState::Draining);
    // Counted as soon as the spawning write returns
    assert!(active_workers() >= 1);

    release.send(()).unwrap();
    writer.close().unwrap();
    assert_eq!(writer.worker_state(), WorkerState::Stopped);
    assert_eq!(inner.data(), 7i32.to_le_bytes().to_vec());
}

#[test]
fn test_workers_exit_after_close() {
    let mut writers = Vec::new();
    for _ in 0..4 {
        let mut writer = AsyncWriter::new(SharedSink::default(), &async_config(4), SerialResolver).unwrap();
        writer.write_i32(1).unwrap();
        writers.push(writer);
    }
    for writer in &mut writers {
        writer.close().unwrap();
        assert_eq!(writer.worker_state(), WorkerState::Stopped);
    }

    // Other tests may still own workers; they all finish quickly
    assert!(wait_for_workers(Duration::from_secs(10)));
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_sink_failure_reported() {
    let data = Arc::new(Mutex::new(Vec::new()));
    let sink = FailingSink { data: Arc::clone(&data), ok_writes: 1 };
    let mut writer = AsyncWriter::new(sink, &async_config(4), SerialResolver).unwrap();

    for i in 0..100 {
        if writer.write_i32(i).is_err() {
            break;
        }
    }

    let result = writer.close();
    assert!(matches!(result, Err(PersistError::WorkerFailed(_))), "got {:?}", result);

    // Only the buffer before the failure reached the sink
    assert_eq!(*data.lock(), 0i32.to_le_bytes().to_vec());
    assert_eq!(writer.flushed_bytes(), 4);

    // Closing again still reports the failure
    assert!(matches!(writer.close(), Err(PersistError::WorkerFailed(_))));
    assert!(matches!(writer.write_i32(1), Err(PersistError::WorkerFailed(_))));
    assert_eq!(writer.worker_state(), WorkerState::Stopped);
}

#[test]
fn test_failed_worker_is_not_draining() {
    let (release, gate) = channel::bounded(1);
    let data = Arc::new(Mutex::new(Vec::new()));
    let sink = GatedSink { gate, opened: false, inner: FailingSink { data: Arc::clone(&data), ok_writes: 0 } };
    let mut writer = AsyncWriter::new(sink, &async_config(4), SerialResolver).unwrap();

    // Three buffers queued behind a blocked first write
    for i in 0..3 {
        writer.write_i32(i).unwrap();
    }
    assert_eq!(writer.worker_state(), WorkerState::Draining);

    // The first write fails; the other two are never written
    release.send(()).unwrap();
    let mut waited = 0;
    while writer.worker_state() != WorkerState::Stopped && waited < 5000 {
        thread::sleep(Duration::from_millis(1));
        waited += 1;
    }
    assert_eq!(writer.worker_state(), WorkerState::Stopped);

    assert!(matches!(writer.write_u8(0), Err(PersistError::WorkerFailed(_))));
    assert!(matches!(writer.close(), Err(PersistError::WorkerFailed(_))));
    assert_eq!(writer.worker_state(), WorkerState::Stopped);
    assert!(data.lock().is_empty());
}

#[test]
fn test_failure_surfaces_on_later_write() {
    let data = Arc::new(Mutex::new(Vec::new()));
    let sink = FailingSink { data, ok_writes: 0 };
    let mut writer = AsyncWriter::new(sink, &async_config(4), SerialResolver).unwrap();

    writer.write_i32(1).unwrap();
    // Give the worker time to hit the error and exit
    let mut failed = false;
    for _ in 0..500 {
        thread::sleep(Duration::from_millis(2));
        if let Err(e) = writer.write_u8(0) {
            assert!(matches!(e, PersistError::WorkerFailed(_)));
            failed = true;
            break;
        }
    }
    assert!(failed);

    // Every later call reports the same failure
    assert!(matches!(writer.write_u8(0), Err(PersistError::WorkerFailed(_))));
    assert!(matches!(writer.close(), Err(PersistError::WorkerFailed(_))));
}

// =============================================================================
// Rotation Tests
// =============================================================================

#[test]
fn test_rotate_before_worker_started() {
    let first = SharedSink::default();
    let second = SharedSink::default();
    let mut writer = AsyncWriter::new(first.clone(), &Config::default(), SerialResolver).unwrap();

    for i in 0..3 {
        writer.write_i32(i).unwrap();
    }
    writer.rotate_to(second.clone()).unwrap();
    assert_eq!(writer.position(), 0);

    writer.write_i32(10).unwrap();
    writer.write_i32(11).unwrap();
    assert_eq!(writer.position(), 8);
    writer.close().unwrap();

    let mut expected_first = Vec::new();
    for i in 0..3i32 {
        expected_first.extend_from_slice(&i.to_le_bytes());
    }
    assert_eq!(first.data(), expected_first);

    let mut expected_second = 10i32.to_le_bytes().to_vec();
    expected_second.extend_from_slice(&11i32.to_le_bytes());
    assert_eq!(second.data(), expected_second);
}

#[test]
fn test_rotate_while_worker_running() {
    let first = SharedSink::slow();
    let second = SharedSink::default();
    let mut writer = AsyncWriter::new(first.clone(), &async_config(8), SerialResolver).unwrap();

    for i in 0..20i64 {
        writer.write_i64(i).unwrap();
    }
    writer.write_u8(0xAB).unwrap();
    writer.rotate_to(second.clone()).unwrap();

    writer.write_time_span(TimeSpan::from_seconds(1)).unwrap();
    writer.close().unwrap();

    let first = first.data();
    assert_eq!(first.len(), 20 * 8 + 1);
    assert_eq!(first[160], 0xAB);
    assert_eq!(second.data(), TimeSpan::from_seconds(1).ticks().to_le_bytes().to_vec());
}
