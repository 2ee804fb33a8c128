//! Ingestion pipeline
//!
//! Two threads per running session:
//! - the reader pulls frames from the [`FrameSource`], stamps them with their
//!   arrival time and pushes them into a bounded hand-off queue;
//! - the worker pops frames, decodes them against the signal table and
//!   appends every decoded value to the series store.
//!
//! Both threads poll a shared stop flag between bounded waits, so a stop
//! request is observed within one receive/poll timeout. Frames flow through a
//! single queue and a single worker, which keeps samples of each series in
//! arrival order.

use crate::bus::FrameSource;
use crate::config::{OverflowPolicy, SessionConfig};
use crate::message_decoder::FrameDecoder;
use crate::signals::SignalTable;
use crate::store::TimeSeriesStore;
use crate::types::{ArrivalClock, BusError, Result, Sample, SeriesKey, TimestampedFrame};
use crossbeam_channel::{
    bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Counters describing what the pipeline has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Frames delivered by the source
    pub frames_received: u64,
    /// Frames rejected by the ID/DLC filter
    pub frames_filtered: u64,
    /// Frames discarded because the hand-off queue was full
    pub frames_dropped: u64,
    /// Frames taken off the queue and decoded
    pub frames_decoded: u64,
    /// Samples appended to the store
    pub samples_stored: u64,
    /// Transient receive errors reported by the source
    pub receive_errors: u64,
    /// Frames whose decoder panicked
    pub decode_panics: u64,
}

#[derive(Default)]
struct PipelineCounters {
    frames_received: AtomicU64,
    frames_filtered: AtomicU64,
    frames_dropped: AtomicU64,
    frames_decoded: AtomicU64,
    samples_stored: AtomicU64,
    receive_errors: AtomicU64,
    decode_panics: AtomicU64,
}

impl PipelineCounters {
    fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_filtered: self.frames_filtered.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            samples_stored: self.samples_stored.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
            decode_panics: self.decode_panics.load(Ordering::Relaxed),
        }
    }
}

/// State shared by the session and both pipeline threads
struct PipelineShared {
    stop: AtomicBool,
    reader_finished: AtomicBool,
    worker_finished: AtomicBool,
    counters: PipelineCounters,
}

/// A running reader/worker pair
pub struct IngestionPipeline {
    shared: Arc<PipelineShared>,
    reader: Option<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
}

impl IngestionPipeline {
    /// Spawn the reader and worker threads
    pub fn spawn<S>(
        source: S,
        table: Arc<RwLock<SignalTable>>,
        store: Arc<RwLock<TimeSeriesStore>>,
        config: &SessionConfig,
    ) -> Result<Self>
    where
        S: FrameSource + 'static,
    {
        config.validate()?;

        let shared = Arc::new(PipelineShared {
            stop: AtomicBool::new(false),
            reader_finished: AtomicBool::new(false),
            worker_finished: AtomicBool::new(false),
            counters: PipelineCounters::default(),
        });

        let (tx, rx) = bounded::<TimestampedFrame>(config.queue_capacity);

        let worker = Worker {
            rx: rx.clone(),
            table,
            store,
            shared: Arc::clone(&shared),
            config: config.clone(),
        };
        let worker = thread::Builder::new()
            .name("can-worker".to_string())
            .spawn(move || worker.run())?;

        let reader = Reader {
            source,
            tx,
            overflow_rx: rx,
            clock: ArrivalClock::new(),
            shared: Arc::clone(&shared),
            config: config.clone(),
        };
        let reader = match thread::Builder::new()
            .name("can-reader".to_string())
            .spawn(move || reader.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                shared.stop.store(true, Ordering::Release);
                if worker.join().is_err() {
                    log::error!("Worker thread panicked during aborted start");
                }
                return Err(e.into());
            }
        };

        log::debug!(
            "Pipeline started (queue {} frames, {:?} on overflow)",
            config.queue_capacity,
            config.overflow_policy
        );

        Ok(Self {
            shared,
            reader: Some(reader),
            worker: Some(worker),
        })
    }

    /// Request a cooperative stop and wait for both threads to exit
    pub fn stop(&mut self) -> PipelineStats {
        self.shared.stop.store(true, Ordering::Release);

        for (name, handle) in [("reader", self.reader.take()), ("worker", self.worker.take())] {
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    log::error!("Pipeline {} thread panicked", name);
                }
            }
        }

        self.stats()
    }

    pub fn stats(&self) -> PipelineStats {
        self.shared.counters.snapshot()
    }

    /// The source reported disconnection and the reader has exited
    pub fn is_reader_finished(&self) -> bool {
        self.shared.reader_finished.load(Ordering::Acquire)
    }

    /// The reader has exited and the worker has decoded everything it queued
    pub fn is_drained(&self) -> bool {
        self.is_reader_finished() && self.shared.worker_finished.load(Ordering::Acquire)
    }
}

impl Drop for IngestionPipeline {
    fn drop(&mut self) {
        if self.reader.is_some() || self.worker.is_some() {
            self.stop();
        }
    }
}

struct Reader<S> {
    source: S,
    tx: Sender<TimestampedFrame>,
    /// Used to evict the oldest queued frame under drop-oldest overflow
    overflow_rx: Receiver<TimestampedFrame>,
    clock: ArrivalClock,
    shared: Arc<PipelineShared>,
    config: SessionConfig,
}

impl<S: FrameSource> Reader<S> {
    fn run(mut self) {
        let timeout = self.config.receive_timeout();
        let counters = &self.shared.counters;

        while !self.shared.stop.load(Ordering::Acquire) {
            match self.source.receive(timeout) {
                Ok(Some(frame)) => {
                    let timestamp = self.clock.now();
                    PipelineCounters::bump(&counters.frames_received);

                    if !self.config.should_process_frame(&frame) {
                        PipelineCounters::bump(&counters.frames_filtered);
                        continue;
                    }

                    if !self.enqueue(TimestampedFrame { timestamp, frame }) {
                        break;
                    }
                }
                Ok(None) => continue,
                Err(BusError::Transient(msg)) => {
                    PipelineCounters::bump(&counters.receive_errors);
                    log::warn!("Error reading frame: {}", msg);
                }
                Err(BusError::Disconnected(msg)) => {
                    log::info!("Frame source disconnected: {}", msg);
                    break;
                }
            }
        }

        self.shared.reader_finished.store(true, Ordering::Release);
        log::debug!("Reader thread exiting");
    }

    /// Hand a frame to the worker; false once the worker is gone
    fn enqueue(&self, frame: TimestampedFrame) -> bool {
        match self.config.overflow_policy {
            OverflowPolicy::DropOldest => self.enqueue_drop_oldest(frame),
            OverflowPolicy::Block => self.enqueue_blocking(frame),
        }
    }

    fn enqueue_drop_oldest(&self, mut frame: TimestampedFrame) -> bool {
        loop {
            match self.tx.try_send(frame) {
                Ok(()) => return true,
                Err(TrySendError::Full(back)) => {
                    if self.overflow_rx.try_recv().is_ok() {
                        let dropped = PipelineCounters::bump(&self.shared.counters.frames_dropped);
                        if dropped == 1 || dropped % 1000 == 0 {
                            log::warn!("Hand-off queue full, {} frame(s) dropped so far", dropped);
                        }
                    }
                    frame = back;
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }

    fn enqueue_blocking(&self, mut frame: TimestampedFrame) -> bool {
        let poll = self.config.poll_timeout();
        loop {
            match self.tx.send_timeout(frame, poll) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(back)) => {
                    if self.shared.stop.load(Ordering::Acquire) {
                        PipelineCounters::bump(&self.shared.counters.frames_dropped);
                        return false;
                    }
                    frame = back;
                }
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }
}

struct Worker {
    rx: Receiver<TimestampedFrame>,
    table: Arc<RwLock<SignalTable>>,
    store: Arc<RwLock<TimeSeriesStore>>,
    shared: Arc<PipelineShared>,
    config: SessionConfig,
}

impl Worker {
    fn run(self) {
        let poll = self.config.poll_timeout();

        while !self.shared.stop.load(Ordering::Acquire) {
            match self.rx.recv_timeout(poll) {
                Ok(frame) => self.process(frame),
                Err(RecvTimeoutError::Timeout) => continue,
                // Reader gone and queue empty: nothing more can arrive
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.shared.worker_finished.store(true, Ordering::Release);
        log::debug!("Worker thread exiting");
    }

    fn process(&self, stamped: TimestampedFrame) {
        let counters = &self.shared.counters;
        let can_id = stamped.frame.can_id();

        // The table stays read-locked until the samples are stored, so a
        // concurrent signal removal cannot be followed by a stale append.
        let table = self.table.read();
        let decoded = panic::catch_unwind(AssertUnwindSafe(|| {
            FrameDecoder::decode(&table, can_id, stamped.frame.payload())
        }));
        PipelineCounters::bump(&counters.frames_decoded);

        let decoded = match decoded {
            Ok(decoded) => decoded,
            Err(_) => {
                PipelineCounters::bump(&counters.decode_panics);
                log::error!("Decoder for CAN ID 0x{:X} panicked; frame skipped", can_id);
                return;
            }
        };

        if decoded.is_empty() {
            return;
        }

        let mut store = self.store.write();
        for (name, value) in decoded.values() {
            store.append(
                SeriesKey::new(can_id, name),
                Sample::new(stamped.timestamp, value),
            );
            PipelineCounters::bump(&counters.samples_stored);
        }
    }
}
