//! Decoding session
//!
//! A [`Session`] is the entry point of the library. It owns the signal table,
//! the series store and, while running, the ingestion pipeline. There is no
//! process-wide state: every session is an independent value.

use crate::bus::FrameSource;
use crate::config::{SessionConfig, SignalConfig};
use crate::message_decoder::FrameDecoder;
use crate::pipeline::{IngestionPipeline, PipelineStats};
use crate::presets;
use crate::signals::{CustomDecoder, SignalSpec, SignalTable};
use crate::store::TimeSeriesStore;
use crate::types::{DecodedMessage, DecoderError, Result, Sample, SeriesKey};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Interval at which [`Session::wait_until_drained`] re-checks the pipeline
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// An explicitly owned decoding session
pub struct Session {
    config: SessionConfig,
    table: Arc<RwLock<SignalTable>>,
    store: Arc<RwLock<TimeSeriesStore>>,
    /// Series selected for display
    watched: BTreeSet<SeriesKey>,
    pipeline: Option<IngestionPipeline>,
    /// Counters of the last finished run
    last_stats: PipelineStats,
}

impl Session {
    /// Create an idle session
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            table: Arc::new(RwLock::new(SignalTable::new())),
            store: Arc::new(RwLock::new(TimeSeriesStore::new(config.history_capacity))),
            watched: BTreeSet::new(),
            pipeline: None,
            last_stats: PipelineStats::default(),
            config,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Signal registration
    // ------------------------------------------------------------------

    /// Register a signal layout under `can_id`
    pub fn add_signal(&self, can_id: u32, spec: SignalSpec) -> Result<()> {
        log::info!(
            "Adding signal 0x{:X}: {} ({})",
            can_id,
            spec.name(),
            spec.unit()
        );
        self.table.write().add_signal(can_id, spec)
    }

    /// Register a signal from its declarative form
    pub fn add_signal_config(&self, can_id: u32, signal: &SignalConfig) -> Result<()> {
        self.add_signal(can_id, signal.to_spec()?)
    }

    /// Register a batch of signals, stopping at the first invalid one
    ///
    /// Returns the number of signals registered.
    pub fn load_signal_configs<'a, I>(&self, signals: I) -> Result<usize>
    where
        I: IntoIterator<Item = (u32, &'a SignalConfig)>,
    {
        let mut count = 0;
        for (can_id, signal) in signals {
            self.add_signal_config(can_id, signal)?;
            count += 1;
        }
        Ok(count)
    }

    /// Register the default start-up decoders
    pub fn load_defaults(&self) -> Result<usize> {
        let defaults = presets::default_signals();
        let count = self.load_signal_configs(defaults.iter().map(|(id, sig)| (*id, sig)))?;
        log::info!("Loaded {} default decoders", count);
        Ok(count)
    }

    /// Register the example catalogue for one identifier
    pub fn load_examples(&self, can_id: u32) -> Result<usize> {
        let examples = presets::example_signals(can_id);
        if examples.is_empty() {
            return Err(DecoderError::ConfigError(format!(
                "no predefined decoders for CAN ID 0x{:X}",
                can_id
            )));
        }
        self.load_signal_configs(examples.iter().map(|sig| (can_id, sig)))
    }

    /// Remove a signal together with its stored series and watch entry
    pub fn remove_signal(&mut self, can_id: u32, name: &str) -> Result<SignalSpec> {
        let key = SeriesKey::new(can_id, name);

        let mut table = self.table.write();
        let removed = table.remove_signal(can_id, name)?;
        self.store.write().remove(&key);
        drop(table);

        self.watched.remove(&key);
        log::info!("Removed signal {}", key);
        Ok(removed)
    }

    /// Signal names of `can_id` in registration order
    pub fn list_signals(&self, can_id: u32) -> Vec<String> {
        self.table.read().signal_names(can_id)
    }

    /// Identifiers with at least one signal or a custom decoder
    pub fn identifiers(&self) -> Vec<u32> {
        self.table.read().can_ids()
    }

    /// Layout of one registered signal
    pub fn signal(&self, can_id: u32, name: &str) -> Option<SignalSpec> {
        self.table.read().get_signal(can_id, name).cloned()
    }

    /// Route every frame of `can_id` through `decoder` instead of the layouts
    pub fn set_custom_decoder<D>(&self, can_id: u32, decoder: D)
    where
        D: CustomDecoder + 'static,
    {
        log::info!("Installing custom decoder for CAN ID 0x{:X}", can_id);
        self.table.write().set_custom_decoder(can_id, Arc::new(decoder));
    }

    pub fn clear_custom_decoder(&self, can_id: u32) -> bool {
        self.table.write().clear_custom_decoder(can_id)
    }

    // ------------------------------------------------------------------
    // Decoding and stored data
    // ------------------------------------------------------------------

    /// Decode one payload synchronously, without touching the store
    pub fn decode(&self, can_id: u32, payload: &[u8]) -> DecodedMessage {
        FrameDecoder::decode(&self.table.read(), can_id, payload)
    }

    /// Copy of one series, oldest first (empty if absent)
    pub fn series(&self, key: &SeriesKey) -> Vec<Sample> {
        self.store.read().snapshot(key)
    }

    pub fn latest(&self, key: &SeriesKey) -> Option<Sample> {
        self.store.read().latest(key)
    }

    /// Keys of all stored series, sorted
    pub fn series_keys(&self) -> Vec<SeriesKey> {
        self.store.read().keys()
    }

    /// Copy of every stored series
    pub fn snapshot(&self) -> Vec<(SeriesKey, Vec<Sample>)> {
        let store = self.store.read();
        store
            .keys()
            .into_iter()
            .map(|key| {
                let samples = store.snapshot(&key);
                (key, samples)
            })
            .collect()
    }

    /// Drop all stored samples
    pub fn clear_data(&self) {
        self.store.write().clear();
        log::info!("Data cleared");
    }

    pub fn history_capacity(&self) -> usize {
        self.store.read().capacity()
    }

    /// Change the per-series capacity; applies from the next append
    pub fn set_history_capacity(&mut self, capacity: usize) {
        self.config.history_capacity = capacity;
        self.store.write().set_capacity(capacity);
    }

    // ------------------------------------------------------------------
    // Watch list
    // ------------------------------------------------------------------

    /// Select a series for display
    pub fn watch(&mut self, key: SeriesKey) -> Result<()> {
        let known = {
            let table = self.table.read();
            table.has_custom_decoder(key.can_id)
                || table.get_signal(key.can_id, &key.signal).is_some()
        };
        if !known {
            return Err(DecoderError::SignalNotFound {
                can_id: key.can_id,
                name: key.signal,
            });
        }
        self.watched.insert(key);
        Ok(())
    }

    pub fn unwatch(&mut self, key: &SeriesKey) -> bool {
        self.watched.remove(key)
    }

    pub fn watched(&self) -> Vec<SeriesKey> {
        self.watched.iter().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Session control
    // ------------------------------------------------------------------

    /// Start ingesting from `source`
    ///
    /// Fails with [`DecoderError::NotConnected`] if the source is not ready.
    /// Starting a running session is a no-op.
    pub fn start<S>(&mut self, source: S) -> Result<()>
    where
        S: FrameSource + 'static,
    {
        if self.pipeline.is_some() {
            log::warn!("Session already running; start ignored");
            return Ok(());
        }

        if !source.is_connected() {
            return Err(DecoderError::NotConnected);
        }

        let pipeline = IngestionPipeline::spawn(
            source,
            Arc::clone(&self.table),
            Arc::clone(&self.store),
            &self.config,
        )?;
        self.pipeline = Some(pipeline);

        log::info!("Capture started");
        Ok(())
    }

    /// Stop ingesting and wait for the pipeline threads to exit
    ///
    /// Safe to call on an idle session.
    pub fn stop(&mut self) -> PipelineStats {
        if let Some(mut pipeline) = self.pipeline.take() {
            self.last_stats = pipeline.stop();
            log::info!(
                "Capture stopped: {} frames received, {} decoded, {} dropped",
                self.last_stats.frames_received,
                self.last_stats.frames_decoded,
                self.last_stats.frames_dropped
            );
        }
        self.last_stats
    }

    pub fn is_running(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Live counters while running, else those of the last run
    pub fn stats(&self) -> PipelineStats {
        self.pipeline
            .as_ref()
            .map(IngestionPipeline::stats)
            .unwrap_or(self.last_stats)
    }

    /// Block until the source is exhausted and every queued frame has been
    /// decoded, or until `timeout` elapses
    ///
    /// Returns whether the pipeline drained. An idle session counts as drained.
    pub fn wait_until_drained(&self, timeout: Duration) -> bool {
        let Some(pipeline) = self.pipeline.as_ref() else {
            return true;
        };

        let deadline = Instant::now() + timeout;
        loop {
            if pipeline.is_drained() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(DRAIN_POLL_INTERVAL);
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self {
            table: Arc::new(RwLock::new(SignalTable::new())),
            store: Arc::new(RwLock::new(TimeSeriesStore::default())),
            watched: BTreeSet::new(),
            pipeline: None,
            last_stats: PipelineStats::default(),
            config: SessionConfig::default(),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}
