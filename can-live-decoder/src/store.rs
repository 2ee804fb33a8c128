//! Bounded time-series store
//!
//! Keeps the most recent samples of every (identifier, signal) series. Each
//! series is a FIFO capped at a store-wide capacity; the oldest sample is
//! evicted first. Changing the capacity does not truncate existing series,
//! they are trimmed on their next append.

use crate::types::{Sample, SeriesKey};
use std::collections::{HashMap, VecDeque};

/// Default number of samples retained per series
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Per-series bounded sample buffers
#[derive(Debug, Clone)]
pub struct TimeSeriesStore {
    series: HashMap<SeriesKey, VecDeque<Sample>>,
    capacity: usize,
}

impl TimeSeriesStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            series: HashMap::new(),
            capacity,
        }
    }

    /// Append a sample, then evict the oldest while over capacity
    ///
    /// With a capacity of zero nothing is retained.
    pub fn append(&mut self, key: SeriesKey, sample: Sample) {
        if self.capacity == 0 {
            return;
        }

        let buffer = self.series.entry(key).or_default();
        buffer.push_back(sample);
        while buffer.len() > self.capacity {
            buffer.pop_front();
        }
    }

    /// Samples of one series, oldest first
    pub fn get(&self, key: &SeriesKey) -> Option<&VecDeque<Sample>> {
        self.series.get(key)
    }

    /// Owned copy of one series (empty if absent)
    pub fn snapshot(&self, key: &SeriesKey) -> Vec<Sample> {
        self.series
            .get(key)
            .map(|buffer| buffer.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Most recent sample of one series
    pub fn latest(&self, key: &SeriesKey) -> Option<Sample> {
        self.series.get(key).and_then(|buffer| buffer.back().copied())
    }

    /// Drop one series; returns whether it existed
    pub fn remove(&mut self, key: &SeriesKey) -> bool {
        self.series.remove(key).is_some()
    }

    /// Drop every series belonging to `can_id`
    pub fn remove_identifier(&mut self, can_id: u32) {
        self.series.retain(|key, _| key.can_id != can_id);
    }

    /// Empty the whole store
    pub fn clear(&mut self) {
        self.series.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Takes effect on subsequent appends
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    /// Keys of all series, sorted
    pub fn keys(&self) -> Vec<SeriesKey> {
        let mut keys: Vec<SeriesKey> = self.series.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of series
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Total number of samples across all series
    pub fn total_samples(&self) -> usize {
        self.series.values().map(VecDeque::len).sum()
    }
}

impl Default for TimeSeriesStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn samples(n: usize) -> Vec<Sample> {
        let origin = Utc::now();
        (0..n)
            .map(|i| Sample::new(origin + Duration::milliseconds(i as i64), i as f64))
            .collect()
    }

    fn values(store: &TimeSeriesStore, key: &SeriesKey) -> Vec<f64> {
        store.snapshot(key).iter().map(|s| s.value).collect()
    }

    #[test]
    fn test_eviction_keeps_newest() {
        let mut store = TimeSeriesStore::new(3);
        let key = SeriesKey::new(0x259, "analog_voltage_in1");

        for sample in samples(5) {
            store.append(key.clone(), sample);
        }

        assert_eq!(values(&store, &key), vec![2.0, 3.0, 4.0]);
        assert_eq!(store.latest(&key).map(|s| s.value), Some(4.0));
    }

    #[test]
    fn test_zero_capacity_is_noop() {
        let mut store = TimeSeriesStore::new(0);
        let key = SeriesKey::new(1, "a");
        store.append(key.clone(), samples(1)[0]);

        assert!(store.get(&key).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_capacity_change_is_lazy() {
        let mut store = TimeSeriesStore::new(10);
        let key = SeriesKey::new(1, "a");
        let all = samples(7);
        for sample in &all[..6] {
            store.append(key.clone(), *sample);
        }

        store.set_capacity(2);
        assert_eq!(store.snapshot(&key).len(), 6);

        store.append(key.clone(), all[6]);
        assert_eq!(values(&store, &key), vec![5.0, 6.0]);
    }

    #[test]
    fn test_series_are_independent() {
        let mut store = TimeSeriesStore::new(2);
        let a = SeriesKey::new(1, "a");
        let b = SeriesKey::new(1, "b");
        let data = samples(3);

        for sample in &data {
            store.append(a.clone(), *sample);
        }
        store.append(b.clone(), data[0]);

        assert_eq!(values(&store, &a), vec![1.0, 2.0]);
        assert_eq!(values(&store, &b), vec![0.0]);
        assert_eq!(store.total_samples(), 3);
        assert_eq!(store.keys(), vec![a, b]);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut store = TimeSeriesStore::default();
        let a = SeriesKey::new(1, "a");
        let b = SeriesKey::new(2, "b");
        store.append(a.clone(), samples(1)[0]);
        store.append(b.clone(), samples(1)[0]);

        assert!(store.remove(&a));
        assert!(!store.remove(&a));
        assert!(store.snapshot(&a).is_empty());

        store.remove_identifier(2);
        assert!(store.is_empty());

        store.append(a.clone(), samples(1)[0]);
        store.clear();
        assert_eq!(store.len(), 0);
        assert_eq!(store.capacity(), DEFAULT_HISTORY_CAPACITY);
    }
}
