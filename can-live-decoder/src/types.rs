//! Core types for the live CAN decoder library
//!
//! This module defines the fundamental values that flow through the decoder:
//! frames handed over by the bus collaborator, decoded signal values, and the
//! samples retained in the time-series store.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Timestamp type used throughout the decoder
pub type Timestamp = DateTime<Utc>;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Maximum payload of a classic CAN frame
pub const MAX_PAYLOAD_LEN: usize = 8;

/// Raw CAN frame as delivered by the bus collaborator
///
/// The payload is stored inline; frames are immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    can_id: u32,
    data: [u8; MAX_PAYLOAD_LEN],
    len: u8,
    dlc: u8,
    is_extended: bool,
    is_remote_frame: bool,
    is_error_frame: bool,
}

impl CanFrame {
    /// Create a data frame. The declared length (DLC) equals the payload length.
    pub fn new(can_id: u32, payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(DecoderError::InvalidFrame(format!(
                "payload of {} bytes exceeds {} bytes (CAN ID 0x{:X})",
                payload.len(),
                MAX_PAYLOAD_LEN,
                can_id
            )));
        }

        let mut data = [0u8; MAX_PAYLOAD_LEN];
        data[..payload.len()].copy_from_slice(payload);

        Ok(Self {
            can_id,
            data,
            len: payload.len() as u8,
            dlc: payload.len() as u8,
            is_extended: can_id > 0x7FF,
            is_remote_frame: false,
            is_error_frame: false,
        })
    }

    /// Override the declared length (some drivers report a DLC that differs
    /// from the number of bytes actually delivered)
    pub fn with_dlc(mut self, dlc: u8) -> Self {
        self.dlc = dlc;
        self
    }

    /// Mark the identifier as extended (29-bit) or standard (11-bit)
    pub fn with_extended(mut self, is_extended: bool) -> Self {
        self.is_extended = is_extended;
        self
    }

    /// Mark this frame as a remote or error frame
    pub fn with_flags(mut self, is_remote_frame: bool, is_error_frame: bool) -> Self {
        self.is_remote_frame = is_remote_frame;
        self.is_error_frame = is_error_frame;
        self
    }

    pub fn can_id(&self) -> u32 {
        self.can_id
    }

    /// Payload bytes actually delivered
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// Declared data length code
    pub fn dlc(&self) -> u8 {
        self.dlc
    }

    pub fn is_extended(&self) -> bool {
        self.is_extended
    }

    pub fn is_remote_frame(&self) -> bool {
        self.is_remote_frame
    }

    pub fn is_error_frame(&self) -> bool {
        self.is_error_frame
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_extended {
            write!(f, "{:08X}#", self.can_id)?;
        } else {
            write!(f, "{:03X}#", self.can_id)?;
        }
        for byte in self.payload() {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// A frame stamped with its arrival time by the reader task
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimestampedFrame {
    pub timestamp: Timestamp,
    pub frame: CanFrame,
}

/// Source of arrival timestamps
///
/// Anchors one wall-clock reading to a monotonic [`Instant`] so that stamps
/// taken from the same clock never go backwards, even if the system clock is
/// adjusted mid-session.
#[derive(Debug, Clone, Copy)]
pub struct ArrivalClock {
    wall_anchor: Timestamp,
    mono_anchor: Instant,
}

impl ArrivalClock {
    pub fn new() -> Self {
        Self {
            wall_anchor: Utc::now(),
            mono_anchor: Instant::now(),
        }
    }

    /// Current arrival time
    pub fn now(&self) -> Timestamp {
        let elapsed = self.mono_anchor.elapsed();
        let elapsed = ChronoDuration::from_std(elapsed).unwrap_or_else(|_| ChronoDuration::zero());
        self.wall_anchor + elapsed
    }

    /// Wall-clock time at which this clock was created
    pub fn started_at(&self) -> Timestamp {
        self.wall_anchor
    }
}

impl Default for ArrivalClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur during decoding and session control
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Signal '{signal}' ends at byte {end_byte} but payload only has {payload_len} bytes")]
    FieldOutOfRange {
        signal: String,
        end_byte: usize,
        payload_len: usize,
    },

    #[error("Invalid signal definition: {0}")]
    InvalidSignalDefinition(String),

    #[error("Signal '{name}' is already registered for CAN ID 0x{can_id:X}")]
    DuplicateSignal { can_id: u32, name: String },

    #[error("Signal '{name}' not found for CAN ID 0x{can_id:X}")]
    SignalNotFound { can_id: u32, name: String },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Bus source is not connected")]
    NotConnected,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors reported by a bus source's receive operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// A hiccup on the bus; the reader logs it and keeps going
    #[error("Transient receive error: {0}")]
    Transient(String),

    /// The source is gone (device unplugged, replay exhausted)
    #[error("Bus disconnected: {0}")]
    Disconnected(String),
}

/// One decoded signal value from a frame
///
/// `value` is `None` when the signal could not be extracted from the payload
/// (e.g. the frame was shorter than the field requires).
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSignal {
    /// Signal name
    pub name: String,
    /// Physical value after scale and offset
    pub value: Option<f64>,
    /// Engineering unit (e.g., "V", "°C"); empty when unknown
    pub unit: String,
}

impl DecodedSignal {
    pub fn new(name: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            name: name.into(),
            value,
            unit: String::new(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }
}

/// All decoded signals of one frame, in registration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedMessage {
    pub signals: Vec<DecodedSignal>,
}

impl DecodedMessage {
    /// Look up a signal by name. The outer `Option` is `None` when the name
    /// is absent, the inner one when it was present but failed to decode.
    pub fn get(&self, name: &str) -> Option<Option<f64>> {
        self.signals.iter().find(|s| s.name == name).map(|s| s.value)
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Iterate over `(name, value)` pairs that decoded successfully
    pub fn values(&self) -> impl Iterator<Item = (&str, f64)> {
        self.signals
            .iter()
            .filter_map(|s| s.value.map(|v| (s.name.as_str(), v)))
    }
}

impl From<Vec<DecodedSignal>> for DecodedMessage {
    fn from(signals: Vec<DecodedSignal>) -> Self {
        Self { signals }
    }
}

/// Identifies one logical time series
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub can_id: u32,
    pub signal: String,
}

impl SeriesKey {
    pub fn new(can_id: u32, signal: impl Into<String>) -> Self {
        Self {
            can_id,
            signal: signal.into(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}/{}", self.can_id, self.signal)
    }
}

/// A decoded physical value with its arrival time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: Timestamp,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Seconds elapsed between `origin` and this sample
    pub fn elapsed_secs(&self, origin: Timestamp) -> f64 {
        let delta = self.timestamp - origin;
        match delta.num_nanoseconds() {
            Some(ns) => ns as f64 / 1_000_000_000.0,
            None => delta.num_milliseconds() as f64 / 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rejects_long_payload() {
        let result = CanFrame::new(0x123, &[0u8; 9]);
        assert!(matches!(result, Err(DecoderError::InvalidFrame(_))));
    }

    #[test]
    fn test_frame_payload_and_dlc() {
        let frame = CanFrame::new(0x259, &[0xD7, 0x03]).unwrap();
        assert_eq!(frame.payload(), &[0xD7, 0x03]);
        assert_eq!(frame.dlc(), 2);
        assert!(!frame.is_extended());

        let frame = frame.with_dlc(8);
        assert_eq!(frame.dlc(), 8);
        assert_eq!(frame.payload().len(), 2);
    }

    #[test]
    fn test_frame_display() {
        let frame = CanFrame::new(0x123, &[0xDE, 0xAD]).unwrap();
        assert_eq!(frame.to_string(), "123#DEAD");

        let frame = CanFrame::new(0x18FF_0001, &[0x01]).unwrap();
        assert_eq!(frame.to_string(), "18FF0001#01");
    }

    #[test]
    fn test_arrival_clock_is_monotonic() {
        let clock = ArrivalClock::new();
        let mut last = clock.started_at();
        for _ in 0..1000 {
            let now = clock.now();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_sample_elapsed_secs() {
        let origin = Utc::now();
        let sample = Sample::new(origin + ChronoDuration::milliseconds(1500), 1.0);
        assert!((sample.elapsed_secs(origin) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_decoded_message_lookup() {
        let message = DecodedMessage::from(vec![
            DecodedSignal::new("voltage", Some(12.5)).with_unit("V"),
            DecodedSignal::new("current", None),
        ]);

        assert_eq!(message.get("voltage"), Some(Some(12.5)));
        assert_eq!(message.get("current"), Some(None));
        assert_eq!(message.get("missing"), None);
        assert_eq!(message.values().count(), 1);
    }

    #[test]
    fn test_series_key_display() {
        assert_eq!(SeriesKey::new(0x259, "voltage").to_string(), "0x259/voltage");
    }
}
