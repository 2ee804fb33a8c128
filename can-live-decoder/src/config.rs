//! Session and signal configuration types
//!
//! `SessionConfig` tunes the ingestion pipeline and the series store.
//! `SignalConfig` is the declarative form of a signal layout used by config
//! files and the preset catalogue.

use crate::signals::{ByteOrder, SignalSpec, ValueType};
use crate::store::DEFAULT_HISTORY_CAPACITY;
use crate::types::{CanFrame, DecoderError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the reader does when the hand-off queue is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the oldest queued frame to make room (reader never stalls)
    #[default]
    DropOldest,
    /// Wait for room, re-checking the stop flag every poll timeout
    Block,
}

/// Configuration for a decoding session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Samples retained per series
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Frames buffered between the reader and the worker
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Behaviour when the hand-off queue is full
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,

    /// Bus receive timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub receive_timeout_ms: u64,

    /// Worker queue poll timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Optional: only ingest these CAN IDs
    #[serde(default)]
    pub message_filter: Option<Vec<u32>>,

    /// Optional: drop frames with a declared length below this
    #[serde(default)]
    pub min_dlc: Option<u8>,

    /// Optional: drop frames with a declared length above this
    #[serde(default)]
    pub max_dlc: Option<u8>,
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_queue_capacity() -> usize {
    4096
}

fn default_timeout_ms() -> u64 {
    100
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            queue_capacity: default_queue_capacity(),
            overflow_policy: OverflowPolicy::default(),
            receive_timeout_ms: default_timeout_ms(),
            poll_timeout_ms: default_timeout_ms(),
            message_filter: None,
            min_dlc: None,
            max_dlc: None,
        }
    }
}

impl SessionConfig {
    /// Create a session configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: samples retained per series
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Builder method: hand-off queue size and overflow behaviour
    pub fn with_queue(mut self, capacity: usize, policy: OverflowPolicy) -> Self {
        self.queue_capacity = capacity;
        self.overflow_policy = policy;
        self
    }

    /// Builder method: receive and poll timeouts
    pub fn with_timeouts(mut self, receive_ms: u64, poll_ms: u64) -> Self {
        self.receive_timeout_ms = receive_ms;
        self.poll_timeout_ms = poll_ms;
        self
    }

    /// Builder method: set message filter
    pub fn with_message_filter(mut self, messages: Vec<u32>) -> Self {
        self.message_filter = Some(messages);
        self
    }

    /// Builder method: set the accepted DLC range
    pub fn with_dlc_range(mut self, min_dlc: Option<u8>, max_dlc: Option<u8>) -> Self {
        self.min_dlc = min_dlc;
        self.max_dlc = max_dlc;
        self
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(DecoderError::ConfigError(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.receive_timeout_ms == 0 || self.poll_timeout_ms == 0 {
            return Err(DecoderError::ConfigError(
                "receive and poll timeouts must be non-zero".to_string(),
            ));
        }
        if let (Some(min), Some(max)) = (self.min_dlc, self.max_dlc) {
            if min > max {
                return Err(DecoderError::ConfigError(format!(
                    "min_dlc {} is greater than max_dlc {}",
                    min, max
                )));
            }
        }
        Ok(())
    }

    /// Check if a message ID should be ingested
    pub fn should_process_message(&self, can_id: u32) -> bool {
        match &self.message_filter {
            Some(messages) => messages.contains(&can_id),
            None => true,
        }
    }

    /// Check if a frame passes the ID and DLC filters
    pub fn should_process_frame(&self, frame: &CanFrame) -> bool {
        let dlc = frame.dlc();
        self.should_process_message(frame.can_id())
            && self.min_dlc.map_or(true, |min| dlc >= min)
            && self.max_dlc.map_or(true, |max| dlc <= max)
    }
}

/// Shorthand field types for byte-aligned signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    #[serde(rename = "uint8")]
    Uint8,
    #[serde(rename = "int8")]
    Int8,
    #[serde(rename = "uint16_le")]
    Uint16Le,
    #[serde(rename = "uint16_be")]
    Uint16Be,
    #[serde(rename = "int16_le")]
    Int16Le,
    #[serde(rename = "int16_be")]
    Int16Be,
}

impl DataType {
    /// `(length, value type, byte order)` of this shorthand
    pub fn layout(self) -> (u16, ValueType, ByteOrder) {
        use ByteOrder::*;
        use ValueType::*;
        match self {
            DataType::Uint8 => (8, Unsigned, LittleEndian),
            DataType::Int8 => (8, Signed, LittleEndian),
            DataType::Uint16Le => (16, Unsigned, LittleEndian),
            DataType::Uint16Be => (16, Unsigned, BigEndian),
            DataType::Int16Le => (16, Signed, LittleEndian),
            DataType::Int16Be => (16, Signed, BigEndian),
        }
    }
}

/// Declarative signal definition
///
/// Either `data_type` (with `byte_index` or `start_bit`) or an explicit
/// `start_bit` + `length` layout must be given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_index: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_bit: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u16>,

    /// Explicit layouts only; defaults to unsigned. Definitions ported from
    /// tools that treat fields as signed by default must set `signed = true`.
    #[serde(default)]
    pub signed: bool,

    /// Explicit layouts only; defaults to little-endian
    #[serde(default = "default_byte_order")]
    pub byte_order: ByteOrder,

    #[serde(default = "default_scale")]
    pub scale: f64,

    #[serde(default)]
    pub offset: f64,

    #[serde(default)]
    pub unit: String,
}

fn default_byte_order() -> ByteOrder {
    ByteOrder::LittleEndian
}

fn default_scale() -> f64 {
    1.0
}

impl SignalConfig {
    /// Byte-aligned signal described by a data type shorthand
    pub fn typed(name: impl Into<String>, byte_index: u16, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type: Some(data_type),
            byte_index: Some(byte_index),
            start_bit: None,
            length: None,
            signed: false,
            byte_order: default_byte_order(),
            scale: default_scale(),
            offset: 0.0,
            unit: String::new(),
        }
    }

    /// Signal with an explicit bit layout
    pub fn bits(
        name: impl Into<String>,
        start_bit: u16,
        length: u16,
        signed: bool,
        byte_order: ByteOrder,
    ) -> Self {
        Self {
            name: name.into(),
            data_type: None,
            byte_index: None,
            start_bit: Some(start_bit),
            length: Some(length),
            signed,
            byte_order,
            scale: default_scale(),
            offset: 0.0,
            unit: String::new(),
        }
    }

    /// Builder method: physical conversion and unit
    pub fn scaled(mut self, scale: f64, offset: f64, unit: impl Into<String>) -> Self {
        self.scale = scale;
        self.offset = offset;
        self.unit = unit.into();
        self
    }

    /// Resolve into a validated [`SignalSpec`]
    pub fn to_spec(&self) -> Result<SignalSpec> {
        let invalid = |msg: &str| {
            DecoderError::InvalidSignalDefinition(format!("signal '{}': {}", self.name, msg))
        };

        let start_bit = match (self.start_bit, self.byte_index) {
            (Some(_), Some(_)) => return Err(invalid("give either start_bit or byte_index, not both")),
            (Some(bit), None) => bit,
            (None, Some(byte)) => byte
                .checked_mul(8)
                .ok_or_else(|| invalid("byte_index out of range"))?,
            (None, None) => return Err(invalid("missing start_bit or byte_index")),
        };

        let (length, value_type, byte_order) = match self.data_type {
            Some(data_type) => {
                if self.length.is_some() {
                    return Err(invalid("length is implied by data_type"));
                }
                data_type.layout()
            }
            None => {
                let length = self.length.ok_or_else(|| invalid("missing length"))?;
                let value_type = if self.signed {
                    ValueType::Signed
                } else {
                    ValueType::Unsigned
                };
                (length, value_type, self.byte_order)
            }
        };

        SignalSpec::new(
            self.name.clone(),
            start_bit,
            length,
            byte_order,
            value_type,
            self.scale,
            self.offset,
            self.unit.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_builder() {
        let config = SessionConfig::new()
            .with_history_capacity(50)
            .with_queue(16, OverflowPolicy::Block)
            .with_timeouts(20, 30)
            .with_message_filter(vec![0x259, 0x25E]);

        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.overflow_policy, OverflowPolicy::Block);
        assert_eq!(config.receive_timeout(), Duration::from_millis(20));
        assert_eq!(config.poll_timeout(), Duration::from_millis(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_queue() {
        let config = SessionConfig::new().with_queue(0, OverflowPolicy::DropOldest);
        assert!(matches!(config.validate(), Err(DecoderError::ConfigError(_))));

        let config = SessionConfig::new().with_dlc_range(Some(8), Some(2));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_frame_filter_logic() {
        let config = SessionConfig::new()
            .with_message_filter(vec![0x123])
            .with_dlc_range(Some(2), Some(8));

        let ok = CanFrame::new(0x123, &[1, 2]).unwrap();
        let wrong_id = CanFrame::new(0x124, &[1, 2]).unwrap();
        let too_short = CanFrame::new(0x123, &[1]).unwrap();

        assert!(config.should_process_frame(&ok));
        assert!(!config.should_process_frame(&wrong_id));
        assert!(!config.should_process_frame(&too_short));
    }

    #[test]
    fn test_no_filters() {
        let config = SessionConfig::new();
        let frame = CanFrame::new(0x1FFF_FFFF, &[]).unwrap();
        assert!(config.should_process_frame(&frame));
    }

    #[test]
    fn test_typed_signal_to_spec() {
        let spec = SignalConfig::typed("temperature", 2, DataType::Int16Be)
            .scaled(0.1, -40.0, "°C")
            .to_spec()
            .unwrap();

        assert_eq!(spec.start_bit(), 16);
        assert_eq!(spec.length(), 16);
        assert_eq!(spec.value_type(), ValueType::Signed);
        assert_eq!(spec.byte_order(), ByteOrder::BigEndian);
        assert_eq!(spec.offset(), -40.0);
    }

    #[test]
    fn test_explicit_signal_to_spec() {
        let spec = SignalConfig::bits("flag", 13, 1, false, ByteOrder::LittleEndian)
            .to_spec()
            .unwrap();
        assert_eq!(spec.start_bit(), 13);
        assert_eq!(spec.length(), 1);
    }

    #[test]
    fn test_signal_config_errors() {
        let mut missing = SignalConfig::bits("a", 0, 8, false, ByteOrder::LittleEndian);
        missing.start_bit = None;
        assert!(missing.to_spec().is_err());

        let mut conflicting = SignalConfig::typed("a", 0, DataType::Uint8);
        conflicting.length = Some(4);
        assert!(conflicting.to_spec().is_err());

        // Field would end past byte 7
        assert!(SignalConfig::typed("a", 7, DataType::Uint16Le).to_spec().is_err());
    }

    #[test]
    fn test_explicit_layout_defaults_to_unsigned() {
        let implicit: SignalConfig =
            serde_json::from_str(r#"{"name": "level", "start_bit": 0, "length": 8}"#).unwrap();
        assert!(!implicit.signed);
        assert_eq!(implicit.to_spec().unwrap().value_type(), ValueType::Unsigned);

        let explicit: SignalConfig = serde_json::from_str(
            r#"{"name": "level", "start_bit": 0, "length": 8, "signed": true}"#,
        )
        .unwrap();
        assert_eq!(explicit.to_spec().unwrap().value_type(), ValueType::Signed);
    }
}
