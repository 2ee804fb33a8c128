//! Signal layout definitions
//!
//! A [`SignalSpec`] describes how one physical quantity is packed into a frame
//! payload. Specs are validated once at construction and immutable afterwards.

use crate::types::{DecoderError, Result, MAX_PAYLOAD_LEN};
use serde::{Deserialize, Serialize};

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Two's-complement signed integer
    Signed,
    /// Unsigned integer
    Unsigned,
}

/// Bit-field to physical value mapping for one signal
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSpec {
    name: String,
    start_bit: u16,
    length: u16,
    byte_order: ByteOrder,
    value_type: ValueType,
    scale: f64,
    offset: f64,
    unit: String,
}

impl SignalSpec {
    /// Create a signal spec, rejecting layouts that can never be decoded
    ///
    /// # Arguments
    /// * `name` - Signal name, unique within its identifier
    /// * `start_bit` - First bit of the field (bit 0 = LSB of byte 0)
    /// * `length` - Field width in bits (1..=64)
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        start_bit: u16,
        length: u16,
        byte_order: ByteOrder,
        value_type: ValueType,
        scale: f64,
        offset: f64,
        unit: impl Into<String>,
    ) -> Result<Self> {
        let spec = Self {
            name: name.into(),
            start_bit,
            length,
            byte_order,
            value_type,
            scale,
            offset,
            unit: unit.into(),
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Shorthand for an unscaled little-endian unsigned field
    pub fn raw(name: impl Into<String>, start_bit: u16, length: u16) -> Result<Self> {
        Self::new(
            name,
            start_bit,
            length,
            ByteOrder::LittleEndian,
            ValueType::Unsigned,
            1.0,
            0.0,
            "",
        )
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DecoderError::InvalidSignalDefinition(
                "signal name must not be empty".to_string(),
            ));
        }

        if self.length == 0 || self.length > 64 {
            return Err(DecoderError::InvalidSignalDefinition(format!(
                "signal '{}': bit length {} is outside 1..=64",
                self.name, self.length
            )));
        }

        let max_bits = (MAX_PAYLOAD_LEN * 8) as u32;
        if self.start_bit as u32 + self.length as u32 > max_bits {
            return Err(DecoderError::InvalidSignalDefinition(format!(
                "signal '{}': bits {}..{} do not fit in a {}-byte payload",
                self.name,
                self.start_bit,
                self.start_bit as u32 + self.length as u32,
                MAX_PAYLOAD_LEN
            )));
        }

        if !self.scale.is_finite() || !self.offset.is_finite() {
            return Err(DecoderError::InvalidSignalDefinition(format!(
                "signal '{}': scale and offset must be finite",
                self.name
            )));
        }

        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_bit(&self) -> u16 {
        self.start_bit
    }

    pub fn length(&self) -> u16 {
        self.length
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn is_signed(&self) -> bool {
        self.value_type == ValueType::Signed
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Inclusive byte span `(first, last)` covered by this field
    pub fn byte_span(&self) -> (usize, usize) {
        let start = self.start_bit as usize;
        let end = start + self.length as usize - 1;
        (start / 8, end / 8)
    }
}
