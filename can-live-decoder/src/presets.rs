//! Predefined identifiers and decoders
//!
//! Catalogue of the analog-input module's frames: identifier constants,
//! display names, the decoders loaded at start-up and the wider example set
//! per identifier. Also provides fixed-width helpers for assembling custom
//! decoders.
//!
//! Raw values on this module are uint16 little-endian (`b0 + b1 << 8`), e.g.
//! 0x259 carries analog input 1 in bytes 0-1 (raw 0xD703 = 55043) and 0x25E
//! carries the internal voltage in bytes 2-3 and the temperature in bytes 4-5.

use crate::config::{DataType, SignalConfig};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

pub const CAN_ID_KEEP_ALIVE: u32 = 600;
pub const CAN_ID_AIN1_4: u32 = 601;
pub const CAN_ID_AIN5_8: u32 = 602;
pub const CAN_ID_AIN9_12: u32 = 603;
pub const CAN_ID_AIN13_16: u32 = 604;
pub const CAN_ID_AIN17_20: u32 = 605;
pub const CAN_ID_AIN21_TEMP: u32 = 606;

/// `(identifier, short name, display name)` of every known frame
pub const KNOWN_IDS: &[(u32, &str, &str)] = &[
    (CAN_ID_KEEP_ALIVE, "KEEP_ALIVE", "Keep Alive"),
    (CAN_ID_AIN1_4, "AIN1_4", "Analog Inputs 1-4"),
    (CAN_ID_AIN5_8, "AIN5_8", "Analog Inputs 5-8"),
    (CAN_ID_AIN9_12, "AIN9_12", "Analog Inputs 9-12"),
    (CAN_ID_AIN13_16, "AIN13_16", "Analog Inputs 13-16"),
    (CAN_ID_AIN17_20, "AIN17_20", "Analog Inputs 17-20"),
    (CAN_ID_AIN21_TEMP, "AIN21_temp", "Analog Input 21 / Temperature"),
];

/// Human-readable name of an identifier, `0x{id:X}` if unknown
pub fn identifier_name(can_id: u32) -> String {
    KNOWN_IDS
        .iter()
        .find(|(id, _, _)| *id == can_id)
        .map(|(_, _, name)| name.to_string())
        .unwrap_or_else(|| format!("0x{:X}", can_id))
}

/// Look up an identifier by its short name (e.g. "AIN5_8")
pub fn identifier_by_short_name(short_name: &str) -> Option<u32> {
    KNOWN_IDS
        .iter()
        .find(|(_, short, _)| short.eq_ignore_ascii_case(short_name))
        .map(|(id, _, _)| *id)
}

fn millis(name: &str, byte_index: u16, unit: &str) -> SignalConfig {
    SignalConfig::typed(name, byte_index, DataType::Uint16Le).scaled(0.001, 0.0, unit)
}

fn raw16(name: &str, byte_index: u16) -> SignalConfig {
    SignalConfig::typed(name, byte_index, DataType::Uint16Le).scaled(1.0, 0.0, "raw")
}

/// Decoders registered automatically at start-up
///
/// Scales assume millivolt / milli-degree resolution; adjust to the sensor
/// calibration if values look off by a decade.
pub fn default_signals() -> Vec<(u32, SignalConfig)> {
    vec![
        (CAN_ID_AIN1_4, millis("analog_voltage_in1", 0, "V")),
        (CAN_ID_AIN21_TEMP, millis("internal_voltage", 2, "V")),
        (CAN_ID_AIN21_TEMP, millis("temperature", 4, "°C")),
    ]
}

/// Example decoders for one identifier (empty if none are known)
pub fn example_signals(can_id: u32) -> Vec<SignalConfig> {
    let four_inputs = |first: u16| -> Vec<SignalConfig> {
        (0..4)
            .map(|i| raw16(&format!("AIN{}", first + i), i * 2))
            .collect()
    };

    match can_id {
        CAN_ID_AIN1_4 => vec![
            millis("analog_voltage_in1", 0, "V"),
            raw16("analog_voltage_in1_raw", 0),
        ],
        CAN_ID_AIN5_8 => four_inputs(5),
        CAN_ID_AIN9_12 => four_inputs(9),
        CAN_ID_AIN13_16 => four_inputs(13),
        CAN_ID_AIN17_20 => four_inputs(17),
        CAN_ID_AIN21_TEMP => vec![
            millis("internal_voltage", 2, "V"),
            millis("temperature", 4, "°C"),
            raw16("internal_voltage_raw", 2),
            raw16("temperature_raw", 4),
        ],
        _ => Vec::new(),
    }
}

/// Quick-entry templates for the two most common signal kinds
pub fn voltage_template() -> SignalConfig {
    SignalConfig::typed("voltage", 0, DataType::Uint16Le).scaled(0.1, 0.0, "V")
}

pub fn temperature_template() -> SignalConfig {
    SignalConfig::typed("temperature", 2, DataType::Int16Le).scaled(0.1, -40.0, "°C")
}

// ----------------------------------------------------------------------
// Fixed-width helpers for custom decoders
// ----------------------------------------------------------------------

/// Unsigned byte at `byte_index`, scaled
pub fn decode_voltage_8bit(data: &[u8], byte_index: usize, scale: f64) -> Option<f64> {
    data.get(byte_index).map(|&b| b as f64 * scale)
}

/// Unsigned 16-bit word at `byte_index`, scaled and offset
pub fn decode_voltage_16bit(
    data: &[u8],
    byte_index: usize,
    scale: f64,
    offset: f64,
    little_endian: bool,
) -> Option<f64> {
    let bytes = data.get(byte_index..byte_index.checked_add(2)?)?;
    let raw = if little_endian {
        LittleEndian::read_u16(bytes)
    } else {
        BigEndian::read_u16(bytes)
    };
    Some(raw as f64 * scale + offset)
}

/// Unsigned byte at `byte_index`; typical sensors use offset -40
pub fn decode_temperature_8bit(data: &[u8], byte_index: usize, scale: f64, offset: f64) -> Option<f64> {
    data.get(byte_index).map(|&b| b as f64 * scale + offset)
}

/// Signed 16-bit word at `byte_index`, scaled and offset
pub fn decode_signed_16bit(
    data: &[u8],
    byte_index: usize,
    scale: f64,
    offset: f64,
    little_endian: bool,
) -> Option<f64> {
    let bytes = data.get(byte_index..byte_index.checked_add(2)?)?;
    let raw = if little_endian {
        LittleEndian::read_i16(bytes)
    } else {
        BigEndian::read_i16(bytes)
    };
    Some(raw as f64 * scale + offset)
}

/// Signed 16-bit temperature (default scale 0.1, offset -40)
pub fn decode_temperature_16bit(data: &[u8], byte_index: usize, little_endian: bool) -> Option<f64> {
    decode_signed_16bit(data, byte_index, 0.1, -40.0, little_endian)
}

/// Signed 16-bit current (default scale 0.01, offset -327.68)
pub fn decode_current_16bit(data: &[u8], byte_index: usize, little_endian: bool) -> Option<f64> {
    decode_signed_16bit(data, byte_index, 0.01, -327.68, little_endian)
}
