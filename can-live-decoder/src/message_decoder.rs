//! Frame decoding
//!
//! Applies the signal table to one payload. Signal-level failures are absorbed
//! here: a field that does not fit the payload yields a `None` value for that
//! signal and never stops the other signals of the frame from decoding.

use crate::bitfield::BitFieldCodec;
use crate::signals::{DecodeStrategy, SignalSpec, SignalTable};
use crate::types::{DecodedMessage, DecodedSignal};

/// Frame decoder - turns a payload into named physical values
pub struct FrameDecoder;

impl FrameDecoder {
    /// Decode a payload received under `can_id`
    ///
    /// # Returns
    /// * The custom decoder's output verbatim, if one is registered
    /// * Otherwise one entry per registered signal, `None` where extraction failed
    /// * An empty message for identifiers with nothing registered
    pub fn decode(table: &SignalTable, can_id: u32, payload: &[u8]) -> DecodedMessage {
        match table.strategy(can_id) {
            DecodeStrategy::Custom(decoder) => DecodedMessage::from(decoder.decode(payload)),
            DecodeStrategy::FieldTable(specs) => Self::decode_fields(specs, can_id, payload),
            DecodeStrategy::Unknown => {
                log::trace!("No decoder for CAN ID 0x{:X}", can_id);
                DecodedMessage::default()
            }
        }
    }

    fn decode_fields(specs: &[SignalSpec], can_id: u32, payload: &[u8]) -> DecodedMessage {
        let signals = specs
            .iter()
            .map(|spec| {
                let value = match BitFieldCodec::decode(payload, spec) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        log::debug!("CAN ID 0x{:X}: {}", can_id, e);
                        None
                    }
                };

                DecodedSignal::new(spec.name(), value).with_unit(spec.unit())
            })
            .collect();

        DecodedMessage { signals }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{ByteOrder, ValueType};
    use std::sync::Arc;

    fn table_with_two_signals() -> SignalTable {
        let mut table = SignalTable::new();
        table
            .add_signal(
                0x25E,
                SignalSpec::new(
                    "internal_voltage",
                    16,
                    16,
                    ByteOrder::LittleEndian,
                    ValueType::Unsigned,
                    0.001,
                    0.0,
                    "V",
                )
                .unwrap(),
            )
            .unwrap();
        table
            .add_signal(0x25E, SignalSpec::raw("status", 40, 8).unwrap())
            .unwrap();
        table
    }

    #[test]
    fn test_unknown_identifier_is_empty() {
        let table = SignalTable::new();
        let decoded = FrameDecoder::decode(&table, 0x7FF, &[1, 2, 3]);
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_short_frame_isolated_per_signal() {
        let table = table_with_two_signals();

        // Only 4 bytes: status (byte 5) cannot be located
        let decoded = FrameDecoder::decode(&table, 0x25E, &[0x00, 0x00, 0x05, 0xEC]);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.get("status"), Some(None));

        let voltage = decoded.get("internal_voltage").flatten().unwrap();
        assert!((voltage - 60.421).abs() < 1e-9);
        assert_eq!(decoded.signals[0].unit, "V");
    }

    #[test]
    fn test_empty_payload() {
        let table = table_with_two_signals();
        let decoded = FrameDecoder::decode(&table, 0x25E, &[]);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.values().count(), 0);
    }

    #[test]
    fn test_custom_decoder_output_returned_verbatim() {
        let mut table = table_with_two_signals();
        table.set_custom_decoder(
            0x25E,
            Arc::new(|payload: &[u8]| {
                vec![DecodedSignal::new("length", Some(payload.len() as f64))]
            }),
        );

        let decoded = FrameDecoder::decode(&table, 0x25E, &[0u8; 6]);
        assert_eq!(
            decoded,
            DecodedMessage::from(vec![DecodedSignal::new("length", Some(6.0))])
        );
    }
}
