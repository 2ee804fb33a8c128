//! Bit-field codec
//!
//! Extracts raw integers from arbitrary-width, arbitrary-offset bit fields in a
//! frame payload and converts them to physical values. This is the hottest
//! path under sustained frame rates: no allocation, no logging.

use crate::signals::{ByteOrder, SignalSpec, ValueType};
use crate::types::{DecoderError, Result};

/// Stateless bit-field extraction and packing
pub struct BitFieldCodec;

impl BitFieldCodec {
    /// Decode one signal into its physical value
    ///
    /// Fails with [`DecoderError::FieldOutOfRange`] when the payload is shorter
    /// than the field's last byte.
    pub fn decode(data: &[u8], spec: &SignalSpec) -> Result<f64> {
        let raw = Self::extract_raw(data, spec)?;
        let value = Self::to_integer(raw, spec.length(), spec.value_type());
        Ok(value as f64 * spec.scale() + spec.offset())
    }

    /// Extract the unsigned raw value of a field, before sign handling
    pub fn extract_raw(data: &[u8], spec: &SignalSpec) -> Result<u64> {
        Self::check_span(data, spec)?;

        let start_bit = spec.start_bit() as usize;
        let length = spec.length() as usize;

        Ok(match spec.byte_order() {
            ByteOrder::LittleEndian => Self::extract_little_endian(data, start_bit, length),
            ByteOrder::BigEndian => Self::extract_big_endian(data, start_bit, length),
        })
    }

    /// Apply the field's signedness to a raw value
    ///
    /// Widened to `i128` so unsigned 64-bit fields keep their full range.
    pub fn to_integer(raw: u64, length: u16, value_type: ValueType) -> i128 {
        match value_type {
            ValueType::Unsigned => raw as i128,
            ValueType::Signed => Self::sign_extend(raw, length as usize) as i128,
        }
    }

    /// Write a raw value into the field described by `spec`
    ///
    /// Exact inverse of [`BitFieldCodec::extract_raw`] for both byte orders.
    /// Only the field's bits are touched, so several signals can be packed into
    /// the same payload. Bits of `raw` above the field width are ignored.
    pub fn pack_raw(data: &mut [u8], spec: &SignalSpec, raw: u64) -> Result<()> {
        Self::check_span(data, spec)?;

        let start_bit = spec.start_bit() as usize;
        let length = spec.length() as usize;
        let (first_byte, last_byte) = spec.byte_span();

        match spec.byte_order() {
            ByteOrder::LittleEndian => {
                for i in 0..length {
                    let bit_pos = start_bit + i;
                    Self::write_bit(data, bit_pos / 8, bit_pos % 8, (raw >> i) & 1 == 1);
                }
            }
            ByteOrder::BigEndian => {
                let mut value_bit = 0;
                for byte_idx in (first_byte..=last_byte).rev() {
                    for bit_idx in (0..8).rev() {
                        let global_bit = byte_idx * 8 + (7 - bit_idx);
                        if global_bit >= start_bit && global_bit < start_bit + length {
                            Self::write_bit(data, byte_idx, bit_idx, (raw >> value_bit) & 1 == 1);
                            value_bit += 1;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn check_span(data: &[u8], spec: &SignalSpec) -> Result<()> {
        let (_, end_byte) = spec.byte_span();
        if end_byte >= data.len() {
            return Err(DecoderError::FieldOutOfRange {
                signal: spec.name().to_string(),
                end_byte,
                payload_len: data.len(),
            });
        }
        Ok(())
    }

    fn write_bit(data: &mut [u8], byte_idx: usize, bit_idx: usize, set: bool) {
        if set {
            data[byte_idx] |= 1 << bit_idx;
        } else {
            data[byte_idx] &= !(1 << bit_idx);
        }
    }

    /// Little-endian (Intel) extraction
    ///
    /// Bits are read in increasing (byte, bit-within-byte) order from
    /// `start_bit`; the first bit read is the LSB of the result. The caller
    /// has already checked the span, so the whole field is inside `data`.
    fn extract_little_endian(data: &[u8], start_bit: usize, length: usize) -> u64 {
        let mut window = [0u8; 8];
        let available = data.len().min(8);
        window[..available].copy_from_slice(&data[..available]);

        let word = u64::from_le_bytes(window) >> start_bit;
        if length >= 64 {
            word
        } else {
            word & ((1u64 << length) - 1)
        }
    }

    /// Big-endian (Motorola) extraction
    ///
    /// Walks the byte span from its last byte to its first, and each byte
    /// from MSB to LSB. A bit at position `bit_idx` of byte `byte_idx` has the
    /// global index `byte_idx * 8 + (7 - bit_idx)`; only bits whose global
    /// index lies in `[start_bit, start_bit + length)` are taken, and the first
    /// one taken becomes the LSB of the result.
    fn extract_big_endian(data: &[u8], start_bit: usize, length: usize) -> u64 {
        let first_byte = start_bit / 8;
        let last_byte = (start_bit + length - 1) / 8;

        let mut result: u64 = 0;
        let mut value_bit = 0;

        for byte_idx in (first_byte..=last_byte).rev() {
            let byte = data[byte_idx];
            for bit_idx in (0..8).rev() {
                let global_bit = byte_idx * 8 + (7 - bit_idx);
                if global_bit >= start_bit && global_bit < start_bit + length {
                    if (byte >> bit_idx) & 0x01 == 1 {
                        result |= 1u64 << value_bit;
                    }
                    value_bit += 1;
                }
            }
        }

        result
    }

    /// Sign-extend a value from N bits to 64 bits
    ///
    /// Equivalent to subtracting `2^N` when bit `N-1` is set.
    fn sign_extend(value: u64, bit_length: usize) -> i64 {
        if bit_length >= 64 {
            return value as i64;
        }

        let sign_bit = 1u64 << (bit_length - 1);
        if (value & sign_bit) != 0 {
            let mask = !0u64 << bit_length;
            (value | mask) as i64
        } else {
            value as i64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(start_bit: u16, length: u16, order: ByteOrder, value_type: ValueType) -> SignalSpec {
        SignalSpec::new("sig", start_bit, length, order, value_type, 1.0, 0.0, "").unwrap()
    }

    #[test]
    fn test_little_endian_scaled() {
        let spec = SignalSpec::new(
            "voltage",
            0,
            16,
            ByteOrder::LittleEndian,
            ValueType::Unsigned,
            0.1,
            0.0,
            "V",
        )
        .unwrap();

        let data = [0x2B, 0x01];
        assert_eq!(BitFieldCodec::extract_raw(&data, &spec).unwrap(), 299);
        let value = BitFieldCodec::decode(&data, &spec).unwrap();
        assert!((value - 29.9).abs() < 1e-9);
    }

    #[test]
    fn test_extract_little_endian_simple() {
        let data = [0xAB, 0xCD, 0xEF, 0x12];
        let s = spec(0, 8, ByteOrder::LittleEndian, ValueType::Unsigned);
        assert_eq!(BitFieldCodec::extract_raw(&data, &s).unwrap(), 0xAB);
    }

    #[test]
    fn test_extract_little_endian_cross_byte() {
        let data = [0xAB, 0xCD, 0xEF, 0x12];
        let s = spec(4, 8, ByteOrder::LittleEndian, ValueType::Unsigned);
        assert_eq!(BitFieldCodec::extract_raw(&data, &s).unwrap(), 0xDA);
    }

    #[test]
    fn test_extract_little_endian_full_word() {
        let data = [0xFF; 8];
        let s = spec(0, 64, ByteOrder::LittleEndian, ValueType::Unsigned);
        assert_eq!(BitFieldCodec::extract_raw(&data, &s).unwrap(), u64::MAX);
    }

    #[test]
    fn test_extract_big_endian_single_byte_walk() {
        // The MSB of the byte is read first and becomes the LSB of the raw value
        let data = [0x01];
        let s = spec(0, 8, ByteOrder::BigEndian, ValueType::Unsigned);
        assert_eq!(BitFieldCodec::extract_raw(&data, &s).unwrap(), 0x80);

        let data = [0x80];
        assert_eq!(BitFieldCodec::extract_raw(&data, &s).unwrap(), 0x01);
    }

    #[test]
    fn test_extract_big_endian_two_bytes() {
        // Last byte of the span is walked first
        let data = [0x12, 0x34];
        let s = spec(0, 16, ByteOrder::BigEndian, ValueType::Unsigned);
        assert_eq!(BitFieldCodec::extract_raw(&data, &s).unwrap(), 0x482C);
    }

    #[test]
    fn test_extract_big_endian_partial_byte() {
        // Global bits 0..4 of byte 0 map to bit_idx 7..4
        let data = [0xF0];
        let s = spec(0, 4, ByteOrder::BigEndian, ValueType::Unsigned);
        assert_eq!(BitFieldCodec::extract_raw(&data, &s).unwrap(), 0x0F);
    }

    #[test]
    fn test_unsigned_64bit_keeps_top_bit() {
        let s = SignalSpec::raw("wide", 0, 64).unwrap();
        let value = BitFieldCodec::decode(&[0xFF; 8], &s).unwrap();
        assert_eq!(value, u64::MAX as f64);

        let signed = spec(0, 64, ByteOrder::LittleEndian, ValueType::Signed);
        assert_eq!(BitFieldCodec::decode(&[0xFF; 8], &signed).unwrap(), -1.0);
    }

    #[test]
    fn test_to_integer() {
        assert_eq!(BitFieldCodec::to_integer(u64::MAX, 64, ValueType::Unsigned), u64::MAX as i128);
        assert_eq!(BitFieldCodec::to_integer(0xFF, 8, ValueType::Signed), -1);
        assert_eq!(BitFieldCodec::to_integer(0xFF, 8, ValueType::Unsigned), 255);
    }

    #[test]
    fn test_signed_16bit_boundaries() {
        let s = spec(0, 16, ByteOrder::LittleEndian, ValueType::Signed);
        assert_eq!(BitFieldCodec::decode(&[0xFF, 0xFF], &s).unwrap(), -1.0);
        assert_eq!(BitFieldCodec::decode(&[0x00, 0x80], &s).unwrap(), -32768.0);
        assert_eq!(BitFieldCodec::decode(&[0xFF, 0x7F], &s).unwrap(), 32767.0);
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(BitFieldCodec::sign_extend(0x7F, 8), 127);
        assert_eq!(BitFieldCodec::sign_extend(0xFF, 8), -1);
        assert_eq!(BitFieldCodec::sign_extend(0x8000, 16), -32768);
        assert_eq!(BitFieldCodec::sign_extend(0x1, 1), -1);
        assert_eq!(BitFieldCodec::sign_extend(u64::MAX, 64), -1);
    }

    #[test]
    fn test_offset_applied_after_scale() {
        let s = SignalSpec::new(
            "temperature",
            0,
            8,
            ByteOrder::LittleEndian,
            ValueType::Unsigned,
            0.5,
            -40.0,
            "°C",
        )
        .unwrap();
        assert_eq!(BitFieldCodec::decode(&[100], &s).unwrap(), 10.0);
    }

    #[test]
    fn test_out_of_range() {
        let s = spec(40, 8, ByteOrder::LittleEndian, ValueType::Unsigned);
        let err = BitFieldCodec::decode(&[0u8; 4], &s).unwrap_err();
        match err {
            DecoderError::FieldOutOfRange { end_byte, payload_len, .. } => {
                assert_eq!(end_byte, 5);
                assert_eq!(payload_len, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_is_deterministic() {
        let s = spec(3, 13, ByteOrder::BigEndian, ValueType::Signed);
        let data = [0x5A, 0xC3, 0x7E];
        let first = BitFieldCodec::decode(&data, &s).unwrap();
        let second = BitFieldCodec::decode(&data, &s).unwrap();
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn test_pack_round_trip_all_widths() {
        for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            for length in 1..=16u16 {
                for start_bit in [0u16, 3, 7, 8, 13, 21] {
                    let s = spec(start_bit, length, order, ValueType::Unsigned);
                    let max = (1u64 << length) - 1;
                    for raw in [0, 1, max / 3, max / 2 + 1, max] {
                        let mut data = [0xA5u8; 8];
                        BitFieldCodec::pack_raw(&mut data, &s, raw).unwrap();
                        assert_eq!(
                            BitFieldCodec::extract_raw(&data, &s).unwrap(),
                            raw,
                            "order={order:?} start={start_bit} len={length}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_pack_leaves_neighbours_untouched() {
        let low = spec(0, 4, ByteOrder::LittleEndian, ValueType::Unsigned);
        let high = spec(4, 4, ByteOrder::LittleEndian, ValueType::Unsigned);

        let mut data = [0u8; 1];
        BitFieldCodec::pack_raw(&mut data, &low, 0x3).unwrap();
        BitFieldCodec::pack_raw(&mut data, &high, 0xC).unwrap();
        assert_eq!(data[0], 0xC3);
    }
}
