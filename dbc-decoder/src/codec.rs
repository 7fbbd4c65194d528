//! Signal codec engine
//!
//! Converts between frame bytes and signal values. A [`BitLayout`] is the
//! single description of where a signal's bits live; extraction and insertion
//! both walk the same spans, so they are inverses by construction.
//!
//! Bit numbering follows the DBC convention: bit `n` is bit `n % 8` of byte
//! `n / 8`, with bit 0 the least significant bit of the byte.
//! - Little-endian (Intel): the start bit is the LSB of the field. Bits climb
//!   towards bit 7, then continue at bit 0 of the next byte.
//! - Big-endian (Motorola): the start bit is the MSB of the field. Bits descend
//!   towards bit 0, then continue at bit 7 of the next byte.

use crate::model::network::{ByteOrder, Signal, ValueRepresentation};
use crate::types::{CodecError, PhysicalValue, RawValue};

/// One contiguous run of bits within a single byte of the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BitSpan {
    pub byte_index: usize,
    /// Lowest bit position within the byte (0..=7)
    pub bit_offset: u8,
    /// Number of consecutive bits (1..=8)
    pub num_bits: u8,
    /// Position of the span's lowest bit in the raw value
    pub value_shift: u8,
}

impl BitSpan {
    fn mask(&self) -> u8 {
        ((1u16 << self.num_bits) - 1) as u8
    }
}

/// A 64-bit field starting mid-byte touches at most nine bytes
const MAX_SPANS: usize = 9;

/// Precomputed mapping from a signal's bits to frame bytes
///
/// Spans live inline, so building a layout on the decode path never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitLayout {
    spans: [BitSpan; MAX_SPANS],
    count: usize,
    length: u32,
}

impl BitLayout {
    /// Build the layout for a start bit, length (at most 64) and byte order
    pub fn new(start_bit: u32, length: u32, byte_order: ByteOrder) -> Self {
        let length = length.min(64);
        let mut layout = Self {
            spans: [BitSpan::default(); MAX_SPANS],
            count: 0,
            length,
        };
        let mut byte_index = (start_bit / 8) as usize;
        let mut bit_index = start_bit % 8;
        let mut remaining = length;

        match byte_order {
            ByteOrder::BigEndian => {
                // First bits taken are the most significant ones
                while remaining > 0 {
                    let num_bits = (bit_index + 1).min(remaining);
                    remaining -= num_bits;
                    layout.push(BitSpan {
                        byte_index,
                        bit_offset: (bit_index + 1 - num_bits) as u8,
                        num_bits: num_bits as u8,
                        value_shift: remaining as u8,
                    });
                    byte_index += 1;
                    bit_index = 7;
                }
            }
            ByteOrder::LittleEndian => {
                let mut value_shift = 0;
                while remaining > 0 {
                    let num_bits = (8 - bit_index).min(remaining);
                    layout.push(BitSpan {
                        byte_index,
                        bit_offset: bit_index as u8,
                        num_bits: num_bits as u8,
                        value_shift: value_shift as u8,
                    });
                    value_shift += num_bits;
                    remaining -= num_bits;
                    byte_index += 1;
                    bit_index = 0;
                }
            }
        }

        layout
    }

    fn push(&mut self, span: BitSpan) {
        self.spans[self.count] = span;
        self.count += 1;
    }

    pub fn segments(&self) -> &[BitSpan] {
        &self.spans[..self.count]
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    /// Number of frame bytes the signal touches
    pub fn required_bytes(&self) -> usize {
        self.segments()
            .iter()
            .map(|s| s.byte_index + 1)
            .max()
            .unwrap_or(0)
    }

    /// Extract the raw unsigned bit pattern, or None if the frame is too short
    pub fn extract(&self, data: &[u8]) -> Option<u64> {
        if data.len() < self.required_bytes() {
            return None;
        }
        let mut result: u64 = 0;
        for span in self.segments() {
            let bits = (data[span.byte_index] >> span.bit_offset) & span.mask();
            result |= (bits as u64) << span.value_shift;
        }
        Some(result)
    }

    /// Write a raw bit pattern, leaving all other bits untouched
    ///
    /// Returns false if the frame is too short.
    pub fn insert(&self, data: &mut [u8], raw: u64) -> bool {
        if data.len() < self.required_bytes() {
            return false;
        }
        for span in self.segments() {
            let mask = span.mask();
            let bits = ((raw >> span.value_shift) as u8) & mask;
            data[span.byte_index] &= !(mask << span.bit_offset);
            data[span.byte_index] |= bits << span.bit_offset;
        }
        true
    }
}

/// Sign-extend a value from N bits to 64 bits
///
/// If the value's MSB is 1, fill the upper bits with 1s.
pub fn sign_extend(value: u64, bit_length: u32) -> i64 {
    if bit_length == 0 || bit_length >= 64 {
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

fn bit_mask(bit_length: u32) -> u64 {
    if bit_length >= 64 {
        u64::MAX
    } else {
        (1u64 << bit_length) - 1
    }
}

/// Resolve the value representation, checking float lengths
pub fn representation(signal: &Signal) -> Result<ValueRepresentation, CodecError> {
    let unsupported = |reason: String| CodecError::UnsupportedValueRepresentation {
        signal: signal.name.clone(),
        reason,
    };

    match signal.representation() {
        None => Err(unsupported(format!(
            "extended value type {} is not defined",
            signal.extended_value_type.map_or(0, |t| t.code())
        ))),
        Some(ValueRepresentation::Float32) if signal.length != 32 => Err(unsupported(format!(
            "float32 needs 32 bits, signal has {}",
            signal.length
        ))),
        Some(ValueRepresentation::Float64) if signal.length != 64 => Err(unsupported(format!(
            "float64 needs 64 bits, signal has {}",
            signal.length
        ))),
        Some(representation) => Ok(representation),
    }
}

/// Extract the raw value of a signal, ignoring multiplexing
pub fn extract_raw(signal: &Signal, data: &[u8]) -> Result<RawValue, CodecError> {
    let representation = representation(signal)?;
    let layout = signal.layout();
    let bits = layout
        .extract(data)
        .ok_or_else(|| CodecError::BitRangeOutOfBounds {
            signal: signal.name.clone(),
            required: layout.required_bytes(),
            available: data.len(),
        })?;

    Ok(match representation {
        ValueRepresentation::Unsigned => RawValue::Unsigned(bits),
        ValueRepresentation::Signed => RawValue::Signed(sign_extend(bits, signal.length)),
        ValueRepresentation::Float32 => RawValue::Float(f32::from_bits(bits as u32) as f64),
        ValueRepresentation::Float64 => RawValue::Float(f64::from_bits(bits)),
    })
}

/// Apply factor and offset
pub fn to_physical(signal: &Signal, raw: RawValue) -> PhysicalValue {
    raw.as_f64() * signal.factor + signal.offset
}

/// Decode the physical value of a signal, ignoring multiplexing
pub fn decode(signal: &Signal, data: &[u8]) -> Result<PhysicalValue, CodecError> {
    extract_raw(signal, data).map(|raw| to_physical(signal, raw))
}

/// Convert a physical value to the raw bit pattern of a signal
///
/// Integer signals round to the nearest raw step and must fit the bit length.
pub fn to_raw_bits(signal: &Signal, value: PhysicalValue) -> Result<u64, CodecError> {
    let representation = representation(signal)?;
    let not_representable = || CodecError::ValueNotRepresentable {
        signal: signal.name.clone(),
        value,
    };

    if signal.factor == 0.0 || !value.is_finite() {
        return Err(not_representable());
    }
    let scaled = (value - signal.offset) / signal.factor;
    let length = signal.length;

    match representation {
        // Exclusive power-of-two bounds: `u64::MAX as f64` rounds up to 2^64
        ValueRepresentation::Unsigned => {
            let scaled = scaled.round();
            if scaled < 0.0 || scaled >= 2f64.powi(length as i32) {
                return Err(not_representable());
            }
            Ok(scaled as u64)
        }
        ValueRepresentation::Signed => {
            let scaled = scaled.round();
            let half = 2f64.powi(length as i32 - 1);
            if scaled < -half || scaled >= half {
                return Err(not_representable());
            }
            Ok((scaled as i64) as u64 & bit_mask(length))
        }
        ValueRepresentation::Float32 => {
            let narrowed = scaled as f32;
            if narrowed.is_infinite() {
                return Err(not_representable());
            }
            Ok(narrowed.to_bits() as u64)
        }
        ValueRepresentation::Float64 => Ok(scaled.to_bits()),
    }
}

/// Encode a physical value into the frame, ignoring multiplexing
pub fn encode(signal: &Signal, value: PhysicalValue, data: &mut [u8]) -> Result<(), CodecError> {
    let bits = to_raw_bits(signal, value)?;
    let layout = signal.layout();
    if !layout.insert(data, bits) {
        return Err(CodecError::BitRangeOutOfBounds {
            signal: signal.name.clone(),
            required: layout.required_bytes(),
            available: data.len(),
        });
    }
    Ok(())
}
