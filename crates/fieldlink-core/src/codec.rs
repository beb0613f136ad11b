// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Conversion between raw register bytes and typed [`Value`]s.
//!
//! Decoding runs the byte-order transforms before the final unpack,
//! encoding runs them after the pack:
//!
//! ```text
//! decode:  bytes ─► word swap ─► byte swap ─► unpack(endianness) ─► Value
//! encode:  Value ─► pack(endianness) ─► word swap ─► byte swap ─► bytes
//! ```
//!
//! Swaps only touch 4- and 8-byte values. Both swaps are involutions and
//! commute, so the same transform serves both directions.
//!
//! Booleans are a single bit of an unsigned register. Writing one must
//! preserve the other bits, which is what [`ValueCodec::merge_bit`] is for.

use serde::{Deserialize, Serialize};

use crate::catalog::TypeCatalog;
use crate::error::{PlcError, PlcResult};
use crate::types::{ByteOrder, DataType, Endianness, Value};

// =============================================================================
// CodecSettings
// =============================================================================

/// Byte-order settings of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecSettings {
    /// Endianness of the final pack/unpack.
    pub endianness: Endianness,
    /// Reverse the order of 16-bit words in 32/64-bit values.
    pub word_swap: bool,
    /// Swap the two bytes inside every 16-bit word of 32/64-bit values.
    pub byte_swap: bool,
}

impl CodecSettings {
    /// Creates settings from explicit flags.
    pub const fn new(endianness: Endianness, word_swap: bool, byte_swap: bool) -> Self {
        Self {
            endianness,
            word_swap,
            byte_swap,
        }
    }

    /// Expands a vendor byte-order preset.
    pub const fn from_byte_order(order: ByteOrder) -> Self {
        match order {
            ByteOrder::BigEndian => Self::new(Endianness::Big, false, false),
            ByteOrder::LittleEndian => Self::new(Endianness::Little, false, false),
            ByteOrder::MidBigEndian => Self::new(Endianness::Big, true, false),
            ByteOrder::MidLittleEndian => Self::new(Endianness::Big, false, true),
        }
    }
}

impl From<ByteOrder> for CodecSettings {
    fn from(order: ByteOrder) -> Self {
        Self::from_byte_order(order)
    }
}

// =============================================================================
// ValueCodec
// =============================================================================

/// Stateless value codec for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValueCodec {
    settings: CodecSettings,
    catalog: TypeCatalog,
}

impl ValueCodec {
    /// Creates a codec.
    pub const fn new(settings: CodecSettings, catalog: TypeCatalog) -> Self {
        Self { settings, catalog }
    }

    /// Returns the byte-order settings.
    pub fn settings(&self) -> CodecSettings {
        self.settings
    }

    /// Returns the register layout.
    pub fn catalog(&self) -> TypeCatalog {
        self.catalog
    }

    /// Width in bytes of `data_type` on this device.
    pub fn width(&self, data_type: DataType) -> usize {
        self.catalog.wire_format(data_type).size()
    }

    /// Decodes `bytes` as `data_type`.
    ///
    /// Returns `None` when the slice length does not match the type width,
    /// so a truncated page only loses the affected values, and when `bit`
    /// lies outside the register.
    pub fn decode(&self, bytes: &[u8], data_type: DataType, bit: u8) -> Option<Value> {
        let format = self.catalog.wire_format(data_type);
        if bytes.len() != format.size() {
            return None;
        }

        let mut buf = bytes.to_vec();
        self.reorder(&mut buf);
        let raw = self.read_uint(&buf);

        let value = match data_type {
            DataType::Boolean => {
                if usize::from(bit) >= format.bits() {
                    return None;
                }
                Value::Bool(raw & (1u64 << bit) != 0)
            }
            // a byte on a word register keeps its low byte
            DataType::Byte => Value::Byte((raw & 0xFF) as u8),
            _ => format.unpack(raw),
        };
        Some(value)
    }

    /// Encodes `value` as `data_type`.
    ///
    /// A Boolean encodes to a register with only `bit` set (or nothing set).
    ///
    /// # Errors
    ///
    /// [`PlcError::InvalidValue`] when the value does not fit the type.
    pub fn encode(&self, value: &Value, data_type: DataType, bit: u8) -> PlcResult<Vec<u8>> {
        let width = self.width(data_type);

        let raw: u64 = match data_type {
            DataType::Boolean => {
                if usize::from(bit) >= width * 8 {
                    return Err(PlcError::invalid_value(
                        data_type.name(),
                        format!("bit {bit} outside a {width}-byte register"),
                    ));
                }
                let on = value
                    .as_bool()
                    .ok_or_else(|| mismatch(value, data_type))?;
                if on {
                    1 << bit
                } else {
                    0
                }
            }
            DataType::Float32 => {
                let v = value.as_f64().ok_or_else(|| mismatch(value, data_type))?;
                u64::from((v as f32).to_bits())
            }
            DataType::Float64 => {
                let v = value.as_f64().ok_or_else(|| mismatch(value, data_type))?;
                v.to_bits()
            }
            integer => {
                let v = integer_of(value).ok_or_else(|| mismatch(value, data_type))?;
                let (min, max) = integer_range(integer);
                if v < min || v > max {
                    return Err(PlcError::invalid_value(
                        data_type.name(),
                        format!("{value} is out of range {min}..={max}"),
                    ));
                }
                // two's complement truncated to the type width
                (v as i64) as u64
            }
        };

        let mut buf = self.write_uint(raw, width);
        self.reorder(&mut buf);
        Ok(buf)
    }

    /// Sets or clears `bit` in the register bytes `current`, leaving every
    /// other bit untouched.
    ///
    /// # Errors
    ///
    /// [`PlcError::InvalidValue`] when `current` is not exactly one register
    /// or `bit` does not fit in it.
    pub fn merge_bit(&self, current: &[u8], bit: u8, on: bool) -> PlcResult<Vec<u8>> {
        let width = self.width(DataType::Boolean);
        if current.len() != width {
            return Err(PlcError::invalid_value(
                "bit write",
                format!("expected {width} register bytes, got {}", current.len()),
            ));
        }
        if usize::from(bit) >= width * 8 {
            return Err(PlcError::invalid_value(
                "bit write",
                format!("bit {bit} outside a {width}-byte register"),
            ));
        }

        let mask = 1u64 << bit;
        let raw = self.read_uint(current);
        let merged = if on { raw | mask } else { raw & !mask };
        Ok(self.write_uint(merged, width))
    }

    fn reorder(&self, buf: &mut [u8]) {
        if buf.len() != 4 && buf.len() != 8 {
            return;
        }
        if self.settings.word_swap {
            let words: Vec<[u8; 2]> = buf.chunks_exact(2).rev().map(|w| [w[0], w[1]]).collect();
            for (dst, word) in buf.chunks_exact_mut(2).zip(words) {
                dst.copy_from_slice(&word);
            }
        }
        if self.settings.byte_swap {
            for word in buf.chunks_exact_mut(2) {
                word.swap(0, 1);
            }
        }
    }

    fn read_uint(&self, buf: &[u8]) -> u64 {
        let fold = |acc: u64, byte: &u8| (acc << 8) | u64::from(*byte);
        match self.settings.endianness {
            Endianness::Big => buf.iter().fold(0, fold),
            Endianness::Little => buf.iter().rev().fold(0, fold),
        }
    }

    fn write_uint(&self, raw: u64, width: usize) -> Vec<u8> {
        let width = width.min(8);
        let mut out = raw.to_be_bytes()[8 - width..].to_vec();
        if self.settings.endianness == Endianness::Little {
            out.reverse();
        }
        out
    }
}

fn mismatch(value: &Value, data_type: DataType) -> PlcError {
    PlcError::invalid_value(data_type.name(), format!("cannot encode '{value}'"))
}

/// Integer view of a value; floats are accepted when they hold a whole number.
fn integer_of(value: &Value) -> Option<i128> {
    match value {
        Value::Float32(_) | Value::Float64(_) => {
            let v = value.as_f64()?;
            (v.is_finite() && v.fract() == 0.0).then_some(v as i128)
        }
        other => other.as_i128(),
    }
}

fn integer_range(data_type: DataType) -> (i128, i128) {
    match data_type {
        DataType::Byte => (0, i128::from(u8::MAX)),
        DataType::UnsignedInt16 => (0, i128::from(u16::MAX)),
        DataType::SignedInt16 => (i128::from(i16::MIN), i128::from(i16::MAX)),
        DataType::UnsignedInt32 => (0, i128::from(u32::MAX)),
        DataType::SignedInt32 => (i128::from(i32::MIN), i128::from(i32::MAX)),
        DataType::UnsignedInt64 => (0, i128::from(u64::MAX)),
        DataType::SignedInt64 => (i128::from(i64::MIN), i128::from(i64::MAX)),
        DataType::Boolean => (0, 1),
        DataType::Float32 | DataType::Float64 => (i128::MIN, i128::MAX),
    }
}

// =============================================================================
// Tests
// =============================================================================
