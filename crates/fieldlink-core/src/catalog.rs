// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Type catalog: how each [`DataType`] is laid out on a device's registers.
//!
//! ```text
//!            S7 (1-byte registers)        Modbus (2-byte registers)
//! bool       1 byte,  footprint 1         1 word, footprint 1
//! uint16     2 bytes, footprint 2         1 word, footprint 1
//! float64    8 bytes, footprint 8         4 words, footprint 4
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{DataType, DeviceFamily, Value};

/// Fixed-size unpack format used for the final pack/unpack step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireFormat {
    /// Unsigned 8-bit.
    U8,
    /// Unsigned 16-bit.
    U16,
    /// Signed 16-bit.
    I16,
    /// Unsigned 32-bit.
    U32,
    /// Signed 32-bit.
    I32,
    /// Unsigned 64-bit.
    U64,
    /// Signed 64-bit.
    I64,
    /// IEEE-754 single.
    F32,
    /// IEEE-754 double.
    F64,
}

impl WireFormat {
    /// Size of the packed representation in bytes.
    pub const fn size(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    /// Number of addressable bits in the packed representation.
    pub const fn bits(&self) -> usize {
        self.size() * 8
    }

    /// Builds a value from the unpacked integer, truncated to this format.
    pub fn unpack(&self, raw: u64) -> Value {
        match self {
            Self::U8 => Value::Byte(raw as u8),
            Self::U16 => Value::UInt16(raw as u16),
            Self::I16 => Value::Int16(raw as u16 as i16),
            Self::U32 => Value::UInt32(raw as u32),
            Self::I32 => Value::Int32(raw as u32 as i32),
            Self::U64 => Value::UInt64(raw),
            Self::I64 => Value::Int64(raw as i64),
            Self::F32 => Value::Float32(f32::from_bits(raw as u32)),
            Self::F64 => Value::Float64(f64::from_bits(raw)),
        }
    }
}

/// Register layout of a device family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeCatalog {
    bytes_per_register: usize,
}

impl TypeCatalog {
    /// Catalog for S7 PLCs (byte-addressed).
    pub const SIEMENS: Self = Self::new(1);

    /// Catalog for Modbus devices (16-bit registers).
    pub const MODBUS: Self = Self::new(2);

    /// Creates a catalog for registers of the given size.
    pub const fn new(bytes_per_register: usize) -> Self {
        let bytes_per_register = if bytes_per_register == 0 { 1 } else { bytes_per_register };
        Self { bytes_per_register }
    }

    /// Returns the catalog for a device family.
    pub const fn for_family(family: DeviceFamily) -> Self {
        match family {
            DeviceFamily::Modbus => Self::MODBUS,
            DeviceFamily::Siemens | DeviceFamily::OpcUa => Self::SIEMENS,
        }
    }

    /// Size of one register in bytes.
    pub const fn bytes_per_register(&self) -> usize {
        self.bytes_per_register
    }

    /// Width in bytes of a value of `data_type` on this device.
    ///
    /// Boolean and Byte occupy one whole register.
    pub const fn width(&self, data_type: DataType) -> usize {
        match data_type {
            DataType::Boolean | DataType::Byte => self.bytes_per_register,
            other => other.natural_width(),
        }
    }

    /// Number of registers covered by a value of `data_type`.
    pub const fn footprint(&self, data_type: DataType) -> u32 {
        let registers = self.width(data_type) / self.bytes_per_register;
        if registers == 0 {
            1
        } else {
            registers as u32
        }
    }

    /// Pack format of `data_type` on this device.
    pub const fn wire_format(&self, data_type: DataType) -> WireFormat {
        match data_type {
            DataType::Boolean | DataType::Byte => {
                if self.bytes_per_register >= 2 {
                    WireFormat::U16
                } else {
                    WireFormat::U8
                }
            }
            DataType::UnsignedInt16 => WireFormat::U16,
            DataType::SignedInt16 => WireFormat::I16,
            DataType::UnsignedInt32 => WireFormat::U32,
            DataType::SignedInt32 => WireFormat::I32,
            DataType::Float32 => WireFormat::F32,
            DataType::Float64 => WireFormat::F64,
            DataType::SignedInt64 => WireFormat::I64,
            DataType::UnsignedInt64 => WireFormat::U64,
        }
    }
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::SIEMENS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_siemens_widths() {
        let catalog = TypeCatalog::SIEMENS;
        assert_eq!(catalog.width(DataType::Boolean), 1);
        assert_eq!(catalog.width(DataType::UnsignedInt16), 2);
        assert_eq!(catalog.footprint(DataType::Float32), 4);
        assert_eq!(catalog.footprint(DataType::Float64), 8);
        assert_eq!(catalog.wire_format(DataType::Byte), WireFormat::U8);
    }

    #[test]
    fn test_modbus_widths() {
        let catalog = TypeCatalog::MODBUS;
        assert_eq!(catalog.width(DataType::Boolean), 2);
        assert_eq!(catalog.width(DataType::Byte), 2);
        assert_eq!(catalog.footprint(DataType::Boolean), 1);
        assert_eq!(catalog.footprint(DataType::UnsignedInt16), 1);
        assert_eq!(catalog.footprint(DataType::SignedInt32), 2);
        assert_eq!(catalog.footprint(DataType::UnsignedInt64), 4);
        assert_eq!(catalog.wire_format(DataType::Boolean), WireFormat::U16);
    }

    #[test]
    fn test_wire_format_matches_width() {
        for catalog in [TypeCatalog::SIEMENS, TypeCatalog::MODBUS] {
            for data_type in DataType::ALL {
                assert_eq!(catalog.wire_format(data_type).size(), catalog.width(data_type));
            }
        }
    }

    #[test]
    fn test_unpack_truncates_to_format() {
        assert_eq!(WireFormat::I16.unpack(0xFFFF), Value::Int16(-1));
        assert_eq!(WireFormat::U8.unpack(0x1FF), Value::Byte(0xFF));
        assert_eq!(WireFormat::F32.unpack(0x4248_0000), Value::Float32(50.0));
        assert_eq!(WireFormat::U8.bits(), 8);
    }
}
