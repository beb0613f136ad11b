// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core value and type definitions.
//!
//! - [`DeviceFamily`]: which protocol family a client speaks
//! - [`DataType`]: the ten logical data types addressable on a device
//! - [`Value`]: a decoded, typed value
//! - [`Endianness`] / [`ByteOrder`]: register byte-ordering settings

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PlcError, PlcResult};

// =============================================================================
// DeviceFamily
// =============================================================================

/// Protocol family of a device client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceFamily {
    /// Siemens S7 PLC through the snap7 driver.
    Siemens,
    /// Modbus/TCP device.
    Modbus,
    /// OPC-UA server.
    OpcUa,
}

impl DeviceFamily {
    /// Numeric code used in structured error codes.
    pub const fn code(&self) -> u8 {
        match self {
            Self::Siemens => 1,
            Self::Modbus => 2,
            Self::OpcUa => 3,
        }
    }
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Siemens => "S7",
            Self::Modbus => "Modbus",
            Self::OpcUa => "OPC-UA",
        };
        f.write_str(s)
    }
}

// =============================================================================
// DataType
// =============================================================================

/// Logical data type of an addressed variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Single bit inside a register.
    Boolean,
    /// 8-bit unsigned.
    Byte,
    /// 16-bit unsigned (`w`).
    UnsignedInt16,
    /// 32-bit unsigned (`dw`).
    UnsignedInt32,
    /// 16-bit signed (`i`).
    SignedInt16,
    /// 32-bit signed (`di`).
    SignedInt32,
    /// IEEE-754 single (`r`).
    Float32,
    /// IEEE-754 double (`dr`).
    Float64,
    /// 64-bit signed (`qi`).
    SignedInt64,
    /// 64-bit unsigned (`qw`).
    UnsignedInt64,
}

impl DataType {
    /// All data types, in grammar order.
    pub const ALL: [DataType; 10] = [
        DataType::Boolean,
        DataType::Byte,
        DataType::UnsignedInt16,
        DataType::UnsignedInt32,
        DataType::SignedInt16,
        DataType::SignedInt32,
        DataType::Float32,
        DataType::Float64,
        DataType::SignedInt64,
        DataType::UnsignedInt64,
    ];

    /// Returns the address-grammar type code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Boolean => "x",
            Self::Byte => "b",
            Self::UnsignedInt16 => "w",
            Self::UnsignedInt32 => "dw",
            Self::SignedInt16 => "i",
            Self::SignedInt32 => "di",
            Self::Float32 => "r",
            Self::Float64 => "dr",
            Self::SignedInt64 => "qi",
            Self::UnsignedInt64 => "qw",
        }
    }

    /// Looks up a type code. The empty code means Boolean.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "" | "x" => Some(Self::Boolean),
            "b" => Some(Self::Byte),
            "w" => Some(Self::UnsignedInt16),
            "dw" => Some(Self::UnsignedInt32),
            "i" => Some(Self::SignedInt16),
            "di" => Some(Self::SignedInt32),
            "r" => Some(Self::Float32),
            "dr" => Some(Self::Float64),
            "qi" => Some(Self::SignedInt64),
            "qw" => Some(Self::UnsignedInt64),
            _ => None,
        }
    }

    /// Natural width of the type in bytes.
    pub const fn natural_width(&self) -> usize {
        match self {
            Self::Boolean | Self::Byte => 1,
            Self::UnsignedInt16 | Self::SignedInt16 => 2,
            Self::UnsignedInt32 | Self::SignedInt32 | Self::Float32 => 4,
            Self::Float64 | Self::SignedInt64 | Self::UnsignedInt64 => 8,
        }
    }

    /// Returns `true` for Boolean.
    pub const fn is_bit(&self) -> bool {
        matches!(self, Self::Boolean)
    }

    /// Returns a short lowercase name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "bool",
            Self::Byte => "byte",
            Self::UnsignedInt16 => "uint16",
            Self::UnsignedInt32 => "uint32",
            Self::SignedInt16 => "int16",
            Self::SignedInt32 => "int32",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::SignedInt64 => "int64",
            Self::UnsignedInt64 => "uint64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = PlcError;

    /// Accepts either a grammar code (`dw`) or a name (`uint32`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if let Some(data_type) = Self::from_code(&lower) {
            return Ok(data_type);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name() == lower)
            .ok_or_else(|| PlcError::unsupported_type(s))
    }
}

// =============================================================================
// Value
// =============================================================================

/// A decoded, typed value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// 8-bit unsigned integer.
    Byte(u8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// 32-bit float.
    Float32(f32),
    /// 64-bit float.
    Float64(f64),
    /// Text value (OPC-UA strings and other non-numeric node values).
    String(String),
}

impl Value {
    /// Returns the data type this value naturally encodes as, if any.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Bool(_) => Some(DataType::Boolean),
            Self::Byte(_) => Some(DataType::Byte),
            Self::Int16(_) => Some(DataType::SignedInt16),
            Self::UInt16(_) => Some(DataType::UnsignedInt16),
            Self::Int32(_) => Some(DataType::SignedInt32),
            Self::UInt32(_) => Some(DataType::UnsignedInt32),
            Self::Int64(_) => Some(DataType::SignedInt64),
            Self::UInt64(_) => Some(DataType::UnsignedInt64),
            Self::Float32(_) => Some(DataType::Float32),
            Self::Float64(_) => Some(DataType::Float64),
            Self::String(_) => None,
        }
    }

    /// Returns the value as a boolean (non-zero is `true`).
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::String(_) => None,
            Self::Float32(v) => Some(*v != 0.0),
            Self::Float64(v) => Some(*v != 0.0),
            other => other.as_i128().map(|v| v != 0),
        }
    }

    /// Returns an integer value widened to i128, or `None` for floats and text.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Self::Bool(v) => Some(i128::from(*v)),
            Self::Byte(v) => Some(i128::from(*v)),
            Self::Int16(v) => Some(i128::from(*v)),
            Self::UInt16(v) => Some(i128::from(*v)),
            Self::Int32(v) => Some(i128::from(*v)),
            Self::UInt32(v) => Some(i128::from(*v)),
            Self::Int64(v) => Some(i128::from(*v)),
            Self::UInt64(v) => Some(i128::from(*v)),
            Self::Float32(_) | Self::Float64(_) | Self::String(_) => None,
        }
    }

    /// Returns the value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float32(v) => Some(f64::from(*v)),
            Self::Float64(v) => Some(*v),
            Self::String(_) => None,
            other => other.as_i128().map(|v| v as f64),
        }
    }

    /// Parses a text value as the given data type.
    ///
    /// Booleans accept `true`/`false`/`on`/`off`/`1`/`0`.
    pub fn parse_as(text: &str, data_type: DataType) -> PlcResult<Self> {
        let text = text.trim();
        let bad = |e: &dyn fmt::Display| PlcError::invalid_value(data_type.name(), format!("'{text}': {e}"));
        let value = match data_type {
            DataType::Boolean => match text.to_lowercase().as_str() {
                "true" | "on" | "1" => Self::Bool(true),
                "false" | "off" | "0" => Self::Bool(false),
                _ => return Err(bad(&"expected true or false")),
            },
            DataType::Byte => Self::Byte(text.parse().map_err(|e| bad(&e))?),
            DataType::SignedInt16 => Self::Int16(text.parse().map_err(|e| bad(&e))?),
            DataType::UnsignedInt16 => Self::UInt16(text.parse().map_err(|e| bad(&e))?),
            DataType::SignedInt32 => Self::Int32(text.parse().map_err(|e| bad(&e))?),
            DataType::UnsignedInt32 => Self::UInt32(text.parse().map_err(|e| bad(&e))?),
            DataType::SignedInt64 => Self::Int64(text.parse().map_err(|e| bad(&e))?),
            DataType::UnsignedInt64 => Self::UInt64(text.parse().map_err(|e| bad(&e))?),
            DataType::Float32 => Self::Float32(text.parse().map_err(|e| bad(&e))?),
            DataType::Float64 => Self::Float64(text.parse().map_err(|e| bad(&e))?),
        };
        Ok(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
        }
    }
}

// =============================================================================
// Byte Ordering
// =============================================================================

/// Endianness used for the final pack/unpack step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endianness {
    /// Most significant byte first.
    #[default]
    Big,
    /// Least significant byte first.
    Little,
}

/// Common vendor byte-order presets.
///
/// A preset expands into an [`Endianness`] plus word/byte swap flags; see
/// [`CodecSettings::from_byte_order`](crate::codec::CodecSettings::from_byte_order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum ByteOrder {
    /// ABCD: big-endian, words in order.
    #[default]
    BigEndian,
    /// DCBA: fully reversed.
    LittleEndian,
    /// CDAB: big-endian bytes, words swapped.
    MidBigEndian,
    /// BADC: words in order, bytes swapped inside each word.
    MidLittleEndian,
}

impl ByteOrder {
    /// Returns common vendor-specific aliases for this byte order.
    pub const fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::BigEndian => &["ABCD", "big", "be", "network"],
            Self::LittleEndian => &["DCBA", "little", "le", "intel"],
            Self::MidBigEndian => &["CDAB", "mid_big", "word_swap", "modicon"],
            Self::MidLittleEndian => &["BADC", "mid_little", "byte_swap"],
        }
    }

    /// Returns a description of this byte order.
    pub const fn description(&self) -> &'static str {
        match self {
            Self::BigEndian => "Big-endian (ABCD)",
            Self::LittleEndian => "Little-endian (DCBA)",
            Self::MidBigEndian => "Mid-big-endian (CDAB) - word swapped",
            Self::MidLittleEndian => "Mid-little-endian (BADC) - byte swapped",
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BigEndian => "big_endian",
            Self::LittleEndian => "little_endian",
            Self::MidBigEndian => "mid_big_endian",
            Self::MidLittleEndian => "mid_little_endian",
        };
        f.write_str(s)
    }
}

impl FromStr for ByteOrder {
    type Err = PlcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "bigendian" | "big" | "be" | "abcd" | "network" => Ok(Self::BigEndian),
            "littleendian" | "little" | "le" | "dcba" | "intel" => Ok(Self::LittleEndian),
            "midbigendian" | "midbig" | "cdab" | "wordswap" | "modicon" => Ok(Self::MidBigEndian),
            "midlittleendian" | "midlittle" | "badc" | "byteswap" => Ok(Self::MidLittleEndian),
            _ => Err(PlcError::configuration(format!(
                "invalid byte order '{s}': expected abcd, dcba, cdab or badc"
            ))),
        }
    }
}

impl TryFrom<String> for ByteOrder {
    type Error = PlcError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// =============================================================================
// Tests
// =============================================================================
