// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Symbolic address grammar.
//!
//! Variables are addressed with short strings of the form
//!
//! ```text
//! [<area>[<digits>].][<type>]<position>[.<bit>]
//!
//!   db2.w0      DB 2, unsigned 16-bit at offset 0
//!   hr5.di10    holding registers of slave 5, signed 32-bit at register 10
//!   w2          default area, unsigned 16-bit at 2
//!   mk8.3       marks, bit 3 of byte 8
//!   co.x4.1     coils, bit 1 of position 4
//! ```
//!
//! Input is trimmed and matched case-insensitively. An empty type code means
//! Boolean; a Boolean without a `.bit` suffix addresses bit 0.
//!
//! Siemens areas that never carry a number (`mk`, `pe`, `pa`, `ct`, `tm`)
//! may drop the dot before a bit address: `mk8.3` reads the same as `mk.x8.3`.
//!
//! # Examples
//!
//! ```
//! use fieldlink_core::address::AddressGrammar;
//! use fieldlink_core::types::DataType;
//!
//! let grammar = AddressGrammar::modbus();
//! let address = grammar.parse("w2").unwrap();
//! assert_eq!(address.area, "hr");
//! assert_eq!(address.data_type, DataType::UnsignedInt16);
//! assert_eq!(address.position, 2);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PlcError, PlcResult};
use crate::types::{DataType, DeviceFamily};

/// Highest bit index accepted in a `.bit` suffix on 16-bit registers.
pub const MAX_BIT_INDEX: u8 = 15;

// =============================================================================
// Address
// =============================================================================

/// A parsed symbolic address.
///
/// `bit` is `Some` exactly when `data_type` is [`DataType::Boolean`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    /// Area tag, including its number when present (`db2`, `hr`, `mk`).
    pub area: String,
    /// Logical data type.
    pub data_type: DataType,
    /// Register position inside the area.
    pub position: u32,
    /// Bit index for Boolean addresses.
    pub bit: Option<u8>,
}

impl Address {
    /// Creates a non-Boolean address.
    pub fn new(area: impl Into<String>, data_type: DataType, position: u32) -> Self {
        let bit = data_type.is_bit().then_some(0);
        Self {
            area: area.into(),
            data_type,
            position,
            bit,
        }
    }

    /// Creates a Boolean address.
    pub fn bit(area: impl Into<String>, position: u32, bit: u8) -> Self {
        Self {
            area: area.into(),
            data_type: DataType::Boolean,
            position,
            bit: Some(bit),
        }
    }

    /// Returns the area name without its number (`db2` -> `db`).
    pub fn area_name(&self) -> &str {
        split_area_tag(&self.area).0
    }

    /// Returns the number carried by the area tag (`db2` -> `2`).
    pub fn area_number(&self) -> Option<u32> {
        split_area_tag(&self.area).1
    }

    /// Returns the bit index, `0` for non-Boolean addresses.
    pub fn bit_index(&self) -> u8 {
        self.bit.unwrap_or(0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.area, self.data_type.code(), self.position)?;
        if let Some(bit) = self.bit {
            write!(f, ".{bit}")?;
        }
        Ok(())
    }
}

/// Splits an area tag into its name and optional number.
///
/// `"db12"` gives `("db", Some(12))`, `"hr"` gives `("hr", None)`.
/// A number too large for `u32` is reported as `None`.
pub fn split_area_tag(tag: &str) -> (&str, Option<u32>) {
    let split = tag
        .char_indices()
        .find(|(_, c)| c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(tag.len());
    let (name, digits) = tag.split_at(split);
    (name, digits.parse().ok())
}

// =============================================================================
// AddressGrammar
// =============================================================================

/// Family-specific address parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressGrammar {
    family: DeviceFamily,
    areas: &'static [&'static str],
    numberless_areas: &'static [&'static str],
    default_area: &'static str,
    max_bit: u8,
}

impl AddressGrammar {
    /// Grammar for Modbus devices: areas `co`, `in`, `ir`, `hr`, default `hr`.
    pub const fn modbus() -> Self {
        Self {
            family: DeviceFamily::Modbus,
            areas: &["co", "in", "ir", "hr"],
            numberless_areas: &[],
            default_area: "hr",
            max_bit: MAX_BIT_INDEX,
        }
    }

    /// Grammar for Siemens S7 PLCs: areas `db`, `mk`, `pe`, `pa`, `ct`, `tm`, default `db`.
    pub const fn siemens() -> Self {
        Self {
            family: DeviceFamily::Siemens,
            areas: &["db", "mk", "pe", "pa", "ct", "tm"],
            numberless_areas: &["mk", "pe", "pa", "ct", "tm"],
            default_area: "db",
            // byte-addressed
            max_bit: 7,
        }
    }

    /// Returns the grammar for a device family.
    ///
    /// OPC-UA nodes are not addressed with this grammar; the Modbus grammar
    /// is returned so register helpers still have a sane default.
    pub const fn for_family(family: DeviceFamily) -> Self {
        match family {
            DeviceFamily::Siemens => Self::siemens(),
            DeviceFamily::Modbus | DeviceFamily::OpcUa => Self::modbus(),
        }
    }

    /// Returns the device family of this grammar.
    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    /// Returns the area used when an address has no prefix.
    pub fn default_area(&self) -> &'static str {
        self.default_area
    }

    /// Returns the highest bit index a Boolean address may carry.
    pub fn max_bit(&self) -> u8 {
        self.max_bit
    }

    /// Returns `true` if `name` is an area of this family.
    pub fn is_area(&self, name: &str) -> bool {
        self.areas.contains(&name)
    }

    /// Returns `true` if `name` is an area that never carries a number.
    pub fn is_numberless_area(&self, name: &str) -> bool {
        self.numberless_areas.contains(&name)
    }

    /// Parses an address string.
    ///
    /// # Errors
    ///
    /// - [`PlcError::InvalidAddress`] when the string does not match the grammar
    /// - [`PlcError::UnsupportedArea`] when the area is not in this family's allow-list
    /// - [`PlcError::UnsupportedType`] when the type code is unknown
    pub fn parse(&self, input: &str) -> PlcResult<Address> {
        let text = input.trim().to_lowercase();
        if text.is_empty() {
            return Err(PlcError::invalid_address(input, "empty address"));
        }

        let (area, body) = self.split_prefix(input, &text)?;
        let (type_code, position, bit) = parse_body(input, &body, self.max_bit)?;

        let data_type =
            DataType::from_code(type_code).ok_or_else(|| PlcError::unsupported_type(type_code))?;

        let bit = match (data_type.is_bit(), bit) {
            (true, bit) => Some(bit.unwrap_or(0)),
            (false, None) => None,
            (false, Some(_)) => {
                return Err(PlcError::invalid_address(
                    input,
                    format!("bit suffix is only valid for boolean addresses, not {data_type}"),
                ))
            }
        };

        Ok(Address {
            area,
            data_type,
            position,
            bit,
        })
    }

    /// Splits the optional `<area>[<digits>].` prefix from the body.
    fn split_prefix(&self, input: &str, text: &str) -> PlcResult<(String, String)> {
        let Some((head, tail)) = text.split_once('.') else {
            return Ok((self.default_area.to_string(), text.to_string()));
        };
        if !is_area_token(head) || tail.is_empty() {
            return Ok((self.default_area.to_string(), text.to_string()));
        }

        let (name, digits) = head.split_at(head.find(|c: char| c.is_ascii_digit()).unwrap_or(head.len()));
        let tail_is_bit = tail.bytes().all(|b| b.is_ascii_digit());

        if self.is_area(name) {
            if digits.is_empty() {
                return Ok((name.to_string(), tail.to_string()));
            }
            if self.is_numberless_area(name) {
                // `mk8.3`: numberless area written directly before a bit address
                if tail_is_bit {
                    return Ok((name.to_string(), format!("{digits}.{tail}")));
                }
                return Err(PlcError::invalid_address(
                    input,
                    format!("area '{name}' does not take a number"),
                ));
            }
            let number: u32 = digits
                .parse()
                .map_err(|_| PlcError::invalid_address(input, "area number out of range"))?;
            return Ok((format!("{name}{number}"), tail.to_string()));
        }

        // `x4.1`: no area, just a type-coded bit address
        if DataType::from_code(name).is_some() && tail_is_bit {
            return Ok((self.default_area.to_string(), text.to_string()));
        }

        Err(PlcError::unsupported_area(name))
    }
}

/// Returns `true` for `[a-z]+[0-9]*`.
fn is_area_token(token: &str) -> bool {
    let letters = token.bytes().take_while(|b| b.is_ascii_lowercase()).count();
    letters > 0 && token.bytes().skip(letters).all(|b| b.is_ascii_digit())
}

/// Parses `[<type>]<position>[.<bit>]`.
fn parse_body<'a>(input: &str, body: &'a str, max_bit: u8) -> PlcResult<(&'a str, u32, Option<u8>)> {
    let letters = body.bytes().take_while(|b| b.is_ascii_lowercase()).count();
    let (type_code, rest) = body.split_at(letters);

    let (position_text, bit_text) = match rest.split_once('.') {
        Some((position, bit)) => (position, Some(bit)),
        None => (rest, None),
    };

    if position_text.is_empty() || !position_text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PlcError::invalid_address(input, "expected a numeric position"));
    }
    let position = position_text
        .parse::<u32>()
        .map_err(|_| PlcError::invalid_address(input, "position out of range"))?;

    let bit = match bit_text {
        None => None,
        Some(text) if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) => {
            let bit = text
                .parse::<u8>()
                .ok()
                .filter(|bit| *bit <= max_bit)
                .ok_or_else(|| PlcError::invalid_address(input, format!("bit index must be 0..={max_bit}")))?;
            Some(bit)
        }
        Some(_) => return Err(PlcError::invalid_address(input, "malformed bit suffix")),
    };

    Ok((type_code, position, bit))
}

// =============================================================================
// Tests
// =============================================================================
