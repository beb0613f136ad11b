// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus/TCP application framing.
//!
//! # Frame Layout
//!
//! ```text
//! ┌──────────────────────────── MBAP header (7) ──────────────────────┐┌──── PDU ────┐
//! │ transaction id (2) │ protocol id (2) = 0 │ length (2) │ unit (1) ││ fc (1) │ ... │
//! └───────────────────────────────────────────────────────────────────┘└─────────────┘
//!                                          length = 1 + PDU bytes
//! ```
//!
//! All fields are big-endian. Read responses carry a byte count followed by
//! the data; write responses echo the start address and quantity.
//!
//! An echoed function code outside the set this client sends marks an
//! exception response; the byte after it is the exception code.

use std::fmt;

use crate::error::{ModbusError, ModbusResult, ProtocolError};

/// Size of the MBAP header in bytes.
pub const MBAP_HEADER_LEN: usize = 7;

/// Largest PDU a Modbus/TCP frame carries.
pub const MAX_PDU_LEN: usize = 253;

/// Item count limit of one read or write request.
pub const MAX_REGISTERS_PER_REQUEST: u16 = 123;

// =============================================================================
// RegisterType
// =============================================================================

/// The four Modbus data tables, addressed by area tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterType {
    /// `co`: read/write bits.
    Coil,
    /// `in`: read-only bits.
    DiscreteInput,
    /// `hr`: read/write words.
    HoldingRegister,
    /// `ir`: read-only words.
    InputRegister,
}

impl RegisterType {
    /// Looks up an area tag without digits.
    pub fn from_area(tag: &str) -> Option<Self> {
        match tag {
            "co" => Some(Self::Coil),
            "in" => Some(Self::DiscreteInput),
            "hr" => Some(Self::HoldingRegister),
            "ir" => Some(Self::InputRegister),
            _ => None,
        }
    }

    /// Area tag of this table.
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Coil => "co",
            Self::DiscreteInput => "in",
            Self::HoldingRegister => "hr",
            Self::InputRegister => "ir",
        }
    }

    /// Returns `true` for single-bit tables.
    pub const fn is_bit(&self) -> bool {
        matches!(self, Self::Coil | Self::DiscreteInput)
    }

    /// Function code that reads this table.
    pub const fn read_function(&self) -> FunctionCode {
        match self {
            Self::Coil => FunctionCode::ReadCoils,
            Self::DiscreteInput => FunctionCode::ReadDiscreteInputs,
            Self::HoldingRegister => FunctionCode::ReadHoldingRegisters,
            Self::InputRegister => FunctionCode::ReadInputRegisters,
        }
    }

    /// Function code that writes this table, if it is writable.
    pub const fn write_function(&self) -> Option<FunctionCode> {
        match self {
            Self::Coil => Some(FunctionCode::WriteMultipleCoils),
            Self::HoldingRegister => Some(FunctionCode::WriteMultipleRegisters),
            Self::DiscreteInput | Self::InputRegister => None,
        }
    }
}

impl fmt::Display for RegisterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// =============================================================================
// FunctionCode
// =============================================================================

/// Function codes this client sends and accepts in responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FunctionCode {
    /// FC1
    ReadCoils = 0x01,
    /// FC2
    ReadDiscreteInputs = 0x02,
    /// FC3
    ReadHoldingRegisters = 0x03,
    /// FC4
    ReadInputRegisters = 0x04,
    /// FC5
    WriteSingleCoil = 0x05,
    /// FC6
    WriteSingleRegister = 0x06,
    /// FC15
    WriteMultipleCoils = 0x0F,
    /// FC16
    WriteMultipleRegisters = 0x10,
}

impl FunctionCode {
    /// Decodes a known function code.
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::ReadCoils),
            0x02 => Some(Self::ReadDiscreteInputs),
            0x03 => Some(Self::ReadHoldingRegisters),
            0x04 => Some(Self::ReadInputRegisters),
            0x05 => Some(Self::WriteSingleCoil),
            0x06 => Some(Self::WriteSingleRegister),
            0x0F => Some(Self::WriteMultipleCoils),
            0x10 => Some(Self::WriteMultipleRegisters),
            _ => None,
        }
    }

    /// Wire value.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

// =============================================================================
// MbapHeader
// =============================================================================

/// Modbus application protocol header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    /// Matches a response to its request.
    pub transaction_id: u16,
    /// Always 0 for Modbus.
    pub protocol_id: u16,
    /// Bytes following the length field: unit id plus PDU.
    pub length: u16,
    /// Addressed unit.
    pub unit_id: u8,
}

impl MbapHeader {
    /// Header for a PDU of `pdu_len` bytes.
    pub fn new(transaction_id: u16, unit_id: u8, pdu_len: usize) -> Self {
        Self {
            transaction_id,
            protocol_id: 0,
            length: (pdu_len + 1) as u16,
            unit_id,
        }
    }

    /// Serializes the header.
    pub fn encode(&self) -> [u8; MBAP_HEADER_LEN] {
        let [t0, t1] = self.transaction_id.to_be_bytes();
        let [p0, p1] = self.protocol_id.to_be_bytes();
        let [l0, l1] = self.length.to_be_bytes();
        [t0, t1, p0, p1, l0, l1, self.unit_id]
    }

    /// Parses and checks a received header.
    pub fn decode(bytes: &[u8; MBAP_HEADER_LEN]) -> ModbusResult<Self> {
        let header = Self {
            transaction_id: u16::from_be_bytes([bytes[0], bytes[1]]),
            protocol_id: u16::from_be_bytes([bytes[2], bytes[3]]),
            length: u16::from_be_bytes([bytes[4], bytes[5]]),
            unit_id: bytes[6],
        };

        if header.protocol_id != 0 {
            return Err(ProtocolError::InvalidHeader(format!(
                "protocol id {} is not Modbus",
                header.protocol_id
            ))
            .into());
        }
        if header.length < 2 || usize::from(header.length) > MAX_PDU_LEN + 1 {
            return Err(ProtocolError::InvalidHeader(format!("length {} out of range", header.length)).into());
        }
        Ok(header)
    }

    /// PDU bytes that follow this header.
    pub fn pdu_len(&self) -> usize {
        usize::from(self.length).saturating_sub(1)
    }
}

// =============================================================================
// Requests
// =============================================================================

/// One request frame: MBAP header plus PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Header sent with the PDU.
    pub header: MbapHeader,
    /// Function code and payload.
    pub pdu: Vec<u8>,
}

impl Request {
    fn with_pdu(transaction_id: u16, unit_id: u8, pdu: Vec<u8>) -> Self {
        Self {
            header: MbapHeader::new(transaction_id, unit_id, pdu.len()),
            pdu,
        }
    }

    /// FC1..FC4 read of `count` items from `start`.
    pub fn read(transaction_id: u16, unit_id: u8, function: FunctionCode, start: u16, count: u16) -> Self {
        let mut pdu = Vec::with_capacity(5);
        pdu.push(function.code());
        pdu.extend_from_slice(&start.to_be_bytes());
        pdu.extend_from_slice(&count.to_be_bytes());
        Self::with_pdu(transaction_id, unit_id, pdu)
    }

    /// FC16 write of `count` registers; `data` holds `count * 2` bytes.
    pub fn write_registers(transaction_id: u16, unit_id: u8, start: u16, count: u16, data: &[u8]) -> Self {
        let mut pdu = Vec::with_capacity(6 + data.len());
        pdu.push(FunctionCode::WriteMultipleRegisters.code());
        pdu.extend_from_slice(&start.to_be_bytes());
        pdu.extend_from_slice(&count.to_be_bytes());
        pdu.push(data.len() as u8);
        pdu.extend_from_slice(data);
        Self::with_pdu(transaction_id, unit_id, pdu)
    }

    /// FC15 write of one coil per entry of `coils`.
    pub fn write_coils(transaction_id: u16, unit_id: u8, start: u16, coils: &[bool]) -> Self {
        let packed = pack_bits(coils);
        let mut pdu = Vec::with_capacity(6 + packed.len());
        pdu.push(FunctionCode::WriteMultipleCoils.code());
        pdu.extend_from_slice(&start.to_be_bytes());
        pdu.extend_from_slice(&(coils.len() as u16).to_be_bytes());
        pdu.push(packed.len() as u8);
        pdu.extend_from_slice(&packed);
        Self::with_pdu(transaction_id, unit_id, pdu)
    }

    /// Function code byte of the PDU.
    pub fn function_code(&self) -> u8 {
        self.pdu.first().copied().unwrap_or(0)
    }

    /// Serializes header and PDU.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(MBAP_HEADER_LEN + self.pdu.len());
        frame.extend_from_slice(&self.header.encode());
        frame.extend_from_slice(&self.pdu);
        frame
    }
}

// =============================================================================
// Responses
// =============================================================================

/// A response PDU split into function code and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Echoed function code.
    pub function: FunctionCode,
    /// Bytes after the function code.
    pub body: Vec<u8>,
}

impl Response {
    /// Splits a PDU. An unknown echoed function code is an exception.
    pub fn parse(pdu: &[u8]) -> ModbusResult<Self> {
        let (&code, body) = pdu
            .split_first()
            .ok_or_else(|| ProtocolError::InvalidHeader("empty PDU".into()))?;

        match FunctionCode::from_u8(code) {
            Some(function) => Ok(Self {
                function,
                body: body.to_vec(),
            }),
            None => {
                let exception_code = body.first().copied().ok_or(ProtocolError::ShortResponse {
                    expected: 1,
                    actual: 0,
                })?;
                Err(ModbusError::exception(code, exception_code))
            }
        }
    }

    /// Data bytes of a read response, checked to hold at least `expected`
    /// bytes and cut to exactly that many.
    pub fn read_data(&self, expected: usize) -> ModbusResult<Vec<u8>> {
        let data = self.body.get(1..).unwrap_or_default();
        if data.len() < expected {
            return Err(ProtocolError::ShortResponse {
                expected,
                actual: data.len(),
            }
            .into());
        }
        Ok(data[..expected].to_vec())
    }
}

// =============================================================================
// Bit packing
// =============================================================================

/// Packs coils LSB-first into `ceil(n / 8)` bytes.
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut packed = vec![0u8; bits.len().div_ceil(8)];
    for (i, _) in bits.iter().enumerate().filter(|(_, on)| **on) {
        packed[i / 8] |= 1 << (i % 8);
    }
    packed
}

/// Unpacks the first `count` LSB-first bits of `bytes`.
pub fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| bytes.get(i / 8).is_some_and(|byte| byte & (1 << (i % 8)) != 0))
        .collect()
}

/// Byte count of a bit-table read of `count` items.
pub fn bit_bytes(count: u16) -> usize {
    usize::from(count).div_ceil(8)
}
