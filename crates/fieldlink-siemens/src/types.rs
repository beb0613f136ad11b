// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! S7 areas, word lengths and native client parameters.
//!
//! # Areas
//!
//! ```text
//! tag  area             code  word length  size
//! ───  ───────────────  ────  ───────────  ────
//! pe   process inputs   0x81  Byte         1
//! pa   process outputs  0x82  Byte         1
//! mk   marks            0x83  Bit          1
//! db   data block       0x84  Byte         1
//! ct   counters         0x1C  Counter      2
//! tm   timers           0x1D  Timer        2
//! ```
//!
//! Addresses on a Bit area are bit offsets (`byte * 8 + bit`).

use std::fmt;

// =============================================================================
// S7Area
// =============================================================================

/// Memory areas reachable through the area read/write calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum S7Area {
    /// `pe`
    ProcessInputs,
    /// `pa`
    ProcessOutputs,
    /// `mk`
    Marks,
    /// `db`
    DataBlock,
    /// `ct`
    Counters,
    /// `tm`
    Timers,
}

impl S7Area {
    /// All areas.
    pub const ALL: [S7Area; 6] = [
        Self::ProcessInputs,
        Self::ProcessOutputs,
        Self::Marks,
        Self::DataBlock,
        Self::Counters,
        Self::Timers,
    ];

    /// Looks up an area tag without digits.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|area| area.tag() == tag)
    }

    /// Area tag.
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::ProcessInputs => "pe",
            Self::ProcessOutputs => "pa",
            Self::Marks => "mk",
            Self::DataBlock => "db",
            Self::Counters => "ct",
            Self::Timers => "tm",
        }
    }

    /// Native area code.
    pub const fn code(&self) -> i32 {
        match self {
            Self::ProcessInputs => 0x81,
            Self::ProcessOutputs => 0x82,
            Self::Marks => 0x83,
            Self::DataBlock => 0x84,
            Self::Counters => 0x1C,
            Self::Timers => 0x1D,
        }
    }

    /// Word length used by [`read_area`](crate::SiemensClient) on this area.
    pub const fn word_length(&self) -> WordLength {
        match self {
            Self::ProcessInputs | Self::ProcessOutputs | Self::DataBlock => WordLength::Byte,
            Self::Marks => WordLength::Bit,
            Self::Counters => WordLength::Counter,
            Self::Timers => WordLength::Timer,
        }
    }

    /// Bytes moved by an area call of `count` items of `word_len`.
    ///
    /// snap7 transfers counters and timers as 2-byte items whatever word
    /// length the call names.
    pub fn transfer_len(&self, word_len: WordLength, count: u32) -> Option<usize> {
        let item = match self {
            Self::Counters | Self::Timers => 2,
            _ => word_len.size(),
        };
        usize::try_from(count).ok()?.checked_mul(item)
    }

    /// Word length for byte-addressed access (variable maps, typed values).
    pub const fn byte_word_length(&self) -> WordLength {
        match self {
            Self::Marks => WordLength::Byte,
            other => other.word_length(),
        }
    }
}

impl fmt::Display for S7Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// =============================================================================
// WordLength
// =============================================================================

/// Transfer unit of an area call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordLength {
    /// Single bit, carried in one byte.
    Bit,
    /// 8 bits.
    Byte,
    /// 16 bits.
    Word,
    /// 32 bits.
    DWord,
    /// 32-bit float.
    Real,
    /// One counter (16 bits).
    Counter,
    /// One timer (16 bits).
    Timer,
}

impl WordLength {
    /// Native word length code.
    pub const fn code(&self) -> i32 {
        match self {
            Self::Bit => 0x01,
            Self::Byte => 0x02,
            Self::Word => 0x04,
            Self::DWord => 0x06,
            Self::Real => 0x08,
            Self::Counter => 0x1C,
            Self::Timer => 0x1D,
        }
    }

    /// Bytes per transferred item.
    pub const fn size(&self) -> usize {
        match self {
            Self::Bit | Self::Byte => 1,
            Self::Word | Self::Counter | Self::Timer => 2,
            Self::DWord | Self::Real => 4,
        }
    }
}

// =============================================================================
// S7Param
// =============================================================================

/// Native value type of a client parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// `u16`
    U16,
    /// `i32`
    I32,
    /// `u32`
    U32,
}

impl ParamKind {
    /// Returns `true` if `value` fits this type.
    pub fn accepts(&self, value: i64) -> bool {
        match self {
            Self::U16 => u16::try_from(value).is_ok(),
            Self::I32 => i32::try_from(value).is_ok(),
            Self::U32 => u32::try_from(value).is_ok(),
        }
    }
}

/// Native client parameters for `get_param` / `set_param`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum S7Param {
    /// Local socket port (server only).
    LocalPort,
    /// Remote PLC port.
    RemotePort,
    /// Ping timeout in ms; 0 disables the ping.
    PingTimeout,
    /// Socket send timeout in ms.
    SendTimeout,
    /// Socket receive timeout in ms.
    RecvTimeout,
    /// Socket worker interval (server only).
    WorkInterval,
    /// ISO-TCP source reference.
    SrcRef,
    /// ISO-TCP destination reference.
    DstRef,
    /// ISO-TCP source TSAP.
    SrcTSap,
    /// Initial PDU length request.
    PduRequest,
    /// Maximum clients (server only).
    MaxClients,
    /// BSend completion timeout (partner only).
    BSendTimeout,
    /// BRecv completion timeout (partner only).
    BRecvTimeout,
    /// Disconnection recovery time (partner only).
    RecoveryTime,
    /// Keep-alive time (partner only).
    KeepAliveTime,
}

impl S7Param {
    /// Native parameter number.
    pub const fn code(&self) -> i32 {
        match self {
            Self::LocalPort => 1,
            Self::RemotePort => 2,
            Self::PingTimeout => 3,
            Self::SendTimeout => 4,
            Self::RecvTimeout => 5,
            Self::WorkInterval => 6,
            Self::SrcRef => 7,
            Self::DstRef => 8,
            Self::SrcTSap => 9,
            Self::PduRequest => 10,
            Self::MaxClients => 11,
            Self::BSendTimeout => 12,
            Self::BRecvTimeout => 13,
            Self::RecoveryTime => 14,
            Self::KeepAliveTime => 15,
        }
    }

    /// Native value type.
    pub const fn kind(&self) -> ParamKind {
        match self {
            Self::LocalPort | Self::RemotePort | Self::SrcRef | Self::DstRef | Self::SrcTSap => ParamKind::U16,
            Self::RecoveryTime | Self::KeepAliveTime => ParamKind::U32,
            _ => ParamKind::I32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_lookup() {
        assert_eq!(S7Area::from_tag("mk"), Some(S7Area::Marks));
        assert_eq!(S7Area::from_tag("hr"), None);
        assert_eq!(S7Area::DataBlock.code(), 0x84);
        assert_eq!(S7Area::Timers.code(), 0x1D);
    }

    #[test]
    fn test_word_lengths() {
        assert_eq!(S7Area::Marks.word_length(), WordLength::Bit);
        assert_eq!(S7Area::Marks.byte_word_length(), WordLength::Byte);
        assert_eq!(S7Area::Counters.word_length().size(), 2);
        assert_eq!(WordLength::Real.code(), 0x08);
    }

    #[test]
    fn test_transfer_len() {
        assert_eq!(S7Area::DataBlock.transfer_len(WordLength::Byte, 100), Some(100));
        assert_eq!(S7Area::DataBlock.transfer_len(WordLength::Real, 3), Some(12));
        assert_eq!(S7Area::Marks.transfer_len(WordLength::Bit, 1), Some(1));
        assert_eq!(S7Area::Counters.transfer_len(WordLength::Byte, 3), Some(6));
    }

    #[test]
    fn test_param_kinds() {
        assert_eq!(S7Param::RemotePort.code(), 2);
        assert_eq!(S7Param::KeepAliveTime.code(), 15);
        assert!(S7Param::RemotePort.kind().accepts(65_535));
        assert!(!S7Param::RemotePort.kind().accepts(70_000));
        assert!(S7Param::PingTimeout.kind().accepts(-1));
        assert!(!S7Param::RecoveryTime.kind().accepts(-1));
    }
}
