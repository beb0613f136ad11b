// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Blocking S7 drivers.
//!
//! [`S7Driver`] is the narrow surface the client needs from snap7. The
//! client only calls it from `spawn_blocking` while holding its access
//! guard, so implementations can block freely.
//!
//! - [`NativeDriver`]: the snap7 library
//! - [`MemoryDriver`]: an in-process PLC image for tests and demos

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::S7Result;
use crate::ffi::{Snap7Handle, Snap7Library, ERR_INVALID_PARAMS};
use crate::types::{S7Area, S7Param, WordLength};

/// Native result: the error is the raw 32-bit snap7 code.
pub type DriverResult<T> = Result<T, u32>;

/// Blocking access to one S7 client connection.
pub trait S7Driver: Send + 'static {
    /// Connects to the PLC at `host` in `rack`/`slot`.
    fn connect_to(&mut self, host: &str, rack: u16, slot: u16) -> DriverResult<()>;

    /// Closes the connection.
    fn disconnect(&mut self) -> DriverResult<()>;

    /// Returns `true` while the link is up.
    fn is_connected(&mut self) -> bool;

    /// Reads `count` items of `word_len` into `buffer`.
    ///
    /// `start` is a bit offset for [`WordLength::Bit`], an item index for
    /// counters and timers and a byte offset otherwise.
    fn read_area(
        &mut self,
        area: S7Area,
        db: u16,
        start: u32,
        count: u32,
        word_len: WordLength,
        buffer: &mut [u8],
    ) -> DriverResult<()>;

    /// Writes `count` items of `word_len` from `data`.
    fn write_area(
        &mut self,
        area: S7Area,
        db: u16,
        start: u32,
        count: u32,
        word_len: WordLength,
        data: &[u8],
    ) -> DriverResult<()>;

    /// Reads a native parameter.
    fn get_param(&mut self, param: S7Param) -> DriverResult<i64>;

    /// Writes a native parameter.
    fn set_param(&mut self, param: S7Param, value: i64) -> DriverResult<()>;

    /// Text of a native error code.
    fn error_text(&self, code: u32) -> String;
}

// =============================================================================
// NativeDriver
// =============================================================================

/// snap7 client object.
pub struct NativeDriver {
    handle: Snap7Handle,
}

impl NativeDriver {
    /// Loads snap7 (once per process) and creates a client object.
    ///
    /// # Errors
    ///
    /// [`S7Error::DriverLoad`](crate::S7Error::DriverLoad) when the library
    /// or one of its entry points is missing.
    pub fn new(library: Option<&str>) -> S7Result<Self> {
        let library = Snap7Library::get(library)?;
        Ok(Self {
            handle: Snap7Handle::new(library)?,
        })
    }
}

impl S7Driver for NativeDriver {
    fn connect_to(&mut self, host: &str, rack: u16, slot: u16) -> DriverResult<()> {
        self.handle.connect_to(host, rack, slot)
    }

    fn disconnect(&mut self) -> DriverResult<()> {
        self.handle.disconnect()
    }

    fn is_connected(&mut self) -> bool {
        self.handle.is_connected()
    }

    fn read_area(
        &mut self,
        area: S7Area,
        db: u16,
        start: u32,
        count: u32,
        word_len: WordLength,
        buffer: &mut [u8],
    ) -> DriverResult<()> {
        self.handle.read_area(area, db, start, count, word_len, buffer)
    }

    fn write_area(
        &mut self,
        area: S7Area,
        db: u16,
        start: u32,
        count: u32,
        word_len: WordLength,
        data: &[u8],
    ) -> DriverResult<()> {
        self.handle.write_area(area, db, start, count, word_len, data)
    }

    fn get_param(&mut self, param: S7Param) -> DriverResult<i64> {
        self.handle.get_param(param.code(), param_size(param))
    }

    fn set_param(&mut self, param: S7Param, value: i64) -> DriverResult<()> {
        self.handle.set_param(param.code(), param_size(param), value)
    }

    fn error_text(&self, code: u32) -> String {
        self.handle.library().error_text(code)
    }
}

fn param_size(param: S7Param) -> usize {
    match param.kind() {
        crate::types::ParamKind::U16 => 2,
        _ => 4,
    }
}

impl fmt::Debug for NativeDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeDriver")
            .field("library", &self.handle.library().name())
            .finish()
    }
}

// =============================================================================
// MemoryDriver
// =============================================================================

/// snap7 `errTCPConnectionFailed`.
pub const ERR_CONNECTION_FAILED: u32 = 0x0000_0003;
/// snap7 `errTCPNotConnected`.
pub const ERR_NOT_CONNECTED: u32 = 0x0000_0009;
/// snap7 `errCliAddressOutOfRange`.
pub const ERR_ADDRESS_OUT_OF_RANGE: u32 = 0x0090_0000;
/// snap7 `errCliInvalidWordLen`.
pub const ERR_INVALID_WORD_LEN: u32 = 0x0050_0000;

/// Bytes per area image of a [`MemoryDriver`].
pub const MEMORY_AREA_SIZE: usize = 65_536;

/// One call received by a [`MemoryDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    /// `connect_to`
    Connect {
        /// Host.
        host: String,
        /// Rack.
        rack: u16,
        /// Slot.
        slot: u16,
    },
    /// `disconnect`
    Disconnect,
    /// `read_area`
    Read {
        /// Area.
        area: S7Area,
        /// DB number.
        db: u16,
        /// Start offset.
        start: u32,
        /// Item count.
        count: u32,
        /// Word length.
        word_len: WordLength,
    },
    /// `write_area`
    Write {
        /// Area.
        area: S7Area,
        /// DB number.
        db: u16,
        /// Start offset.
        start: u32,
        /// Item count.
        count: u32,
        /// Word length.
        word_len: WordLength,
    },
    /// `set_param`
    SetParam {
        /// Parameter.
        param: S7Param,
        /// Value.
        value: i64,
    },
}

#[derive(Debug, Default)]
struct MemoryPlc {
    connected: bool,
    unreachable: bool,
    connects: u32,
    areas: HashMap<(S7Area, u16), Vec<u8>>,
    params: HashMap<S7Param, i64>,
    calls: Vec<DriverCall>,
    fail_next: Option<u32>,
}

impl MemoryPlc {
    fn take_failure(&mut self) -> DriverResult<()> {
        match self.fail_next.take() {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn image(&mut self, area: S7Area, db: u16) -> &mut Vec<u8> {
        self.areas
            .entry((area, db))
            .or_insert_with(|| vec![0; MEMORY_AREA_SIZE])
    }
}

/// Byte range touched by an area call, or the single bit of a Bit call.
fn byte_span(start: u32, count: u32, word_len: WordLength) -> DriverResult<(usize, usize)> {
    let start = start as usize;
    let count = count as usize;
    let span = match word_len {
        WordLength::Bit if count != 1 => return Err(ERR_INVALID_WORD_LEN),
        WordLength::Bit => (start / 8, 1),
        WordLength::Counter | WordLength::Timer => (start * 2, count * 2),
        other => (start, count * other.size()),
    };
    if span.0 + span.1 > MEMORY_AREA_SIZE {
        return Err(ERR_ADDRESS_OUT_OF_RANGE);
    }
    Ok(span)
}

/// In-memory PLC image implementing [`S7Driver`].
///
/// Clones share the same image, so a test keeps one clone to seed memory
/// and inspect calls while the client owns another.
///
/// ```
/// use fieldlink_siemens::{MemoryDriver, S7Area};
///
/// let plc = MemoryDriver::new();
/// plc.set_bytes(S7Area::DataBlock, 2, 0, &[0x12, 0x34]);
/// assert_eq!(plc.bytes(S7Area::DataBlock, 2, 0, 2), vec![0x12, 0x34]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    plc: Arc<Mutex<MemoryPlc>>,
}

impl MemoryDriver {
    /// Creates a reachable, disconnected PLC with zeroed memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes bytes into an area image (`db` is ignored outside DBs).
    ///
    /// # Panics
    ///
    /// When the range leaves the area image.
    pub fn set_bytes(&self, area: S7Area, db: u16, offset: usize, data: &[u8]) {
        let mut plc = self.plc.lock();
        let image = plc.image(area, db_key(area, db));
        image[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Reads bytes from an area image.
    pub fn bytes(&self, area: S7Area, db: u16, offset: usize, len: usize) -> Vec<u8> {
        let mut plc = self.plc.lock();
        plc.image(area, db_key(area, db))[offset..offset + len].to_vec()
    }

    /// Fails the next driver call with `code`.
    pub fn fail_next(&self, code: u32) {
        self.plc.lock().fail_next = Some(code);
    }

    /// Makes connection attempts fail.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.plc.lock().unreachable = unreachable;
    }

    /// Drops the link as if the PLC went away.
    pub fn drop_link(&self) {
        self.plc.lock().connected = false;
    }

    /// Successful connects so far.
    pub fn connects(&self) -> u32 {
        self.plc.lock().connects
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.plc.lock().calls.clone()
    }

    /// Area calls received so far.
    pub fn area_calls(&self) -> Vec<DriverCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, DriverCall::Read { .. } | DriverCall::Write { .. }))
            .collect()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.plc.lock().calls.clear();
    }
}

fn db_key(area: S7Area, db: u16) -> u16 {
    match area {
        S7Area::DataBlock => db,
        _ => 0,
    }
}

impl S7Driver for MemoryDriver {
    fn connect_to(&mut self, host: &str, rack: u16, slot: u16) -> DriverResult<()> {
        let mut plc = self.plc.lock();
        plc.calls.push(DriverCall::Connect {
            host: host.to_string(),
            rack,
            slot,
        });
        plc.take_failure()?;
        if plc.unreachable {
            return Err(ERR_CONNECTION_FAILED);
        }
        plc.connected = true;
        plc.connects += 1;
        Ok(())
    }

    fn disconnect(&mut self) -> DriverResult<()> {
        let mut plc = self.plc.lock();
        plc.calls.push(DriverCall::Disconnect);
        plc.connected = false;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.plc.lock().connected
    }

    fn read_area(
        &mut self,
        area: S7Area,
        db: u16,
        start: u32,
        count: u32,
        word_len: WordLength,
        buffer: &mut [u8],
    ) -> DriverResult<()> {
        let mut plc = self.plc.lock();
        plc.calls.push(DriverCall::Read {
            area,
            db,
            start,
            count,
            word_len,
        });
        plc.take_failure()?;
        if !plc.connected {
            return Err(ERR_NOT_CONNECTED);
        }

        let (offset, len) = byte_span(start, count, word_len)?;
        if buffer.len() < len {
            return Err(ERR_INVALID_PARAMS);
        }
        let image = plc.image(area, db_key(area, db));
        if word_len == WordLength::Bit {
            buffer[0] = (image[offset] >> (start % 8)) & 1;
        } else {
            buffer[..len].copy_from_slice(&image[offset..offset + len]);
        }
        Ok(())
    }

    fn write_area(
        &mut self,
        area: S7Area,
        db: u16,
        start: u32,
        count: u32,
        word_len: WordLength,
        data: &[u8],
    ) -> DriverResult<()> {
        let mut plc = self.plc.lock();
        plc.calls.push(DriverCall::Write {
            area,
            db,
            start,
            count,
            word_len,
        });
        plc.take_failure()?;
        if !plc.connected {
            return Err(ERR_NOT_CONNECTED);
        }

        let (offset, len) = byte_span(start, count, word_len)?;
        if data.len() < len {
            return Err(ERR_INVALID_PARAMS);
        }
        let image = plc.image(area, db_key(area, db));
        if word_len == WordLength::Bit {
            let mask = 1u8 << (start % 8);
            if data[0] & 1 != 0 {
                image[offset] |= mask;
            } else {
                image[offset] &= !mask;
            }
        } else {
            image[offset..offset + len].copy_from_slice(&data[..len]);
        }
        Ok(())
    }

    fn get_param(&mut self, param: S7Param) -> DriverResult<i64> {
        let plc = self.plc.lock();
        Ok(plc.params.get(&param).copied().unwrap_or(match param {
            S7Param::RemotePort => 102,
            _ => 0,
        }))
    }

    fn set_param(&mut self, param: S7Param, value: i64) -> DriverResult<()> {
        let mut plc = self.plc.lock();
        plc.calls.push(DriverCall::SetParam { param, value });
        plc.take_failure()?;
        plc.params.insert(param, value);
        Ok(())
    }

    fn error_text(&self, code: u32) -> String {
        match code {
            ERR_CONNECTION_FAILED => "TCP : Connection failed".to_string(),
            ERR_NOT_CONNECTED => "TCP : Not connected".to_string(),
            ERR_ADDRESS_OUT_OF_RANGE => "CPU : Address out of range".to_string(),
            ERR_INVALID_WORD_LEN => "CLI : Invalid Transport size".to_string(),
            ERR_INVALID_PARAMS => "CLI : Invalid parameter(s) supplied to the current function".to_string(),
            other => format!("Unknown error (0x{other:08x})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_access() {
        let mut plc = MemoryDriver::new();
        plc.connect_to("10.0.0.1", 0, 1).unwrap();

        plc.write_area(S7Area::Marks, 0, 67, 1, WordLength::Bit, &[1]).unwrap();
        assert_eq!(plc.bytes(S7Area::Marks, 0, 8, 1), vec![0b0000_1000]);

        let mut buffer = [0u8; 1];
        plc.read_area(S7Area::Marks, 0, 67, 1, WordLength::Bit, &mut buffer).unwrap();
        assert_eq!(buffer, [1]);
        plc.read_area(S7Area::Marks, 0, 66, 1, WordLength::Bit, &mut buffer).unwrap();
        assert_eq!(buffer, [0]);
    }

    #[test]
    fn test_counter_units() {
        let mut plc = MemoryDriver::new();
        plc.connect_to("10.0.0.1", 0, 1).unwrap();
        plc.set_bytes(S7Area::Counters, 0, 2, &[0x00, 0x07]);

        let mut buffer = [0u8; 2];
        plc.read_area(S7Area::Counters, 0, 1, 1, WordLength::Counter, &mut buffer)
            .unwrap();
        assert_eq!(buffer, [0x00, 0x07]);
    }

    #[test]
    fn test_not_connected_and_failures() {
        let mut plc = MemoryDriver::new();
        let mut buffer = [0u8; 1];
        assert_eq!(
            plc.read_area(S7Area::DataBlock, 1, 0, 1, WordLength::Byte, &mut buffer),
            Err(ERR_NOT_CONNECTED)
        );

        plc.set_unreachable(true);
        assert_eq!(plc.connect_to("10.0.0.1", 0, 1), Err(ERR_CONNECTION_FAILED));
        plc.set_unreachable(false);
        plc.connect_to("10.0.0.1", 0, 1).unwrap();

        plc.fail_next(0x0070_0000);
        assert_eq!(
            plc.read_area(S7Area::DataBlock, 1, 0, 1, WordLength::Byte, &mut buffer),
            Err(0x0070_0000)
        );
        assert!(plc
            .read_area(S7Area::DataBlock, 1, 0, 1, WordLength::Byte, &mut buffer)
            .is_ok());
        assert_eq!(plc.connects(), 1);
    }

    #[test]
    fn test_short_buffer_is_refused() {
        let mut plc = MemoryDriver::new();
        plc.connect_to("10.0.0.1", 0, 1).unwrap();

        let mut buffer = [0u8; 1];
        assert_eq!(
            plc.read_area(S7Area::DataBlock, 1, 0, 100, WordLength::Byte, &mut buffer),
            Err(ERR_INVALID_PARAMS)
        );
        assert_eq!(
            plc.write_area(S7Area::DataBlock, 1, 0, 4, WordLength::Byte, &[1, 2]),
            Err(ERR_INVALID_PARAMS)
        );
        assert_eq!(plc.bytes(S7Area::DataBlock, 1, 0, 2), vec![0, 0]);
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(byte_span(65_535, 2, WordLength::Byte), Err(ERR_ADDRESS_OUT_OF_RANGE));
        assert_eq!(byte_span(8, 2, WordLength::Bit), Err(ERR_INVALID_WORD_LEN));
        assert_eq!(byte_span(3, 2, WordLength::Timer), Ok((6, 4)));
    }
}
