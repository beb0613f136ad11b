// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The `DeviceClient` contract shared by every protocol client.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      DeviceClient (trait)                       │
//! │  map_variables / read_variable_map / read_value / write_value   │
//! │  (provided: grammar + coalescer + codec over the methods below) │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  connect / disconnect / read_area / write_area / write_bit      │
//! │  read_registers / write_registers   (required, per protocol)    │
//! └─────────────────────────────────────────────────────────────────┘
//!            │                     │                      │
//!            ▼                     ▼                      ▼
//!     SiemensClient          ModbusClient            OpcUaClient
//! ```
//!
//! Implementations serialize all device access through an
//! [`AccessGuard`](crate::access::AccessGuard). The provided methods only
//! call the required ones, so each wire exchange takes the guard once.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::address::{Address, AddressGrammar};
use crate::codec::ValueCodec;
use crate::error::{PlcError, PlcResult};
use crate::plan::ReadWindow;
use crate::settings::ClientSettings;
use crate::types::{DataType, DeviceFamily, Value};
use crate::variables::{parse_table, VariableRegistry, VariableValues};

// =============================================================================
// ConnectionState
// =============================================================================

/// Connection state of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No connection.
    #[default]
    Disconnected,
    /// Connect in progress.
    Connecting,
    /// Connected and ready.
    Connected,
    /// The last connection attempt or exchange failed.
    Error,
}

impl ConnectionState {
    /// Returns `true` if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
            Self::Error => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Error,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Lock-free holder for a [`ConnectionState`], readable without the access guard.
#[derive(Debug, Default)]
pub struct StateCell(AtomicU8);

impl StateCell {
    /// Creates a cell in the disconnected state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Stores a new state.
    pub fn set(&self, state: ConnectionState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

// =============================================================================
// ClientStats
// =============================================================================

/// Counters for client operations.
#[derive(Debug, Default)]
pub struct ClientStats {
    total_requests: AtomicU64,
    failed_requests: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    total_response_time_us: AtomicU64,
    connections: AtomicU64,
}

impl ClientStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful read of `bytes` bytes.
    pub fn record_read(&self, bytes: usize, duration: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Records a successful write of `bytes` bytes.
    pub fn record_write(&self, bytes: usize, duration: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Records a failed request.
    pub fn record_error(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an established connection.
    pub fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Total requests, failed ones included.
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Failed requests.
    pub fn failed_requests(&self) -> u64 {
        self.failed_requests.load(Ordering::Relaxed)
    }

    /// Bytes received from the device.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Bytes sent to the device.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Connections established so far.
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    /// Average response time of successful requests.
    pub fn average_response_time(&self) -> Duration {
        let ok = self.total_requests().saturating_sub(self.failed_requests());
        if ok == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.total_response_time_us.load(Ordering::Relaxed) / ok)
    }
}

/// Returns `base + index * stride`.
///
/// # Errors
///
/// [`PlcError::InvalidValue`] when the result does not fit a `u32` position.
pub fn scaled_position(base: u32, index: u32, stride: u32) -> PlcResult<u32> {
    index
        .checked_mul(stride)
        .and_then(|offset| base.checked_add(offset))
        .ok_or_else(|| {
            PlcError::invalid_value(
                "position",
                format!("{base} + {index} * {stride} exceeds the address space"),
            )
        })
}

// =============================================================================
// DeviceClient
// =============================================================================

/// Client for one field device.
///
/// All methods take `&self`; share a client between tasks with `Arc`.
///
/// # Example
///
/// ```rust,ignore
/// use std::collections::BTreeMap;
///
/// let mut table = BTreeMap::new();
/// table.insert("speed".to_string(), "w2".to_string());
/// table.insert("running".to_string(), "co.x0".to_string());
///
/// client.connect().await?;
/// client.map_variables(&table, None)?;
/// let values = client.read_variable_map(None, 0).await?;
/// client.write_value(&Value::UInt16(1500), "w2").await?;
/// client.disconnect().await?;
/// ```
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Device family of this client.
    fn family(&self) -> DeviceFamily;

    /// Client settings.
    fn settings(&self) -> &ClientSettings;

    /// Variable maps of this client.
    fn variables(&self) -> &VariableRegistry;

    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Returns `true` if connected.
    fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Address grammar of this client.
    fn grammar(&self) -> AddressGrammar {
        AddressGrammar::for_family(self.family())
    }

    /// Value codec of this client.
    fn codec(&self) -> ValueCodec {
        self.settings().value_codec()
    }

    // -------------------------------------------------------------------------
    // Required operations
    // -------------------------------------------------------------------------

    /// Opens the connection. Connecting again to a live endpoint is a no-op.
    async fn connect(&self) -> PlcResult<()>;

    /// Closes the connection. Always safe to call.
    async fn disconnect(&self) -> PlcResult<()>;

    /// Reads `count` registers of the default area starting at `position`.
    async fn read_registers(&self, position: u32, count: u32) -> PlcResult<Vec<u8>>;

    /// Writes `count` registers of the default area starting at `position`.
    async fn write_registers(&self, data: &[u8], position: u32, count: u32) -> PlcResult<()>;

    /// Reads `count` registers of `area`.
    ///
    /// `extra_id` is the protocol's secondary selector: the DB number on S7,
    /// the unit id on Modbus.
    async fn read_area(
        &self,
        area: &str,
        position: u32,
        count: u32,
        extra_id: Option<u32>,
    ) -> PlcResult<Vec<u8>>;

    /// Writes `count` registers of `area`.
    async fn write_area(
        &self,
        data: &[u8],
        area: &str,
        position: u32,
        count: u32,
        extra_id: Option<u32>,
    ) -> PlcResult<()>;

    /// Sets or clears one bit, preserving the rest of its register.
    ///
    /// The read, merge and write run under a single acquisition of the
    /// access guard.
    async fn write_bit(&self, address: &Address, on: bool) -> PlcResult<()>;

    // -------------------------------------------------------------------------
    // Provided operations
    // -------------------------------------------------------------------------

    /// Reads the registers of one variable-map window.
    async fn read_window(&self, area: &str, window: &ReadWindow, offset: u32) -> PlcResult<Vec<u8>> {
        let start = scaled_position(window.min, offset, window.count)?;
        self.read_area(area, start, window.count, None).await
    }

    /// Parses `table` (name -> address) and merges it into the map `map_name`.
    ///
    /// # Errors
    ///
    /// The first bad address; the registry is left untouched.
    fn map_variables(&self, table: &BTreeMap<String, String>, map_name: Option<&str>) -> PlcResult<()> {
        let entries = parse_table(&self.grammar(), table.iter().map(|(k, v)| (k.clone(), v)))?;
        self.variables()
            .register(map_name, entries, &self.settings().coalescer());
        Ok(())
    }

    /// Reads every variable of the map `map_name`, one request per window.
    ///
    /// `offset` shifts every window by whole window lengths.
    async fn read_variable_map(&self, map_name: Option<&str>, offset: u32) -> PlcResult<VariableValues> {
        let map = self.variables().get(map_name)?;
        let codec = self.codec();
        let mut values = VariableValues::new();

        for (area, variables) in map.areas() {
            for window in variables.windows() {
                let data = self.read_window(area, window, offset).await?;
                values.extend(variables.decode_window(&codec, window, &data));
            }
        }
        Ok(values)
    }

    /// Reads one variable by address string.
    async fn read_value(&self, address: &str) -> PlcResult<Option<Value>> {
        let address = self.grammar().parse(address)?;
        self.read_address(&address).await
    }

    /// Reads one parsed address.
    async fn read_address(&self, address: &Address) -> PlcResult<Option<Value>> {
        let codec = self.codec();
        let count = codec.catalog().footprint(address.data_type);
        let data = self.read_area(&address.area, address.position, count, None).await?;
        Ok(codec.decode(&data, address.data_type, address.bit_index()))
    }

    /// Writes one variable by address string.
    async fn write_value(&self, value: &Value, address: &str) -> PlcResult<()> {
        let address = self.grammar().parse(address)?;
        self.write_address(value, &address).await
    }

    /// Writes one parsed address. Booleans go through [`write_bit`](Self::write_bit).
    async fn write_address(&self, value: &Value, address: &Address) -> PlcResult<()> {
        if address.data_type.is_bit() {
            let on = value.as_bool().ok_or_else(|| {
                PlcError::invalid_value(address.to_string(), format!("'{value}' is not a boolean"))
            })?;
            return self.write_bit(address, on).await;
        }

        let codec = self.codec();
        let data = codec.encode(value, address.data_type, 0)?;
        let count = codec.catalog().footprint(address.data_type);
        self.write_area(&data, &address.area, address.position, count, None)
            .await
    }

    /// Reads `n` consecutive values of `data_type` from the default area.
    async fn read_array(&self, position: u32, data_type: DataType, n: u32) -> PlcResult<Vec<Option<Value>>> {
        let codec = self.codec();
        let footprint = codec.catalog().footprint(data_type);
        let count = scaled_position(0, n, footprint)?;
        let data = self.read_registers(position, count).await?;

        let width = codec.width(data_type);
        Ok((0..n as usize)
            .map(|i| {
                data.get(i * width..(i + 1) * width)
                    .and_then(|bytes| codec.decode(bytes, data_type, 0))
            })
            .collect())
    }

    /// Reads a set of `position -> type` values from the default area with
    /// coalesced requests.
    async fn read_values(&self, members: &BTreeMap<u32, DataType>) -> PlcResult<BTreeMap<u32, Option<Value>>> {
        let codec = self.codec();
        let bytes_per_register = codec.catalog().bytes_per_register();
        let windows = self
            .settings()
            .coalescer()
            .plan(members.iter().map(|(p, t)| (*p, *t)));

        let mut values = BTreeMap::new();
        for window in windows {
            let data = self.read_registers(window.min, window.count).await?;
            for (position, data_type) in members.range(window.min..=window.max) {
                let start = (position - window.min) as usize * bytes_per_register;
                let value = data
                    .get(start..start + codec.width(*data_type))
                    .and_then(|bytes| codec.decode(bytes, *data_type, 0));
                values.insert(*position, value);
            }
        }
        Ok(values)
    }
}
