// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Siemens S7 device client.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     SiemensClient<D>                         │
//! │  DeviceClient + explicit-DB operations (read_value_in, ...)  │
//! └──────────────────────────────────────────────────────────────┘
//!                              │ AccessGuard (one access at a time, paced)
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  SiemensSession { host, rack, slot, connected }              │
//! │  AreaRequest ──► spawn_blocking ──► S7Driver::read_area      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Addressing
//!
//! Raw [`read_area`](DeviceClient::read_area) calls use each area's native
//! word length, so `mk` positions are bit offsets and `ct`/`tm` positions
//! are counter/timer numbers. Typed values and variable maps are byte
//! addressed on every area: marks are read as bytes and counter `n` sits at
//! byte `2n`.
//!
//! # DB numbers
//!
//! A DB number given explicitly (in the address as `db5.w0`, as `extra_id`
//! or as the `db` argument of the `*_in` methods) is remembered and used for
//! later accesses that do not name one. Without either, a DB access fails
//! with [`PlcError::MissingDbNumber`].

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use fieldlink_core::{
    scaled_position, split_area_tag, AccessGuard, Address, ClientSettings, ClientStats, ConnectionState,
    DataType, DeviceClient, DeviceFamily, PlcError, PlcResult, ReadWindow, StateCell, Value, VariableRegistry,
};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::config::{SiemensConfig, DEFAULT_PORT};
use crate::driver::{DriverResult, NativeDriver, S7Driver};
use crate::error::{S7Error, S7Result};
use crate::types::{S7Area, S7Param, WordLength};

// =============================================================================
// Session
// =============================================================================

#[derive(Debug)]
struct SiemensSession {
    host: String,
    port: u16,
    rack: u16,
    slot: u16,
    connected: bool,
}

/// One native area call.
#[derive(Debug, Clone, Copy)]
struct AreaRequest {
    area: S7Area,
    db: u16,
    start: u32,
    count: u32,
    word_len: WordLength,
}

impl AreaRequest {
    fn len(&self) -> usize {
        self.count as usize * self.word_len.size()
    }
}

/// Bit offset of mark `position.bit` in the marks area.
fn mark_offset(position: u32, bit: u8) -> PlcResult<u32> {
    if bit > 7 {
        return Err(PlcError::invalid_value(
            format!("mk.x{position}.{bit}"),
            format!("bit {bit} outside a 1-byte register"),
        ));
    }
    scaled_position(u32::from(bit), position, 8)
}

// =============================================================================
// SiemensClient
// =============================================================================

/// Client for one S7 PLC.
///
/// # Example
///
/// ```rust,ignore
/// use fieldlink_core::{DeviceClient, Value};
/// use fieldlink_siemens::{SiemensClient, SiemensConfig};
///
/// let client = SiemensClient::new(SiemensConfig::new("192.168.0.10"))?;
/// client.connect().await?;
/// let level = client.read_value("db2.r4").await?;
/// client.write_value(&Value::Bool(true), "mk8.3").await?;
/// // later accesses without a DB number use DB 2
/// let status = client.read_value("w0").await?;
/// ```
pub struct SiemensClient<D: S7Driver = NativeDriver> {
    config: SiemensConfig,
    settings: ClientSettings,
    guard: AccessGuard<SiemensSession>,
    driver: Arc<Mutex<D>>,
    state: StateCell,
    stats: ClientStats,
    variables: VariableRegistry,
    db_number: Mutex<Option<u16>>,
}

impl SiemensClient<NativeDriver> {
    /// Creates a disconnected client on the snap7 library.
    ///
    /// # Errors
    ///
    /// [`PlcError::DriverLoad`] when snap7 cannot be loaded,
    /// [`PlcError::Configuration`] for an invalid configuration.
    pub fn new(config: SiemensConfig) -> PlcResult<Self> {
        config.validate()?;
        let driver = NativeDriver::new(config.library.as_deref())?;
        Self::with_driver(config, driver)
    }
}

impl<D: S7Driver> SiemensClient<D> {
    /// Creates a disconnected client on `driver`.
    pub fn with_driver(config: SiemensConfig, driver: D) -> PlcResult<Self> {
        config.validate()?;
        let settings = config.to_settings()?;
        let session = SiemensSession {
            host: config.host.clone(),
            port: config.port,
            rack: config.rack,
            slot: config.slot,
            connected: false,
        };

        Ok(Self {
            guard: AccessGuard::new(session, settings.access_timeout, settings.pacing),
            driver: Arc::new(Mutex::new(driver)),
            db_number: Mutex::new(config.db_number),
            config,
            settings,
            state: StateCell::new(),
            stats: ClientStats::new(),
            variables: VariableRegistry::new(),
        })
    }

    /// Client configuration.
    pub fn config(&self) -> &SiemensConfig {
        &self.config
    }

    /// Request statistics.
    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    /// DB number used when an access names none.
    pub fn db_number(&self) -> Option<u16> {
        *self.db_number.lock()
    }

    /// Runs a blocking driver call off the runtime.
    async fn call<T, F>(&self, op: F) -> S7Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut D) -> DriverResult<T> + Send + 'static,
    {
        let driver = Arc::clone(&self.driver);
        tokio::task::spawn_blocking(move || {
            let mut driver = driver.lock();
            op(&mut *driver).map_err(|code| S7Error::from_code(code, driver.error_text(code)))
        })
        .await
        .map_err(|e| S7Error::client(format!("driver task failed: {e}")))?
    }

    fn resolve_db(&self, db: Option<u16>) -> S7Result<u16> {
        let mut cached = self.db_number.lock();
        match db {
            Some(db) => {
                *cached = Some(db);
                Ok(db)
            }
            None => cached.ok_or(S7Error::MissingDbNumber),
        }
    }

    /// Resolves an area tag and an optional DB number.
    fn target(&self, area_tag: &str, extra_id: Option<u32>) -> PlcResult<(S7Area, u16)> {
        let (name, number) = split_area_tag(area_tag);
        let area = S7Area::from_tag(name).ok_or_else(|| S7Error::UnknownArea {
            area: area_tag.to_string(),
        })?;
        if area != S7Area::DataBlock {
            return Ok((area, 0));
        }

        let explicit = number
            .or(extra_id)
            .map(|n| {
                u16::try_from(n)
                    .map_err(|_| PlcError::invalid_address(area_tag, format!("DB number {n} out of range")))
            })
            .transpose()?;
        Ok((area, self.resolve_db(explicit)?))
    }

    // -------------------------------------------------------------------------
    // Connection
    // -------------------------------------------------------------------------

    /// Connects, optionally to another PLC or CPU position.
    ///
    /// With a live link to the same host, rack and slot this is a no-op.
    pub async fn connect_to(&self, host: Option<&str>, rack: Option<u16>, slot: Option<u16>) -> PlcResult<()> {
        let mut session = self.guard.acquire().await?;

        let same_target = host.map_or(true, |h| h == session.host)
            && rack.map_or(true, |r| r == session.rack)
            && slot.map_or(true, |s| s == session.slot);
        if same_target && session.connected && self.call(|d| Ok(d.is_connected())).await? {
            debug!(host = %session.host, rack = session.rack, slot = session.slot, "S7 connection still open");
            self.state.set(ConnectionState::Connected);
            return Ok(());
        }

        if let Some(host) = host {
            session.host = host.to_string();
        }
        session.rack = rack.unwrap_or(session.rack);
        session.slot = slot.unwrap_or(session.slot);

        let result = self.open(&mut session).await.map_err(|e| {
            e.log("connect");
            PlcError::from(e)
        });
        session.finish(result).await
    }

    async fn open(&self, session: &mut SiemensSession) -> S7Result<()> {
        if session.connected {
            if let Err(e) = self.call(|d| d.disconnect()).await {
                debug!(error = %e, "Disconnect before reconnect failed");
            }
            session.connected = false;
        }
        self.state.set(ConnectionState::Connecting);

        if session.port != DEFAULT_PORT {
            let port = i64::from(session.port);
            self.call(move |d| d.set_param(S7Param::RemotePort, port)).await?;
        }

        let (host, rack, slot) = (session.host.clone(), session.rack, session.slot);
        if let Err(e) = self.call(move |d| d.connect_to(&host, rack, slot)).await {
            self.state.set(ConnectionState::Error);
            return Err(e);
        }

        session.connected = true;
        self.state.set(ConnectionState::Connected);
        self.stats.record_connection();
        info!(
            host = %session.host,
            port = session.port,
            rack = session.rack,
            slot = session.slot,
            "Connected to S7 PLC"
        );
        Ok(())
    }

    async fn ensure_connected(&self, session: &mut SiemensSession) -> S7Result<()> {
        if session.connected {
            return Ok(());
        }
        if self.settings.auto_connect {
            return self.open(session).await;
        }
        Err(S7Error::NotConnected)
    }

    /// Records, logs and converts a failed access.
    async fn fail(&self, session: &mut SiemensSession, error: S7Error, context: &str) -> PlcError {
        self.stats.record_error();
        error.log(context);
        if error.is_communication() && self.settings.disconnect_on_error {
            if let Err(e) = self.call(|d| d.disconnect()).await {
                debug!(error = %e, "Disconnect after communication error failed");
            }
            session.connected = false;
            self.state.set(ConnectionState::Disconnected);
            warn!(host = %session.host, "Dropped S7 connection after communication error");
        }
        error.into()
    }

    async fn settle<T>(&self, session: &mut SiemensSession, result: S7Result<T>, context: &str) -> PlcResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => Err(self.fail(session, e, context).await),
        }
    }

    // -------------------------------------------------------------------------
    // Wire access (lease held by the caller)
    // -------------------------------------------------------------------------

    async fn run_read(&self, session: &mut SiemensSession, request: AreaRequest) -> S7Result<Vec<u8>> {
        self.ensure_connected(session).await?;
        trace!(
            area = %request.area,
            db = request.db,
            start = request.start,
            count = request.count,
            "S7 read"
        );
        let len = request.len();
        self.call(move |d| {
            let mut buffer = vec![0u8; len];
            d.read_area(
                request.area,
                request.db,
                request.start,
                request.count,
                request.word_len,
                &mut buffer,
            )
            .map(|()| buffer)
        })
        .await
    }

    async fn run_write(&self, session: &mut SiemensSession, request: AreaRequest, data: Vec<u8>) -> S7Result<()> {
        self.ensure_connected(session).await?;
        trace!(
            area = %request.area,
            db = request.db,
            start = request.start,
            count = request.count,
            "S7 write"
        );
        self.call(move |d| {
            d.write_area(
                request.area,
                request.db,
                request.start,
                request.count,
                request.word_len,
                &data,
            )
        })
        .await
    }

    /// Reads `len` bytes at byte offset `offset`, whatever the area's unit.
    async fn read_bytes_in(
        &self,
        session: &mut SiemensSession,
        area: S7Area,
        db: u16,
        offset: u32,
        len: u32,
    ) -> S7Result<Vec<u8>> {
        let word_len = area.byte_word_length();
        let unit = word_len.size() as u32;
        let skip = (offset % unit) as usize;
        let span = len
            .checked_add(skip as u32)
            .ok_or_else(|| S7Error::client(format!("{len} bytes at {offset} exceed the {area} area")))?;
        let request = AreaRequest {
            area,
            db,
            start: offset / unit,
            count: span.div_ceil(unit),
            word_len,
        };

        let data = self.run_read(session, request).await?;
        data.get(skip..skip + len as usize)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| S7Error::client(format!("short read from {area}: {} bytes", data.len())))
    }

    /// Writes `data` at byte offset `offset`. Partial units of counters and
    /// timers are merged into the current unit contents.
    async fn write_bytes_in(
        &self,
        session: &mut SiemensSession,
        area: S7Area,
        db: u16,
        offset: u32,
        data: &[u8],
    ) -> S7Result<()> {
        let word_len = area.byte_word_length();
        let unit = word_len.size() as u32;
        let len = data.len() as u32;
        let skip = offset % unit;

        let (start, block) = if skip == 0 && len % unit == 0 {
            (offset / unit, data.to_vec())
        } else {
            let first = offset / unit;
            let covered = (skip + len).div_ceil(unit) * unit;
            let mut block = self
                .read_bytes_in(session, area, db, first * unit, covered)
                .await?;
            block[skip as usize..(skip + len) as usize].copy_from_slice(data);
            (first, block)
        };

        let request = AreaRequest {
            area,
            db,
            start,
            count: block.len() as u32 / unit,
            word_len,
        };
        self.run_write(session, request, block).await
    }

    // -------------------------------------------------------------------------
    // Leased operations
    // -------------------------------------------------------------------------

    async fn read_request(&self, request: AreaRequest, context: &str) -> PlcResult<Vec<u8>> {
        let mut session = self.guard.acquire().await?;
        let started = Instant::now();
        let result = self.run_read(&mut session, request).await;
        if let Ok(data) = &result {
            self.stats.record_read(data.len(), started.elapsed());
        }
        let result = self.settle(&mut session, result, context).await;
        session.finish(result).await
    }

    async fn write_request(&self, request: AreaRequest, data: &[u8], context: &str) -> PlcResult<()> {
        if data.len() != request.len() {
            return Err(S7Error::PayloadLength {
                expected: request.len(),
                actual: data.len(),
            }
            .into());
        }

        let mut session = self.guard.acquire().await?;
        let started = Instant::now();
        let result = self.run_write(&mut session, request, data.to_vec()).await;
        if result.is_ok() {
            self.stats.record_write(data.len(), started.elapsed());
        }
        let result = self.settle(&mut session, result, context).await;
        session.finish(result).await
    }

    async fn read_bytes(&self, area: S7Area, db: u16, offset: u32, len: u32) -> PlcResult<Vec<u8>> {
        let mut session = self.guard.acquire().await?;
        let started = Instant::now();
        let result = self.read_bytes_in(&mut session, area, db, offset, len).await;
        if let Ok(data) = &result {
            self.stats.record_read(data.len(), started.elapsed());
        }
        let result = self.settle(&mut session, result, "read").await;
        session.finish(result).await
    }

    async fn write_bytes(&self, area: S7Area, db: u16, offset: u32, data: &[u8]) -> PlcResult<()> {
        let mut session = self.guard.acquire().await?;
        let started = Instant::now();
        let result = self.write_bytes_in(&mut session, area, db, offset, data).await;
        if result.is_ok() {
            self.stats.record_write(data.len(), started.elapsed());
        }
        let result = self.settle(&mut session, result, "write").await;
        session.finish(result).await
    }

    // -------------------------------------------------------------------------
    // Explicit-DB operations
    // -------------------------------------------------------------------------

    /// Reads `count` bytes of a DB. `db = None` uses the remembered DB.
    pub async fn read_registers_in(&self, db: Option<u16>, position: u32, count: u32) -> PlcResult<Vec<u8>> {
        let db = self.resolve_db(db)?;
        let request = AreaRequest {
            area: S7Area::DataBlock,
            db,
            start: position,
            count,
            word_len: WordLength::Byte,
        };
        self.read_request(request, "read").await
    }

    /// Writes `count` bytes of a DB.
    pub async fn write_registers_in(&self, db: Option<u16>, data: &[u8], position: u32, count: u32) -> PlcResult<()> {
        let db = self.resolve_db(db)?;
        let request = AreaRequest {
            area: S7Area::DataBlock,
            db,
            start: position,
            count,
            word_len: WordLength::Byte,
        };
        self.write_request(request, data, "write").await
    }

    /// Sets `count` bytes of a DB to `byte`.
    pub async fn write_registers_fill(&self, byte: u8, position: u32, count: u32, db: Option<u16>) -> PlcResult<()> {
        let data = vec![byte; count as usize];
        self.write_registers_in(db, &data, position, count).await
    }

    /// Reads one value by address string; `db` applies to plain `db` addresses.
    pub async fn read_value_in(&self, db: Option<u16>, address: &str) -> PlcResult<Option<Value>> {
        let address = self.grammar().parse(address)?;
        self.read_address_in(db, &address).await
    }

    /// Reads one parsed address.
    pub async fn read_address_in(&self, db: Option<u16>, address: &Address) -> PlcResult<Option<Value>> {
        let (area, db) = self.target(&address.area, db.map(u32::from))?;
        if area == S7Area::Marks && address.data_type.is_bit() {
            return self
                .read_mark(address.position, address.bit_index())
                .await
                .map(|on| Some(Value::Bool(on)));
        }

        let codec = self.codec();
        let width = codec.width(address.data_type) as u32;
        let data = self.read_bytes(area, db, address.position, width).await?;
        Ok(codec.decode(&data, address.data_type, address.bit_index()))
    }

    /// Writes one value by address string.
    pub async fn write_value_in(&self, db: Option<u16>, value: &Value, address: &str) -> PlcResult<()> {
        let address = self.grammar().parse(address)?;
        self.write_address_in(db, value, &address).await
    }

    /// Writes one parsed address. Booleans only change their own bit.
    pub async fn write_address_in(&self, db: Option<u16>, value: &Value, address: &Address) -> PlcResult<()> {
        if address.data_type.is_bit() {
            let on = value.as_bool().ok_or_else(|| {
                PlcError::invalid_value(address.to_string(), format!("'{value}' is not a boolean"))
            })?;
            return self.write_bit_in(db, address, on).await;
        }

        let (area, db) = self.target(&address.area, db.map(u32::from))?;
        let data = self.codec().encode(value, address.data_type, 0)?;
        self.write_bytes(area, db, address.position, &data).await
    }

    /// Sets or clears one bit; the rest of its byte is preserved.
    pub async fn write_bit_in(&self, db: Option<u16>, address: &Address, on: bool) -> PlcResult<()> {
        let (area, db) = self.target(&address.area, db.map(u32::from))?;
        let bit = address.bit_index();
        if area == S7Area::Marks {
            return self.write_mark(address.position, bit, on).await;
        }
        if bit > 7 {
            return Err(PlcError::invalid_value(
                address.to_string(),
                format!("bit {bit} outside a 1-byte register"),
            ));
        }

        let codec = self.codec();
        let mut session = self.guard.acquire().await?;
        let started = Instant::now();
        let result: S7Result<()> = async {
            let current = self.read_bytes_in(&mut session, area, db, address.position, 1).await?;
            let merged = codec
                .merge_bit(&current, bit, on)
                .map_err(|e| S7Error::client(e.to_string()))?;
            self.write_bytes_in(&mut session, area, db, address.position, &merged).await
        }
        .await;
        if result.is_ok() {
            self.stats.record_write(1, started.elapsed());
        }
        let result = self.settle(&mut session, result, "write bit").await;
        session.finish(result).await
    }

    /// Reads `n` consecutive values of `data_type` from a DB.
    pub async fn read_array_in(
        &self,
        db: Option<u16>,
        position: u32,
        data_type: DataType,
        n: u32,
    ) -> PlcResult<Vec<Option<Value>>> {
        let codec = self.codec();
        let width = codec.width(data_type);
        let data = self
            .read_registers_in(db, position, scaled_position(0, n, width as u32)?)
            .await?;
        Ok(data
            .chunks(width)
            .map(|bytes| codec.decode(bytes, data_type, 0))
            .collect())
    }

    // -------------------------------------------------------------------------
    // Marks and parameters
    // -------------------------------------------------------------------------

    /// Reads mark bit `position.bit`.
    pub async fn read_mark(&self, position: u32, bit: u8) -> PlcResult<bool> {
        let request = AreaRequest {
            area: S7Area::Marks,
            db: 0,
            start: mark_offset(position, bit)?,
            count: 1,
            word_len: WordLength::Bit,
        };
        let data = self.read_request(request, "read mark").await?;
        Ok(data.first().is_some_and(|b| *b != 0))
    }

    /// Sets or clears mark bit `position.bit`.
    pub async fn write_mark(&self, position: u32, bit: u8, on: bool) -> PlcResult<()> {
        let request = AreaRequest {
            area: S7Area::Marks,
            db: 0,
            start: mark_offset(position, bit)?,
            count: 1,
            word_len: WordLength::Bit,
        };
        self.write_request(request, &[u8::from(on)], "write mark").await
    }

    /// Reads a native client parameter.
    pub async fn get_param(&self, param: S7Param) -> PlcResult<i64> {
        let session = self.guard.acquire().await?;
        let result = self.call(move |d| d.get_param(param)).await.map_err(|e| {
            e.log("get param");
            PlcError::from(e)
        });
        session.finish(result).await
    }

    /// Writes a native client parameter.
    pub async fn set_param(&self, param: S7Param, value: i64) -> PlcResult<()> {
        if !param.kind().accepts(value) {
            return Err(PlcError::invalid_value(
                format!("{param:?}"),
                format!("{value} does not fit {:?}", param.kind()),
            ));
        }
        let session = self.guard.acquire().await?;
        let result = self
            .call(move |d| d.set_param(param, value))
            .await
            .map_err(|e| {
                e.log("set param");
                PlcError::from(e)
            });
        session.finish(result).await
    }
}

#[async_trait]
impl<D: S7Driver> DeviceClient for SiemensClient<D> {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::Siemens
    }

    fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    fn variables(&self) -> &VariableRegistry {
        &self.variables
    }

    fn state(&self) -> ConnectionState {
        self.state.get()
    }

    async fn connect(&self) -> PlcResult<()> {
        self.connect_to(None, None, None).await
    }

    async fn disconnect(&self) -> PlcResult<()> {
        let mut session = self.guard.acquire().await?;
        if session.connected {
            if let Err(e) = self.call(|d| d.disconnect()).await {
                debug!(error = %e, "S7 disconnect failed");
            }
            session.connected = false;
            info!(host = %session.host, "Disconnected from S7 PLC");
        }
        self.state.set(ConnectionState::Disconnected);
        Ok(())
    }

    async fn read_registers(&self, position: u32, count: u32) -> PlcResult<Vec<u8>> {
        self.read_registers_in(None, position, count).await
    }

    async fn write_registers(&self, data: &[u8], position: u32, count: u32) -> PlcResult<()> {
        self.write_registers_in(None, data, position, count).await
    }

    async fn read_area(&self, area: &str, position: u32, count: u32, extra_id: Option<u32>) -> PlcResult<Vec<u8>> {
        let (area, db) = self.target(area, extra_id)?;
        let request = AreaRequest {
            area,
            db,
            start: position,
            count,
            word_len: area.word_length(),
        };
        self.read_request(request, "read").await
    }

    async fn write_area(
        &self,
        data: &[u8],
        area: &str,
        position: u32,
        count: u32,
        extra_id: Option<u32>,
    ) -> PlcResult<()> {
        let (area, db) = self.target(area, extra_id)?;
        let request = AreaRequest {
            area,
            db,
            start: position,
            count,
            word_len: area.word_length(),
        };
        self.write_request(request, data, "write").await
    }

    async fn write_bit(&self, address: &Address, on: bool) -> PlcResult<()> {
        self.write_bit_in(None, address, on).await
    }

    async fn read_window(&self, area: &str, window: &ReadWindow, offset: u32) -> PlcResult<Vec<u8>> {
        let (area, db) = self.target(area, None)?;
        let start = scaled_position(window.min, offset, window.count)?;
        self.read_bytes(area, db, start, window.count).await
    }

    async fn read_address(&self, address: &Address) -> PlcResult<Option<Value>> {
        self.read_address_in(None, address).await
    }

    async fn write_address(&self, value: &Value, address: &Address) -> PlcResult<()> {
        self.write_address_in(None, value, address).await
    }

    async fn read_array(&self, position: u32, data_type: DataType, n: u32) -> PlcResult<Vec<Option<Value>>> {
        self.read_array_in(None, position, data_type, n).await
    }
}

impl<D: S7Driver> std::fmt::Debug for SiemensClient<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiemensClient")
            .field("host", &self.config.host)
            .field("rack", &self.config.rack)
            .field("slot", &self.config.slot)
            .field("state", &self.state.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MemoryDriver;

    fn client() -> SiemensClient<MemoryDriver> {
        SiemensClient::with_driver(SiemensConfig::new("10.0.0.2"), MemoryDriver::new()).unwrap()
    }

    #[test]
    fn test_db_resolution() {
        let client = client();
        let err = client.target("db", None).unwrap_err();
        assert!(matches!(err, PlcError::MissingDbNumber));

        assert_eq!(client.target("db4", None).unwrap(), (S7Area::DataBlock, 4));
        assert_eq!(client.target("db", None).unwrap(), (S7Area::DataBlock, 4));
        assert_eq!(client.target("db", Some(9)).unwrap(), (S7Area::DataBlock, 9));
        assert_eq!(client.target("mk", Some(9)).unwrap(), (S7Area::Marks, 0));
        assert_eq!(client.db_number(), Some(9));
    }

    #[test]
    fn test_unknown_area_and_db_range() {
        let client = client();
        assert!(matches!(
            client.target("hr", None).unwrap_err(),
            PlcError::UnsupportedArea { .. }
        ));
        assert!(matches!(
            client.target("db70000", None).unwrap_err(),
            PlcError::InvalidAddress { .. }
        ));
    }

    #[test]
    fn test_config_db_seeds_cache() {
        let config = SiemensConfig {
            db_number: Some(3),
            ..SiemensConfig::new("10.0.0.2")
        };
        let client = SiemensClient::with_driver(config, MemoryDriver::new()).unwrap();
        assert_eq!(client.target("db", None).unwrap(), (S7Area::DataBlock, 3));
    }

    #[test]
    fn test_mark_offset() {
        assert_eq!(mark_offset(8, 3).unwrap(), 67);
        assert!(matches!(mark_offset(8, 8).unwrap_err(), PlcError::InvalidValue { .. }));
        assert!(matches!(mark_offset(u32::MAX, 0).unwrap_err(), PlcError::InvalidValue { .. }));
    }

    #[test]
    fn test_with_driver_validates() {
        assert!(SiemensClient::with_driver(SiemensConfig::new("plc"), MemoryDriver::new()).is_err());
    }
}
