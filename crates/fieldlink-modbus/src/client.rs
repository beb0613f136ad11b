// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus/TCP device client.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      ModbusClient                        │
//! │  DeviceClient: read_area / write_area / write_bit / ...  │
//! └──────────────────────────────────────────────────────────┘
//!                            │ AccessGuard (one request at a time, paced)
//!                            ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  ModbusSession { host, port, unit_id, TcpStream }        │
//! │  frame::Request ──► socket ──► MBAP header + PDU         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Bit tables (`co`, `in`) are presented as one register per bit holding 0
//! or 1, so bit variables decode the same way as on holding registers. Coil
//! writes treat every non-zero register as "on".

use std::io;
use std::time::Instant;

use async_trait::async_trait;
use fieldlink_core::{
    split_area_tag, AccessGuard, Address, ClientSettings, ClientStats, ConnectionState, DeviceClient,
    DeviceFamily, Endianness, PlcError, PlcResult, StateCell, ValueCodec, VariableRegistry,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

use crate::config::ModbusConfig;
use crate::error::{ConnectionError, ModbusError, ModbusResult, ProtocolError, RequestError, UnitId};
use crate::frame::{
    bit_bytes, unpack_bits, MbapHeader, RegisterType, Request, Response, MAX_REGISTERS_PER_REQUEST,
    MBAP_HEADER_LEN,
};

// =============================================================================
// Session
// =============================================================================

/// Connection state guarded by the client's access guard.
#[derive(Debug)]
struct ModbusSession {
    host: String,
    port: u16,
    unit_id: u8,
    stream: Option<TcpStream>,
}

impl ModbusSession {
    /// Non-blocking liveness probe of the open socket.
    fn is_alive(&self) -> bool {
        let Some(stream) = &self.stream else {
            return false;
        };
        let mut probe = [0u8; 1];
        match stream.try_read(&mut probe) {
            Err(e) => e.kind() == io::ErrorKind::WouldBlock,
            // EOF, or unsolicited bytes that put the stream out of step
            Ok(_) => false,
        }
    }
}

/// A validated request target.
#[derive(Debug, Clone, Copy)]
struct Target {
    register: RegisterType,
    unit_id: Option<u8>,
    start: u16,
    count: u16,
}

impl Target {
    fn resolve(area: &str, position: u32, count: u32) -> ModbusResult<Self> {
        let (tag, number) = split_area_tag(area);
        let register = RegisterType::from_area(tag)
            .ok_or_else(|| ModbusError::illegal_value(format!("unknown area '{area}'")))?;
        let unit_id = number.map(unit_id_from).transpose()?;

        if count == 0 || count > u32::from(MAX_REGISTERS_PER_REQUEST) {
            return Err(ModbusError::illegal_value(format!(
                "count {count} outside 1..={MAX_REGISTERS_PER_REQUEST}"
            )));
        }
        if u64::from(position) + u64::from(count) > 0x1_0000 {
            return Err(ModbusError::illegal_value(format!(
                "registers {position}..{} exceed the address space",
                u64::from(position) + u64::from(count)
            )));
        }

        Ok(Self {
            register,
            unit_id,
            start: position as u16,
            count: count as u16,
        })
    }

    fn writable(self, area: &str) -> ModbusResult<Self> {
        match self.register.write_function() {
            Some(_) => Ok(self),
            None => Err(RequestError::UnsupportedArea { area: area.to_string() }.into()),
        }
    }
}

fn unit_id_from(id: u32) -> ModbusResult<u8> {
    u8::try_from(id).map_err(|_| ModbusError::illegal_value(format!("unit id {id} out of range")))
}

// =============================================================================
// ModbusClient
// =============================================================================

/// Client for one Modbus/TCP device.
///
/// # Example
///
/// ```rust,ignore
/// use fieldlink_core::DeviceClient;
/// use fieldlink_modbus::{ModbusClient, ModbusConfig};
///
/// let client = ModbusClient::new(ModbusConfig::new("192.168.1.10"))?;
/// client.connect().await?;
/// let speed = client.read_value("w2").await?;
/// let coil = client.read_value("co.x0").await?;
/// ```
pub struct ModbusClient {
    config: ModbusConfig,
    settings: ClientSettings,
    guard: AccessGuard<ModbusSession>,
    state: StateCell,
    stats: ClientStats,
    variables: VariableRegistry,
}

impl ModbusClient {
    /// Creates a disconnected client.
    pub fn new(config: ModbusConfig) -> PlcResult<Self> {
        config.validate()?;
        let settings = config.to_settings()?;
        let session = ModbusSession {
            host: config.host.clone(),
            port: config.port,
            unit_id: config.unit_id,
            stream: None,
        };

        Ok(Self {
            guard: AccessGuard::new(session, settings.access_timeout, settings.pacing),
            config,
            settings,
            state: StateCell::new(),
            stats: ClientStats::new(),
            variables: VariableRegistry::new(),
        })
    }

    /// Client configuration.
    pub fn config(&self) -> &ModbusConfig {
        &self.config
    }

    /// Request statistics.
    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    /// Connects, optionally to another host or with another default unit id.
    ///
    /// A new host drops the current socket. With a live socket to the same
    /// host this is a no-op.
    pub async fn connect_to(&self, host: Option<&str>, unit_id: Option<u8>) -> PlcResult<()> {
        let mut session = self.guard.acquire().await?;

        if let Some(host) = host.filter(|h| *h != session.host) {
            session.stream = None;
            session.host = host.to_string();
        }
        if let Some(unit_id) = unit_id {
            session.unit_id = unit_id;
        }

        if session.is_alive() {
            debug!(host = %session.host, port = session.port, "Modbus connection still open");
            self.state.set(ConnectionState::Connected);
            return Ok(());
        }

        let result = self.open(&mut session).await.map_err(|e| {
            e.log("connect");
            PlcError::from(e)
        });
        session.finish(result).await
    }

    async fn open(&self, session: &mut ModbusSession) -> ModbusResult<()> {
        session.stream = None;
        self.state.set(ConnectionState::Connecting);

        let timeout = self.config.connect_timeout;
        let connect = TcpStream::connect((session.host.as_str(), session.port));
        let stream = match tokio::time::timeout(timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.state.set(ConnectionState::Error);
                return Err(ConnectionError::from_connect(&session.host, session.port, session.unit_id, e).into());
            }
            Err(_) => {
                self.state.set(ConnectionState::Error);
                return Err(ConnectionError::TimedOut {
                    host: session.host.clone(),
                    port: session.port,
                    unit_id: session.unit_id,
                    duration: timeout,
                }
                .into());
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "TCP_NODELAY not applied");
        }
        session.stream = Some(stream);
        self.state.set(ConnectionState::Connected);
        self.stats.record_connection();
        info!(
            host = %session.host,
            port = session.port,
            unit_id = %UnitId(session.unit_id),
            "Connected to Modbus device"
        );
        Ok(())
    }

    async fn ensure_connected(&self, session: &mut ModbusSession) -> ModbusResult<()> {
        if session.stream.is_some() {
            return Ok(());
        }
        if self.settings.auto_connect {
            return self.open(session).await;
        }
        Err(ModbusError::not_connected())
    }

    /// Sends one request and returns its response.
    async fn transact(&self, session: &mut ModbusSession, request: Request) -> ModbusResult<Response> {
        let response_timeout = self.config.response_timeout;
        let stream = session.stream.as_mut().ok_or_else(ModbusError::not_connected)?;

        let exchange = async {
            stream.write_all(&request.to_bytes()).await.map_err(ConnectionError::Io)?;

            let mut head = [0u8; MBAP_HEADER_LEN];
            stream.read_exact(&mut head).await.map_err(ConnectionError::Io)?;
            let header = MbapHeader::decode(&head)?;

            let mut pdu = vec![0u8; header.pdu_len()];
            stream.read_exact(&mut pdu).await.map_err(ConnectionError::Io)?;
            Ok::<_, ModbusError>((header, pdu))
        };
        let (header, pdu) = tokio::time::timeout(response_timeout, exchange)
            .await
            .map_err(|_| ConnectionError::ResponseTimeout(response_timeout))??;

        if header.transaction_id != request.header.transaction_id {
            return Err(ProtocolError::TransactionMismatch {
                expected: request.header.transaction_id,
                actual: header.transaction_id,
            }
            .into());
        }
        trace!(
            transaction_id = header.transaction_id,
            unit_id = header.unit_id,
            pdu_len = pdu.len(),
            "Modbus response"
        );

        let response = Response::parse(&pdu)?;
        if response.function.code() != request.function_code() {
            return Err(ProtocolError::InvalidHeader(format!(
                "function {:#04x} answered with {:#04x}",
                request.function_code(),
                response.function.code()
            ))
            .into());
        }
        Ok(response)
    }

    /// Records, logs and converts a failed exchange.
    fn fail(&self, session: &mut ModbusSession, error: ModbusError, context: &str) -> PlcError {
        self.stats.record_error();
        error.log(context);
        let out_of_step = error.breaks_framing();
        if out_of_step || (error.is_communication() && self.settings.disconnect_on_error) {
            if session.stream.take().is_some() {
                warn!(
                    host = %session.host,
                    port = session.port,
                    out_of_step,
                    "Dropped Modbus connection after communication error"
                );
            }
            self.state.set(ConnectionState::Disconnected);
        }
        error.into()
    }

    fn bits_to_registers(&self, bits: &[bool]) -> Vec<u8> {
        bits.iter()
            .flat_map(|on| match self.settings.codec.endianness {
                Endianness::Big => u16::from(*on).to_be_bytes(),
                Endianness::Little => u16::from(*on).to_le_bytes(),
            })
            .collect()
    }

    async fn read_in(&self, session: &mut ModbusSession, target: Target) -> ModbusResult<Vec<u8>> {
        self.ensure_connected(session).await?;
        let unit_id = target.unit_id.unwrap_or(session.unit_id);
        debug!(
            area = %target.register,
            unit_id,
            start = target.start,
            count = target.count,
            "Modbus read"
        );

        let request = Request::read(
            rand::random(),
            unit_id,
            target.register.read_function(),
            target.start,
            target.count,
        );
        let response = self.transact(session, request).await?;

        if target.register.is_bit() {
            let packed = response.read_data(bit_bytes(target.count))?;
            Ok(self.bits_to_registers(&unpack_bits(&packed, usize::from(target.count))))
        } else {
            response.read_data(usize::from(target.count) * 2)
        }
    }

    async fn write_in(&self, session: &mut ModbusSession, target: Target, data: &[u8]) -> ModbusResult<()> {
        self.ensure_connected(session).await?;
        let unit_id = target.unit_id.unwrap_or(session.unit_id);
        debug!(
            area = %target.register,
            unit_id,
            start = target.start,
            count = target.count,
            "Modbus write"
        );

        let transaction_id = rand::random();
        let request = match target.register {
            RegisterType::Coil => {
                let coils: Vec<bool> = data.chunks_exact(2).map(|r| r != [0, 0]).collect();
                Request::write_coils(transaction_id, unit_id, target.start, &coils)
            }
            _ => Request::write_registers(transaction_id, unit_id, target.start, target.count, data),
        };
        let response = self.transact(session, request).await?;

        // echo of start address and quantity
        if response.body.len() < 4 {
            return Err(ProtocolError::ShortResponse {
                expected: 4,
                actual: response.body.len(),
            }
            .into());
        }
        Ok(())
    }

    async fn write_bit_in(
        &self,
        session: &mut ModbusSession,
        target: Target,
        codec: &ValueCodec,
        bit: u8,
        on: bool,
    ) -> ModbusResult<()> {
        let register = match target.register {
            // a coil is a single bit
            RegisterType::Coil => self.bits_to_registers(&[on]),
            _ => {
                let current = self.read_in(session, target).await?;
                codec
                    .merge_bit(&current, bit, on)
                    .map_err(|e| ModbusError::illegal_value(e.to_string()))?
            }
        };
        self.write_in(session, target, &register).await
    }
}

#[async_trait]
impl DeviceClient for ModbusClient {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::Modbus
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
        self.connect_to(None, None).await
    }

    async fn disconnect(&self) -> PlcResult<()> {
        let mut session = self.guard.acquire().await?;
        if let Some(mut stream) = session.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(error = %e, "Socket shutdown failed");
            }
            info!(host = %session.host, port = session.port, "Disconnected from Modbus device");
        }
        self.state.set(ConnectionState::Disconnected);
        Ok(())
    }

    async fn read_registers(&self, position: u32, count: u32) -> PlcResult<Vec<u8>> {
        self.read_area(RegisterType::HoldingRegister.tag(), position, count, None)
            .await
    }

    async fn write_registers(&self, data: &[u8], position: u32, count: u32) -> PlcResult<()> {
        self.write_area(data, RegisterType::HoldingRegister.tag(), position, count, None)
            .await
    }

    async fn read_area(&self, area: &str, position: u32, count: u32, extra_id: Option<u32>) -> PlcResult<Vec<u8>> {
        let target = Target::resolve(area, position, count)?;
        let default_unit = extra_id.map(unit_id_from).transpose()?;

        let mut session = self.guard.acquire().await?;
        if let Some(unit_id) = default_unit {
            session.unit_id = unit_id;
        }

        let started = Instant::now();
        let result = match self.read_in(&mut session, target).await {
            Ok(data) => {
                self.stats.record_read(data.len(), started.elapsed());
                Ok(data)
            }
            Err(e) => Err(self.fail(&mut session, e, "read")),
        };
        session.finish(result).await
    }

    async fn write_area(
        &self,
        data: &[u8],
        area: &str,
        position: u32,
        count: u32,
        extra_id: Option<u32>,
    ) -> PlcResult<()> {
        let target = Target::resolve(area, position, count)?.writable(area)?;
        let expected = count as usize * 2;
        if data.len() != expected {
            return Err(ModbusError::from(RequestError::PayloadLength {
                expected,
                actual: data.len(),
            })
            .into());
        }
        let default_unit = extra_id.map(unit_id_from).transpose()?;

        let mut session = self.guard.acquire().await?;
        if let Some(unit_id) = default_unit {
            session.unit_id = unit_id;
        }

        let started = Instant::now();
        let result = match self.write_in(&mut session, target, data).await {
            Ok(()) => {
                self.stats.record_write(data.len(), started.elapsed());
                Ok(())
            }
            Err(e) => Err(self.fail(&mut session, e, "write")),
        };
        session.finish(result).await
    }

    async fn write_bit(&self, address: &Address, on: bool) -> PlcResult<()> {
        let target = Target::resolve(&address.area, address.position, 1)?.writable(&address.area)?;
        let codec = self.codec();

        let mut session = self.guard.acquire().await?;
        let started = Instant::now();
        let result = match self
            .write_bit_in(&mut session, target, &codec, address.bit_index(), on)
            .await
        {
            Ok(()) => {
                self.stats.record_write(2, started.elapsed());
                Ok(())
            }
            Err(e) => Err(self.fail(&mut session, e, "write bit")),
        };
        session.finish(result).await
    }
}

impl std::fmt::Debug for ModbusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusClient")
            .field("address", &self.config.socket_addr())
            .field("state", &self.state.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_resolution() {
        let target = Target::resolve("hr5", 10, 2).unwrap();
        assert_eq!(target.register, RegisterType::HoldingRegister);
        assert_eq!(target.unit_id, Some(5));
        assert_eq!((target.start, target.count), (10, 2));

        let plc: PlcError = Target::resolve("hr", 0, 124).unwrap_err().into();
        assert_eq!(plc.device_code(), Some(3));
        let plc: PlcError = Target::resolve("hr", 0, 0).unwrap_err().into();
        assert_eq!(plc.device_code(), Some(3));
        let plc: PlcError = Target::resolve("db", 0, 1).unwrap_err().into();
        assert_eq!(plc.device_code(), Some(3));
        let plc: PlcError = Target::resolve("hr300", 0, 1).unwrap_err().into();
        assert_eq!(plc.device_code(), Some(3));
        assert!(Target::resolve("hr", 65_535, 2).is_err());
    }

    #[test]
    fn test_read_only_tables() {
        let plc: PlcError = Target::resolve("ir", 0, 1)
            .and_then(|t| t.writable("ir"))
            .unwrap_err()
            .into();
        assert!(matches!(plc, PlcError::UnsupportedArea { .. }));
        assert!(Target::resolve("co", 0, 1).and_then(|t| t.writable("co")).is_ok());
    }

    #[test]
    fn test_new_validates() {
        assert!(ModbusClient::new(ModbusConfig::default()).is_err());
        let client = ModbusClient::new(ModbusConfig::new("127.0.0.1")).unwrap();
        assert!(!client.is_connected());
        assert_eq!(client.settings().max_registers, 123);
    }

    #[test]
    fn test_bits_to_registers() {
        let client = ModbusClient::new(ModbusConfig::new("127.0.0.1")).unwrap();
        assert_eq!(client.bits_to_registers(&[true, false]), vec![0, 1, 0, 0]);
    }
}
